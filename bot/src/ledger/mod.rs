//! The only module that talks SQL. Every other component goes through the
//! narrow store contracts (`UsageStore`, `ReactionStore`, `IdentityStore`)
//! or the concrete accessors below, so the ledger invariants are enforced
//! in one place.

pub mod models;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::pooled_connection::deadpool::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use thiserror::Error;

use crate::credit::UsageStore;
use crate::identity::IdentityStore;
use crate::karma::ReactionStore;
use crate::schema::{abbreviations, identities, karma, meta, reactions, usage};
use models::{Abbreviation, Identity, KarmaRecord, ReactionRecord, UsageAccount};

pub const META_LAST_RESET: &str = "last_reset";

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("database error: {0}")]
    Query(#[from] diesel::result::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] diesel_async::pooled_connection::deadpool::PoolError),
}

pub struct Ledger {
    pool: Pool<AsyncPgConnection>,
}

impl Ledger {
    pub fn connect(database_url: &str) -> eyre::Result<Self> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
        let pool = Pool::builder(manager)
            .max_size(10)
            .build()
            .map_err(|e| eyre::eyre!("failed to build connection pool: {e}"))?;
        Ok(Ledger { pool })
    }

    pub async fn karma_of(&self, guild_id: i64, user_id: i64) -> Result<i64, LedgerError> {
        let mut conn = self.pool.get().await?;
        let record = karma::table
            .find((guild_id, user_id))
            .select(KarmaRecord::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(record.map(|r| r.score).unwrap_or(0))
    }

    /// Daily reset: every account's spendable balance back to the allowance.
    pub async fn reset_usage(&self, allowance: f64) -> Result<(), LedgerError> {
        let mut conn = self.pool.get().await?;
        diesel::update(usage::table)
            .set(usage::usage_balance.eq(allowance))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    /// Pin one account's spendable balance, creating the account if needed.
    /// Used for the operator's boosted allowance.
    pub async fn set_usage_balance(&self, user_id: i64, balance: f64) -> Result<(), LedgerError> {
        let mut conn = self.pool.get().await?;
        diesel::insert_into(usage::table)
            .values(&UsageAccount {
                user_id,
                usage_balance: balance,
                bank_balance: 0.0,
                total_usage: 0.0,
            })
            .on_conflict(usage::user_id)
            .do_update()
            .set(usage::usage_balance.eq(balance))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn meta_get(&self, key: &str) -> Result<Option<String>, LedgerError> {
        let mut conn = self.pool.get().await?;
        let value = meta::table
            .find(key)
            .select(meta::value)
            .first::<String>(&mut conn)
            .await
            .optional()?;
        Ok(value)
    }

    pub async fn meta_set(&self, key: &str, value: &str) -> Result<(), LedgerError> {
        let mut conn = self.pool.get().await?;
        diesel::insert_into(meta::table)
            .values((meta::key.eq(key), meta::value.eq(value)))
            .on_conflict(meta::key)
            .do_update()
            .set(meta::value.eq(value))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn abbreviations_for(
        &self,
        guild_id: i64,
        user_id: i64,
    ) -> Result<Vec<Abbreviation>, LedgerError> {
        let mut conn = self.pool.get().await?;
        let rows = abbreviations::table
            .filter(abbreviations::guild_id.eq(guild_id))
            .filter(abbreviations::user_id.eq(user_id))
            .select(Abbreviation::as_select())
            .load(&mut conn)
            .await?;
        Ok(rows)
    }

    pub async fn set_abbreviation(
        &self,
        guild_id: i64,
        user_id: i64,
        key: &str,
        value: &str,
    ) -> Result<(), LedgerError> {
        let mut conn = self.pool.get().await?;
        diesel::insert_into(abbreviations::table)
            .values((
                abbreviations::guild_id.eq(guild_id),
                abbreviations::user_id.eq(user_id),
                abbreviations::key.eq(key),
                abbreviations::value.eq(value),
            ))
            .on_conflict((
                abbreviations::guild_id,
                abbreviations::user_id,
                abbreviations::key,
            ))
            .do_update()
            .set(abbreviations::value.eq(value))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    /// Returns whether an abbreviation was actually removed.
    pub async fn delete_abbreviation(
        &self,
        guild_id: i64,
        user_id: i64,
        key: &str,
    ) -> Result<bool, LedgerError> {
        let mut conn = self.pool.get().await?;
        let deleted = diesel::delete(
            abbreviations::table
                .filter(abbreviations::guild_id.eq(guild_id))
                .filter(abbreviations::user_id.eq(user_id))
                .filter(abbreviations::key.eq(key)),
        )
        .execute(&mut conn)
        .await?;
        Ok(deleted > 0)
    }
}

/// Karma upsert shared by the reaction paths. Runs inside the caller's
/// transaction.
async fn bump_karma(
    conn: &mut AsyncPgConnection,
    guild_id: i64,
    user_id: i64,
    delta: i64,
) -> Result<(), diesel::result::Error> {
    diesel::insert_into(karma::table)
        .values((
            karma::guild_id.eq(guild_id),
            karma::user_id.eq(user_id),
            karma::score.eq(delta),
        ))
        .on_conflict((karma::guild_id, karma::user_id))
        .do_update()
        .set(karma::score.eq(karma::score + delta))
        .execute(conn)
        .await?;
    Ok(())
}

#[async_trait]
impl UsageStore for Ledger {
    async fn load_account(&self, user_id: i64) -> Result<Option<UsageAccount>, LedgerError> {
        let mut conn = self.pool.get().await?;
        let account = usage::table
            .find(user_id)
            .select(UsageAccount::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(account)
    }

    async fn create_account(&self, account: &UsageAccount) -> Result<(), LedgerError> {
        let mut conn = self.pool.get().await?;
        diesel::insert_into(usage::table)
            .values(account)
            .on_conflict_do_nothing()
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn settle_account(
        &self,
        user_id: i64,
        usage_balance: f64,
        bank_balance: f64,
        spent: f64,
    ) -> Result<(), LedgerError> {
        let mut conn = self.pool.get().await?;
        diesel::update(usage::table.find(user_id))
            .set((
                usage::usage_balance.eq(usage_balance),
                usage::bank_balance.eq(bank_balance),
                usage::total_usage.eq(usage::total_usage + spent),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ReactionStore for Ledger {
    async fn reaction(
        &self,
        message_id: i64,
        reactor_id: i64,
        value: &str,
    ) -> Result<Option<ReactionRecord>, LedgerError> {
        let mut conn = self.pool.get().await?;
        let record = reactions::table
            .find((message_id, reactor_id, value))
            .select(ReactionRecord::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(record)
    }

    async fn apply_add(
        &self,
        guild_id: i64,
        record: &ReactionRecord,
        karma_delta: i64,
    ) -> Result<(), LedgerError> {
        let mut conn = self.pool.get().await?;
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            async move {
                diesel::insert_into(reactions::table)
                    .values(record)
                    .on_conflict((
                        reactions::message_id,
                        reactions::reactor_id,
                        reactions::value,
                    ))
                    .do_update()
                    .set(reactions::reactee_id.eq(record.reactee_id))
                    .execute(conn)
                    .await?;
                if karma_delta != 0 {
                    bump_karma(conn, guild_id, record.reactee_id, karma_delta).await?;
                }
                Ok(())
            }
            .scope_boxed()
        })
        .await?;
        Ok(())
    }

    async fn apply_remove(
        &self,
        guild_id: i64,
        message_id: i64,
        reactor_id: i64,
        value: &str,
        karma_delta: i64,
    ) -> Result<bool, LedgerError> {
        let mut conn = self.pool.get().await?;
        let removed = conn
            .transaction::<_, diesel::result::Error, _>(|conn| {
                async move {
                    // The karma target is whoever the stored row says was
                    // reacted to, not whoever owns the message now.
                    let reactees: Vec<i64> = diesel::delete(
                        reactions::table
                            .filter(reactions::message_id.eq(message_id))
                            .filter(reactions::reactor_id.eq(reactor_id))
                            .filter(reactions::value.eq(value)),
                    )
                    .returning(reactions::reactee_id)
                    .get_results(conn)
                    .await?;
                    for reactee_id in &reactees {
                        bump_karma(conn, guild_id, *reactee_id, karma_delta).await?;
                    }
                    Ok(!reactees.is_empty())
                }
                .scope_boxed()
            })
            .await?;
        Ok(removed)
    }
}

#[async_trait]
impl IdentityStore for Ledger {
    async fn identity(&self, user_id: i64) -> Result<Option<Identity>, LedgerError> {
        let mut conn = self.pool.get().await?;
        let identity = identities::table
            .find(user_id)
            .select(Identity::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(identity)
    }

    async fn set_name(&self, user_id: i64, name: &str) -> Result<(), LedgerError> {
        let mut conn = self.pool.get().await?;
        diesel::insert_into(identities::table)
            .values((identities::user_id.eq(user_id), identities::name.eq(name)))
            .on_conflict(identities::user_id)
            .do_update()
            .set(identities::name.eq(name))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn set_description(&self, user_id: i64, description: &str) -> Result<(), LedgerError> {
        let mut conn = self.pool.get().await?;
        diesel::insert_into(identities::table)
            .values((
                identities::user_id.eq(user_id),
                identities::description.eq(description),
            ))
            .on_conflict(identities::user_id)
            .do_update()
            .set(identities::description.eq(description))
            .execute(&mut conn)
            .await?;
        Ok(())
    }
}

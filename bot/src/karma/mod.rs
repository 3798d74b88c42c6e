//! Idempotent accounting of up/down reactions and the karma deltas they
//! imply. A slot is keyed by (message, reactor, value); duplicate add events
//! and historical replays can never double-count karma.

use std::sync::Arc;

use async_trait::async_trait;

use crate::ledger::models::ReactionRecord;
use crate::ledger::LedgerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionKind {
    Upvote,
    Downvote,
}

impl ReactionKind {
    pub fn karma_delta(self) -> i64 {
        match self {
            ReactionKind::Upvote => 1,
            ReactionKind::Downvote => -1,
        }
    }
}

#[async_trait]
pub trait ReactionStore: Send + Sync {
    async fn reaction(
        &self,
        message_id: i64,
        reactor_id: i64,
        value: &str,
    ) -> Result<Option<ReactionRecord>, LedgerError>;

    /// Upsert the slot and apply the karma delta atomically.
    async fn apply_add(
        &self,
        guild_id: i64,
        record: &ReactionRecord,
        karma_delta: i64,
    ) -> Result<(), LedgerError>;

    /// Delete the slot if present, applying the delta to the stored
    /// reactee. Returns whether a row was removed.
    async fn apply_remove(
        &self,
        guild_id: i64,
        message_id: i64,
        reactor_id: i64,
        value: &str,
        karma_delta: i64,
    ) -> Result<bool, LedgerError>;
}

pub struct ReactionLedger<S> {
    store: Arc<S>,
}

impl<S: ReactionStore> ReactionLedger<S> {
    pub fn new(store: Arc<S>) -> Self {
        ReactionLedger { store }
    }

    /// Record a reaction. A pre-existing slot only refreshes the recorded
    /// reactee (authorship can be learned or corrected later); karma moves
    /// exactly once, on the transition into the slot.
    pub async fn add(
        &self,
        guild_id: i64,
        message_id: i64,
        reactor_id: i64,
        reactee_id: i64,
        value: &str,
        kind: ReactionKind,
    ) -> Result<(), LedgerError> {
        let existing = self.store.reaction(message_id, reactor_id, value).await?;
        let karma_delta = if existing.is_some() {
            0
        } else {
            kind.karma_delta()
        };
        let record = ReactionRecord {
            message_id,
            reactor_id,
            value: value.to_string(),
            reactee_id,
        };
        self.store.apply_add(guild_id, &record, karma_delta).await
    }

    /// Undo a reaction. A no-op when the slot is absent; otherwise the
    /// inverse delta goes to whoever the slot recorded as reactee.
    pub async fn remove(
        &self,
        guild_id: i64,
        message_id: i64,
        reactor_id: i64,
        value: &str,
        kind: ReactionKind,
    ) -> Result<bool, LedgerError> {
        self.store
            .apply_remove(guild_id, message_id, reactor_id, value, -kind.karma_delta())
            .await
    }
}

use diesel::prelude::*;

#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::usage)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UsageAccount {
    pub user_id: i64,
    pub usage_balance: f64,
    pub bank_balance: f64,
    pub total_usage: f64,
}

impl UsageAccount {
    /// Fresh account holding the configured daily allowance.
    pub fn with_allowance(user_id: i64, allowance: f64) -> Self {
        UsageAccount {
            user_id,
            usage_balance: allowance,
            bank_balance: 0.0,
            total_usage: 0.0,
        }
    }
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::karma)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct KarmaRecord {
    pub guild_id: i64,
    pub user_id: i64,
    pub score: i64,
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::reactions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ReactionRecord {
    pub message_id: i64,
    pub reactor_id: i64,
    pub value: String,
    pub reactee_id: i64,
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone, Default)]
#[diesel(table_name = crate::schema::identities)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Identity {
    pub user_id: i64,
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::abbreviations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Abbreviation {
    pub guild_id: i64,
    pub user_id: i64,
    pub key: String,
    pub value: String,
}

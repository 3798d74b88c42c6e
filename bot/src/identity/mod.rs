//! Maps user identifiers to display names and the free-text memory the
//! model maintains about them. Resolution never fails: a user the store and
//! the member directory both miss falls back to their stringified id.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::ledger::models::Identity;
use crate::ledger::LedgerError;

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn identity(&self, user_id: i64) -> Result<Option<Identity>, LedgerError>;
    async fn set_name(&self, user_id: i64, name: &str) -> Result<(), LedgerError>;
    async fn set_description(&self, user_id: i64, description: &str) -> Result<(), LedgerError>;
}

/// The host platform's membership directory: display-name lookup that may
/// simply come up empty.
#[async_trait]
pub trait MemberDirectory: Send + Sync {
    async fn display_name(&self, user_id: i64) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedIdentity {
    pub name: String,
    pub description: Option<String>,
}

/// Stored name wins; otherwise the member directory is consulted and the
/// derived name persisted for next time; otherwise the stringified id.
pub async fn resolve<S, D>(store: &S, directory: &D, user_id: i64) -> ResolvedIdentity
where
    S: IdentityStore,
    D: MemberDirectory,
{
    let stored = match store.identity(user_id).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!("Failed to load identity for user {user_id}: {e}");
            None
        }
    };
    let description = stored.as_ref().and_then(|i| i.description.clone());

    if let Some(name) = stored.and_then(|i| i.name) {
        return ResolvedIdentity { name, description };
    }

    match directory.display_name(user_id).await {
        Some(name) => {
            if let Err(e) = store.set_name(user_id, &name).await {
                tracing::warn!("Failed to persist name for user {user_id}: {e}");
            }
            ResolvedIdentity { name, description }
        }
        None => {
            tracing::warn!("Could not find member for user ID {user_id}");
            ResolvedIdentity {
                name: user_id.to_string(),
                description,
            }
        }
    }
}

pub async fn resolve_all<S, D>(
    store: &S,
    directory: &D,
    user_ids: &[u64],
) -> HashMap<u64, ResolvedIdentity>
where
    S: IdentityStore,
    D: MemberDirectory,
{
    let mut resolved = HashMap::with_capacity(user_ids.len());
    for &user_id in user_ids {
        resolved.insert(user_id, resolve(store, directory, user_id as i64).await);
    }
    resolved
}

use thiserror::Error;

use crate::ledger::LedgerError;
use crate::llm::ProviderError;

#[derive(Debug, Error)]
pub enum BotError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Discord(#[from] serenity::Error),
}

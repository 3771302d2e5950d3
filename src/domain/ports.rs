use super::money::Balance;
use super::transaction::Transaction;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Failure reported by the remote account service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Call timed out after {0:?}")]
    Timeout(std::time::Duration),
}

#[derive(Error, Debug)]
#[error("Notification failed: {0}")]
pub struct NotificationError(pub String);

/// Remote owner of account balances.
#[async_trait]
pub trait BalanceService: Send + Sync {
    async fn get_balance(&self, account: &str) -> std::result::Result<Balance, RemoteError>;
    async fn set_balance(
        &self,
        account: &str,
        new_balance: Balance,
    ) -> std::result::Result<(), RemoteError>;
}

/// Append-only record of finalized transactions.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn append(&self, tx: Transaction) -> Result<()>;
    async fn find_by_source(&self, account: &str) -> Result<Vec<Transaction>>;
    async fn find_by_destination(&self, account: &str) -> Result<Vec<Transaction>>;
}

/// Best-effort delivery of human-readable event text.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, text: &str) -> std::result::Result<(), NotificationError>;
}

pub type BalanceServiceRef = Arc<dyn BalanceService>;
pub type LedgerStoreRef = Arc<dyn LedgerStore>;
pub type NotificationSinkRef = Arc<dyn NotificationSink>;

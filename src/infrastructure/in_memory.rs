use crate::domain::money::Balance;
use crate::domain::ports::{BalanceService, LedgerStore, RemoteError};
use crate::domain::transaction::Transaction;
use crate::error::Result;
use async_trait::async_trait;
use parking_lot::RwLock as SyncRwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory stand-in for the remote account service.
///
/// Behaves like the real service: unknown accounts are `AccountNotFound` on
/// both read and write, and writes overwrite the stored balance as-is.
#[derive(Default, Clone)]
pub struct InMemoryAccountDirectory {
    balances: Arc<SyncRwLock<HashMap<String, Balance>>>,
}

impl InMemoryAccountDirectory {
    /// Creates a new, empty account directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens or overwrites an account with the given balance.
    pub fn insert(&self, account: impl Into<String>, balance: Balance) {
        self.balances.write().insert(account.into(), balance);
    }

    pub fn balance(&self, account: &str) -> Option<Balance> {
        self.balances.read().get(account).copied()
    }
}

impl FromIterator<(String, Balance)> for InMemoryAccountDirectory {
    fn from_iter<I: IntoIterator<Item = (String, Balance)>>(iter: I) -> Self {
        Self {
            balances: Arc::new(SyncRwLock::new(iter.into_iter().collect())),
        }
    }
}

#[async_trait]
impl BalanceService for InMemoryAccountDirectory {
    async fn get_balance(&self, account: &str) -> std::result::Result<Balance, RemoteError> {
        self.balance(account)
            .ok_or_else(|| RemoteError::AccountNotFound(account.to_string()))
    }

    async fn set_balance(
        &self,
        account: &str,
        new_balance: Balance,
    ) -> std::result::Result<(), RemoteError> {
        let mut balances = self.balances.write();
        match balances.get_mut(account) {
            Some(balance) => {
                *balance = new_balance;
                Ok(())
            }
            None => Err(RemoteError::AccountNotFound(account.to_string())),
        }
    }
}

/// A thread-safe, append-only in-memory ledger.
///
/// Records are kept in append order, so per-account queries return them
/// oldest first.
#[derive(Default, Clone)]
pub struct InMemoryLedger {
    transactions: Arc<RwLock<Vec<Transaction>>>,
}

impl InMemoryLedger {
    /// Creates a new, empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.transactions.read().await.len()
    }

    pub async fn all(&self) -> Vec<Transaction> {
        self.transactions.read().await.clone()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn append(&self, tx: Transaction) -> Result<()> {
        let mut transactions = self.transactions.write().await;
        transactions.push(tx);
        Ok(())
    }

    async fn find_by_source(&self, account: &str) -> Result<Vec<Transaction>> {
        let transactions = self.transactions.read().await;
        Ok(transactions
            .iter()
            .filter(|tx| tx.source_account == account)
            .cloned()
            .collect())
    }

    async fn find_by_destination(&self, account: &str) -> Result<Vec<Transaction>> {
        let transactions = self.transactions.read().await;
        Ok(transactions
            .iter()
            .filter(|tx| tx.destination_account.as_deref() == Some(account))
            .cloned()
            .collect())
    }
}

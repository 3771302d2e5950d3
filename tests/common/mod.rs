#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use txn_orchestrator::application::gateway::AccountBalanceGateway;
use txn_orchestrator::application::orchestrator::TransactionOrchestrator;
use txn_orchestrator::domain::money::Balance;
use txn_orchestrator::domain::ports::{
    BalanceService, LedgerStore, NotificationError, NotificationSink, RemoteError,
};
use txn_orchestrator::domain::transaction::Transaction;
use txn_orchestrator::error::{OrchestratorError, Result as LedgerResult};
use txn_orchestrator::infrastructure::in_memory::InMemoryLedger;
use txn_orchestrator::resilience::{BreakerConfig, CircuitBreaker, CircuitState};

/// Account service fake with call counting and failure injection.
///
/// Writes to an account fail once that account has accepted `n` writes, as
/// configured through [`ScriptedAccounts::fail_writes_after`].
#[derive(Default)]
pub struct ScriptedAccounts {
    balances: Mutex<HashMap<String, Balance>>,
    write_limits: Mutex<HashMap<String, usize>>,
    writes_per_account: Mutex<HashMap<String, usize>>,
    latency: Mutex<Option<Duration>>,
    down: AtomicBool,
    get_calls: AtomicUsize,
    set_calls: AtomicUsize,
}

impl ScriptedAccounts {
    pub fn with_accounts(accounts: &[(&str, Balance)]) -> Arc<Self> {
        let fake = Self::default();
        {
            let mut balances = fake.balances.lock();
            for (id, balance) in accounts {
                balances.insert(id.to_string(), *balance);
            }
        }
        Arc::new(fake)
    }

    pub fn balance(&self, account: &str) -> Option<Balance> {
        self.balances.lock().get(account).copied()
    }

    pub fn fail_writes_after(&self, account: &str, accepted: usize) {
        self.write_limits.lock().insert(account.to_string(), accepted);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn set_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }

    async fn simulate_network(&self) -> Result<(), RemoteError> {
        let latency = *self.latency.lock();
        match latency {
            Some(latency) => tokio::time::sleep(latency).await,
            None => tokio::task::yield_now().await,
        }
        if self.down.load(Ordering::SeqCst) {
            return Err(RemoteError::Transport("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl BalanceService for ScriptedAccounts {
    async fn get_balance(&self, account: &str) -> Result<Balance, RemoteError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_network().await?;
        self.balance(account)
            .ok_or_else(|| RemoteError::AccountNotFound(account.to_string()))
    }

    async fn set_balance(&self, account: &str, new_balance: Balance) -> Result<(), RemoteError> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_network().await?;

        let accepted = self
            .writes_per_account
            .lock()
            .get(account)
            .copied()
            .unwrap_or_default();
        if let Some(limit) = self.write_limits.lock().get(account)
            && accepted >= *limit
        {
            return Err(RemoteError::Transport(format!("write to {account} rejected")));
        }

        let mut balances = self.balances.lock();
        let slot = balances
            .get_mut(account)
            .ok_or_else(|| RemoteError::AccountNotFound(account.to_string()))?;
        *slot = new_balance;
        *self
            .writes_per_account
            .lock()
            .entry(account.to_string())
            .or_default() += 1;
        Ok(())
    }
}

/// Notification sink that remembers every message it was given.
#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl RecordingSink {
    pub fn failing() -> Arc<Self> {
        let sink = Self::default();
        sink.failing.store(true, Ordering::SeqCst);
        Arc::new(sink)
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(&self, text: &str) -> Result<(), NotificationError> {
        self.messages.lock().push(text.to_string());
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotificationError("notification service down".to_string()));
        }
        Ok(())
    }
}

/// Ledger whose appends always fail and whose queries return nothing.
#[derive(Default)]
pub struct FailingLedger {
    attempts: AtomicUsize,
}

impl FailingLedger {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerStore for FailingLedger {
    async fn append(&self, _tx: Transaction) -> LedgerResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(OrchestratorError::LedgerError("ledger disk full".to_string()))
    }

    async fn find_by_source(&self, _account: &str) -> LedgerResult<Vec<Transaction>> {
        Ok(Vec::new())
    }

    async fn find_by_destination(&self, _account: &str) -> LedgerResult<Vec<Transaction>> {
        Ok(Vec::new())
    }
}

pub struct Harness {
    pub accounts: Arc<ScriptedAccounts>,
    pub ledger: InMemoryLedger,
    pub sink: Arc<RecordingSink>,
    pub orchestrator: TransactionOrchestrator,
}

pub fn harness(accounts: Arc<ScriptedAccounts>) -> Harness {
    harness_with(
        accounts,
        Arc::new(RecordingSink::default()),
        BreakerConfig::default(),
        CircuitState::Closed,
        Duration::from_secs(1),
    )
}

pub fn harness_with(
    accounts: Arc<ScriptedAccounts>,
    sink: Arc<RecordingSink>,
    breaker: BreakerConfig,
    state: CircuitState,
    call_timeout: Duration,
) -> Harness {
    let ledger = InMemoryLedger::new();
    let gateway = AccountBalanceGateway::new(
        accounts.clone(),
        CircuitBreaker::with_state("accountService", breaker, state).unwrap(),
        call_timeout,
    );
    let orchestrator = TransactionOrchestrator::new(gateway, Arc::new(ledger.clone()), sink.clone());
    Harness {
        accounts,
        ledger,
        sink,
        orchestrator,
    }
}

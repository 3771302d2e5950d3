use crate::application::account_locks::AccountLocks;
use crate::application::gateway::AccountBalanceGateway;
use crate::context::RequestContext;
use crate::domain::money::{Amount, Balance};
use crate::domain::ports::{LedgerStoreRef, NotificationSinkRef};
use crate::domain::transaction::{FailureReason, PendingTransaction, Transaction, TransactionType};
use crate::error::Result;
use crate::resilience::CircuitState;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::task::JoinSet;
use tracing::{Instrument, Span, error, info, instrument, warn};

type Outcome = std::result::Result<(), FailureReason>;

/// A money-movement request, as accepted by [`TransactionOrchestrator::execute`].
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Deposit {
        account: String,
        amount: Decimal,
    },
    Withdraw {
        account: String,
        amount: Decimal,
    },
    Transfer {
        source: String,
        destination: String,
        amount: Decimal,
    },
}

/// Runs deposits, withdrawals and transfers against remotely held balances.
///
/// Every operation returns a finalized [`Transaction`]; failures are captured
/// as `FAILED` with a [`FailureReason`] rather than returned as errors. The
/// transaction is appended to the ledger once its outcome is known, and only a
/// `SUCCESS` triggers a notification, dispatched in the background so that
/// delivery problems never affect the recorded status.
///
/// Pending notifications are tracked and aborted if the orchestrator is
/// dropped; call [`TransactionOrchestrator::flush_notifications`] before
/// shutting down to let them finish.
///
/// Balance updates on one account are serialized through [`AccountLocks`].
/// A transfer whose credit leg fails after the debit went through restores the
/// source balance before reporting the failure.
pub struct TransactionOrchestrator {
    gateway: AccountBalanceGateway,
    ledger: LedgerStoreRef,
    notifier: NotificationSinkRef,
    locks: AccountLocks,
    notifications: Mutex<JoinSet<()>>,
}

impl TransactionOrchestrator {
    pub fn new(
        gateway: AccountBalanceGateway,
        ledger: LedgerStoreRef,
        notifier: NotificationSinkRef,
    ) -> Self {
        Self {
            gateway,
            ledger,
            notifier,
            locks: AccountLocks::new(),
            notifications: Mutex::new(JoinSet::new()),
        }
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.gateway.circuit_state()
    }

    pub async fn execute(&self, ctx: &RequestContext, operation: &Operation) -> Transaction {
        match operation {
            Operation::Deposit { account, amount } => self.deposit(ctx, account, *amount).await,
            Operation::Withdraw { account, amount } => self.withdraw(ctx, account, *amount).await,
            Operation::Transfer {
                source,
                destination,
                amount,
            } => self.transfer(ctx, source, destination, *amount).await,
        }
    }

    #[instrument(skip(self, ctx), fields(correlation_id = %ctx.correlation_id))]
    pub async fn deposit(&self, ctx: &RequestContext, account: &str, amount: Decimal) -> Transaction {
        info!("Starting deposit");
        let pending = PendingTransaction::new(TransactionType::Deposit, amount, account, None);
        let outcome = self.apply_deposit(account, amount).await;
        self.finish(pending, outcome, || {
            format!("Deposit of {amount} to account {account} was successful.")
        })
        .await
    }

    #[instrument(skip(self, ctx), fields(correlation_id = %ctx.correlation_id))]
    pub async fn withdraw(&self, ctx: &RequestContext, account: &str, amount: Decimal) -> Transaction {
        info!("Starting withdrawal");
        let pending = PendingTransaction::new(TransactionType::Withdraw, amount, account, None);
        let outcome = self.apply_withdraw(account, amount).await;
        self.finish(pending, outcome, || {
            format!("Withdrawal of {amount} from account {account} was successful.")
        })
        .await
    }

    #[instrument(skip(self, ctx), fields(correlation_id = %ctx.correlation_id))]
    pub async fn transfer(
        &self,
        ctx: &RequestContext,
        source: &str,
        destination: &str,
        amount: Decimal,
    ) -> Transaction {
        info!("Starting transfer");
        let pending = PendingTransaction::new(
            TransactionType::Transfer,
            amount,
            source,
            Some(destination.to_string()),
        );
        let outcome = self.apply_transfer(source, destination, amount).await;
        self.finish(pending, outcome, || {
            format!("Transfer of {amount} from {source} to {destination} was successful.")
        })
        .await
    }

    /// All ledger records where `account` is the source, followed by those
    /// where it is the destination. No de-duplication is done.
    #[instrument(skip(self, ctx), fields(correlation_id = %ctx.correlation_id))]
    pub async fn transactions_for_account(
        &self,
        ctx: &RequestContext,
        account: &str,
    ) -> Result<Vec<Transaction>> {
        let mut transactions = self.ledger.find_by_source(account).await?;
        transactions.extend(self.ledger.find_by_destination(account).await?);
        info!(count = transactions.len(), "Fetched transactions for account");
        Ok(transactions)
    }

    async fn apply_deposit(&self, account: &str, amount: Decimal) -> Outcome {
        let amount = validate_amount(amount)?;
        let _guard = self.locks.lock(account).await;

        let current = self.read(account).await?;
        self.write(account, increased(account, current, amount)?).await
    }

    async fn apply_withdraw(&self, account: &str, amount: Decimal) -> Outcome {
        let amount = validate_amount(amount)?;
        let _guard = self.locks.lock(account).await;

        let current = self.read(account).await?;
        if !current.covers(amount) {
            warn!(account, balance = %current, "Insufficient funds");
            return Err(FailureReason::InsufficientFunds);
        }
        self.write(account, decreased(account, current, amount)?).await
    }

    async fn apply_transfer(&self, source: &str, destination: &str, amount: Decimal) -> Outcome {
        if source == destination {
            warn!(account = source, "Transfer source and destination are the same account");
            return Err(FailureReason::InvalidRequest);
        }
        let amount = validate_amount(amount)?;
        let _guard = self.locks.lock_pair(source, destination).await;

        let source_balance = self.read(source).await?;
        if !source_balance.covers(amount) {
            warn!(account = source, balance = %source_balance, "Insufficient funds");
            return Err(FailureReason::InsufficientFunds);
        }
        let debited = decreased(source, source_balance, amount)?;
        self.write(source, debited).await?;

        match self.credit(destination, amount).await {
            Ok(()) => Ok(()),
            Err(reason) => Err(self.restore(source, source_balance, reason).await),
        }
    }

    async fn credit(&self, account: &str, amount: Amount) -> Outcome {
        let current = self.read(account).await?;
        self.write(account, increased(account, current, amount)?).await
    }

    /// Writes the pre-debit balance back to a transfer's source after the
    /// credit leg failed. Returns the reason to record on the transaction.
    async fn restore(&self, source: &str, original: Balance, cause: FailureReason) -> FailureReason {
        warn!(account = source, %cause, "Credit leg failed, reversing source debit");
        match self.gateway.set_balance(source, original).await {
            Ok(()) => {
                info!(account = source, balance = %original, "Source debit reversed");
                cause
            }
            Err(e) => {
                error!(
                    account = source,
                    expected_balance = %original,
                    error = %e,
                    "Failed to reverse source debit, manual reconciliation required"
                );
                FailureReason::ReconciliationRequired
            }
        }
    }

    async fn read(&self, account: &str) -> std::result::Result<Balance, FailureReason> {
        self.gateway
            .get_balance(account)
            .await
            .map_err(|e| e.failure_reason())
    }

    async fn write(&self, account: &str, new_balance: Balance) -> Outcome {
        self.gateway
            .set_balance(account, new_balance)
            .await
            .map_err(|e| e.failure_reason())
    }

    async fn finish<M>(&self, pending: PendingTransaction, outcome: Outcome, message: M) -> Transaction
    where
        M: FnOnce() -> String,
    {
        let tx = match outcome {
            Ok(()) => pending.succeed(),
            Err(reason) => pending.fail(reason),
        };

        if let Err(e) = self.ledger.append(tx.clone()).await {
            error!(tx_id = %tx.id, error = %e, "Failed to record transaction in ledger");
        }

        match tx.failure_reason {
            None => {
                info!(tx_id = %tx.id, "Transaction succeeded");
                self.notify(message());
            }
            Some(reason) => warn!(tx_id = %tx.id, %reason, "Transaction failed"),
        }

        tx
    }

    /// Waits for every notification dispatched so far to be delivered or fail.
    pub async fn flush_notifications(&self) {
        let mut pending = std::mem::take(&mut *self.notifications.lock());
        while pending.join_next().await.is_some() {}
    }

    fn notify(&self, text: String) {
        let notifier = self.notifier.clone();
        let mut pending = self.notifications.lock();
        while pending.try_join_next().is_some() {}
        pending.spawn(
            async move {
                if let Err(e) = notifier.send(&text).await {
                    warn!(error = %e, "Notification delivery failed");
                }
            }
            .instrument(Span::current()),
        );
    }
}

fn validate_amount(amount: Decimal) -> std::result::Result<Amount, FailureReason> {
    Amount::new(amount).map_err(|e| {
        warn!(error = %e, "Rejected amount");
        FailureReason::InvalidRequest
    })
}

fn increased(account: &str, balance: Balance, amount: Amount) -> std::result::Result<Balance, FailureReason> {
    balance.checked_add(amount).ok_or_else(|| {
        error!(account, %balance, %amount, "Balance overflow on credit");
        FailureReason::UnknownFailure
    })
}

fn decreased(account: &str, balance: Balance, amount: Amount) -> std::result::Result<Balance, FailureReason> {
    balance.checked_sub(amount).ok_or_else(|| {
        error!(account, %balance, %amount, "Balance overflow on debit");
        FailureReason::UnknownFailure
    })
}

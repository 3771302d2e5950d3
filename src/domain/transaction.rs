use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a transaction. Random UUID v4, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(Uuid);

impl TransactionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Deposit,
    Withdraw,
    Transfer,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Success,
    Failed,
}

/// Why a transaction ended up `FAILED`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    /// The referenced account does not exist downstream.
    NotFound,
    /// Balance was lower than the requested amount. Nothing was written.
    InsufficientFunds,
    /// Circuit open, remote call failed or timed out.
    UpstreamUnavailable,
    /// Non-positive amount or a transfer to the same account.
    InvalidRequest,
    /// A transfer debited the source, failed to credit the destination and
    /// could not restore the source either. Needs manual reconciliation.
    ReconciliationRequired,
    UnknownFailure,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdraw => "WITHDRAW",
            TransactionType::Transfer => "TRANSFER",
        };
        f.write_str(s)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Success => f.write_str("SUCCESS"),
            TransactionStatus::Failed => f.write_str("FAILED"),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureReason::NotFound => "NOT_FOUND",
            FailureReason::InsufficientFunds => "INSUFFICIENT_FUNDS",
            FailureReason::UpstreamUnavailable => "UPSTREAM_UNAVAILABLE",
            FailureReason::InvalidRequest => "INVALID_REQUEST",
            FailureReason::ReconciliationRequired => "RECONCILIATION_REQUIRED",
            FailureReason::UnknownFailure => "UNKNOWN_FAILURE",
        };
        f.write_str(s)
    }
}

/// A finalized money movement as recorded in the ledger.
///
/// Only built through [`PendingTransaction::succeed`] or
/// [`PendingTransaction::fail`], so every stored record carries a terminal
/// status and a `failure_reason` exactly when it failed.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Transaction {
    pub id: TransactionId,
    #[serde(rename = "type")]
    pub r#type: TransactionType,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
    pub source_account: String,
    pub destination_account: Option<String>,
    pub status: TransactionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<FailureReason>,
}

impl Transaction {
    pub fn is_success(&self) -> bool {
        self.status == TransactionStatus::Success
    }

    /// True when `account` is either side of this transaction.
    pub fn touches(&self, account: &str) -> bool {
        self.source_account == account || self.destination_account.as_deref() == Some(account)
    }
}

/// A transaction that exists only in memory while an operation is running.
///
/// The id and timestamp are fixed on creation, before any remote call.
#[derive(Debug)]
pub struct PendingTransaction {
    id: TransactionId,
    r#type: TransactionType,
    amount: Decimal,
    timestamp: DateTime<Utc>,
    source_account: String,
    destination_account: Option<String>,
}

impl PendingTransaction {
    pub fn new(
        r#type: TransactionType,
        amount: Decimal,
        source_account: impl Into<String>,
        destination_account: Option<String>,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            r#type,
            amount,
            timestamp: Utc::now(),
            source_account: source_account.into(),
            destination_account,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn succeed(self) -> Transaction {
        self.finalize(TransactionStatus::Success, None)
    }

    pub fn fail(self, reason: FailureReason) -> Transaction {
        self.finalize(TransactionStatus::Failed, Some(reason))
    }

    fn finalize(self, status: TransactionStatus, failure_reason: Option<FailureReason>) -> Transaction {
        Transaction {
            id: self.id,
            r#type: self.r#type,
            amount: self.amount,
            timestamp: self.timestamp,
            source_account: self.source_account,
            destination_account: self.destination_account,
            status,
            failure_reason,
        }
    }
}

//! Application layer containing the transaction workflow.
//!
//! `TransactionOrchestrator` is the entry point: it composes the resilient
//! `AccountBalanceGateway`, the ledger and the notification sink, and
//! serializes balance updates per account through `AccountLocks`.

pub mod account_locks;
pub mod gateway;
pub mod orchestrator;

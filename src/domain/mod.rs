//! Domain types and the ports the orchestrator talks through.

pub mod money;
pub mod ports;
pub mod transaction;

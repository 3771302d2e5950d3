//! CSV input and output for batch runs.

pub mod account_reader;
pub mod operation_reader;
pub mod transaction_writer;

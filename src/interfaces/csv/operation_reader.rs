use crate::application::orchestrator::Operation;
use crate::error::{OrchestratorError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Deposit,
    Withdraw,
    Transfer,
}

/// One raw row of an operations file.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct OperationRecord {
    pub r#type: OperationKind,
    pub account: String,
    pub destination: Option<String>,
    pub amount: Decimal,
}

impl TryFrom<OperationRecord> for Operation {
    type Error = OrchestratorError;

    fn try_from(record: OperationRecord) -> Result<Self> {
        let OperationRecord {
            r#type,
            account,
            destination,
            amount,
        } = record;

        match (r#type, destination) {
            (OperationKind::Deposit, _) => Ok(Operation::Deposit { account, amount }),
            (OperationKind::Withdraw, _) => Ok(Operation::Withdraw { account, amount }),
            (OperationKind::Transfer, Some(destination)) => Ok(Operation::Transfer {
                source: account,
                destination,
                amount,
            }),
            (OperationKind::Transfer, None) => Err(OrchestratorError::ValidationError(format!(
                "transfer from {account} has no destination"
            ))),
        }
    }
}

/// Reads operations from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record lengths,
/// yielding one `Result<Operation>` per row so a bad row can be skipped.
pub struct OperationReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OperationReader<R> {
    /// Creates a new `OperationReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and converts operations.
    pub fn operations(self) -> impl Iterator<Item = Result<Operation>> {
        self.reader.into_deserialize().map(|result| {
            result
                .map_err(OrchestratorError::from)
                .and_then(|record: OperationRecord| Operation::try_from(record))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reader_valid_stream() {
        let data = "type, account, destination, amount\n\
                    deposit, ACC1, , 1000\n\
                    withdraw, ACC1, , 0.5\n\
                    transfer, ACC1, ACC2, 250";
        let reader = OperationReader::new(data.as_bytes());
        let results: Vec<Result<Operation>> = reader.operations().collect();

        assert_eq!(results.len(), 3);
        assert_eq!(
            results[0].as_ref().unwrap(),
            &Operation::Deposit {
                account: "ACC1".to_string(),
                amount: dec!(1000)
            }
        );
        assert_eq!(
            results[2].as_ref().unwrap(),
            &Operation::Transfer {
                source: "ACC1".to_string(),
                destination: "ACC2".to_string(),
                amount: dec!(250)
            }
        );
    }

    #[test]
    fn test_reader_keeps_non_positive_amounts() {
        let data = "type, account, destination, amount\ndeposit, ACC1, , -5";
        let results: Vec<Result<Operation>> = OperationReader::new(data.as_bytes()).operations().collect();
        assert!(matches!(
            results[0],
            Ok(Operation::Deposit { amount, .. }) if amount == dec!(-5)
        ));
    }

    #[test]
    fn test_reader_malformed_rows() {
        let data = "type, account, destination, amount\n\
                    invalid, ACC1, , 1.0\n\
                    transfer, ACC1, , 1.0\n\
                    deposit, ACC1, , not_a_number";
        let results: Vec<Result<Operation>> = OperationReader::new(data.as_bytes()).operations().collect();

        assert!(matches!(results[0], Err(OrchestratorError::CsvError(_))));
        assert!(matches!(results[1], Err(OrchestratorError::ValidationError(_))));
        assert!(matches!(results[2], Err(OrchestratorError::CsvError(_))));
    }
}

use crate::domain::transaction::Transaction;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct TransactionRow<'a> {
    id: String,
    r#type: String,
    source: &'a str,
    destination: &'a str,
    amount: Decimal,
    status: String,
    failure_reason: String,
}

impl<'a> From<&'a Transaction> for TransactionRow<'a> {
    fn from(tx: &'a Transaction) -> Self {
        Self {
            id: tx.id.to_string(),
            r#type: tx.r#type.to_string(),
            source: &tx.source_account,
            destination: tx.destination_account.as_deref().unwrap_or_default(),
            amount: tx.amount,
            status: tx.status.to_string(),
            failure_reason: tx.failure_reason.map(|r| r.to_string()).unwrap_or_default(),
        }
    }
}

/// Writes finalized transactions as CSV.
pub struct TransactionWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> TransactionWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write(&mut self, tx: &Transaction) -> Result<()> {
        self.writer.serialize(TransactionRow::from(tx))?;
        Ok(())
    }

    pub fn write_all<'a>(&mut self, txs: impl IntoIterator<Item = &'a Transaction>) -> Result<()> {
        for tx in txs {
            self.write(tx)?;
        }
        self.flush()
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

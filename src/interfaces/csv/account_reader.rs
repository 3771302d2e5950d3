use crate::domain::money::Balance;
use crate::error::Result;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct AccountRecord {
    account: String,
    balance: Balance,
}

/// Reads `account, balance` rows used to seed the in-memory account directory.
///
/// Unlike operations, a malformed seed row fails the whole read.
pub fn read_accounts<R: Read>(source: R) -> Result<Vec<(String, Balance)>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(source);

    reader
        .deserialize()
        .map(|row| -> Result<(String, Balance)> {
            let record: AccountRecord = row?;
            Ok((record.account, record.balance))
        })
        .collect()
}

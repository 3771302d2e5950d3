use crate::domain::ports::LedgerStore;
use crate::domain::transaction::Transaction;
use crate::error::{OrchestratorError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, IteratorMode, Options};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Column Family holding ledger records keyed by append sequence.
pub const CF_LEDGER: &str = "ledger";

/// A persistent, append-only ledger backed by RocksDB.
///
/// Records are stored as JSON under a big-endian sequence number so that a
/// forward scan yields them in append order, across restarts.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbLedger {
    db: Arc<DB>,
    next_seq: Arc<AtomicU64>,
}

impl RocksDbLedger {
    /// Opens or creates a ledger at `path`, resuming the sequence after the
    /// last stored record.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_ledger = ColumnFamilyDescriptor::new(CF_LEDGER, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf_ledger])?;

        let next_seq = {
            let cf = db
                .cf_handle(CF_LEDGER)
                .ok_or_else(|| OrchestratorError::LedgerError("Ledger column family not found".into()))?;
            match db.iterator_cf(cf, IteratorMode::End).next() {
                Some(item) => {
                    let (key, _) = item?;
                    decode_seq(&key)? + 1
                }
                None => 0,
            }
        };

        Ok(Self {
            db: Arc::new(db),
            next_seq: Arc::new(AtomicU64::new(next_seq)),
        })
    }

    fn scan<F>(&self, mut keep: F) -> Result<Vec<Transaction>>
    where
        F: FnMut(&Transaction) -> bool,
    {
        let cf = self.cf()?;
        let mut matches = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            let tx: Transaction = serde_json::from_slice(&value)?;
            if keep(&tx) {
                matches.push(tx);
            }
        }
        Ok(matches)
    }

    fn cf(&self) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(CF_LEDGER)
            .ok_or_else(|| OrchestratorError::LedgerError("Ledger column family not found".into()))
    }
}

fn decode_seq(key: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| OrchestratorError::LedgerError(format!("Malformed ledger key of {} bytes", key.len())))?;
    Ok(u64::from_be_bytes(bytes))
}

#[async_trait]
impl LedgerStore for RocksDbLedger {
    async fn append(&self, tx: Transaction) -> Result<()> {
        let cf = self.cf()?;
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let value = serde_json::to_vec(&tx)?;
        self.db.put_cf(cf, seq.to_be_bytes(), value)?;
        Ok(())
    }

    async fn find_by_source(&self, account: &str) -> Result<Vec<Transaction>> {
        self.scan(|tx| tx.source_account == account)
    }

    async fn find_by_destination(&self, account: &str) -> Result<Vec<Transaction>> {
        self.scan(|tx| tx.destination_account.as_deref() == Some(account))
    }
}

use clap::Parser;
use miette::{IntoDiagnostic, Result, miette};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use txn_orchestrator::application::gateway::AccountBalanceGateway;
use txn_orchestrator::application::orchestrator::TransactionOrchestrator;
use txn_orchestrator::config::OrchestratorConfig;
use txn_orchestrator::context::RequestContext;
use txn_orchestrator::domain::ports::{BalanceServiceRef, LedgerStoreRef, NotificationSinkRef};
use txn_orchestrator::infrastructure::http::{HttpAccountService, HttpNotifier};
use txn_orchestrator::infrastructure::in_memory::{InMemoryAccountDirectory, InMemoryLedger};
use txn_orchestrator::infrastructure::notifier::LogNotifier;
use txn_orchestrator::interfaces::csv::account_reader::read_accounts;
use txn_orchestrator::interfaces::csv::operation_reader::OperationReader;
use txn_orchestrator::interfaces::csv::transaction_writer::TransactionWriter;
use txn_orchestrator::logging::init_logging;
use txn_orchestrator::resilience::CircuitBreaker;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input operations CSV file (`type, account, destination, amount`)
    input: PathBuf,

    /// Seed balances (`account, balance`) for the in-memory account service.
    #[arg(long)]
    accounts: Option<PathBuf>,

    /// Base URL of a remote account service. Overrides ACCOUNT_SERVICE_URL.
    #[arg(long)]
    account_service_url: Option<String>,

    /// Base URL of a remote notification service. Overrides NOTIFICATION_SERVICE_URL.
    #[arg(long)]
    notification_url: Option<String>,

    /// Path to persistent ledger (optional). If provided, uses RocksDB.
    #[arg(long)]
    ledger_path: Option<PathBuf>,

    /// Print the ledger history of this account instead of the batch results.
    #[arg(long)]
    history: Option<String>,

    /// Emit logs as JSON.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = OrchestratorConfig::from_env();
    if cli.account_service_url.is_some() {
        config.account_service_url = cli.account_service_url.clone();
    }
    if cli.notification_url.is_some() {
        config.notification_service_url = cli.notification_url.clone();
    }
    config
        .validate()
        .map_err(|e| miette!("Configuration error: {e}"))?;

    init_logging(&config.log_level, cli.log_json).map_err(|e| miette!(e))?;

    let balances: BalanceServiceRef = match &config.account_service_url {
        Some(url) => Arc::new(
            HttpAccountService::new(url.clone(), config.call_timeout).into_diagnostic()?,
        ),
        None => {
            let seed = match &cli.accounts {
                Some(path) => read_accounts(File::open(path).into_diagnostic()?).into_diagnostic()?,
                None => Vec::new(),
            };
            Arc::new(seed.into_iter().collect::<InMemoryAccountDirectory>())
        }
    };

    let notifier: NotificationSinkRef = match &config.notification_service_url {
        Some(url) => {
            Arc::new(HttpNotifier::new(url.clone(), config.call_timeout).into_diagnostic()?)
        }
        None => Arc::new(LogNotifier),
    };

    let ledger = open_ledger(cli.ledger_path.as_ref())?;

    let gateway = AccountBalanceGateway::new(
        balances,
        CircuitBreaker::new("accountService", config.breaker.clone()).into_diagnostic()?,
        config.call_timeout,
    );
    let orchestrator = TransactionOrchestrator::new(gateway, ledger, notifier);

    // Process operations, one request context per row
    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = OperationReader::new(file);
    let mut results = Vec::new();
    for op_result in reader.operations() {
        match op_result {
            Ok(operation) => {
                let ctx = RequestContext::new();
                results.push(orchestrator.execute(&ctx, &operation).await);
            }
            Err(e) => {
                eprintln!("Error reading operation: {}", e);
            }
        }
    }
    orchestrator.flush_notifications().await;

    let output = match &cli.history {
        Some(account) => orchestrator
            .transactions_for_account(&RequestContext::new(), account)
            .await
            .into_diagnostic()?,
        None => results,
    };

    let stdout = io::stdout();
    let mut writer = TransactionWriter::new(stdout.lock());
    writer.write_all(&output).into_diagnostic()?;

    Ok(())
}

#[cfg(feature = "storage-rocksdb")]
fn open_ledger(path: Option<&PathBuf>) -> Result<LedgerStoreRef> {
    use txn_orchestrator::infrastructure::rocksdb::RocksDbLedger;

    Ok(match path {
        Some(path) => Arc::new(RocksDbLedger::open(path).into_diagnostic()?),
        None => Arc::new(InMemoryLedger::new()),
    })
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_ledger(path: Option<&PathBuf>) -> Result<LedgerStoreRef> {
    if path.is_some() {
        eprintln!(
            "WARNING: Persistent ledger requested via --ledger-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(Arc::new(InMemoryLedger::new()))
}

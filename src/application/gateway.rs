use crate::domain::money::Balance;
use crate::domain::ports::{BalanceServiceRef, RemoteError};
use crate::domain::transaction::FailureReason;
use crate::resilience::{BreakerError, CircuitBreaker, CircuitState};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Account not found: {0}")]
    NotFound(String),
    #[error("Account service unavailable: {0}")]
    Unavailable(String),
}

impl GatewayError {
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            GatewayError::NotFound(_) => FailureReason::NotFound,
            GatewayError::Unavailable(_) => FailureReason::UpstreamUnavailable,
        }
    }
}

/// Resilient client for remote balance reads and writes.
///
/// Every call goes through one shared [`CircuitBreaker`] and is bounded by
/// `call_timeout`. An open breaker or a failed call surfaces as
/// [`GatewayError::Unavailable`]; no balance is ever made up and no write is
/// silently dropped. A missing account is reported as
/// [`GatewayError::NotFound`] and does not count against the breaker.
#[derive(Clone)]
pub struct AccountBalanceGateway {
    service: BalanceServiceRef,
    breaker: CircuitBreaker,
    call_timeout: Duration,
}

impl AccountBalanceGateway {
    pub fn new(service: BalanceServiceRef, breaker: CircuitBreaker, call_timeout: Duration) -> Self {
        Self {
            service,
            breaker,
            call_timeout,
        }
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    pub async fn get_balance(&self, account: &str) -> Result<Balance, GatewayError> {
        debug!(account, "Fetching balance from account service");
        let balance = self
            .guarded("get_balance", account, self.service.get_balance(account))
            .await?;
        debug!(account, %balance, "Account service returned balance");
        Ok(balance)
    }

    pub async fn set_balance(&self, account: &str, new_balance: Balance) -> Result<(), GatewayError> {
        debug!(account, %new_balance, "Updating balance in account service");
        self.guarded(
            "set_balance",
            account,
            self.service.set_balance(account, new_balance),
        )
        .await
    }

    async fn guarded<T, F>(&self, operation: &'static str, account: &str, fut: F) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, RemoteError>>,
    {
        let call_timeout = self.call_timeout;
        let result = self
            .breaker
            .call_with(
                |e: &RemoteError| !matches!(e, RemoteError::AccountNotFound(_)),
                async move {
                    tokio::time::timeout(call_timeout, fut)
                        .await
                        .unwrap_or(Err(RemoteError::Timeout(call_timeout)))
                },
            )
            .await;

        match result {
            Ok(value) => Ok(value),
            Err(BreakerError::Rejected) => {
                warn!(
                    operation,
                    account,
                    breaker = self.breaker.name(),
                    "Call short-circuited, circuit breaker is open"
                );
                Err(GatewayError::Unavailable(format!(
                    "{} circuit breaker is open",
                    self.breaker.name()
                )))
            }
            Err(BreakerError::Inner(RemoteError::AccountNotFound(missing))) => {
                warn!(operation, account = %missing, "Account not found in account service");
                Err(GatewayError::NotFound(missing))
            }
            Err(BreakerError::Inner(e)) => {
                warn!(operation, account, error = %e, "Account service call failed");
                Err(GatewayError::Unavailable(e.to_string()))
            }
        }
    }
}

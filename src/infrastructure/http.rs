//! HTTP adapters for the account and notification services.

use crate::domain::money::Balance;
use crate::domain::ports::{BalanceService, NotificationError, NotificationSink, RemoteError};
use crate::error::Result as CrateResult;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

/// Subset of the account service's account payload that we read.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountResponse {
    pub balance: Balance,
}

fn build_client(timeout: Duration) -> CrateResult<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        RemoteError::Transport(e.to_string())
    }
}

/// Client for the remote account service.
///
/// `GET {base}/api/accounts/{id}` answers with the account JSON (or `null`
/// when it does not exist); `PUT {base}/api/accounts/{id}/balance?newBalance=x`
/// overwrites the balance.
#[derive(Clone)]
pub struct HttpAccountService {
    client: Client,
    base_url: String,
}

impl HttpAccountService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> CrateResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into(),
        })
    }

    fn account_url(&self, account: &str) -> String {
        format!(
            "{}/api/accounts/{}",
            self.base_url.trim_end_matches('/'),
            account
        )
    }
}

#[async_trait]
impl BalanceService for HttpAccountService {
    async fn get_balance(&self, account: &str) -> Result<Balance, RemoteError> {
        let response = self.client.get(self.account_url(account)).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(RemoteError::AccountNotFound(account.to_string()));
        }
        if !response.status().is_success() {
            return Err(RemoteError::Transport(format!(
                "account service responded with {}",
                response.status()
            )));
        }

        let body: Option<AccountResponse> = response
            .json()
            .await
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))?;
        body.map(|account| account.balance)
            .ok_or_else(|| RemoteError::AccountNotFound(account.to_string()))
    }

    async fn set_balance(&self, account: &str, new_balance: Balance) -> Result<(), RemoteError> {
        let url = format!("{}/balance", self.account_url(account));
        let response = self
            .client
            .put(url)
            .query(&[("newBalance", new_balance.to_string())])
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(RemoteError::AccountNotFound(account.to_string())),
            status => Err(RemoteError::Transport(format!(
                "account service responded with {status}"
            ))),
        }
    }
}

/// Posts notification text to `{base}/api/notifications/send`.
#[derive(Clone)]
pub struct HttpNotifier {
    client: Client,
    url: String,
}

impl HttpNotifier {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> CrateResult<Self> {
        let base_url = base_url.into();
        Ok(Self {
            client: build_client(timeout)?,
            url: format!("{}/api/notifications/send", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl NotificationSink for HttpNotifier {
    async fn send(&self, text: &str) -> Result<(), NotificationError> {
        let response = self
            .client
            .post(&self.url)
            .body(text.to_string())
            .send()
            .await
            .map_err(|e| NotificationError(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(NotificationError(format!(
                "notification service responded with {}",
                response.status()
            )))
        }
    }
}

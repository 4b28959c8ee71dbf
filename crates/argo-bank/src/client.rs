use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use argo_core::config::BankConfig;
use argo_core::error::{ArgoError, Result};
use argo_core::services::{BankData, BankLink, LinkedItem};
use argo_core::types::{Account, Investments, Transaction};

use crate::wire::{
    AccessTokenRequest, AccountsResponse, ApiErrorBody, Credentials, LinkTokenRequest, LinkUser,
    PublicTokenExchangeRequest, PublicTokenExchangeResponse, TransactionsRequest,
    TransactionsResponse,
};

/// Window used when the caller asks for an unusable day count.
const DEFAULT_DAYS: u32 = 30;
/// Longest window the aggregator is asked for.
const MAX_DAYS: u32 = 730;

/// Normalize a requested window: anything outside `(0, 730]` becomes 30.
pub fn clamp_days(days: u32) -> u32 {
    if days == 0 || days > MAX_DAYS {
        DEFAULT_DAYS
    } else {
        days
    }
}

/// Client for the bank aggregation API.
pub struct PlaidClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    secret: String,
    config: BankConfig,
}

impl PlaidClient {
    /// Build a client from config, reading credentials from the environment
    /// variables the config names.
    pub fn from_config(config: &BankConfig) -> Result<Self> {
        let (client_id, secret) = config.credentials()?;
        Self::new(config.clone(), client_id, secret)
    }

    pub fn new(config: BankConfig, client_id: String, secret: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ArgoError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client_id,
            secret,
            config,
        })
    }

    fn credentials(&self) -> Credentials<'_> {
        Credentials {
            client_id: &self.client_id,
            secret: &self.secret,
        }
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "bank request");

        let resp = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ArgoError::Upstream(format!("{}: {}", path, e)))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ApiErrorBody>(&text)
                .ok()
                .and_then(|b| match (b.error_code, b.error_message) {
                    (Some(code), Some(msg)) => Some(format!("{}: {}", code, msg)),
                    (code, msg) => code.or(msg),
                })
                .unwrap_or(text);
            return Err(ArgoError::Upstream(format!(
                "{} returned {}: {}",
                path,
                status.as_u16(),
                detail
            )));
        }

        resp.json::<R>()
            .await
            .map_err(|e| ArgoError::Upstream(format!("{}: invalid response body: {}", path, e)))
    }
}

#[async_trait]
impl BankData for PlaidClient {
    async fn transactions(&self, access_token: &str, days: u32) -> Result<Vec<Transaction>> {
        let days = clamp_days(days);
        let end = Utc::now().date_naive();
        let start = end - ChronoDuration::days(i64::from(days));

        let body = TransactionsRequest {
            credentials: self.credentials(),
            access_token,
            start_date: start.format("%Y-%m-%d").to_string(),
            end_date: end.format("%Y-%m-%d").to_string(),
        };
        let resp: TransactionsResponse = self.post("/transactions/get", &body).await?;
        debug!(days, count = resp.transactions.len(), "transactions fetched");
        Ok(resp.transactions)
    }

    async fn accounts(&self, access_token: &str) -> Result<Vec<Account>> {
        let body = AccessTokenRequest {
            credentials: self.credentials(),
            access_token,
        };
        let resp: AccountsResponse = self.post("/accounts/balance/get", &body).await?;
        Ok(resp.accounts)
    }

    async fn investments(&self, access_token: &str) -> Result<Investments> {
        let body = AccessTokenRequest {
            credentials: self.credentials(),
            access_token,
        };
        // Items without an investment product fail here; treat as no holdings.
        match self
            .post::<_, Investments>("/investments/holdings/get", &body)
            .await
        {
            Ok(investments) => Ok(investments),
            Err(e) => {
                warn!("Investments fetch failed: {}", e);
                Ok(Investments::default())
            }
        }
    }
}

#[async_trait]
impl BankLink for PlaidClient {
    async fn create_link_token(&self, user_id: &str) -> Result<serde_json::Value> {
        let body = LinkTokenRequest {
            credentials: self.credentials(),
            user: LinkUser {
                client_user_id: user_id,
            },
            client_name: &self.config.client_name,
            products: &self.config.products,
            country_codes: &self.config.country_codes,
            language: &self.config.language,
        };
        self.post("/link/token/create", &body).await
    }

    async fn exchange_public_token(&self, public_token: &str) -> Result<LinkedItem> {
        let body = PublicTokenExchangeRequest {
            credentials: self.credentials(),
            public_token,
        };
        let resp: PublicTokenExchangeResponse =
            self.post("/item/public_token/exchange", &body).await?;
        Ok(LinkedItem {
            access_token: resp.access_token,
            item_id: resp.item_id,
        })
    }
}

//! Request and response bodies for the aggregator endpoints.

use serde::{Deserialize, Serialize};

use argo_core::types::{Account, Transaction};

#[derive(Debug, Serialize)]
pub(crate) struct Credentials<'a> {
    pub client_id: &'a str,
    pub secret: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct AccessTokenRequest<'a> {
    #[serde(flatten)]
    pub credentials: Credentials<'a>,
    pub access_token: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct TransactionsRequest<'a> {
    #[serde(flatten)]
    pub credentials: Credentials<'a>,
    pub access_token: &'a str,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct LinkUser<'a> {
    pub client_user_id: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct LinkTokenRequest<'a> {
    #[serde(flatten)]
    pub credentials: Credentials<'a>,
    pub user: LinkUser<'a>,
    pub client_name: &'a str,
    pub products: &'a [String],
    pub country_codes: &'a [String],
    pub language: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct PublicTokenExchangeRequest<'a> {
    #[serde(flatten)]
    pub credentials: Credentials<'a>,
    pub public_token: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TransactionsResponse {
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccountsResponse {
    #[serde(default)]
    pub accounts: Vec<Account>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PublicTokenExchangeResponse {
    pub access_token: String,
    pub item_id: String,
}

/// Error body the aggregator returns on non-2xx responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

//! Argo Bank crate - HTTP client for the bank aggregation API.
//!
//! Implements the `BankData` and `BankLink` collaborator traits over a
//! Plaid-style JSON API: every call is a POST carrying the client id and
//! secret in the body.

pub mod client;
pub mod wire;

pub use client::{clamp_days, PlaidClient};

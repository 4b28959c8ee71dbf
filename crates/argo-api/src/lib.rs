//! Argo API crate - axum HTTP server and route handlers.
//!
//! Exposes the chat turn pipeline, conversation history, attachment upload
//! and bank data behind bearer-token authentication.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;

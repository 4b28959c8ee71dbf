//! API authentication via bearer tokens.
//!
//! Tokens are minted per user (see [`issue_token`]) and resolved to the
//! user record on every protected request.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rand::Rng;

use argo_core::error::ArgoError;
use argo_core::types::User;
use argo_storage::UserRepository;

use crate::state::AppState;

/// The authenticated caller, inserted as a request extension.
#[derive(Clone, Debug)]
pub struct AuthUser(pub User);

/// Generate a random 64-character hex token.
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Create the user for `email` if needed and bind a fresh token to it.
/// Any previous token for the user stops working.
pub fn issue_token(users: &UserRepository, email: &str) -> Result<String, ArgoError> {
    let user = users.get_or_create(email, None)?;
    let token = generate_token();
    users.set_api_token(&user.id, &token)?;
    tracing::info!(user_id = %user.id, "API token issued");
    Ok(token)
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "unauthorized",
            "message": message
        })),
    )
        .into_response()
}

/// Middleware that validates Bearer token authentication.
///
/// Resolves the token from `Authorization: Bearer <token>` to a user record
/// and attaches it as [`AuthUser`]. Returns 401 if missing or unknown.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let Some(value) = req.headers().get("authorization") else {
        return unauthorized("Missing Authorization header");
    };
    let Ok(value_str) = value.to_str() else {
        return unauthorized("Invalid Authorization header encoding");
    };
    let Some(token) = value_str.strip_prefix("Bearer ") else {
        return unauthorized("Invalid bearer token");
    };

    match state.users.find_by_api_token(token.trim()) {
        Ok(Some(user)) => {
            req.extensions_mut().insert(AuthUser(user));
            next.run(req).await
        }
        Ok(None) => unauthorized("Invalid bearer token"),
        Err(e) => {
            tracing::error!("token lookup failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": "internal_error",
                    "message": "Failed to verify token"
                })),
            )
                .into_response()
        }
    }
}

//! Route handlers for the Argo API.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Local;
use serde::{Deserialize, Serialize};

use argo_chat::{NewAttachment, TurnRequest};
use argo_core::services::{BankData, BankLink};
use argo_core::types::{ChartSpec, FinancialContext, Message, User};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_TITLE: &str = "New Chat";

// =============================================================================
// Health
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub bank_configured: bool,
}

/// GET /health - public liveness probe.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        bank_configured: state.bank.is_some(),
    })
}

// =============================================================================
// Chat
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentPayload {
    pub file_name: String,
    pub content_type: String,
    /// Base64-encoded file bytes.
    pub data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub attachment: Option<AttachmentPayload>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub conversation_id: String,
    pub reply: String,
    pub chart: Option<ChartSpec>,
    pub messages: Vec<Message>,
    pub lookback_days: Option<i64>,
}

/// POST /chat - run one conversation turn.
pub async fn chat(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let attachment = match body.attachment {
        Some(payload) => {
            let bytes = STANDARD
                .decode(payload.data.as_bytes())
                .map_err(|e| ApiError::BadRequest(format!("Invalid attachment encoding: {e}")))?;
            Some(NewAttachment {
                file_name: payload.file_name,
                content_type: payload.content_type,
                bytes,
            })
        }
        None => None,
    };

    // A client that reopens a conversation may send only its id.
    let transcript = match (&body.conversation_id, body.messages.is_empty()) {
        (Some(id), true) => state.conversations.load_messages(&user.id, id).await?,
        _ => body.messages,
    };

    // Attachment turns replace the snapshot, so skip the bank round-trips.
    let snapshot = if attachment.is_none() {
        build_snapshot(&state, &user).await
    } else {
        FinancialContext::default()
    };

    let outcome = state
        .orchestrator
        .handle_turn(TurnRequest {
            user_id: user.id.clone(),
            conversation_id: body.conversation_id,
            transcript,
            text: body.message,
            attachment,
            snapshot,
            bank_access_token: user.bank_access_token.clone(),
        })
        .await?;

    Ok(Json(ChatResponse {
        conversation_id: outcome.conversation_id,
        reply: outcome.reply,
        chart: outcome.chart,
        messages: outcome.messages,
        lookback_days: outcome.lookback_days,
    }))
}

/// Fetch the default-window snapshot for a linked user. Each piece that
/// fails is logged and left empty.
async fn build_snapshot(state: &AppState, user: &User) -> FinancialContext {
    let (Some(bank), Some(token)) = (&state.bank, &user.bank_access_token) else {
        return FinancialContext::default();
    };

    let days = state.config.chat.default_lookback_days;
    let (accounts, transactions, investments) = tokio::join!(
        bank.accounts(token),
        bank.transactions(token, days),
        bank.investments(token),
    );

    FinancialContext {
        accounts: accounts.unwrap_or_else(|e| {
            tracing::warn!(user_id = %user.id, "accounts fetch failed: {}", e);
            Vec::new()
        }),
        transactions: transactions.unwrap_or_else(|e| {
            tracing::warn!(user_id = %user.id, "transactions fetch failed: {}", e);
            Vec::new()
        }),
        investments: match investments {
            Ok(inv) => Some(inv),
            Err(e) => {
                tracing::warn!(user_id = %user.id, "investments fetch failed: {}", e);
                None
            }
        },
    }
}

#[derive(Debug, Deserialize)]
pub struct ExtractDaysRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ExtractDaysResponse {
    pub days: Option<i64>,
}

/// POST /chat/extract-days - ask the model for a lookback window.
pub async fn extract_days(
    State(state): State<AppState>,
    Json(body): Json<ExtractDaysRequest>,
) -> Result<Json<ExtractDaysResponse>, ApiError> {
    if body.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message is required".to_string()));
    }
    let days = state
        .orchestrator
        .extractor()
        .extract_days(&body.message, Local::now().date_naive())
        .await;
    Ok(Json(ExtractDaysResponse { days }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub attachment_id: String,
}

/// POST /chat/upload - store a file against a conversation the caller owns.
pub async fn upload(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut file: Option<NewAttachment> = None;
    let mut conversation_id: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {e}")))?;
                file = Some(NewAttachment {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            Some("conversationId") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Invalid conversationId: {e}")))?;
                conversation_id = Some(text);
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| ApiError::BadRequest("No file provided".to_string()))?;
    let conversation_id = conversation_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("No conversation ID".to_string()))?;

    let attachment = state
        .orchestrator
        .resolver()
        .upload(&user.id, &conversation_id, &file)
        .await?;

    Ok(Json(UploadResponse {
        attachment_id: attachment.as_str().to_string(),
    }))
}

// =============================================================================
// History
// =============================================================================

/// GET /chat/history - the caller's conversations, newest first.
pub async fn list_history(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let conversations = state.conversations.list_conversations(&user.id).await?;
    Ok(Json(serde_json::json!({ "conversations": conversations })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// POST /chat/history - create conversation metadata.
pub async fn create_history(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Json(body): Json<CreateConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let conversation_id = body
        .conversation_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("conversationId is required".to_string()))?;
    let title = body
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());

    state
        .conversations
        .create_conversation(&user.id, &conversation_id, &title)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "success": true })),
    ))
}

/// GET /chat/history/{id} - stored transcript, empty when unknown.
pub async fn get_history(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(conversation_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = state
        .conversations
        .load_messages(&user.id, &conversation_id)
        .await?;
    Ok(Json(serde_json::json!({ "messages": messages })))
}

#[derive(Debug, Deserialize)]
pub struct SaveMessagesRequest {
    pub messages: Vec<Message>,
}

/// PUT /chat/history/{id} - overwrite a transcript the caller owns.
pub async fn put_history(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(conversation_id): Path<String>,
    Json(body): Json<SaveMessagesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .conversations
        .save_messages(&user.id, &conversation_id, &body.messages)
        .await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

// =============================================================================
// Bank
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    pub days: Option<String>,
}

fn bank_data(state: &AppState) -> Result<&dyn BankData, ApiError> {
    state
        .bank
        .as_deref()
        .ok_or_else(|| ApiError::ServiceUnavailable("Bank integration not configured".to_string()))
}

fn bank_link(state: &AppState) -> Result<&dyn BankLink, ApiError> {
    state
        .bank_link
        .as_deref()
        .ok_or_else(|| ApiError::ServiceUnavailable("Bank integration not configured".to_string()))
}

fn access_token(user: &User) -> Result<&str, ApiError> {
    user.bank_access_token
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("No bank connected".to_string()))
}

/// Lookback for `?days=`; anything missing or outside `1..=max` falls back
/// to the default window.
pub fn lookback_param(raw: Option<&str>, default_days: u32, max_days: u32) -> u32 {
    raw.and_then(|s| s.trim().parse::<u32>().ok())
        .filter(|d| (1..=max_days).contains(d))
        .unwrap_or(default_days)
}

/// GET /bank/transactions?days=N
pub async fn bank_transactions(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Query(query): Query<TransactionsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let token = access_token(&user)?;
    let bank = bank_data(&state)?;
    let days = lookback_param(
        query.days.as_deref(),
        state.config.chat.default_lookback_days,
        state.config.chat.max_lookback_days,
    );
    let transactions = bank.transactions(token, days).await?;
    Ok(Json(serde_json::json!({ "transactions": transactions })))
}

/// GET /bank/accounts
pub async fn bank_accounts(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let token = access_token(&user)?;
    let accounts = bank_data(&state)?.accounts(token).await?;
    Ok(Json(serde_json::json!({ "accounts": accounts })))
}

/// GET /bank/investments
pub async fn bank_investments(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let token = access_token(&user)?;
    let investments = bank_data(&state)?.investments(token).await?;
    Ok(Json(serde_json::json!({ "investments": investments })))
}

/// POST /bank/link-token - start the account-linking flow.
pub async fn create_link_token(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let response = bank_link(&state)?.create_link_token(&user.id).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct ExchangeRequest {
    #[serde(default)]
    pub public_token: String,
}

/// POST /bank/exchange - finish linking and store the access token.
pub async fn exchange_public_token(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Json(body): Json<ExchangeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.public_token.trim().is_empty() {
        return Err(ApiError::BadRequest("public_token is required".to_string()));
    }
    let item = bank_link(&state)?
        .exchange_public_token(&body.public_token)
        .await?;
    state
        .users
        .link_bank(&user.id, &item.access_token, &item.item_id)?;
    tracing::info!(user_id = %user.id, item_id = %item.item_id, "bank item linked");
    Ok(Json(serde_json::json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookback_param() {
        assert_eq!(lookback_param(None, 30, 730), 30);
        assert_eq!(lookback_param(Some("90"), 30, 730), 90);
        assert_eq!(lookback_param(Some("730"), 30, 730), 730);
        assert_eq!(lookback_param(Some("731"), 30, 730), 30);
        assert_eq!(lookback_param(Some("0"), 30, 730), 30);
        assert_eq!(lookback_param(Some("-5"), 30, 730), 30);
        assert_eq!(lookback_param(Some("abc"), 30, 730), 30);
    }
}

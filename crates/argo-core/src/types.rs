use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{ArgoError, Result};

// =============================================================================
// Enums
// =============================================================================

/// Author of a transcript message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Presentation hint stored with a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Chart,
}

/// Chart kinds the renderer understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
    Area,
}

// =============================================================================
// Chart directive
// =============================================================================

/// One labelled value in a chart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub label: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Rendering directive parsed out of a `<chart>` block in assistant text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    #[serde(rename = "type")]
    pub kind: ChartKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub data: Vec<ChartPoint>,
}

// =============================================================================
// Attachments
// =============================================================================

/// Key of an uploaded file: `{conversationId}/{uploadEpochMillis}-{fileName}`.
///
/// Deserializes from any string so stored transcripts with odd ids still
/// load; use [`AttachmentRef::conversation_id`] to check well-formedness.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttachmentRef(String);

impl AttachmentRef {
    /// Mint a ref for a file uploaded at `uploaded_at_millis`.
    pub fn new(conversation_id: &str, uploaded_at_millis: i64, file_name: &str) -> Self {
        Self(format!(
            "{}/{}-{}",
            conversation_id, uploaded_at_millis, file_name
        ))
    }

    /// Conversation id embedded before the first `/`.
    pub fn conversation_id(&self) -> Option<&str> {
        match self.0.split_once('/') {
            Some((conv, rest)) if !conv.is_empty() && !rest.is_empty() => Some(conv),
            _ => None,
        }
    }

    /// Original file name (after the timestamp prefix), if present.
    pub fn file_name(&self) -> Option<&str> {
        let (_, rest) = self.0.split_once('/')?;
        rest.split_once('-').map(|(_, name)| name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AttachmentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw bytes plus declared media type, as held by an object store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
}

// =============================================================================
// Conversations
// =============================================================================

/// Reject conversation ids that cannot prefix an attachment key.
///
/// An id is used verbatim as the first segment of `{conversationId}/...`
/// object keys, so it must be non-blank and free of `/`.
pub fn validate_conversation_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(ArgoError::InvalidInput(
            "conversation id cannot be empty".to_string(),
        ));
    }
    if id.contains('/') {
        return Err(ArgoError::InvalidInput(format!(
            "conversation id {:?} cannot contain '/'",
            id
        )));
    }
    Ok(())
}

/// One transcript entry.
///
/// `content` is what the user sees; `text` is plain text safe to send to the
/// model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<MessageKind>,
    #[serde(
        rename = "chartConfig",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub chart: Option<ChartSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_id: Option<AttachmentRef>,
}

impl Message {
    /// Plain text message with identical display and model text.
    pub fn text(id: impl Into<String>, role: Role, body: impl Into<String>) -> Self {
        let body = body.into();
        Self {
            id: id.into(),
            role,
            content: body.clone(),
            text: body,
            kind: Some(MessageKind::Text),
            chart: None,
            timestamp: None,
            attachment_id: None,
        }
    }
}

/// Conversation record owned by one user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationMetadata {
    pub user_id: String,
    pub conversation_id: String,
    pub title: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub attachment_ids: Vec<AttachmentRef>,
}

impl ConversationMetadata {
    pub fn has_attachment(&self, attachment: &AttachmentRef) -> bool {
        self.attachment_ids.iter().any(|a| a == attachment)
    }
}

// =============================================================================
// Users
// =============================================================================

/// Account holder record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_item_id: Option<String>,
}

impl User {
    /// Stable user id: hex SHA-256 of the email address.
    pub fn id_for_email(email: &str) -> String {
        hex::encode(Sha256::digest(email.as_bytes()))
    }
}

// =============================================================================
// Financial records
// =============================================================================

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Balances {
    #[serde(default)]
    pub current: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<f64>,
    #[serde(default)]
    pub iso_currency_code: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Account {
    #[serde(default)]
    pub account_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub official_name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub account_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default)]
    pub balances: Balances,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    pub amount: f64,
    pub date: NaiveDate,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iso_currency_code: Option<String>,
}

/// Holdings and securities are passed through to the model untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Investments {
    #[serde(default)]
    pub holdings: Vec<serde_json::Value>,
    #[serde(default)]
    pub securities: Vec<serde_json::Value>,
}

/// Snapshot of a user's financial records used to ground one turn.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialContext {
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub investments: Option<Investments>,
}

impl FinancialContext {
    /// Copy of the snapshot with at most `cap` transactions.
    pub fn capped(&self, cap: usize) -> Self {
        Self {
            accounts: self.accounts.clone(),
            transactions: self.transactions.iter().take(cap).cloned().collect(),
            investments: self.investments.clone(),
        }
    }

    /// Drop transactions dated before `cutoff`.
    pub fn retain_since(&mut self, cutoff: NaiveDate) {
        self.transactions.retain(|t| t.date >= cutoff);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(id: &str, date: &str, amount: f64) -> Transaction {
        Transaction {
            transaction_id: id.to_string(),
            account_id: None,
            amount,
            date: date.parse().unwrap(),
            name: format!("Vendor {}", id),
            merchant_name: None,
            category: None,
            iso_currency_code: None,
        }
    }

    #[test]
    fn test_attachment_ref_format() {
        let r = AttachmentRef::new("conv123", 1700000000000, "bank.pdf");
        assert_eq!(r.as_str(), "conv123/1700000000000-bank.pdf");
        assert_eq!(r.conversation_id(), Some("conv123"));
        assert_eq!(r.file_name(), Some("bank.pdf"));
    }

    #[test]
    fn test_attachment_ref_file_name_keeps_dashes() {
        let r = AttachmentRef::new("c", 5, "my-statement-2024.csv");
        assert_eq!(r.file_name(), Some("my-statement-2024.csv"));
    }

    #[test]
    fn test_attachment_ref_malformed_has_no_conversation() {
        for raw in ["no-separator", "/999-bank.pdf", "conv123/", ""] {
            assert!(AttachmentRef(raw.to_string()).conversation_id().is_none(), "{raw}");
        }
    }

    #[test]
    fn test_conversation_id_validation() {
        assert!(validate_conversation_id("conv-1700000000000").is_ok());
        for bad in ["", "   ", "team/q1", "c-alice/1700-budget.pdf", "/"] {
            let err = validate_conversation_id(bad).unwrap_err();
            assert!(matches!(err, ArgoError::InvalidInput(_)), "{bad:?}");
        }
    }

    #[test]
    fn test_attachment_ref_serializes_as_plain_string() {
        let r = AttachmentRef::new("c1", 1, "a.csv");
        assert_eq!(serde_json::to_string(&r).unwrap(), "\"c1/1-a.csv\"");
        let back: AttachmentRef = serde_json::from_str("\"weird\"").unwrap();
        assert_eq!(back.conversation_id(), None);
    }

    #[test]
    fn test_message_wire_format() {
        let json = r#"{
            "id": "1",
            "role": "assistant",
            "content": "Here you go",
            "text": "Here you go",
            "type": "chart",
            "chartConfig": {"type": "pie", "data": [{"label": "Food", "value": 12.5}]},
            "timestamp": 1700000000000,
            "attachmentId": "c1/1-a.pdf"
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.kind, Some(MessageKind::Chart));
        let chart = msg.chart.as_ref().unwrap();
        assert_eq!(chart.kind, ChartKind::Pie);
        assert_eq!(chart.data[0].value, 12.5);
        assert_eq!(msg.attachment_id.as_ref().unwrap().as_str(), "c1/1-a.pdf");

        let out = serde_json::to_value(&msg).unwrap();
        assert_eq!(out["chartConfig"]["type"], "pie");
        assert_eq!(out["attachmentId"], "c1/1-a.pdf");
    }

    #[test]
    fn test_message_tolerates_null_optionals() {
        let json = r#"{"id":"2","role":"user","content":"hi","text":"hi","chartConfig":null}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert!(msg.chart.is_none());
        assert!(msg.kind.is_none());
        let out = serde_json::to_value(&msg).unwrap();
        assert!(out.get("chartConfig").is_none());
    }

    #[test]
    fn test_chart_spec_rejects_unknown_kind() {
        let json = r#"{"type":"scatter","data":[]}"#;
        assert!(serde_json::from_str::<ChartSpec>(json).is_err());
    }

    #[test]
    fn test_user_id_is_sha256_hex() {
        let id = User::id_for_email("a@example.com");
        assert_eq!(id.len(), 64);
        assert_eq!(id, User::id_for_email("a@example.com"));
        assert_ne!(id, User::id_for_email("b@example.com"));
    }

    #[test]
    fn test_financial_context_capped() {
        let ctx = FinancialContext {
            accounts: vec![],
            transactions: (0..5).map(|i| tx(&i.to_string(), "2024-01-01", 1.0)).collect(),
            investments: None,
        };
        let capped = ctx.capped(3);
        assert_eq!(capped.transactions.len(), 3);
        assert_eq!(capped.transactions[0].transaction_id, "0");
        assert_eq!(ctx.transactions.len(), 5);
    }

    #[test]
    fn test_financial_context_retain_since() {
        let mut ctx = FinancialContext {
            accounts: vec![],
            transactions: vec![
                tx("old", "2024-01-01", 1.0),
                tx("edge", "2024-02-01", 2.0),
                tx("new", "2024-03-01", 3.0),
            ],
            investments: None,
        };
        ctx.retain_since("2024-02-01".parse().unwrap());
        let ids: Vec<_> = ctx.transactions.iter().map(|t| t.transaction_id.as_str()).collect();
        assert_eq!(ids, vec!["edge", "new"]);
    }

    #[test]
    fn test_conversation_has_attachment() {
        let linked = AttachmentRef::new("c1", 1, "a.csv");
        let meta = ConversationMetadata {
            user_id: "u".into(),
            conversation_id: "c1".into(),
            title: "t".into(),
            updated_at: Utc::now(),
            attachment_ids: vec![linked.clone()],
        };
        assert!(meta.has_attachment(&linked));
        assert!(!meta.has_attachment(&AttachmentRef::new("c1", 2, "a.csv")));
    }
}

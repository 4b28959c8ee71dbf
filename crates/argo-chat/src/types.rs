//! Turn-level request and outcome types.

use serde::{Deserialize, Serialize};

use argo_core::types::{ChartSpec, FinancialContext, Message};

/// How an attachment is presented to the model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    /// PDF, sent as an inline document block.
    Document,
    /// CSV, decoded and inlined as text.
    Tabular,
    /// Anything else; bytes are not forwarded.
    Opaque,
}

/// Attachment bytes fetched after a successful ownership check.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedAttachment {
    pub kind: AttachmentKind,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A file submitted along with the user's message.
#[derive(Clone, Debug, PartialEq)]
pub struct NewAttachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Everything needed to run one turn.
#[derive(Clone, Debug, Default)]
pub struct TurnRequest {
    pub user_id: String,
    /// Existing conversation, or `None` to start a new one.
    pub conversation_id: Option<String>,
    /// Prior messages. Empty means a fresh conversation seeded with the
    /// greeting.
    pub transcript: Vec<Message>,
    pub text: String,
    pub attachment: Option<NewAttachment>,
    pub snapshot: FinancialContext,
    /// Linked bank item, used to widen the transaction window.
    pub bank_access_token: Option<String>,
}

/// Pipeline position of a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    Idle,
    ConversationEnsured,
    AttachmentUploaded,
    WindowExtracted,
    ContextBuilt,
    AssistantInvoked,
    Done,
    Failed,
}

/// Result of a completed turn.
#[derive(Clone, Debug, PartialEq)]
pub struct TurnOutcome {
    pub conversation_id: String,
    /// Assistant text with any chart block removed.
    pub reply: String,
    pub chart: Option<ChartSpec>,
    /// Full transcript including the new user and assistant messages.
    pub messages: Vec<Message>,
    /// Final pipeline state, `Done` or `Failed`.
    pub state: TurnState,
    /// Day window applied to the snapshot, if one was extracted.
    pub lookback_days: Option<i64>,
}

//! Model context assembly.
//!
//! Turns a stored transcript plus a financial snapshot into the system
//! instructions and message list for one assistant call.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Local};
use tracing::warn;

use argo_core::types::{FinancialContext, Message, Role};

use crate::attachment::{classify, AttachmentResolver};
use crate::llm::{ContentPart, DocumentSource, MessageContent, ModelMessage};
use crate::types::{AttachmentKind, NewAttachment};

const DOCUMENT_FALLBACK_TEXT: &str = "Analyze this document.";
const CSV_SEPARATOR: &str = "\n\nCSV Data:\n";

/// System instructions plus the ordered message list.
#[derive(Clone, Debug, PartialEq)]
pub struct AssembledContext {
    pub system: String,
    pub messages: Vec<ModelMessage>,
}

/// Builds assistant requests from transcripts.
pub struct ContextAssembler {
    resolver: Arc<AttachmentResolver>,
    transaction_cap: usize,
}

impl ContextAssembler {
    pub fn new(resolver: Arc<AttachmentResolver>, transaction_cap: usize) -> Self {
        Self {
            resolver,
            transaction_cap,
        }
    }

    /// Assemble the model input for a turn.
    ///
    /// `snapshot` is `None` when the turn carries an attachment; the system
    /// prompt then embeds `{}`. `latest_override`, if given, replaces the
    /// content of the final message when that message is from the user.
    pub async fn assemble(
        &self,
        user_id: &str,
        history: &[Message],
        snapshot: Option<&FinancialContext>,
        latest_override: Option<MessageContent>,
        now: DateTime<Local>,
    ) -> AssembledContext {
        let start = history
            .iter()
            .position(|m| m.role == Role::User)
            .unwrap_or(history.len());

        let mut messages = Vec::with_capacity(history.len() - start);
        for message in &history[start..] {
            messages.push(self.format_message(user_id, message).await);
        }

        if let Some(content) = latest_override {
            match messages.last_mut() {
                Some(last) if last.role == Role::User => last.content = content,
                _ => warn!("latest-message override ignored: final message is not from the user"),
            }
        }

        let snapshot_json = match snapshot {
            Some(ctx) => serde_json::to_string(&ctx.capped(self.transaction_cap))
                .unwrap_or_else(|_| "{}".to_string()),
            None => "{}".to_string(),
        };

        AssembledContext {
            system: system_prompt(&now.format("%A, %B %-d, %Y").to_string(), &snapshot_json),
            messages,
        }
    }

    async fn format_message(&self, user_id: &str, message: &Message) -> ModelMessage {
        let plain = ModelMessage {
            role: message.role,
            content: MessageContent::Text(message.text.clone()),
        };

        let Some(attachment) = &message.attachment_id else {
            return plain;
        };
        let Some(resolved) = self.resolver.resolve(attachment, user_id).await else {
            return plain;
        };

        let content = match resolved.kind {
            AttachmentKind::Document => {
                document_content(&message.text, &resolved.content_type, &resolved.bytes)
            }
            AttachmentKind::Tabular => {
                MessageContent::Text(csv_text(&message.text, &resolved.bytes))
            }
            AttachmentKind::Opaque => return plain,
        };
        ModelMessage {
            role: message.role,
            content,
        }
    }
}

/// Override content for a file submitted with the current turn, built from
/// the bytes in hand so it applies even when the upload failed.
pub fn attachment_override(input: &str, file: &NewAttachment) -> MessageContent {
    match classify(&file.content_type, &file.file_name) {
        AttachmentKind::Document => document_content(input, "application/pdf", &file.bytes),
        AttachmentKind::Tabular => MessageContent::Parts(vec![ContentPart::Text {
            text: csv_text(input, &file.bytes),
        }]),
        AttachmentKind::Opaque => MessageContent::Text(input.to_string()),
    }
}

fn document_content(text: &str, media_type: &str, bytes: &[u8]) -> MessageContent {
    let text = if text.is_empty() {
        DOCUMENT_FALLBACK_TEXT
    } else {
        text
    };
    MessageContent::Parts(vec![
        ContentPart::Text {
            text: text.to_string(),
        },
        ContentPart::Document {
            source: DocumentSource::base64(media_type, STANDARD.encode(bytes)),
        },
    ])
}

fn csv_text(text: &str, bytes: &[u8]) -> String {
    format!("{}{}{}", text, CSV_SEPARATOR, String::from_utf8_lossy(bytes))
}

/// Assistant system instructions for the given long-form date and snapshot
/// JSON.
pub fn system_prompt(current_date: &str, snapshot_json: &str) -> String {
    format!(
        r##"
You are Argo, an expert AI financial assistant.
The current date is {current_date}.
You have access to the user's financial data (accounts, transactions, investments) in JSON format below.
Your goal is to answer the user's question clearly, concisely, and accurately based on this data.

User Data:
{snapshot_json}

Instructions:
- If the user asks for a chart, graph, or visualization:
    1. Analyze the data to determine the best chart type (bar, line, pie, area).
    2. Generate a JSON configuration for the chart inside a <chart> tag.
    3. The JSON must follow this structure:
       {{
         "type": "bar" | "line" | "pie" | "area",
         "title": "Chart Title",
         "data": [
           {{ "label": "Label1", "value": 100, "color": "#10b981" }},
           {{ "label": "Label2", "value": 200, "color": "#f43f5e" }}
         ]
       }}
    4. Provide a brief text summary alongside the chart.
- If the user asks for balances, sum them up accurately.
- If the user asks for portfolio details, summarize the holdings.
- Do not graph data in the future, unless the user explicitly asks for it.
- Be friendly and professional.
- Do not make up data not present in the JSON or the attached document.
- If an attachment is provided, prioritize its content over the JSON data.
- If the user attaches statements, first filter out any transactions that are not relevant to the user's question.
- Once the filtering is done, use the remaining transactions to answer the user's question.

When classifying vendors, look for partial matches and common variations:
- Credit card transactions often include internal codes, reference numbers, or location codes
- Match based on recognizable vendor names embedded in the description
- Common patterns:
  * "AMAZON MKTPL*" or "AMZN.COM" → Amazon
  * "SQ *" or "SQUARE *" → Square payment processor (check what follows for actual vendor)
  * "PAYPAL *" → PayPal (check what follows for actual vendor)
  * "TST* " → Toast POS system (check for restaurant name)
"##
    )
}

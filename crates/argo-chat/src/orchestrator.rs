//! Turn orchestrator: drives one user message through the pipeline.
//!
//! Ensures the conversation exists, uploads any attachment, narrows the
//! transaction window, assembles context, calls the assistant and schedules
//! the transcript save. Recoverable collaborator failures degrade the turn
//! instead of failing it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Local, NaiveDate, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use argo_core::config::ChatConfig;
use argo_core::services::{AttachmentStore, BankData, ConversationStore};
use argo_core::types::{validate_conversation_id, FinancialContext, Message, MessageKind, Role};

use crate::assistant::{AssistantInvoker, AssistantReply};
use crate::attachment::AttachmentResolver;
use crate::autosave::TranscriptAutosaver;
use crate::context::{attachment_override, ContextAssembler};
use crate::error::ChatError;
use crate::llm::LanguageModel;
use crate::types::{TurnOutcome, TurnRequest, TurnState};
use crate::window::WindowExtractor;

/// Display text of the assistant message appended when a turn fails.
pub const FAILURE_CONTENT: &str = "Error connecting to Argo AI. Please try again.";
/// Model-facing text of the failure message.
pub const FAILURE_TEXT: &str = "Error connecting to Argo AI.";

/// Collaborators the orchestrator is built from.
pub struct TurnDependencies {
    pub conversations: Arc<dyn ConversationStore>,
    pub attachments: Arc<dyn AttachmentStore>,
    pub model: Arc<dyn LanguageModel>,
    pub bank: Option<Arc<dyn BankData>>,
}

/// Central coordinator for chat turns.
pub struct TurnOrchestrator {
    conversations: Arc<dyn ConversationStore>,
    resolver: Arc<AttachmentResolver>,
    extractor: Arc<WindowExtractor>,
    assembler: ContextAssembler,
    assistant: AssistantInvoker,
    bank: Option<Arc<dyn BankData>>,
    autosaver: TranscriptAutosaver,
    config: ChatConfig,
}

impl TurnOrchestrator {
    pub fn new(
        deps: TurnDependencies,
        config: ChatConfig,
        max_output_tokens: u32,
        extraction_max_tokens: u32,
    ) -> Self {
        let resolver = Arc::new(AttachmentResolver::new(
            deps.conversations.clone(),
            deps.attachments,
        ));
        let extractor = Arc::new(WindowExtractor::new(
            deps.model.clone(),
            extraction_max_tokens,
        ));
        let assembler = ContextAssembler::new(resolver.clone(), config.transaction_cap);
        let assistant = AssistantInvoker::new(deps.model, max_output_tokens);
        let autosaver = TranscriptAutosaver::new(
            deps.conversations.clone(),
            Duration::from_millis(config.autosave_delay_ms),
        );

        Self {
            conversations: deps.conversations,
            resolver,
            extractor,
            assembler,
            assistant,
            bank: deps.bank,
            autosaver,
            config,
        }
    }

    pub fn resolver(&self) -> Arc<AttachmentResolver> {
        self.resolver.clone()
    }

    pub fn extractor(&self) -> Arc<WindowExtractor> {
        self.extractor.clone()
    }

    pub fn autosaver(&self) -> &TranscriptAutosaver {
        &self.autosaver
    }

    /// Greeting that opens a fresh conversation.
    pub fn greeting(&self) -> Message {
        Message::text("1", Role::Assistant, self.config.greeting.clone())
    }

    /// Conversation title derived from the first user message.
    pub fn title_for(&self, text: &str) -> String {
        let head: String = text.chars().take(self.config.title_chars).collect();
        format!("{}...", head)
    }

    /// Run one turn.
    ///
    /// Returns `Err` only for invalid input and for errors that must reach the
    /// caller (ownership and configuration). Every other failure completes
    /// the turn with an error message from the assistant.
    pub async fn handle_turn(&self, request: TurnRequest) -> Result<TurnOutcome, ChatError> {
        self.validate(&request)?;

        let mut state = TurnState::Idle;
        let mut messages = if request.transcript.is_empty() {
            vec![self.greeting()]
        } else {
            request.transcript.clone()
        };
        messages.push(self.user_message(&request));

        let conversation_id = match self.ensure_conversation(&request).await {
            Ok(id) => id,
            Err(e) if e.is_surfaced() => return Err(e),
            Err(e) => {
                warn!(user_id = %request.user_id, "Turn failed before conversation was ensured: {}", e);
                let id = request
                    .conversation_id
                    .clone()
                    .unwrap_or_else(|| Uuid::new_v4().to_string());
                return Ok(self.fail(&id, messages, &mut state));
            }
        };
        self.transition(&mut state, TurnState::ConversationEnsured, &conversation_id);

        let has_attachment = match &request.attachment {
            Some(file) => {
                match self
                    .resolver
                    .upload(&request.user_id, &conversation_id, file)
                    .await
                {
                    Ok(attachment) => {
                        if let Some(last) = messages.last_mut() {
                            last.attachment_id = Some(attachment);
                        }
                        self.transition(&mut state, TurnState::AttachmentUploaded, &conversation_id);
                    }
                    Err(e) => warn!(%conversation_id, "Attachment upload failed: {}", e),
                }
                true
            }
            None => false,
        };

        let today = Local::now().date_naive();
        let mut snapshot = request.snapshot.clone();
        let mut lookback_days = None;
        if !has_attachment {
            let user_text = messages.last().map(|m| m.text.clone()).unwrap_or_default();
            lookback_days = self.extractor.extract_days(&user_text, today).await;
            self.apply_window(
                &mut snapshot,
                lookback_days,
                request.bank_access_token.as_deref(),
                today,
            )
            .await;
            self.transition(&mut state, TurnState::WindowExtracted, &conversation_id);
        }

        let latest_override = request
            .attachment
            .as_ref()
            .map(|file| attachment_override(&request.text, file));
        let context = self
            .assembler
            .assemble(
                &request.user_id,
                &messages,
                (!has_attachment).then_some(&snapshot),
                latest_override,
                Local::now(),
            )
            .await;
        self.transition(&mut state, TurnState::ContextBuilt, &conversation_id);

        let reply = self.assistant.invoke(context).await;
        self.transition(&mut state, TurnState::AssistantInvoked, &conversation_id);

        messages.push(assistant_message(&reply));
        self.autosaver
            .schedule(&request.user_id, &conversation_id, messages.clone());
        self.transition(&mut state, TurnState::Done, &conversation_id);

        info!(
            user_id = %request.user_id,
            %conversation_id,
            chart = reply.chart.is_some(),
            lookback_days = ?lookback_days,
            "turn complete"
        );

        Ok(TurnOutcome {
            conversation_id,
            reply: reply.text,
            chart: reply.chart,
            messages,
            state,
            lookback_days,
        })
    }

    fn validate(&self, request: &TurnRequest) -> Result<(), ChatError> {
        if request.text.trim().is_empty() && request.attachment.is_none() {
            return Err(ChatError::EmptyMessage);
        }
        if request.text.chars().count() > self.config.max_message_length {
            return Err(ChatError::MessageTooLong(self.config.max_message_length));
        }
        if let Some(id) = request.conversation_id.as_deref() {
            validate_conversation_id(id)?;
        }
        Ok(())
    }

    fn user_message(&self, request: &TurnRequest) -> Message {
        let (content, text) = user_texts(request);
        let now = Utc::now().timestamp_millis();
        Message {
            id: Uuid::new_v4().to_string(),
            role: Role::User,
            content,
            text,
            kind: Some(MessageKind::Text),
            chart: None,
            timestamp: Some(now),
            attachment_id: None,
        }
    }

    /// Make sure metadata exists for the turn's conversation, creating it
    /// when the id is new to this user.
    async fn ensure_conversation(&self, request: &TurnRequest) -> Result<String, ChatError> {
        let title = self.title_for(&user_texts(request).1);

        match &request.conversation_id {
            Some(id) => {
                if self
                    .conversations
                    .find_conversation(&request.user_id, id)
                    .await?
                    .is_none()
                {
                    self.conversations
                        .create_conversation(&request.user_id, id, &title)
                        .await?;
                }
                Ok(id.clone())
            }
            None => {
                let id = Uuid::new_v4().to_string();
                self.conversations
                    .create_conversation(&request.user_id, &id, &title)
                    .await?;
                info!(user_id = %request.user_id, conversation_id = %id, "conversation started");
                Ok(id)
            }
        }
    }

    /// Narrow or widen the snapshot's transactions to `days`.
    async fn apply_window(
        &self,
        snapshot: &mut FinancialContext,
        days: Option<i64>,
        bank_access_token: Option<&str>,
        today: NaiveDate,
    ) {
        let Some(days) = days.filter(|d| *d > 0) else {
            return;
        };

        if days <= i64::from(self.config.max_lookback_days) {
            if let (Some(bank), Some(token)) = (&self.bank, bank_access_token) {
                match bank.transactions(token, days as u32).await {
                    Ok(transactions) => {
                        debug!(days, count = transactions.len(), "transactions re-fetched");
                        snapshot.transactions = transactions;
                        return;
                    }
                    Err(e) => warn!(days, "Transaction re-fetch failed, filtering locally: {}", e),
                }
            }
        }

        // A window reaching past the calendar range keeps everything.
        if let Some(cutoff) =
            ChronoDuration::try_days(days).and_then(|d| today.checked_sub_signed(d))
        {
            snapshot.retain_since(cutoff);
        }
    }

    /// Close the turn with the failure message. Nothing is saved: the
    /// conversation has no metadata to save against.
    fn fail(
        &self,
        conversation_id: &str,
        mut messages: Vec<Message>,
        state: &mut TurnState,
    ) -> TurnOutcome {
        messages.push(Message {
            id: Uuid::new_v4().to_string(),
            role: Role::Assistant,
            content: FAILURE_CONTENT.to_string(),
            text: FAILURE_TEXT.to_string(),
            kind: Some(MessageKind::Text),
            chart: None,
            timestamp: Some(Utc::now().timestamp_millis()),
            attachment_id: None,
        });
        self.transition(state, TurnState::Failed, conversation_id);

        TurnOutcome {
            conversation_id: conversation_id.to_string(),
            reply: FAILURE_CONTENT.to_string(),
            chart: None,
            messages,
            state: *state,
            lookback_days: None,
        }
    }

    fn transition(&self, state: &mut TurnState, next: TurnState, conversation_id: &str) {
        debug!(%conversation_id, from = ?*state, to = ?next, "turn state");
        *state = next;
    }
}

/// Display and plain text of the user's message, with the attachment note.
fn user_texts(request: &TurnRequest) -> (String, String) {
    match &request.attachment {
        Some(file) => (
            format!("{}\n[Attached: {}]", request.text, file.file_name),
            format!("{} \n[Attached: {}]", request.text, file.file_name),
        ),
        None => (request.text.clone(), request.text.clone()),
    }
}

fn assistant_message(reply: &AssistantReply) -> Message {
    Message {
        id: Uuid::new_v4().to_string(),
        role: Role::Assistant,
        content: reply.text.clone(),
        text: reply.text.clone(),
        kind: Some(if reply.chart.is_some() {
            MessageKind::Chart
        } else {
            MessageKind::Text
        }),
        chart: reply.chart.clone(),
        timestamp: Some(Utc::now().timestamp_millis()),
        attachment_id: None,
    }
}

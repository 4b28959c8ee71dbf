//! Attachment upload and owner-checked resolution.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use argo_core::services::{AttachmentStore, ConversationStore};
use argo_core::types::AttachmentRef;

use crate::error::ChatError;
use crate::types::{AttachmentKind, NewAttachment, ResolvedAttachment};

/// Classify by media type, falling back to the file name for CSV.
pub fn classify(content_type: &str, name: &str) -> AttachmentKind {
    if content_type == "application/pdf" {
        AttachmentKind::Document
    } else if content_type.contains("csv") || name.ends_with(".csv") {
        AttachmentKind::Tabular
    } else {
        AttachmentKind::Opaque
    }
}

/// Stores uploads and resolves refs for the user who owns them.
pub struct AttachmentResolver {
    conversations: Arc<dyn ConversationStore>,
    store: Arc<dyn AttachmentStore>,
}

impl AttachmentResolver {
    pub fn new(conversations: Arc<dyn ConversationStore>, store: Arc<dyn AttachmentStore>) -> Self {
        Self {
            conversations,
            store,
        }
    }

    /// Fetch an attachment if `user_id` owns the conversation named in the
    /// ref and the ref is linked to it. Every miss is `None`.
    pub async fn resolve(
        &self,
        attachment: &AttachmentRef,
        user_id: &str,
    ) -> Option<ResolvedAttachment> {
        let Some(conversation_id) = attachment.conversation_id() else {
            warn!(attachment = %attachment, "malformed attachment ref");
            return None;
        };

        let meta = match self
            .conversations
            .find_conversation(user_id, conversation_id)
            .await
        {
            Ok(Some(meta)) => meta,
            Ok(None) => {
                warn!(user_id, attachment = %attachment, "attachment conversation not owned by user");
                return None;
            }
            Err(e) => {
                warn!(attachment = %attachment, "conversation lookup failed: {}", e);
                return None;
            }
        };

        if !meta.has_attachment(attachment) {
            warn!(user_id, attachment = %attachment, "attachment not linked to conversation");
            return None;
        }

        let object = match self.store.get_attachment(attachment).await {
            Ok(Some(obj)) => obj,
            Ok(None) => {
                debug!(attachment = %attachment, "attachment bytes missing");
                return None;
            }
            Err(e) => {
                warn!(attachment = %attachment, "attachment fetch failed: {}", e);
                return None;
            }
        };

        Some(ResolvedAttachment {
            kind: classify(&object.content_type, attachment.as_str()),
            content_type: object.content_type,
            bytes: object.body,
        })
    }

    /// Store a new file under a freshly minted ref and link it to the
    /// conversation.
    pub async fn upload(
        &self,
        user_id: &str,
        conversation_id: &str,
        file: &NewAttachment,
    ) -> Result<AttachmentRef, ChatError> {
        if self
            .conversations
            .find_conversation(user_id, conversation_id)
            .await?
            .is_none()
        {
            return Err(ChatError::Unauthorized(format!(
                "conversation {} does not belong to user",
                conversation_id
            )));
        }

        let attachment = AttachmentRef::new(
            conversation_id,
            Utc::now().timestamp_millis(),
            &file.file_name,
        );
        self.store
            .put_attachment(&attachment, &file.bytes, &file.content_type)
            .await?;
        self.conversations
            .link_attachment(user_id, conversation_id, &attachment)
            .await?;

        info!(
            user_id,
            attachment = %attachment,
            bytes = file.bytes.len(),
            "attachment uploaded"
        );
        Ok(attachment)
    }
}

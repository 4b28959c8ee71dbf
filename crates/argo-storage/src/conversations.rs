//! Conversation metadata rows plus transcript objects.
//!
//! Metadata lives in the `conversations` table keyed by `(user_id,
//! conversation_id)`; the transcript itself is a JSON object at
//! `{conversationId}.json` in the transcripts bucket. Every read and write
//! goes through the owner's metadata row first.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use argo_core::error::ArgoError;
use argo_core::services::ConversationStore;
use argo_core::types::{validate_conversation_id, AttachmentRef, ConversationMetadata, Message};

use crate::db::{storage_err, Database, OptionalExt};
use crate::objects::{require_bucket, ObjectStore};

/// SQLite-backed [`ConversationStore`].
pub struct ConversationRepository {
    db: Arc<Database>,
    objects: Arc<ObjectStore>,
    transcripts_bucket: String,
}

impl ConversationRepository {
    pub fn new(
        db: Arc<Database>,
        objects: Arc<ObjectStore>,
        transcripts_bucket: impl Into<String>,
    ) -> Self {
        Self {
            db,
            objects,
            transcripts_bucket: transcripts_bucket.into(),
        }
    }

    fn transcript_key(conversation_id: &str) -> String {
        format!("{}.json", conversation_id)
    }

    fn find(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<Option<ConversationMetadata>, ArgoError> {
        self.db.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT user_id, conversation_id, title, updated_at, attachment_ids
                     FROM conversations WHERE user_id = ?1 AND conversation_id = ?2",
                    rusqlite::params![user_id, conversation_id],
                    |row| Ok(row_to_metadata(row)),
                )
                .optional()
                .map_err(storage_err)?;
            row.transpose()
        })
    }

    fn touch(&self, user_id: &str, conversation_id: &str) -> Result<(), ArgoError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE conversations SET updated_at = ?3
                 WHERE user_id = ?1 AND conversation_id = ?2",
                rusqlite::params![user_id, conversation_id, Utc::now().timestamp_millis()],
            )
            .map_err(storage_err)?;
            Ok(())
        })
    }
}

#[async_trait]
impl ConversationStore for ConversationRepository {
    async fn create_conversation(
        &self,
        user_id: &str,
        conversation_id: &str,
        title: &str,
    ) -> Result<(), ArgoError> {
        validate_conversation_id(conversation_id)?;
        self.db.with_conn(|conn| {
            // Transcript keys are not user-scoped, so an id belongs to one user.
            let other_owner: Option<String> = conn
                .query_row(
                    "SELECT user_id FROM conversations
                     WHERE conversation_id = ?1 AND user_id != ?2 LIMIT 1",
                    rusqlite::params![conversation_id, user_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(storage_err)?;
            if other_owner.is_some() {
                return Err(ArgoError::Unauthorized(format!(
                    "conversation {} belongs to another user",
                    conversation_id
                )));
            }

            conn.execute(
                "INSERT OR REPLACE INTO conversations
                    (user_id, conversation_id, title, updated_at, attachment_ids)
                 VALUES (?1, ?2, ?3, ?4, '[]')",
                rusqlite::params![
                    user_id,
                    conversation_id,
                    title,
                    Utc::now().timestamp_millis()
                ],
            )
            .map_err(|e| ArgoError::Storage(format!("Failed to create conversation: {}", e)))?;
            Ok(())
        })?;
        debug!(user_id, conversation_id, "conversation created");
        Ok(())
    }

    async fn list_conversations(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConversationMetadata>, ArgoError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT user_id, conversation_id, title, updated_at, attachment_ids
                     FROM conversations
                     WHERE user_id = ?1
                     ORDER BY updated_at DESC",
                )
                .map_err(storage_err)?;

            let rows = stmt
                .query_map(rusqlite::params![user_id], |row| Ok(row_to_metadata(row)))
                .map_err(storage_err)?;

            let mut conversations = Vec::new();
            for row in rows {
                conversations.push(row.map_err(storage_err)??);
            }
            Ok(conversations)
        })
    }

    async fn find_conversation(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<Option<ConversationMetadata>, ArgoError> {
        self.find(user_id, conversation_id)
    }

    async fn link_attachment(
        &self,
        user_id: &str,
        conversation_id: &str,
        attachment: &AttachmentRef,
    ) -> Result<(), ArgoError> {
        // Read-modify-write under the connection lock.
        self.db.with_conn(|conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT attachment_ids FROM conversations
                     WHERE user_id = ?1 AND conversation_id = ?2",
                    rusqlite::params![user_id, conversation_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(storage_err)?;

            let Some(raw) = raw else {
                return Err(ArgoError::Unauthorized(format!(
                    "conversation {} does not belong to user",
                    conversation_id
                )));
            };

            let mut ids: Vec<AttachmentRef> = serde_json::from_str(&raw)?;
            if !ids.contains(attachment) {
                ids.push(attachment.clone());
            }

            conn.execute(
                "UPDATE conversations SET attachment_ids = ?3, updated_at = ?4
                 WHERE user_id = ?1 AND conversation_id = ?2",
                rusqlite::params![
                    user_id,
                    conversation_id,
                    serde_json::to_string(&ids)?,
                    Utc::now().timestamp_millis()
                ],
            )
            .map_err(storage_err)?;
            Ok(())
        })?;
        debug!(user_id, conversation_id, attachment = %attachment, "attachment linked");
        Ok(())
    }

    async fn save_messages(
        &self,
        user_id: &str,
        conversation_id: &str,
        messages: &[Message],
    ) -> Result<(), ArgoError> {
        require_bucket(&self.transcripts_bucket)?;
        if self.find(user_id, conversation_id)?.is_none() {
            warn!(user_id, conversation_id, "transcript save for unowned conversation");
            return Err(ArgoError::Unauthorized(format!(
                "conversation {} does not belong to user",
                conversation_id
            )));
        }

        let body = serde_json::to_vec(messages)?;
        self.objects.put(
            &self.transcripts_bucket,
            &Self::transcript_key(conversation_id),
            &body,
            "application/json",
        )?;
        self.touch(user_id, conversation_id)?;
        debug!(user_id, conversation_id, count = messages.len(), "transcript saved");
        Ok(())
    }

    async fn load_messages(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<Vec<Message>, ArgoError> {
        require_bucket(&self.transcripts_bucket)?;
        if self.find(user_id, conversation_id)?.is_none() {
            warn!(user_id, conversation_id, "unauthorized transcript read attempt");
            return Ok(Vec::new());
        }

        match self
            .objects
            .get(&self.transcripts_bucket, &Self::transcript_key(conversation_id))?
        {
            Some(obj) => Ok(serde_json::from_slice(&obj.body)?),
            None => Ok(Vec::new()),
        }
    }
}

fn row_to_metadata(row: &rusqlite::Row<'_>) -> Result<ConversationMetadata, ArgoError> {
    let updated_millis: i64 = row.get(3).map_err(storage_err)?;
    let raw_ids: String = row.get(4).map_err(storage_err)?;

    let updated_at = DateTime::<Utc>::from_timestamp_millis(updated_millis)
        .ok_or_else(|| ArgoError::Storage(format!("invalid timestamp {}", updated_millis)))?;

    Ok(ConversationMetadata {
        user_id: row.get(0).map_err(storage_err)?,
        conversation_id: row.get(1).map_err(storage_err)?,
        title: row.get(2).map_err(storage_err)?,
        updated_at,
        attachment_ids: serde_json::from_str(&raw_ids)?,
    })
}

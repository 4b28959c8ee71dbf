//! Collaborator interfaces for external services.
//!
//! Concrete adapters are constructed once at startup and shared as
//! `Arc<dyn Trait>`. Every operation that touches user data takes the
//! authenticated user id and must scope its reads and writes to it.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    Account, AttachmentRef, ConversationMetadata, Investments, Message, StoredObject, Transaction,
};

/// Conversation metadata and transcript persistence.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Create (or overwrite) the metadata record for a conversation.
    async fn create_conversation(
        &self,
        user_id: &str,
        conversation_id: &str,
        title: &str,
    ) -> Result<()>;

    /// All of a user's conversations, most recently updated first.
    async fn list_conversations(&self, user_id: &str) -> Result<Vec<ConversationMetadata>>;

    /// One conversation, if it exists and belongs to `user_id`.
    async fn find_conversation(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<Option<ConversationMetadata>>;

    /// Append an attachment to the conversation's linked set.
    async fn link_attachment(
        &self,
        user_id: &str,
        conversation_id: &str,
        attachment: &AttachmentRef,
    ) -> Result<()>;

    /// Overwrite the transcript. Fails with `Unauthorized` when the
    /// conversation has no metadata for this user.
    async fn save_messages(
        &self,
        user_id: &str,
        conversation_id: &str,
        messages: &[Message],
    ) -> Result<()>;

    /// Load the transcript. Unknown or unowned conversations yield `[]`.
    async fn load_messages(&self, user_id: &str, conversation_id: &str) -> Result<Vec<Message>>;
}

/// Attachment byte storage.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    async fn put_attachment(
        &self,
        attachment: &AttachmentRef,
        body: &[u8],
        content_type: &str,
    ) -> Result<()>;

    async fn get_attachment(&self, attachment: &AttachmentRef) -> Result<Option<StoredObject>>;
}

/// Read access to a linked bank item.
#[async_trait]
pub trait BankData: Send + Sync {
    /// Transactions from `days` ago through today.
    async fn transactions(&self, access_token: &str, days: u32) -> Result<Vec<Transaction>>;

    async fn accounts(&self, access_token: &str) -> Result<Vec<Account>>;

    async fn investments(&self, access_token: &str) -> Result<Investments>;
}

/// Credentials produced by a completed account-linking flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedItem {
    pub access_token: String,
    pub item_id: String,
}

/// Account-linking flow of the bank aggregator.
#[async_trait]
pub trait BankLink: Send + Sync {
    /// Start a linking session; returns the aggregator's JSON response.
    async fn create_link_token(&self, user_id: &str) -> Result<serde_json::Value>;

    async fn exchange_public_token(&self, public_token: &str) -> Result<LinkedItem>;
}

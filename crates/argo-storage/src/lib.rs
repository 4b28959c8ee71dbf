//! Argo Storage crate - SQLite persistence for users, conversations and objects.
//!
//! Provides a WAL-mode SQLite database with migrations, a bucketed object
//! store for transcripts and attachments, and repository implementations of
//! the `argo-core` collaborator traits.

pub mod conversations;
pub mod db;
pub mod migrations;
pub mod objects;
pub mod users;

pub use conversations::ConversationRepository;
pub use db::Database;
pub use objects::{AttachmentRepository, ObjectStore};
pub use users::UserRepository;

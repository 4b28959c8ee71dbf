pub mod config;
pub mod error;
pub mod services;
pub mod types;

pub use config::ArgoConfig;
pub use error::{ArgoError, Result};
pub use services::{AttachmentStore, BankData, BankLink, ConversationStore, LinkedItem};
pub use types::*;

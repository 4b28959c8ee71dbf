//! Chat turn pipeline for Argo.
//!
//! Resolves attachments, extracts lookback windows, assembles model context,
//! invokes the assistant and persists transcripts with a debounced saver.

pub mod assistant;
pub mod attachment;
pub mod autosave;
pub mod context;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod types;
pub mod window;

pub use assistant::{extract_chart, AssistantInvoker, AssistantReply};
pub use attachment::{classify, AttachmentResolver};
pub use autosave::TranscriptAutosaver;
pub use context::{AssembledContext, ContextAssembler};
pub use error::ChatError;
pub use llm::{AnthropicClient, LanguageModel, MessageContent, ModelMessage, ModelRequest};
pub use orchestrator::{TurnDependencies, TurnOrchestrator};
pub use types::{
    AttachmentKind, NewAttachment, ResolvedAttachment, TurnOutcome, TurnRequest, TurnState,
};
pub use window::WindowExtractor;

//! Persistent chat sessions.

pub mod store;
pub mod title;
pub mod types;

pub use store::{format_context, ConversationStore, DEFAULT_CONTEXT_LIMIT};
pub use title::derive_title;
pub use types::{
    AssistantTurn, Message, MessageRole, Session, SessionSummary, ToolCallRecord, DEFAULT_TITLE,
};

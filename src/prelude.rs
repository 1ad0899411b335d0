//! Convenience re-exports for embedding the assistant.

pub use crate::chat::{ChatDispatcher, ChatReply, Selection};
pub use crate::config::DeskConfig;
pub use crate::conversation::ConversationStore;
pub use crate::error::{DeskError, ErrorCategory, Result};
pub use crate::provider::ModelProvider;
pub use crate::quickbooks::{Invoice, InvoiceFilter, InvoiceGateway, StatusFilter};
pub use crate::tools::{invoice_registry, AgentTool, AgentToolParameters, Tool, ToolArguments, ToolRegistry};
pub use crate::types::{ModelMessage, Role};

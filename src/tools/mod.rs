//! Typed tool registry used for model function calling.

pub mod arguments;
pub mod invoice;
pub mod tool;
pub mod types;
pub mod validation;

pub use arguments::ToolArguments;
pub use invoice::invoice_registry;
pub use tool::{AgentTool, Tool, ToolRegistry};
pub use types::{AgentToolParameters, ToolOutput, UiDirective};
pub use validation::validate_arguments;

//! Natural-language chat over the invoice tools.

pub mod dispatcher;
pub mod extract;
pub mod prompt;
pub mod suggest;

pub use dispatcher::{resolve_selection, ChatDispatcher, ChatReply, Selection, MAX_TOOL_ROUNDS};
pub use extract::{invoice_numbers, single_invoice_number};

//! QuickBooks Online invoice gateway.

pub mod client;
pub mod gateway;
pub mod query;
pub mod types;

pub use client::QuickBooksClient;
pub use gateway::{ensure_no_payments, validate_email, validate_entity_id, InvoiceGateway};
pub use query::{InvoiceFilter, InvoiceQuery, StatusFilter};
pub use types::{Customer, DashboardSummary, Invoice, InvoiceStatus, NewInvoice, NewLine};

//! invoicedesk: a QuickBooks Online invoice assistant.
//!
//! Connects to a QuickBooks company over OAuth 2.0, answers invoice questions
//! through an LLM that calls typed invoice tools, and keeps conversations on
//! disk. The [`server`] module exposes it all over HTTP.
//!
//! ```no_run
//! use invoicedesk::config::DeskConfig;
//! use invoicedesk::server::{self, AppState};
//!
//! # async fn example() -> invoicedesk::error::Result<()> {
//! let config = DeskConfig::from_env()?;
//! let state = AppState::from_config(&config).await?;
//! let listener = tokio::net::TcpListener::bind(&config.bind).await?;
//! server::serve(listener, state).await
//! # }
//! ```

pub mod auth;
pub mod chat;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod error;
pub mod prelude;
pub mod provider;
pub mod quickbooks;
pub mod server;
pub mod tools;
pub mod types;

//! QuickBooks OAuth flow, credential storage, and token lifecycle.

pub mod error;
pub mod manager;
pub mod oauth;
pub mod store;
pub mod token;

pub use error::AuthError;
pub use manager::{ConnectionState, ConnectionStatus, TokenManager};
pub use oauth::{GrantedTokens, OAuthConfig, QuickBooksOAuth, TokenGrant};
pub use store::{CredentialStore, InMemoryCredentialStore};
pub use token::Credential;

//! Error types for invoicedesk.

use thiserror::Error;

/// Primary error type for all invoicedesk operations.
#[derive(Error, Debug)]
pub enum DeskError {
    #[error("Not connected to QuickBooks")]
    NotAuthenticated,

    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("Invoice {id} has payments applied (balance {balance}, total {total})")]
    InvoiceHasPayments { id: String, balance: f64, total: f64 },

    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    #[error("{service} error (status {status}): {message}")]
    Upstream {
        service: &'static str,
        status: u16,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },
}

/// Broad error category for routing responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCategory {
    Authentication,
    Precondition,
    Conflict,
    NotFound,
    Upstream,
    Network,
    Configuration,
    Internal,
}

impl DeskError {
    /// Create an upstream error for the QuickBooks API.
    pub fn quickbooks(status: u16, message: impl Into<String>) -> Self {
        Self::Upstream {
            service: "QuickBooks",
            status,
            message: message.into(),
            details: None,
        }
    }

    /// Create an upstream error for the LLM provider.
    pub fn llm(status: u16, message: impl Into<String>) -> Self {
        Self::Upstream {
            service: "LLM provider",
            status,
            message: message.into(),
            details: None,
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotAuthenticated | Self::TokenRefreshFailed(_) => ErrorCategory::Authentication,
            Self::InvoiceHasPayments { .. } | Self::Validation(_) => ErrorCategory::Precondition,
            Self::ConcurrencyConflict(_) => ErrorCategory::Conflict,
            Self::NotFound(_) => ErrorCategory::NotFound,
            Self::Upstream { .. } | Self::ToolExecution { .. } => ErrorCategory::Upstream,
            Self::Network(_) => ErrorCategory::Network,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Io(_) | Self::Serialization(_) => ErrorCategory::Internal,
        }
    }

    /// HTTP status the server answers with for this error.
    pub fn http_status(&self) -> u16 {
        match self.category() {
            ErrorCategory::Authentication => 401,
            ErrorCategory::Precondition => 400,
            ErrorCategory::Conflict => 409,
            ErrorCategory::NotFound => 404,
            _ => 500,
        }
    }

    /// Whether the user has to go through the OAuth connect flow again.
    pub fn requires_reauthentication(&self) -> bool {
        self.category() == ErrorCategory::Authentication
    }

    /// Upstream payload worth surfacing to the client, if any.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Upstream { details, .. } => details.clone(),
            Self::InvoiceHasPayments { balance, total, .. } => Some(serde_json::json!({
                "balance": balance,
                "totalAmount": total,
            })),
            _ => None,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, DeskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_failures_map_to_bad_request() {
        let err = DeskError::InvoiceHasPayments {
            id: "42".into(),
            balance: 10.0,
            total: 50.0,
        };
        assert_eq!(err.http_status(), 400);
        assert_eq!(DeskError::Validation("message is required".into()).http_status(), 400);
    }

    #[test]
    fn auth_failures_request_reauthentication() {
        assert!(DeskError::NotAuthenticated.requires_reauthentication());
        assert!(DeskError::TokenRefreshFailed("invalid_grant".into()).requires_reauthentication());
        assert!(!DeskError::NotFound("invoice 1".into()).requires_reauthentication());
    }

    #[test]
    fn upstream_errors_are_opaque_server_errors() {
        let err = DeskError::quickbooks(503, "unavailable");
        assert_eq!(err.http_status(), 500);
        assert_eq!(err.to_string(), "QuickBooks error (status 503): unavailable");
    }

    #[test]
    fn stale_sync_token_is_a_conflict() {
        assert_eq!(DeskError::ConcurrencyConflict("stale".into()).http_status(), 409);
    }
}

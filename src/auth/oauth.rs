//! Intuit OAuth 2.0 authorization-code flow for QuickBooks Online.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::error::AuthError;
use super::token::Credential;
use crate::provider::http::shared_client;

pub const DEFAULT_AUTHORIZE_URL: &str = "https://appcenter.intuit.com/connect/oauth2";
pub const DEFAULT_TOKEN_URL: &str = "https://oauth.platform.intuit.com/oauth2/v1/tokens/bearer";
pub const DEFAULT_REVOKE_URL: &str = "https://developer.api.intuit.com/v2/oauth2/tokens/revoke";
const ACCOUNTING_SCOPE: &str = "com.intuit.quickbooks.accounting";
const STATE_TTL_MINUTES: i64 = 10;

/// Client registration for the Intuit developer app.
#[derive(Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Mixed into generated `state` values.
    pub state_secret: String,
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"..")
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

/// Tokens returned by a grant, before they are bound to a realm.
#[derive(Debug, Clone)]
pub struct GrantedTokens {
    pub access_token: String,
    /// Absent when the provider keeps the previous refresh token.
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub refresh_expires_at: Option<DateTime<Utc>>,
}

impl GrantedTokens {
    /// Merge into an existing credential, keeping the old refresh token if none was issued.
    pub fn apply_to(self, previous: &Credential) -> Credential {
        Credential {
            access_token: self.access_token,
            refresh_token: self
                .refresh_token
                .unwrap_or_else(|| previous.refresh_token.clone()),
            realm_id: previous.realm_id.clone(),
            expires_at: self.expires_at,
            refresh_expires_at: self.refresh_expires_at.or(previous.refresh_expires_at),
        }
    }
}

/// Refresh-token grant against the OAuth provider.
#[async_trait]
pub trait TokenGrant: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<GrantedTokens, AuthError>;
}

/// Intuit OAuth client.
///
/// # Example
/// ```no_run
/// use invoicedesk::auth::{OAuthConfig, QuickBooksOAuth};
///
/// let oauth = QuickBooksOAuth::new(OAuthConfig {
///     client_id: "client".into(),
///     client_secret: "secret".into(),
///     redirect_uri: "http://localhost:3001/auth/callback".into(),
///     state_secret: "salt".into(),
/// });
/// let url = oauth.authorize_url()?;
/// # Ok::<(), invoicedesk::auth::AuthError>(())
/// ```
pub struct QuickBooksOAuth {
    config: OAuthConfig,
    authorize_url: String,
    token_url: String,
    revoke_url: String,
    pending_states: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl QuickBooksOAuth {
    pub fn new(config: OAuthConfig) -> Self {
        Self {
            config,
            authorize_url: DEFAULT_AUTHORIZE_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            revoke_url: DEFAULT_REVOKE_URL.to_string(),
            pending_states: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_authorize_url(mut self, url: impl Into<String>) -> Self {
        self.authorize_url = url.into();
        self
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn with_revoke_url(mut self, url: impl Into<String>) -> Self {
        self.revoke_url = url.into();
        self
    }

    /// Build the provider authorize URL and remember its `state`.
    pub fn authorize_url(&self) -> Result<String, AuthError> {
        if self.config.client_id.is_empty() {
            return Err(AuthError::MissingConfiguration("QUICKBOOKS_CLIENT_ID"));
        }
        if self.config.redirect_uri.is_empty() {
            return Err(AuthError::MissingConfiguration("QUICKBOOKS_REDIRECT_URI"));
        }
        let state = self.new_state();
        let url = reqwest::Url::parse_with_params(
            &self.authorize_url,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("response_type", "code"),
                ("scope", ACCOUNTING_SCOPE),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("state", state.as_str()),
            ],
        )
        .map_err(|e| AuthError::InvalidResponse(format!("invalid authorize url: {e}")))?;
        Ok(url.into())
    }

    /// Exchange the callback's authorization code for a credential.
    pub async fn exchange_code(
        &self,
        code: &str,
        realm_id: &str,
        state: &str,
    ) -> Result<Credential, AuthError> {
        self.consume_state(state)?;
        if realm_id.trim().is_empty() {
            return Err(AuthError::InvalidResponse("callback is missing realmId".into()));
        }
        let granted = self
            .token_request(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ])
            .await?;
        Ok(Credential {
            access_token: granted.access_token,
            refresh_token: granted.refresh_token.ok_or_else(|| {
                AuthError::InvalidResponse("authorization response missing refresh_token".into())
            })?,
            realm_id: realm_id.to_string(),
            expires_at: granted.expires_at,
            refresh_expires_at: granted.refresh_expires_at,
        })
    }

    /// Revoke a token at the provider. Failures are logged, not returned.
    pub async fn revoke(&self, token: &str) {
        let result = shared_client()
            .post(&self.revoke_url)
            .header("Accept", "application/json")
            .header("Authorization", self.basic_auth())
            .json(&serde_json::json!({ "token": token }))
            .send()
            .await;
        match result {
            Ok(resp) if resp.status().is_success() => debug!("refresh token revoked"),
            Ok(resp) => warn!(status = resp.status().as_u16(), "token revocation rejected"),
            Err(e) => warn!(error = %e, "token revocation failed"),
        }
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<GrantedTokens, AuthError> {
        let resp = shared_client()
            .post(&self.token_url)
            .header("Accept", "application/json")
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("Authorization", self.basic_auth())
            .form(form)
            .send()
            .await?;
        let status = resp.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::InvalidGrant(body));
        }
        if !status.is_success() {
            return Err(AuthError::InvalidResponse(format!(
                "token request failed with status {status}"
            )));
        }
        let payload: IntuitTokenResponse = resp.json().await?;
        let now = Utc::now();
        Ok(GrantedTokens {
            access_token: payload.access_token,
            refresh_token: payload.refresh_token,
            expires_at: now + Duration::seconds(payload.expires_in),
            refresh_expires_at: payload
                .x_refresh_token_expires_in
                .map(|secs| now + Duration::seconds(secs)),
        })
    }

    fn basic_auth(&self) -> String {
        let raw = format!("{}:{}", self.config.client_id, self.config.client_secret);
        format!("Basic {}", STANDARD.encode(raw))
    }

    fn new_state(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.config.state_secret.as_bytes());
        hasher.update(uuid::Uuid::new_v4().as_bytes());
        let state = URL_SAFE_NO_PAD.encode(hasher.finalize());
        if let Ok(mut pending) = self.pending_states.lock() {
            let now = Utc::now();
            pending.retain(|_, issued| now - *issued < Duration::minutes(STATE_TTL_MINUTES));
            pending.insert(state.clone(), now);
        }
        state
    }

    fn consume_state(&self, state: &str) -> Result<(), AuthError> {
        let mut pending = self
            .pending_states
            .lock()
            .map_err(|_| AuthError::Storage("state lock poisoned".into()))?;
        match pending.remove(state) {
            Some(issued) if Utc::now() - issued < Duration::minutes(STATE_TTL_MINUTES) => Ok(()),
            _ => Err(AuthError::InvalidState),
        }
    }
}

#[async_trait]
impl TokenGrant for QuickBooksOAuth {
    async fn refresh(&self, refresh_token: &str) -> Result<GrantedTokens, AuthError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }
}

#[derive(Debug, Deserialize)]
struct IntuitTokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
    x_refresh_token_expires_in: Option<i64>,
}

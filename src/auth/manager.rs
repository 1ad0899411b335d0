//! Expiry-aware access-token lifecycle on top of a credential store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::error::AuthError;
use super::oauth::TokenGrant;
use super::store::CredentialStore;
use super::token::Credential;
use crate::error::{DeskError, Result};

/// Connection summary exposed by `GET /api/status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub status: ConnectionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realm_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connected,
    NotConnected,
}

/// Hands out valid access tokens, refreshing through the provider when needed.
///
/// Refreshes are serialized: concurrent callers that all observe an expiring
/// token wait on one lock, and only the first performs the refresh grant.
pub struct TokenManager {
    store: Arc<dyn CredentialStore>,
    grant: Arc<dyn TokenGrant>,
    refresh_lock: Mutex<()>,
}

impl TokenManager {
    pub fn new(store: Arc<dyn CredentialStore>, grant: Arc<dyn TokenGrant>) -> Self {
        Self {
            store,
            grant,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Return an access token valid for at least the expiry margin.
    pub async fn valid_access_token(&self) -> Result<String> {
        Ok(self.valid_credential().await?.access_token)
    }

    /// Return the full credential (token + realm), refreshed if necessary.
    pub async fn valid_credential(&self) -> Result<Credential> {
        let current = self.store.load()?.ok_or(DeskError::NotAuthenticated)?;
        if !current.needs_refresh(Utc::now()) {
            return Ok(current);
        }

        let _guard = self.refresh_lock.lock().await;
        // Another caller may have refreshed while we waited.
        let current = self.store.load()?.ok_or(DeskError::NotAuthenticated)?;
        let now = Utc::now();
        if !current.needs_refresh(now) {
            return Ok(current);
        }
        if current.refresh_expired(now) {
            warn!(realm_id = %current.realm_id, "refresh token expired; reconnect required");
            return Err(DeskError::NotAuthenticated);
        }

        info!(realm_id = %current.realm_id, "refreshing QuickBooks access token");
        let granted = self
            .grant
            .refresh(&current.refresh_token)
            .await
            .map_err(|e| {
                warn!(realm_id = %current.realm_id, error = %e, "token refresh failed");
                DeskError::TokenRefreshFailed(e.to_string())
            })?;
        let refreshed = granted.apply_to(&current);
        self.store.save(&refreshed)?;
        Ok(refreshed)
    }

    /// Store a freshly authorized credential.
    pub fn connect(&self, credential: &Credential) -> Result<()> {
        info!(realm_id = %credential.realm_id, "QuickBooks connected");
        self.store.save(credential)?;
        Ok(())
    }

    /// Drop the stored credential, returning it so the caller can revoke it.
    pub fn disconnect(&self) -> Result<Option<Credential>> {
        let previous = self.store.load()?;
        self.store.clear()?;
        if let Some(ref cred) = previous {
            info!(realm_id = %cred.realm_id, "QuickBooks disconnected");
        }
        Ok(previous)
    }

    pub fn status(&self) -> std::result::Result<ConnectionStatus, AuthError> {
        Ok(match self.store.load()? {
            Some(cred) => ConnectionStatus {
                status: ConnectionState::Connected,
                realm_id: Some(cred.realm_id),
                expires_at: Some(cred.expires_at),
                refresh_expires_at: cred.refresh_expires_at,
            },
            None => ConnectionStatus {
                status: ConnectionState::NotConnected,
                realm_id: None,
                expires_at: None,
                refresh_expires_at: None,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::oauth::GrantedTokens;
    use crate::auth::store::InMemoryCredentialStore;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingGrant {
        calls: AtomicUsize,
        rotate_refresh: bool,
        fail: bool,
    }

    #[async_trait]
    impl TokenGrant for CountingGrant {
        async fn refresh(&self, refresh_token: &str) -> std::result::Result<GrantedTokens, AuthError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::task::yield_now().await;
            if self.fail {
                return Err(AuthError::InvalidGrant(format!("{refresh_token} rejected")));
            }
            Ok(GrantedTokens {
                access_token: format!("access-{n}"),
                refresh_token: self.rotate_refresh.then(|| format!("refresh-{n}")),
                expires_at: Utc::now() + Duration::hours(1),
                refresh_expires_at: None,
            })
        }
    }

    fn credential(expires_in: Duration) -> Credential {
        Credential {
            access_token: "access-0".into(),
            refresh_token: "refresh-0".into(),
            realm_id: "realm-1".into(),
            expires_at: Utc::now() + expires_in,
            refresh_expires_at: None,
        }
    }

    fn manager(grant: Arc<CountingGrant>, cred: Option<Credential>) -> (Arc<InMemoryCredentialStore>, TokenManager) {
        let store = Arc::new(InMemoryCredentialStore::new());
        if let Some(cred) = cred {
            store.save(&cred).unwrap();
        }
        let manager = TokenManager::new(store.clone(), grant);
        (store, manager)
    }

    #[tokio::test]
    async fn fresh_token_is_returned_without_refresh() {
        let grant = Arc::new(CountingGrant::default());
        let (_store, manager) = manager(grant.clone(), Some(credential(Duration::minutes(30))));
        assert_eq!(manager.valid_access_token().await.unwrap(), "access-0");
        assert_eq!(grant.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn token_inside_margin_is_refreshed_once() {
        let grant = Arc::new(CountingGrant::default());
        let (store, manager) = manager(grant.clone(), Some(credential(Duration::minutes(4))));
        assert_eq!(manager.valid_access_token().await.unwrap(), "access-1");
        assert_eq!(manager.valid_access_token().await.unwrap(), "access-1");
        assert_eq!(grant.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.load().unwrap().unwrap().refresh_token, "refresh-0");
    }

    #[tokio::test]
    async fn rotated_refresh_token_is_stored() {
        let grant = Arc::new(CountingGrant {
            rotate_refresh: true,
            ..Default::default()
        });
        let (store, manager) = manager(grant, Some(credential(-Duration::minutes(1))));
        manager.valid_access_token().await.unwrap();
        assert_eq!(store.load().unwrap().unwrap().refresh_token, "refresh-1");
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let grant = Arc::new(CountingGrant {
            rotate_refresh: true,
            ..Default::default()
        });
        let (_store, manager) = manager(grant.clone(), Some(credential(-Duration::minutes(1))));
        let manager = Arc::new(manager);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = manager.clone();
                tokio::spawn(async move { m.valid_access_token().await })
            })
            .collect();
        for h in handles {
            assert_eq!(h.await.unwrap().unwrap(), "access-1");
        }
        assert_eq!(grant.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_credential_is_not_authenticated() {
        let grant = Arc::new(CountingGrant::default());
        let (_store, manager) = manager(grant.clone(), None);
        assert!(matches!(
            manager.valid_access_token().await,
            Err(DeskError::NotAuthenticated)
        ));
        assert_eq!(grant.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn refresh_failure_is_not_retried() {
        let grant = Arc::new(CountingGrant {
            fail: true,
            ..Default::default()
        });
        let (_store, manager) = manager(grant.clone(), Some(credential(-Duration::minutes(1))));
        let err = manager.valid_access_token().await.unwrap_err();
        assert!(matches!(err, DeskError::TokenRefreshFailed(_)));
        assert_eq!(grant.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_refresh_token_requires_reconnect() {
        let grant = Arc::new(CountingGrant::default());
        let mut cred = credential(-Duration::minutes(1));
        cred.refresh_expires_at = Some(Utc::now() - Duration::days(1));
        let (_store, manager) = manager(grant.clone(), Some(cred));
        assert!(matches!(
            manager.valid_access_token().await,
            Err(DeskError::NotAuthenticated)
        ));
        assert_eq!(grant.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn status_reflects_connection() {
        let grant = Arc::new(CountingGrant::default());
        let (_store, manager) = manager(grant, None);
        assert_eq!(manager.status().unwrap().status, ConnectionState::NotConnected);
        manager.connect(&credential(Duration::hours(1))).unwrap();
        let status = manager.status().unwrap();
        assert_eq!(status.status, ConnectionState::Connected);
        assert_eq!(status.realm_id.as_deref(), Some("realm-1"));
        assert!(manager.disconnect().unwrap().is_some());
        assert_eq!(manager.status().unwrap().status, ConnectionState::NotConnected);
    }
}

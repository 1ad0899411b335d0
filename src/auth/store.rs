use std::sync::RwLock;

use super::error::AuthError;
use super::token::Credential;

/// Storage abstraction for the single process-wide QuickBooks credential.
///
/// Entries never expire on their own; validity is decided from
/// [`Credential::expires_at`] by the token manager.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<Credential>, AuthError>;
    fn save(&self, credential: &Credential) -> Result<(), AuthError>;
    fn clear(&self) -> Result<(), AuthError>;
}

/// Memory-only credential store. Credentials are lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    slot: RwLock<Option<Credential>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn load(&self) -> Result<Option<Credential>, AuthError> {
        let guard = self
            .slot
            .read()
            .map_err(|_| AuthError::Storage("credential lock poisoned".into()))?;
        Ok(guard.clone())
    }

    fn save(&self, credential: &Credential) -> Result<(), AuthError> {
        let mut guard = self
            .slot
            .write()
            .map_err(|_| AuthError::Storage("credential lock poisoned".into()))?;
        *guard = Some(credential.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), AuthError> {
        let mut guard = self
            .slot
            .write()
            .map_err(|_| AuthError::Storage("credential lock poisoned".into()))?;
        *guard = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn credential(access: &str) -> Credential {
        Credential {
            access_token: access.to_string(),
            refresh_token: "refresh".to_string(),
            realm_id: "realm".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
            refresh_expires_at: None,
        }
    }

    #[test]
    fn empty_store_loads_none() {
        let store = InMemoryCredentialStore::new();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_replaces_previous_credential() {
        let store = InMemoryCredentialStore::new();
        store.save(&credential("first")).unwrap();
        store.save(&credential("second")).unwrap();
        assert_eq!(store.load().unwrap().unwrap().access_token, "second");
    }

    #[test]
    fn expired_credential_is_still_returned() {
        let store = InMemoryCredentialStore::new();
        let mut cred = credential("old");
        cred.expires_at = Utc::now() - Duration::hours(3);
        store.save(&cred).unwrap();
        assert_eq!(store.load().unwrap(), Some(cred));
    }

    #[test]
    fn clear_removes_credential() {
        let store = InMemoryCredentialStore::new();
        store.save(&credential("access")).unwrap();
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        store.clear().unwrap();
    }
}

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Safety margin subtracted from `expires_at` before an access token counts as valid.
pub const EXPIRY_MARGIN_MINUTES: i64 = 5;

/// OAuth credential for the connected QuickBooks company.
///
/// # Example
/// ```
/// use chrono::{Duration, Utc};
/// use invoicedesk::auth::Credential;
///
/// let credential = Credential {
///     access_token: "access".to_string(),
///     refresh_token: "refresh".to_string(),
///     realm_id: "9130350000000000".to_string(),
///     expires_at: Utc::now() + Duration::hours(1),
///     refresh_expires_at: Some(Utc::now() + Duration::days(100)),
/// };
/// assert!(!credential.needs_refresh(Utc::now()));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    /// QuickBooks company (tenant) id.
    pub realm_id: String,
    pub expires_at: DateTime<Utc>,
    pub refresh_expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// True once `now` is inside the safety margin before `expires_at`.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at - Duration::minutes(EXPIRY_MARGIN_MINUTES)
    }

    /// True when the refresh token itself is known to be dead.
    pub fn refresh_expired(&self, now: DateTime<Utc>) -> bool {
        self.refresh_expires_at.is_some_and(|exp| now >= exp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(expires_at: DateTime<Utc>) -> Credential {
        Credential {
            access_token: "a".into(),
            refresh_token: "r".into(),
            realm_id: "1".into(),
            expires_at,
            refresh_expires_at: None,
        }
    }

    #[test]
    fn margin_is_applied_before_expiry() {
        let now = Utc::now();
        assert!(!credential(now + Duration::minutes(6)).needs_refresh(now));
        assert!(credential(now + Duration::minutes(4)).needs_refresh(now));
        assert!(credential(now - Duration::seconds(1)).needs_refresh(now));
    }

    #[test]
    fn refresh_expiry_is_optional() {
        let now = Utc::now();
        let mut cred = credential(now);
        assert!(!cred.refresh_expired(now));
        cred.refresh_expires_at = Some(now - Duration::seconds(1));
        assert!(cred.refresh_expired(now));
    }
}

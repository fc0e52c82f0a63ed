use crate::errors::{AppError, AppResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

pub const KEYRING_SERVICE: &str = "nadrika-leads-admin";

/// Where admin passwords live. Emails arrive already normalized.
pub trait CredentialStore: Send + Sync {
    fn verify(&self, email: &str, password: &str) -> AppResult<bool>;
    fn has_password(&self, email: &str) -> AppResult<bool>;
    fn set_password(&self, email: &str, password: &str) -> AppResult<()>;
}

/// Admin passwords kept in the OS keyring, one entry per admin e-mail.
#[derive(Debug, Clone)]
pub struct KeyringCredentials {
    service: String,
}

impl KeyringCredentials {
    pub fn new(service: impl Into<String>) -> Self {
        Self { service: service.into() }
    }

    fn stored_password(&self, email: &str) -> AppResult<Option<String>> {
        let entry = keyring::Entry::new(&self.service, email)?;
        match entry.get_password() {
            Ok(stored) => Ok(Some(stored)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(AppError::from(error)),
        }
    }
}

impl CredentialStore for KeyringCredentials {
    fn verify(&self, email: &str, password: &str) -> AppResult<bool> {
        Ok(self
            .stored_password(email)?
            .is_some_and(|stored| constant_time_eq(stored.as_bytes(), password.as_bytes())))
    }

    fn has_password(&self, email: &str) -> AppResult<bool> {
        Ok(self.stored_password(email)?.is_some())
    }

    fn set_password(&self, email: &str, password: &str) -> AppResult<()> {
        keyring::Entry::new(&self.service, email)?.set_password(password)?;
        Ok(())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter().zip(right).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSession {
    pub session_id: String,
    pub email: String,
    pub signed_in_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Sign-in, sign-out and a subscription that reports the current session
/// (or `None`) on every change.
#[derive(Clone)]
pub struct AuthGate {
    credentials: Arc<dyn CredentialStore>,
    sender: Arc<watch::Sender<Option<AdminSession>>>,
    sign_in_lock: Arc<Mutex<()>>,
    ttl: Duration,
}

impl AuthGate {
    pub fn new(credentials: Arc<dyn CredentialStore>, ttl_hours: u32) -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            credentials,
            sender: Arc::new(sender),
            sign_in_lock: Arc::new(Mutex::new(())),
            ttl: Duration::hours(i64::from(ttl_hours.max(1))),
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AppResult<AdminSession> {
        let _guard = self.sign_in_lock.lock().await;
        let verified = match self.credentials.verify(&normalize_email(email), password) {
            Ok(verified) => verified,
            Err(error) => {
                tracing::warn!(error = %error, "credential lookup failed");
                false
            }
        };
        if !verified {
            return Err(AppError::Auth("invalid credentials".to_string()));
        }

        let now = Utc::now();
        let session = AdminSession {
            session_id: Uuid::new_v4().to_string(),
            email: normalize_email(email),
            signed_in_at: now,
            expires_at: now + self.ttl,
        };
        self.sender.send_replace(Some(session.clone()));
        tracing::info!(session_id = %session.session_id, "admin signed in");
        Ok(session)
    }

    /// Stores a password for `email`. Without an active session this only
    /// provisions a first password and never overwrites an existing one.
    pub fn set_password(&self, email: &str, password: &str) -> AppResult<()> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(AppError::Validation("Email y contraseña son requeridos".to_string()));
        }
        if self.current().is_none() && self.credentials.has_password(&email)? {
            tracing::warn!("password overwrite refused without an admin session");
            return Err(AppError::Auth("admin password already provisioned".to_string()));
        }
        self.credentials.set_password(&email, password)?;
        tracing::info!("admin password stored");
        Ok(())
    }

    pub fn sign_out(&self) {
        if let Some(previous) = self.sender.send_replace(None) {
            tracing::info!(session_id = %previous.session_id, "admin signed out");
        }
    }

    /// Current session, invalidating it first when it has expired.
    pub fn current(&self) -> Option<AdminSession> {
        self.current_at(Utc::now())
    }

    pub(crate) fn current_at(&self, now: DateTime<Utc>) -> Option<AdminSession> {
        let session = self.sender.borrow().clone()?;
        if session.expires_at <= now {
            self.sender.send_replace(None);
            tracing::info!(session_id = %session.session_id, "admin session expired");
            return None;
        }
        Some(session)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<AdminSession>> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::CredentialStore;
    use crate::errors::AppResult;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory credential store keyed by normalized e-mail.
    #[derive(Default)]
    pub struct StaticCredentials {
        entries: Mutex<HashMap<String, String>>,
    }

    impl StaticCredentials {
        pub fn new(email: &str, password: &str) -> Self {
            let store = Self::default();
            store
                .entries
                .lock()
                .expect("entries lock")
                .insert(email.to_string(), password.to_string());
            store
        }
    }

    impl CredentialStore for StaticCredentials {
        fn verify(&self, email: &str, password: &str) -> AppResult<bool> {
            let entries = self.entries.lock().expect("entries lock");
            Ok(entries.get(email).is_some_and(|stored| stored == password))
        }

        fn has_password(&self, email: &str) -> AppResult<bool> {
            Ok(self.entries.lock().expect("entries lock").contains_key(email))
        }

        fn set_password(&self, email: &str, password: &str) -> AppResult<()> {
            self.entries
                .lock()
                .expect("entries lock")
                .insert(email.to_string(), password.to_string());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::StaticCredentials;
    use super::{constant_time_eq, AuthGate};
    use crate::errors::AppError;
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    fn gate() -> AuthGate {
        AuthGate::new(Arc::new(StaticCredentials::new("admin@nadrika.com", "s3cret")), 12)
    }

    #[tokio::test]
    async fn wrong_email_and_wrong_password_fail_identically() {
        let gate = gate();
        let wrong_email = gate.sign_in("nobody@nadrika.com", "s3cret").await.expect_err("wrong email");
        let wrong_password = gate.sign_in("admin@nadrika.com", "nope").await.expect_err("wrong password");
        assert!(matches!(wrong_email, AppError::Auth(_)));
        assert_eq!(wrong_email.to_string(), wrong_password.to_string());
        assert!(gate.current().is_none());
    }

    #[tokio::test]
    async fn subscribers_see_sign_in_and_sign_out() {
        let gate = gate();
        let mut receiver = gate.subscribe();
        assert!(receiver.borrow().is_none());

        let session = gate.sign_in(" Admin@Nadrika.com ", "s3cret").await.expect("sign in");
        receiver.changed().await.expect("changed");
        assert_eq!(receiver.borrow().as_ref(), Some(&session));
        assert_eq!(session.email, "admin@nadrika.com");

        gate.sign_out();
        receiver.changed().await.expect("changed");
        assert!(receiver.borrow().is_none());
    }

    #[tokio::test]
    async fn expired_session_is_invalidated() {
        let gate = gate();
        gate.sign_in("admin@nadrika.com", "s3cret").await.expect("sign in");
        assert!(gate.current().is_some());
        assert!(gate.current_at(Utc::now() + Duration::hours(13)).is_none());
        assert!(gate.current().is_none());
    }

    #[tokio::test]
    async fn first_password_can_be_provisioned_without_session() {
        let gate = AuthGate::new(Arc::new(StaticCredentials::default()), 12);
        gate.set_password(" Admin@Nadrika.com ", "first").expect("provision");
        gate.sign_in("admin@nadrika.com", "first").await.expect("sign in");
    }

    #[tokio::test]
    async fn existing_password_is_not_overwritten_without_session() {
        let gate = gate();
        let refused = gate.set_password("admin@nadrika.com", "hijacked").expect_err("refused");
        assert!(matches!(refused, AppError::Auth(_)));
        assert!(gate.sign_in("admin@nadrika.com", "hijacked").await.is_err());
        gate.sign_in("admin@nadrika.com", "s3cret").await.expect("old password still valid");
    }

    #[tokio::test]
    async fn signed_in_admin_can_rotate_password() {
        let gate = gate();
        gate.sign_in("admin@nadrika.com", "s3cret").await.expect("sign in");
        gate.set_password("admin@nadrika.com", "rotated").expect("rotate");
        gate.sign_out();

        assert!(gate.sign_in("admin@nadrika.com", "s3cret").await.is_err());
        gate.sign_in("admin@nadrika.com", "rotated").await.expect("new password");
    }

    #[test]
    fn constant_time_comparison() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}

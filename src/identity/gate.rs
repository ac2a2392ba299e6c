use std::sync::Arc;

use tracing::{error, warn};

use super::credentials::extract_credentials;
use super::Principal;
use crate::error::{AppError, AppResult};
use crate::security::{Argon2Verifier, SecretVerifier};
use crate::storage::SharedStore;

/// Why a request failed authentication. Only ever logged; clients always see
/// the same 401 body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    MissingCredentials,
    UnknownPrincipal { login: String },
    SecretMismatch { login: String },
}

impl Rejection {
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::MissingCredentials => "missing_credentials",
            Rejection::UnknownPrincipal { .. } => "unknown_principal",
            Rejection::SecretMismatch { .. } => "secret_mismatch",
        }
    }

    pub fn log(&self, request_id: &str) {
        match self {
            Rejection::MissingCredentials => {
                warn!(target: "coursegate::auth", request_id, reason = self.code(), "auth header not found");
            }
            Rejection::UnknownPrincipal { login } => {
                warn!(target: "coursegate::auth", request_id, reason = self.code(), "user not found for username: {}", login);
            }
            Rejection::SecretMismatch { login } => {
                warn!(target: "coursegate::auth", request_id, reason = self.code(), "authentication failure for username: {}", login);
            }
        }
    }
}

impl From<Rejection> for AppError {
    fn from(_: Rejection) -> Self { AppError::access_denied() }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated(Principal),
    Rejected(Rejection),
}

/// Extract → resolve → verify. One store lookup and at most one hash comparison
/// per call; nothing is cached between calls.
#[derive(Clone)]
pub struct AuthenticationGate {
    store: SharedStore,
    verifier: Arc<dyn SecretVerifier>,
}

impl AuthenticationGate {
    pub fn new(store: SharedStore, verifier: Arc<dyn SecretVerifier>) -> Self { Self { store, verifier } }

    pub fn with_argon2(store: SharedStore) -> Self { Self::new(store, Arc::new(Argon2Verifier)) }

    /// Store failures are returned as `Err`; they are never folded into a rejection.
    pub async fn authenticate(&self, header: Option<&str>) -> AppResult<AuthOutcome> {
        let Some(creds) = extract_credentials(header) else {
            return Ok(AuthOutcome::Rejected(Rejection::MissingCredentials));
        };
        let Some(principal) = self.store.find_principal_by_login(&creds.login).await? else {
            return Ok(AuthOutcome::Rejected(Rejection::UnknownPrincipal { login: creds.login }));
        };

        // Argon2 is deliberately slow; keep it off the async workers.
        let verifier = self.verifier.clone();
        let hash = principal.password_hash.clone();
        let secret = creds.secret;
        let matches = tokio::task::spawn_blocking(move || verifier.verify(&secret, &hash))
            .await
            .map_err(|e| {
                error!(target: "coursegate::auth", "secret verification task failed: {}", e);
                AppError::internal("verifier_failed", "Internal server error")
            })?;

        if matches {
            Ok(AuthOutcome::Authenticated(principal))
        } else {
            Ok(AuthOutcome::Rejected(Rejection::SecretMismatch { login: creds.login }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Principal;
    use crate::security::SecretHasher;
    use crate::storage::{Course, CourseFields, CourseUpdate, MemoryStore, NewPrincipal, Store, StoreError, StoreResult};
    use async_trait::async_trait;
    use base64::Engine;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingVerifier(AtomicUsize);

    impl SecretVerifier for CountingVerifier {
        fn verify(&self, secret: &str, stored_hash: &str) -> bool {
            self.0.fetch_add(1, Ordering::SeqCst);
            Argon2Verifier.verify(secret, stored_hash)
        }
    }

    struct DownStore;

    #[async_trait]
    impl Store for DownStore {
        async fn find_principal_by_login(&self, _: &str) -> StoreResult<Option<Principal>> { Err(StoreError::Unavailable("offline".into())) }
        async fn find_principal_by_id(&self, _: i64) -> StoreResult<Option<Principal>> { Err(StoreError::Unavailable("offline".into())) }
        async fn create_principal(&self, _: NewPrincipal) -> StoreResult<Principal> { Err(StoreError::Unavailable("offline".into())) }
        async fn count_principals(&self) -> StoreResult<usize> { Err(StoreError::Unavailable("offline".into())) }
        async fn list_courses(&self) -> StoreResult<Vec<Course>> { Err(StoreError::Unavailable("offline".into())) }
        async fn find_course_by_id(&self, _: i64) -> StoreResult<Option<Course>> { Err(StoreError::Unavailable("offline".into())) }
        async fn create_course(&self, _: CourseFields, _: i64) -> StoreResult<Course> { Err(StoreError::Unavailable("offline".into())) }
        async fn update_course(&self, _: i64, _: CourseUpdate) -> StoreResult<()> { Err(StoreError::Unavailable("offline".into())) }
        async fn delete_course(&self, _: i64) -> StoreResult<()> { Err(StoreError::Unavailable("offline".into())) }
    }

    fn basic(login: &str, secret: &str) -> String {
        format!("Basic {}", base64::engine::general_purpose::STANDARD.encode(format!("{login}:{secret}")))
    }

    async fn setup() -> (AuthenticationGate, Arc<CountingVerifier>, Principal) {
        let store = Arc::new(MemoryStore::new());
        let hash = SecretHasher::with_params(1024, 1).unwrap().hash("joepassword").unwrap();
        let joe = store
            .create_principal(NewPrincipal {
                first_name: "Joe".into(),
                last_name: "Smith".into(),
                email_address: "joe@smith.com".into(),
                password_hash: hash,
            })
            .await
            .unwrap();
        let verifier = Arc::new(CountingVerifier(AtomicUsize::new(0)));
        (AuthenticationGate::new(store, verifier.clone()), verifier, joe)
    }

    #[tokio::test]
    async fn missing_header_is_rejected_without_lookup_or_comparison() {
        let (gate, verifier, _) = setup().await;
        assert_eq!(gate.authenticate(None).await.unwrap(), AuthOutcome::Rejected(Rejection::MissingCredentials));
        assert_eq!(gate.authenticate(Some("Bearer token")).await.unwrap(), AuthOutcome::Rejected(Rejection::MissingCredentials));
        assert_eq!(verifier.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_login_skips_secret_comparison() {
        let (gate, verifier, _) = setup().await;
        let out = gate.authenticate(Some(&basic("nobody@example.com", "joepassword"))).await.unwrap();
        assert_eq!(out, AuthOutcome::Rejected(Rejection::UnknownPrincipal { login: "nobody@example.com".into() }));
        assert_eq!(verifier.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn wrong_secret_is_rejected_after_one_comparison() {
        let (gate, verifier, _) = setup().await;
        let out = gate.authenticate(Some(&basic("joe@smith.com", "nope"))).await.unwrap();
        assert_eq!(out, AuthOutcome::Rejected(Rejection::SecretMismatch { login: "joe@smith.com".into() }));
        assert_eq!(verifier.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn correct_secret_authenticates() {
        let (gate, verifier, joe) = setup().await;
        let out = gate.authenticate(Some(&basic("joe@smith.com", "joepassword"))).await.unwrap();
        assert_eq!(out, AuthOutcome::Authenticated(joe));
        assert_eq!(verifier.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn every_call_reverifies() {
        let (gate, verifier, _) = setup().await;
        for _ in 0..3 {
            gate.authenticate(Some(&basic("joe@smith.com", "joepassword"))).await.unwrap();
        }
        assert_eq!(verifier.0.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn store_failure_is_not_a_rejection() {
        let gate = AuthenticationGate::with_argon2(Arc::new(DownStore));
        let err = gate.authenticate(Some(&basic("joe@smith.com", "joepassword"))).await.unwrap_err();
        assert_eq!(err.http_status(), 503);
    }

    #[test]
    fn every_rejection_collapses_to_the_same_response() {
        let reasons = [
            Rejection::MissingCredentials,
            Rejection::UnknownPrincipal { login: "a".into() },
            Rejection::SecretMismatch { login: "a".into() },
        ];
        for r in reasons {
            let e: AppError = r.into();
            assert_eq!(e, AppError::access_denied());
        }
    }
}

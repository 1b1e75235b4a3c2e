//! Authentication gate seen from the engine.
//!
//! The engine never validates sessions itself. It observes `Unauthenticated`
//! failures from the providers and hands control to an [`AuthGate`].

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::warn;

/// External collaborator that owns the session
#[async_trait]
pub trait AuthGate: Send + Sync {
    /// Whether a session is currently believed valid
    async fn is_authenticated(&self) -> bool;

    /// Start the login flow; called once per aborted operation
    async fn request_login(&self);
}

/// Gate backed by statically configured provider credentials.
///
/// There is no interactive login: `request_login` marks the session invalid
/// and tells the user which credentials to supply.
#[derive(Debug)]
pub struct CredentialGate {
    authenticated: AtomicBool,
    login_requests: AtomicUsize,
    hint: String,
}

impl CredentialGate {
    /// Create a gate; `has_credentials` seeds the authenticated flag
    #[must_use]
    pub fn new<S: Into<String>>(has_credentials: bool, hint: S) -> Self {
        Self {
            authenticated: AtomicBool::new(has_credentials),
            login_requests: AtomicUsize::new(0),
            hint: hint.into(),
        }
    }

    /// Number of times a login was requested
    #[must_use]
    pub fn login_requests(&self) -> usize {
        self.login_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthGate for CredentialGate {
    async fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    async fn request_login(&self) {
        self.authenticated.store(false, Ordering::SeqCst);
        self.login_requests.fetch_add(1, Ordering::SeqCst);
        warn!("Provider rejected the session; {}", self.hint);
    }
}

//! Session credential storage.

use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// A session credential issued by the server on login.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Value for an `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Shared handle to the current session credential.
///
/// Cloning the store yields another handle to the same credential. Updates
/// replace the whole value, so readers always observe either the old or the
/// new credential and never a partial one.
///
/// Only the login flow and the [`RequestGuard`](super::RequestGuard) write
/// to the store; every other component reads it.
///
/// # Examples
///
/// ```
/// use oracle::session::CredentialStore;
///
/// let store = CredentialStore::new();
/// assert!(!store.is_authenticated());
///
/// store.set("abc123");
/// assert_eq!(store.token().as_deref(), Some("abc123"));
///
/// assert!(store.clear());
/// assert!(store.token().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct CredentialStore {
    current: Arc<watch::Sender<Option<Credential>>>,
}

impl CredentialStore {
    /// Create an empty store (no session).
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            current: Arc::new(current),
        }
    }

    /// Create a store that already holds `token`.
    pub fn with_token(token: impl Into<String>) -> Self {
        let store = Self::new();
        store.set(token);
        store
    }

    /// Install a new credential, replacing any previous one.
    pub fn set(&self, token: impl Into<String>) {
        self.current.send_replace(Some(Credential::new(token)));
    }

    /// Remove the credential.
    ///
    /// Returns `true` if a credential was present.
    pub fn clear(&self) -> bool {
        self.current.send_replace(None).is_some()
    }

    /// Snapshot of the current credential.
    pub fn current(&self) -> Option<Credential> {
        self.current.borrow().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.current.borrow().as_ref().map(|c| c.token.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.borrow().is_some()
    }

    /// Observe session changes (login, logout, invalidation).
    pub fn subscribe(&self) -> watch::Receiver<Option<Credential>> {
        self.current.subscribe()
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

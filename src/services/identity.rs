//! Identity provider seam.
//!
//! The core only ever compares user ids for equality (host election, "which
//! player is me"), so identities are opaque strings issued once per session.

use std::sync::Mutex;

use uuid::Uuid;

/// Opaque, stable-for-the-session user identifier.
pub type UserId = String;

/// External collaborator issuing a stable user id per device/session.
pub trait IdentityProvider: Send + Sync {
    /// The id of the signed-in user, if any.
    fn current_user(&self) -> Option<UserId>;

    /// Sign in anonymously, returning the (possibly freshly minted) id.
    fn sign_in_anonymously(&self) -> UserId;
}

/// In-process identity provider handing out one anonymous id per instance.
#[derive(Debug, Default)]
pub struct AnonymousIdentity {
    current: Mutex<Option<UserId>>,
}

impl AnonymousIdentity {
    /// Create a provider with no signed-in user yet.
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityProvider for AnonymousIdentity {
    fn current_user(&self) -> Option<UserId> {
        self.current.lock().expect("identity mutex poisoned").clone()
    }

    fn sign_in_anonymously(&self) -> UserId {
        let mut guard = self.current.lock().expect("identity mutex poisoned");
        guard
            .get_or_insert_with(|| Uuid::new_v4().simple().to_string())
            .clone()
    }
}

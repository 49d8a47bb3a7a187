//! Identity session shared by every component.
//!
//! The identity provider itself is external. Whatever integrates with it owns
//! an [`IdentityPublisher`] and pushes sign-in, sign-out and token refresh
//! events into it; components hold cheap [`IdentityHandle`] clones and read
//! the identity current at the moment they need it (the signaling relay
//! reads the UID on every reconnect, the REST client reads the ID token on
//! every request).

use crate::secret::SecretString;
use tokio::sync::watch;

/// The signed-in user as supplied by the identity provider.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// Stable user ID.
    pub uid: String,
    /// E-mail, when the provider exposes one.
    pub email: Option<String>,
    /// Signed ID token presented to the backend as a bearer token.
    pub id_token: SecretString,
}

impl AuthenticatedUser {
    /// Create a user with the given UID and ID token.
    #[must_use]
    pub fn new(uid: impl Into<String>, id_token: SecretString) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            id_token,
        }
    }

    /// Attach an e-mail address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Write side of the identity session.
#[derive(Debug)]
pub struct IdentityPublisher {
    sender: watch::Sender<Option<AuthenticatedUser>>,
}

impl IdentityPublisher {
    /// Create a publisher with no signed-in user, plus its first handle.
    #[must_use]
    pub fn new() -> (Self, IdentityHandle) {
        let (sender, receiver) = watch::channel(None);
        (Self { sender }, IdentityHandle(receiver))
    }

    /// Publish a signed-in user.
    pub fn sign_in(&self, user: AuthenticatedUser) {
        self.sender.send_replace(Some(user));
    }

    /// Clear the signed-in user.
    pub fn sign_out(&self) {
        self.sender.send_replace(None);
    }

    /// Replace the ID token of the current user, if any.
    pub fn refresh_token(&self, id_token: SecretString) {
        self.sender.send_if_modified(|current| match current {
            Some(user) => {
                user.id_token = id_token;
                true
            }
            None => false,
        });
    }

    /// Another handle onto this session.
    #[must_use]
    pub fn handle(&self) -> IdentityHandle {
        IdentityHandle(self.sender.subscribe())
    }
}

/// Read side of the identity session.
#[derive(Debug, Clone)]
pub struct IdentityHandle(watch::Receiver<Option<AuthenticatedUser>>);

impl IdentityHandle {
    /// A handle with a fixed signed-in user and no publisher.
    ///
    /// Useful for tools that receive credentials up front.
    #[must_use]
    pub fn fixed(user: AuthenticatedUser) -> Self {
        let (_sender, receiver) = watch::channel(Some(user));
        Self(receiver)
    }

    /// The user signed in right now.
    #[must_use]
    pub fn current(&self) -> Option<AuthenticatedUser> {
        self.0.borrow().clone()
    }

    /// UID of the user signed in right now.
    #[must_use]
    pub fn uid(&self) -> Option<String> {
        self.0.borrow().as_ref().map(|user| user.uid.clone())
    }

    /// Wait for the identity to change.
    ///
    /// Returns `false` once the publisher is gone and no further change can
    /// happen.
    pub async fn changed(&mut self) -> bool {
        self.0.changed().await.is_ok()
    }
}

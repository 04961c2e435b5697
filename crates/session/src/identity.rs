//! Identity provider boundary (consumed).

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use lexdesk_auth::Credential;
use lexdesk_events::Subscription;

/// What the provider says happened to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialEventKind {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// Push notification from the provider. `credential` is `None` when the
/// session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialEvent {
    pub kind: CredentialEventKind,
    pub credential: Option<Credential>,
}

impl CredentialEvent {
    pub fn new(kind: CredentialEventKind, credential: Option<Credential>) -> Self {
        Self { kind, credential }
    }

    pub fn signed_in(credential: Credential) -> Self {
        Self::new(CredentialEventKind::SignedIn, Some(credential))
    }

    pub fn signed_out() -> Self {
        Self::new(CredentialEventKind::SignedOut, None)
    }
}

/// Metadata attached to a new account at sign-up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignUpMetadata {
    pub full_name: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("invalid login credentials")]
    InvalidCredentials,

    #[error("email not confirmed")]
    EmailNotConfirmed,

    #[error("user already registered")]
    AlreadyRegistered,

    #[error("identity provider error: {0}")]
    Provider(String),
}

/// Remote identity provider.
///
/// Implementations must deliver a [`CredentialEvent`] to every live
/// subscription whenever the provider-side session changes.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Credential of the session the provider currently holds, if any.
    async fn current_credential(&self) -> Result<Option<Credential>, IdentityError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Credential, IdentityError>;

    /// Create an account. No session exists until the email is confirmed.
    async fn sign_up(&self, email: &str, password: &str, metadata: SignUpMetadata) -> Result<(), IdentityError>;

    async fn sign_out(&self) -> Result<(), IdentityError>;

    async fn resend_signup_confirmation(&self, email: &str) -> Result<(), IdentityError>;

    fn subscribe(&self) -> Subscription<CredentialEvent>;
}

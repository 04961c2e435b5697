use thiserror::Error;

use lexdesk_auth::is_platform_owner_email;
use lexdesk_core::{DomainError, UserId};

use crate::identity::IdentityError;
use crate::store::StoreError;

/// Profile creation failed for a reason other than a duplicate-key race.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("profile creation failed for user {user_id}: {source}")]
    CreationFailed {
        user_id: UserId,
        #[source]
        source: StoreError,
    },
}

/// Errors returned by coordinator commands.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Credential is correct but the email was never confirmed. Resend the
    /// confirmation email and retry.
    #[error("email {email} is not confirmed; request a new confirmation email")]
    ConfirmationRequired { email: String, platform_owner: bool },

    #[error("account is not the platform owner")]
    NotPlatformOwner,

    #[error("user already registered")]
    AlreadyRegistered,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("identity provider error: {0}")]
    Provider(String),

    /// Signed in, but no profile could be resolved or created.
    #[error("profile unavailable: {0}")]
    ProfileUnavailable(String),

    #[error("session coordinator not started")]
    NotStarted,
}

impl SessionError {
    /// Stable machine-readable kind, e.g. for UI message lookup.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::InvalidCredentials => "invalid_credentials",
            SessionError::ConfirmationRequired { .. } => "confirmation_required",
            SessionError::NotPlatformOwner => "not_platform_owner",
            SessionError::AlreadyRegistered => "already_registered",
            SessionError::Validation(_) => "validation",
            SessionError::Provider(_) => "provider",
            SessionError::ProfileUnavailable(_) => "profile_unavailable",
            SessionError::NotStarted => "not_started",
        }
    }
}

impl From<DomainError> for SessionError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(message) => SessionError::Validation(message),
            other => SessionError::Validation(other.to_string()),
        }
    }
}

impl SessionError {
    /// Map a provider error for a command issued for `email`.
    pub(crate) fn from_identity(err: IdentityError, email: &str, owner_email: &str) -> Self {
        match err {
            IdentityError::InvalidCredentials => SessionError::InvalidCredentials,
            IdentityError::EmailNotConfirmed => SessionError::ConfirmationRequired {
                email: email.to_string(),
                platform_owner: is_platform_owner_email(email, owner_email),
            },
            IdentityError::AlreadyRegistered => SessionError::AlreadyRegistered,
            IdentityError::Provider(message) => SessionError::Provider(message),
        }
    }
}

//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic failures (validation, malformed ids).
/// Transport and storage concerns belong to the ports that surface them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed email).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}

/// Validate an email address the way sign-up and profile creation need it:
/// non-empty after trimming, exactly one `@`, non-empty local and domain parts.
pub fn validate_email(email: &str) -> DomainResult<()> {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return Err(DomainError::validation("invalid email format"));
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(DomainError::validation("invalid email format"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_address() {
        assert!(validate_email("ana@escritorio.com.br").is_ok());
        assert!(validate_email("  ana@escritorio.com.br ").is_ok());
    }

    #[test]
    fn rejects_malformed_addresses() {
        for bad in ["", "   ", "ana", "@escritorio.com", "ana@", "a@b@c"] {
            assert!(
                matches!(validate_email(bad), Err(DomainError::Validation(_))),
                "{bad:?} should be rejected"
            );
        }
    }
}

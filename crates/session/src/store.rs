//! Relational store boundary (consumed).

use async_trait::async_trait;
use thiserror::Error;

use lexdesk_auth::{Membership, NewProfile, Profile, Role, Tenant};
use lexdesk_core::UserId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Unique constraint violated (e.g. a profile for this user already exists).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Transient failure: network, timeout, overload.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store refused the operation for a non-transient reason.
    #[error("rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_by_user(&self, user_id: UserId) -> Result<Option<Profile>, StoreError>;

    /// Insert a new profile. Unique on `user_id`; a clash is
    /// [`StoreError::Conflict`].
    async fn insert(&self, profile: NewProfile) -> Result<Profile, StoreError>;
}

/// An active membership joined with its tenant row, which may be missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipRow {
    pub membership: Membership,
    pub tenant: Option<Tenant>,
}

#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Active memberships for a user, in store order.
    async fn find_active(&self, user_id: UserId) -> Result<Vec<MembershipRow>, StoreError>;
}

/// Map a stored role string onto [`Role`]. Unknown values fall back to the
/// least privileged role.
pub fn role_from_store(raw: &str) -> Role {
    raw.parse().unwrap_or_else(|_| {
        tracing::warn!(role = raw, "unknown stored role, treating as user");
        Role::User
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_stored_role_is_least_privileged() {
        assert_eq!(role_from_store("super_admin"), Role::SuperAdmin);
        assert_eq!(role_from_store("owner"), Role::User);
        assert_eq!(role_from_store(""), Role::User);
    }
}

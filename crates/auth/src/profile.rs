//! Application-level user profile.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use lexdesk_core::{TenantId, UserId};

use crate::Role;

/// Stored profile for an authenticated identity (zero or one per user).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: UserId,
    pub display_name: String,
    pub email: String,
    pub role: Role,
    pub tenant_id: Option<TenantId>,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// First-login heuristic: a profile younger than `window` whose role is
    /// not `super_admin`.
    ///
    /// This is an approximation; any sign-in within the window after
    /// creation counts, and nothing is persisted.
    pub fn is_first_login(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.role != Role::SuperAdmin && now.signed_duration_since(self.created_at) < window
    }
}

/// Row to insert when a profile does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProfile {
    pub user_id: UserId,
    pub display_name: String,
    pub email: String,
    pub role: Role,
}

/// Whether `email` is the configured platform owner (trimmed, case-insensitive).
pub fn is_platform_owner_email(email: &str, owner_email: &str) -> bool {
    let owner = owner_email.trim();
    !owner.is_empty() && email.trim().eq_ignore_ascii_case(owner)
}

/// Default role for a freshly created profile.
pub fn default_role_for(email: &str, owner_email: &str) -> Role {
    if is_platform_owner_email(email, owner_email) {
        Role::SuperAdmin
    } else {
        Role::User
    }
}

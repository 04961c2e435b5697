//! Tenant (office) membership model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lexdesk_core::{DomainError, TenantId, UserId};

use crate::Role;

/// Link between a user and a tenant, carrying a tenant-scoped role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub role: Role,
    pub active: bool,
    pub joined_at: DateTime<Utc>,
}

/// Subscription plan of a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantPlan {
    #[default]
    Free,
    Basic,
    Professional,
    Enterprise,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantSettings {
    pub max_users: u32,
    pub show_financial: bool,
    pub show_goals: bool,
}

impl Default for TenantSettings {
    fn default() -> Self {
        Self {
            max_users: 5,
            show_financial: true,
            show_goals: true,
        }
    }
}

/// A law office.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub plan: TenantPlan,
    pub active: bool,
    #[serde(default)]
    pub settings: TenantSettings,
}

/// An active membership together with its tenant.
///
/// Never partial: either both halves are present or the user has no tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedMembership {
    membership: Membership,
    tenant: Tenant,
}

impl ResolvedMembership {
    pub fn new(membership: Membership, tenant: Tenant) -> Result<Self, DomainError> {
        if membership.tenant_id != tenant.id {
            return Err(DomainError::validation(format!(
                "membership tenant {} does not match tenant {}",
                membership.tenant_id, tenant.id
            )));
        }
        Ok(Self { membership, tenant })
    }

    pub fn membership(&self) -> &Membership {
        &self.membership
    }

    pub fn tenant(&self) -> &Tenant {
        &self.tenant
    }

    pub fn role(&self) -> Role {
        self.membership.role
    }

    pub fn into_parts(self) -> (Membership, Tenant) {
        (self.membership, self.tenant)
    }
}

//! Session read model.

use chrono::{DateTime, Utc};
use serde::Serialize;

use lexdesk_auth::{
    Credential, Membership, PermissionMatrix, PermissionSet, Profile, ResolvedMembership, Role,
    Tenant, email_local_part,
};
use lexdesk_core::{TenantId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    #[default]
    Uninitialized,
    Initializing,
    Ready,
    Unauthenticated,
    Error,
}

impl Lifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifecycle::Uninitialized => "uninitialized",
            Lifecycle::Initializing => "initializing",
            Lifecycle::Ready => "ready",
            Lifecycle::Unauthenticated => "unauthenticated",
            Lifecycle::Error => "error",
        }
    }

    /// Still waiting for the first answer; callers should render a loading
    /// state rather than a denial.
    pub fn is_loading(self) -> bool {
        matches!(self, Lifecycle::Uninitialized | Lifecycle::Initializing)
    }
}

impl core::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the coordinator knows, as one value.
///
/// Replaced wholesale on every transition so profile, membership, tenant and
/// permissions always come from the same resolution. `generation` counts
/// observed credential changes; a resolution result is only applied while
/// its generation is still current.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    pub credential: Option<Credential>,
    pub profile: Option<Profile>,
    pub membership: Option<Membership>,
    pub tenant: Option<Tenant>,
    pub permissions: PermissionSet,
    pub lifecycle: Lifecycle,
    pub first_login: bool,
    pub generation: u64,
    pub error: Option<String>,
}

impl SessionState {
    pub fn initializing(generation: u64, credential: Option<Credential>) -> Self {
        Self {
            credential,
            lifecycle: Lifecycle::Initializing,
            generation,
            ..Self::default()
        }
    }

    pub fn unauthenticated(generation: u64) -> Self {
        Self {
            lifecycle: Lifecycle::Unauthenticated,
            generation,
            ..Self::default()
        }
    }

    pub fn failed(generation: u64, credential: Option<Credential>, error: impl Into<String>) -> Self {
        Self {
            credential,
            lifecycle: Lifecycle::Error,
            generation,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Build a ready state, deriving permissions and the first-login flag.
    pub fn ready(
        generation: u64,
        credential: Credential,
        profile: Profile,
        membership: Option<ResolvedMembership>,
        now: DateTime<Utc>,
        first_login_window: chrono::Duration,
    ) -> Self {
        let (membership, tenant) = match membership {
            Some(resolved) => {
                let (membership, tenant) = resolved.into_parts();
                (Some(membership), Some(tenant))
            }
            None => (None, None),
        };
        let permissions = PermissionMatrix::derive(
            Some(profile.role),
            membership.as_ref().map(|m| m.role),
            tenant.is_some(),
        );
        let first_login = profile.is_first_login(now, first_login_window);

        Self {
            credential: Some(credential),
            profile: Some(profile),
            membership,
            tenant,
            permissions,
            lifecycle: Lifecycle::Ready,
            first_login,
            generation,
            error: None,
        }
    }

    /// Profile role, only once the session is ready.
    pub fn role(&self) -> Option<Role> {
        match self.lifecycle {
            Lifecycle::Ready => self.profile.as_ref().map(|p| p.role),
            _ => None,
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.credential.as_ref().map(|c| c.user_id)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let user = match (self.lifecycle, &self.credential, &self.profile) {
            (Lifecycle::Ready, Some(credential), Some(profile)) => Some(SessionUser::new(
                credential,
                profile,
                self.membership.as_ref(),
            )),
            _ => None,
        };
        let ready = user.is_some();

        SessionSnapshot {
            is_authenticated: ready,
            is_loading: self.lifecycle.is_loading(),
            lifecycle: self.lifecycle,
            generation: self.generation,
            user,
            permissions: if ready { self.permissions } else { PermissionSet::empty() },
            is_first_login: ready && self.first_login,
            tenant: if ready { self.tenant.clone() } else { None },
            membership: if ready { self.membership.clone() } else { None },
            error: self.error.clone(),
        }
    }
}

/// User as exposed to the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionUser {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub tenant_id: Option<TenantId>,
    pub tenant_role: Option<Role>,
}

impl SessionUser {
    fn new(credential: &Credential, profile: &Profile, membership: Option<&Membership>) -> Self {
        let name = match profile.display_name.trim() {
            "" => email_local_part(&credential.email).to_string(),
            name => name.to_string(),
        };
        Self {
            id: credential.user_id,
            name,
            email: credential.email.clone(),
            role: profile.role,
            tenant_id: profile.tenant_id.or_else(|| membership.map(|m| m.tenant_id)),
            tenant_role: membership.map(|m| m.role),
        }
    }
}

/// Immutable, serializable view of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub lifecycle: Lifecycle,
    pub generation: u64,
    pub user: Option<SessionUser>,
    pub permissions: PermissionSet,
    pub is_first_login: bool,
    pub tenant: Option<Tenant>,
    pub membership: Option<Membership>,
    pub error: Option<String>,
}

impl SessionSnapshot {
    fn role(&self) -> Option<Role> {
        self.user.as_ref().map(|u| u.role)
    }

    pub fn is_super_admin(&self) -> bool {
        self.role() == Some(Role::SuperAdmin)
    }

    /// `admin` or `super_admin` profile.
    pub fn is_admin(&self) -> bool {
        self.role().is_some_and(Role::is_elevated)
    }

    /// Elevated tenant role, or platform owner.
    pub fn is_tenant_admin(&self) -> bool {
        self.is_super_admin()
            || self
                .user
                .as_ref()
                .and_then(|u| u.tenant_role)
                .is_some_and(Role::is_elevated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexdesk_auth::{Capability, TenantPlan, TenantSettings};

    fn profile(role: Role, age_secs: i64) -> Profile {
        Profile {
            user_id: UserId::new(),
            display_name: String::new(),
            email: "ana@example.com".into(),
            role,
            tenant_id: None,
            created_at: Utc::now() - chrono::Duration::seconds(age_secs),
        }
    }

    fn ready(profile: Profile, membership: Option<ResolvedMembership>) -> SessionState {
        let credential = Credential::new(profile.user_id, profile.email.clone());
        SessionState::ready(7, credential, profile, membership, Utc::now(), chrono::Duration::seconds(60))
    }

    fn office_membership(user_id: UserId, role: Role) -> ResolvedMembership {
        let tenant = Tenant {
            id: TenantId::new(),
            name: "Office".into(),
            plan: TenantPlan::Enterprise,
            active: true,
            settings: TenantSettings::default(),
        };
        let membership = Membership {
            user_id,
            tenant_id: tenant.id,
            role,
            active: true,
            joined_at: Utc::now(),
        };
        ResolvedMembership::new(membership, tenant).unwrap()
    }

    #[test]
    fn default_state_is_loading_and_anonymous() {
        let snapshot = SessionState::default().snapshot();
        assert!(snapshot.is_loading);
        assert!(!snapshot.is_authenticated);
        assert!(snapshot.permissions.is_empty());
    }

    #[test]
    fn ready_state_is_internally_consistent() {
        let p = profile(Role::User, 3_600);
        let membership = office_membership(p.user_id, Role::Admin);
        let state = ready(p, Some(membership));

        let snapshot = state.snapshot();
        assert!(snapshot.is_authenticated);
        assert!(!snapshot.is_loading);
        assert_eq!(snapshot.tenant.as_ref().unwrap().id, snapshot.membership.as_ref().unwrap().tenant_id);
        assert!(snapshot.permissions.is_granted(Capability::InviteUsers));
        assert!(snapshot.is_tenant_admin());
        assert!(!snapshot.is_admin());
        assert_eq!(snapshot.user.as_ref().unwrap().name, "ana");
    }

    #[test]
    fn first_login_follows_profile_age_and_role() {
        assert!(ready(profile(Role::User, 10), None).snapshot().is_first_login);
        assert!(!ready(profile(Role::SuperAdmin, 10), None).snapshot().is_first_login);
        assert!(!ready(profile(Role::User, 120), None).snapshot().is_first_login);
    }

    #[test]
    fn non_ready_states_expose_nothing() {
        let p = profile(Role::Admin, 10);
        let credential = Credential::new(p.user_id, p.email.clone());
        for state in [
            SessionState::initializing(1, Some(credential.clone())),
            SessionState::failed(1, Some(credential), "boom"),
            SessionState::unauthenticated(2),
        ] {
            let snapshot = state.snapshot();
            assert!(snapshot.user.is_none());
            assert!(snapshot.permissions.is_empty());
            assert!(!snapshot.is_first_login);
            assert_eq!(state.role(), None);
        }
    }

    #[test]
    fn snapshot_serializes_permission_map() {
        let json = serde_json::to_value(ready(profile(Role::Admin, 3_600), None).snapshot()).unwrap();
        assert_eq!(json["lifecycle"], "ready");
        assert_eq!(json["permissions"]["manage_office"], true);
        assert_eq!(json["permissions"]["manage_global_settings"], false);
    }
}

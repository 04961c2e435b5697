//! Route/feature guard over the session read model.

use std::time::Duration;

use tokio::sync::watch;

use lexdesk_auth::{AccessRequirement, AuthzError, Capability, Role, authorize, check_requirement};

use crate::state::SessionState;

/// Outcome of a route-level check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// The session is still initializing; render a loading state.
    Pending,
    Unauthenticated,
    Denied(AuthzError),
    Allowed,
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allowed)
    }
}

/// Read-only view of the coordinator's state. Never triggers resolution.
#[derive(Debug, Clone)]
pub struct AccessGuard {
    state: watch::Receiver<SessionState>,
}

impl AccessGuard {
    pub fn new(state: watch::Receiver<SessionState>) -> Self {
        Self { state }
    }

    /// Feature-level check. No requirement allows.
    pub fn allow(&self, required_role: Option<Role>, required_capability: Option<Capability>) -> bool {
        let state = self.state.borrow();
        let requirement = AccessRequirement {
            role: required_role,
            capability: required_capability,
        };
        check_requirement(state.role(), &state.permissions, &requirement).is_ok()
    }

    /// Whether the session is still loading (distinct from denied).
    pub fn is_pending(&self) -> bool {
        self.state.borrow().lifecycle.is_loading()
    }

    /// Route-level check: also requires an authenticated session.
    pub fn check(&self, requirement: &AccessRequirement) -> AccessDecision {
        let state = self.state.borrow();
        if state.lifecycle.is_loading() {
            return AccessDecision::Pending;
        }
        match authorize(state.role(), &state.permissions, requirement) {
            Ok(()) => AccessDecision::Allowed,
            Err(AuthzError::Unauthenticated) => AccessDecision::Unauthenticated,
            Err(err) => AccessDecision::Denied(err),
        }
    }

    /// Like [`AccessGuard::check`], but waits up to `patience` for loading to
    /// finish. A session still loading after that counts as unauthenticated.
    pub async fn check_within(&self, requirement: &AccessRequirement, patience: Duration) -> AccessDecision {
        let mut rx = self.state.clone();
        let settled = tokio::time::timeout(patience, rx.wait_for(|state| !state.lifecycle.is_loading()))
            .await
            .is_ok_and(|changed| changed.is_ok());
        if !settled {
            tracing::debug!(patience_ms = patience.as_millis() as u64, "session still loading, treating as unauthenticated");
            return AccessDecision::Unauthenticated;
        }
        self.check(requirement)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use lexdesk_auth::{Credential, Profile};
    use lexdesk_core::UserId;

    fn ready_state(role: Role) -> SessionState {
        let user_id = UserId::new();
        let profile = Profile {
            user_id,
            display_name: "Ana".into(),
            email: "ana@example.com".into(),
            role,
            tenant_id: None,
            created_at: Utc::now() - chrono::Duration::hours(1),
        };
        let credential = Credential::new(user_id, "ana@example.com");
        SessionState::ready(1, credential, profile, None, Utc::now(), chrono::Duration::seconds(60))
    }

    fn guard(state: SessionState) -> (watch::Sender<SessionState>, AccessGuard) {
        let (tx, rx) = watch::channel(state);
        (tx, AccessGuard::new(rx))
    }

    #[test]
    fn no_requirement_allows() {
        let (_tx, guard) = guard(SessionState::unauthenticated(1));
        assert!(guard.allow(None, None));
    }

    #[test]
    fn role_requirement_is_exact_or_super_admin() {
        let (_tx, admin) = guard(ready_state(Role::Admin));
        assert!(admin.allow(Some(Role::Admin), None));
        assert!(!admin.allow(Some(Role::SuperAdmin), None));

        let (_tx, owner) = guard(ready_state(Role::SuperAdmin));
        assert!(owner.allow(Some(Role::Admin), None));
        assert!(owner.allow(Some(Role::User), None));
    }

    #[test]
    fn capability_requirement_reads_permission_set() {
        let (_tx, user) = guard(ready_state(Role::User));
        assert!(user.allow(None, Some(Capability::CreateClients)));
        assert!(!user.allow(None, Some(Capability::DeleteClients)));
    }

    #[test]
    fn pending_is_not_denied() {
        let (_tx, guard) = guard(SessionState::initializing(1, None));
        assert!(guard.is_pending());
        assert_eq!(guard.check(&AccessRequirement::none()), AccessDecision::Pending);
    }

    #[test]
    fn route_check_requires_authentication() {
        let (_tx, guard) = guard(SessionState::unauthenticated(2));
        assert_eq!(guard.check(&AccessRequirement::none()), AccessDecision::Unauthenticated);
    }

    #[test]
    fn route_check_reports_denial_reason() {
        let (_tx, guard) = guard(ready_state(Role::User));
        let requirement = AccessRequirement::capability(Capability::ManageOffice);
        assert_eq!(
            guard.check(&requirement),
            AccessDecision::Denied(AuthzError::Forbidden(Capability::ManageOffice))
        );
    }

    #[test]
    fn guard_follows_state_replacements() {
        let (tx, guard) = guard(SessionState::initializing(1, None));
        tx.send_replace(ready_state(Role::Admin));
        assert!(!guard.is_pending());
        assert!(guard.allow(Some(Role::Admin), Some(Capability::ManageOffice)));
    }

    #[tokio::test]
    async fn check_within_gives_up_on_endless_loading() {
        let (_tx, guard) = guard(SessionState::initializing(1, None));
        let decision = guard.check_within(&AccessRequirement::none(), Duration::from_millis(20)).await;
        assert_eq!(decision, AccessDecision::Unauthenticated);
    }

    #[tokio::test]
    async fn check_within_waits_for_resolution() {
        let (tx, guard) = guard(SessionState::initializing(1, None));
        let waiter = tokio::spawn(async move {
            guard
                .check_within(&AccessRequirement::role(Role::Admin), Duration::from_secs(2))
                .await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        tx.send_replace(ready_state(Role::Admin));
        assert_eq!(waiter.await.unwrap(), AccessDecision::Allowed);
    }
}

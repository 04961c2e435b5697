use serde::Serialize;
use thiserror::Error;

use crate::{Capability, PermissionSet, Role};

/// What a guarded surface demands from the current identity.
///
/// Both parts are optional; an empty requirement only asks for an
/// authenticated identity when evaluated through [`authorize`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct AccessRequirement {
    pub role: Option<Role>,
    pub capability: Option<Capability>,
}

impl AccessRequirement {
    pub const fn none() -> Self {
        Self {
            role: None,
            capability: None,
        }
    }

    pub const fn role(role: Role) -> Self {
        Self {
            role: Some(role),
            capability: None,
        }
    }

    pub const fn capability(capability: Capability) -> Self {
        Self {
            role: None,
            capability: Some(capability),
        }
    }

    pub const fn with_capability(mut self, capability: Capability) -> Self {
        self.capability = Some(capability);
        self
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthzError {
    #[error("not authenticated")]
    Unauthenticated,

    #[error("forbidden: role '{0}' required")]
    RoleRequired(Role),

    #[error("forbidden: missing capability '{0}'")]
    Forbidden(Capability),
}

/// Whether `role` satisfies a required role.
///
/// Exact match, with `super_admin` satisfying every role requirement.
pub fn role_satisfies(role: Role, required: Role) -> bool {
    role == required || role == Role::SuperAdmin
}

/// Check a requirement against a role and its permission set, ignoring
/// authentication (a missing role only fails a role requirement).
///
/// - No IO
/// - No panics
pub fn check_requirement(
    role: Option<Role>,
    permissions: &PermissionSet,
    requirement: &AccessRequirement,
) -> Result<(), AuthzError> {
    if let Some(required) = requirement.role {
        match role {
            Some(role) if role_satisfies(role, required) => {}
            _ => return Err(AuthzError::RoleRequired(required)),
        }
    }

    if let Some(capability) = requirement.capability {
        if !permissions.is_granted(capability) {
            return Err(AuthzError::Forbidden(capability));
        }
    }

    Ok(())
}

/// Authorize an identity for a guarded surface.
///
/// `role` is `None` when nobody is signed in, which always fails with
/// [`AuthzError::Unauthenticated`].
pub fn authorize(
    role: Option<Role>,
    permissions: &PermissionSet,
    requirement: &AccessRequirement,
) -> Result<(), AuthzError> {
    if role.is_none() {
        return Err(AuthzError::Unauthenticated);
    }
    check_requirement(role, permissions, requirement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PermissionMatrix;

    fn perms(role: Role) -> PermissionSet {
        PermissionMatrix::derive(Some(role), None, false)
    }

    #[test]
    fn anonymous_is_unauthenticated() {
        let err = authorize(None, &PermissionSet::empty(), &AccessRequirement::none()).unwrap_err();
        assert_eq!(err, AuthzError::Unauthenticated);
    }

    #[test]
    fn empty_requirement_passes_for_any_identity() {
        assert!(authorize(Some(Role::User), &perms(Role::User), &AccessRequirement::none()).is_ok());
        assert!(check_requirement(None, &PermissionSet::empty(), &AccessRequirement::none()).is_ok());
    }

    #[test]
    fn super_admin_satisfies_any_role_requirement() {
        let req = AccessRequirement::role(Role::Admin);
        assert!(authorize(Some(Role::SuperAdmin), &perms(Role::SuperAdmin), &req).is_ok());
    }

    #[test]
    fn role_requirement_is_exact_below_super_admin() {
        let req = AccessRequirement::role(Role::SuperAdmin);
        let err = authorize(Some(Role::Admin), &perms(Role::Admin), &req).unwrap_err();
        assert_eq!(err, AuthzError::RoleRequired(Role::SuperAdmin));

        let req = AccessRequirement::role(Role::User);
        let err = authorize(Some(Role::Admin), &perms(Role::Admin), &req).unwrap_err();
        assert_eq!(err, AuthzError::RoleRequired(Role::User));
    }

    #[test]
    fn missing_capability_is_forbidden() {
        let req = AccessRequirement::capability(Capability::DeleteClients);
        let err = authorize(Some(Role::User), &perms(Role::User), &req).unwrap_err();
        assert_eq!(err, AuthzError::Forbidden(Capability::DeleteClients));
    }

    #[test]
    fn role_and_capability_must_both_hold() {
        let req = AccessRequirement::role(Role::Admin).with_capability(Capability::ManageSystemUsers);
        let err = authorize(Some(Role::Admin), &perms(Role::Admin), &req).unwrap_err();
        assert_eq!(err, AuthzError::Forbidden(Capability::ManageSystemUsers));
    }

    #[test]
    fn requirement_serializes_capability_by_name() {
        let req = AccessRequirement::role(Role::Admin).with_capability(Capability::ManageOffice);
        let json = serde_json::to_value(req).unwrap();
        assert_eq!(json, serde_json::json!({"role": "admin", "capability": "manage_office"}));

        let json = serde_json::to_value(AccessRequirement::none()).unwrap();
        assert_eq!(json, serde_json::json!({"role": null, "capability": null}));
    }
}

//! `lexdesk-auth`: pure identity and authorization model.
//!
//! Roles, profiles, memberships, capability flags and the rule table that
//! derives a permission set from them. No I/O, no async.

pub mod authorize;
pub mod credential;
pub mod matrix;
pub mod membership;
pub mod permissions;
pub mod profile;
pub mod roles;

pub use authorize::{AccessRequirement, AuthzError, authorize, check_requirement, role_satisfies};
pub use credential::{Credential, CredentialMetadata, email_local_part};
pub use matrix::{PermissionMatrix, RULES, RoleContext, Rule, Tier};
pub use membership::{Membership, ResolvedMembership, Tenant, TenantPlan, TenantSettings};
pub use permissions::{Capability, CapabilityScope, PermissionSet};
pub use profile::{NewProfile, Profile, default_role_for, is_platform_owner_email};
pub use roles::Role;

//! Role → permission derivation.
//!
//! One ordered rule list, evaluated top-down; the first matching rule decides
//! the whole set. Rules never merge, so a more privileged rule can't be
//! partially undone by a less privileged one.

use crate::permissions::{Capability, CapabilityScope, PermissionSet};
use crate::roles::Role;

/// Inputs the matrix looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoleContext {
    /// Platform role from the profile; `None` when nobody is signed in.
    pub profile_role: Option<Role>,
    /// Tenant-scoped role from the active membership, if any.
    pub membership_role: Option<Role>,
    /// Whether an active membership and its tenant were resolved.
    pub has_tenant: bool,
}

/// Grant tier a rule hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Nothing,
    Member,
    OfficeAdmin,
    Admin,
    Everything,
}

impl Tier {
    fn grants(self, cap: Capability) -> bool {
        match self {
            Tier::Nothing => false,
            Tier::Member => MEMBER_GRANTS.contains(&cap),
            Tier::OfficeAdmin => match cap.scope() {
                CapabilityScope::Operational => cap != Capability::DeleteCases,
                CapabilityScope::TenantAdmin => cap != Capability::ViewAdmin,
                CapabilityScope::Platform => false,
            },
            Tier::Admin => cap.scope() != CapabilityScope::Platform,
            Tier::Everything => true,
        }
    }

    pub fn permissions(self) -> PermissionSet {
        PermissionSet::from_capabilities(Capability::ALL.iter().copied().filter(|cap| self.grants(*cap)))
    }
}

/// Default authenticated-user grants: work on owned entities, read shared
/// ones, no deletes on shared entities and no office/platform management.
const MEMBER_GRANTS: &[Capability] = &[
    Capability::ViewDashboard,
    Capability::ViewClients,
    Capability::CreateClients,
    Capability::EditClients,
    Capability::ViewCases,
    Capability::CreateCases,
    Capability::EditCases,
    Capability::ViewServiceRecords,
    Capability::CreateServiceRecords,
    Capability::EditServiceRecords,
    Capability::ViewCrm,
    Capability::ViewAgenda,
    Capability::ManageAgenda,
    Capability::ViewHearings,
    Capability::ManageHearings,
    Capability::ViewTeam,
    Capability::ViewTasks,
    Capability::ManageTasks,
    Capability::ViewDeadlines,
    Capability::ManageDeadlines,
    Capability::ViewPublications,
    Capability::ViewAdvisory,
    Capability::ManageAdvisory,
    Capability::ViewCharts,
    Capability::ViewFinancial,
    Capability::ViewGoals,
    Capability::ViewTags,
    Capability::ViewNotifications,
    Capability::ViewSettings,
    Capability::ViewProfile,
    Capability::EditProfile,
];

/// A single precedence rule.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub applies: fn(&RoleContext) -> bool,
    pub tier: Tier,
}

fn is_anonymous(ctx: &RoleContext) -> bool {
    ctx.profile_role.is_none()
}

fn is_platform_owner(ctx: &RoleContext) -> bool {
    ctx.profile_role == Some(Role::SuperAdmin)
}

fn is_administrator(ctx: &RoleContext) -> bool {
    ctx.profile_role == Some(Role::Admin)
}

fn is_office_administrator(ctx: &RoleContext) -> bool {
    ctx.has_tenant && ctx.membership_role.is_some_and(Role::is_elevated)
}

fn always(_: &RoleContext) -> bool {
    true
}

/// Most privileged first. The last rule matches everything, which keeps
/// derivation total.
pub const RULES: &[Rule] = &[
    Rule { name: "anonymous", applies: is_anonymous, tier: Tier::Nothing },
    Rule { name: "platform_owner", applies: is_platform_owner, tier: Tier::Everything },
    Rule { name: "administrator", applies: is_administrator, tier: Tier::Admin },
    Rule { name: "office_administrator", applies: is_office_administrator, tier: Tier::OfficeAdmin },
    Rule { name: "member", applies: always, tier: Tier::Member },
];

/// Pure role → permission mapping. No state, no I/O.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionMatrix;

impl PermissionMatrix {
    /// Derive the full permission set for a role combination.
    pub fn derive(profile_role: Option<Role>, membership_role: Option<Role>, has_tenant: bool) -> PermissionSet {
        Self::derive_for(&RoleContext {
            profile_role,
            membership_role,
            has_tenant,
        })
    }

    pub fn derive_for(ctx: &RoleContext) -> PermissionSet {
        Self::matching_rule(ctx).tier.permissions()
    }

    /// The rule that decides `ctx` (useful for logging which tier applied).
    pub fn matching_rule(ctx: &RoleContext) -> &'static Rule {
        RULES
            .iter()
            .find(|rule| (rule.applies)(ctx))
            .unwrap_or(&RULES[RULES.len() - 1])
    }
}

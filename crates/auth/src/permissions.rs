use core::str::FromStr;

use serde::ser::{Serialize, SerializeMap, Serializer};

use lexdesk_core::DomainError;

/// Which layer of the product a capability belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityScope {
    /// Day-to-day practice work inside an office (clients, cases, agenda, ...).
    Operational,
    /// Administration of a single office (invites, office settings, admin area).
    TenantAdmin,
    /// Administration of the whole platform, across offices.
    Platform,
}

macro_rules! capabilities {
    ($($variant:ident => $name:literal, $scope:ident;)+) => {
        /// Named capability flag.
        ///
        /// Flag names are the stable, serialized identifiers guards refer to.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum Capability {
            $($variant,)+
        }

        impl Capability {
            /// Every capability, in declaration order.
            pub const ALL: &'static [Capability] = &[$(Capability::$variant,)+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Capability::$variant => $name,)+
                }
            }

            pub fn scope(&self) -> CapabilityScope {
                match self {
                    $(Capability::$variant => CapabilityScope::$scope,)+
                }
            }
        }

        impl FromStr for Capability {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($name => Ok(Capability::$variant),)+
                    other => Err(DomainError::validation(format!("unknown capability '{other}'"))),
                }
            }
        }
    };
}

capabilities! {
    ViewDashboard => "view_dashboard", Operational;

    ViewClients => "view_clients", Operational;
    CreateClients => "create_clients", Operational;
    EditClients => "edit_clients", Operational;
    DeleteClients => "delete_clients", Operational;

    ViewCases => "view_cases", Operational;
    CreateCases => "create_cases", Operational;
    EditCases => "edit_cases", Operational;
    DeleteCases => "delete_cases", Operational;

    ViewServiceRecords => "view_service_records", Operational;
    CreateServiceRecords => "create_service_records", Operational;
    EditServiceRecords => "edit_service_records", Operational;
    DeleteServiceRecords => "delete_service_records", Operational;

    ViewCrm => "view_crm", Operational;
    ManageCrm => "manage_crm", Operational;

    ViewAgenda => "view_agenda", Operational;
    ManageAgenda => "manage_agenda", Operational;
    ViewHearings => "view_hearings", Operational;
    ManageHearings => "manage_hearings", Operational;

    ViewTeam => "view_team", Operational;
    ManageTeam => "manage_team", Operational;

    ViewTasks => "view_tasks", Operational;
    ManageTasks => "manage_tasks", Operational;
    ViewDeadlines => "view_deadlines", Operational;
    ManageDeadlines => "manage_deadlines", Operational;

    ViewPublications => "view_publications", Operational;
    ManagePublications => "manage_publications", Operational;
    ViewAdvisory => "view_advisory", Operational;
    ManageAdvisory => "manage_advisory", Operational;

    ViewCharts => "view_charts", Operational;
    ViewAdvancedAnalytics => "view_advanced_analytics", Operational;

    ViewFinancial => "view_financial", Operational;
    ManageFinancial => "manage_financial", Operational;

    ViewGoals => "view_goals", Operational;
    ManageGoals => "manage_goals", Operational;

    ViewTags => "view_tags", Operational;
    ManageTags => "manage_tags", Operational;

    ViewNotifications => "view_notifications", Operational;
    ManageNotifications => "manage_notifications", Operational;

    ViewSettings => "view_settings", Operational;
    ManageSettings => "manage_settings", Operational;
    ViewProfile => "view_profile", Operational;
    EditProfile => "edit_profile", Operational;

    ViewOffice => "view_office", TenantAdmin;
    ManageOffice => "manage_office", TenantAdmin;
    InviteUsers => "invite_users", TenantAdmin;
    ManageOfficeUsers => "manage_office_users", TenantAdmin;
    ManageOfficeSettings => "manage_office_settings", TenantAdmin;
    ViewAdmin => "view_admin", TenantAdmin;

    ManageGlobalSettings => "manage_global_settings", Platform;
    ManageAllOffices => "manage_all_offices", Platform;
    ManageSubscriptions => "manage_subscriptions", Platform;
    ViewSystemMetrics => "view_system_metrics", Platform;
    ManageSystemUsers => "manage_system_users", Platform;
}

// PermissionSet packs one bit per capability.
const _: () = assert!(Capability::ALL.len() <= 64);

impl Capability {
    fn bit(self) -> u64 {
        1u64 << (self as u8)
    }
}

impl core::fmt::Display for Capability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Capability {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Immutable set of granted capabilities.
///
/// A permission set is never patched: it is derived in full by
/// [`crate::PermissionMatrix`] and replaced wholesale. Every capability not in
/// the set reads as `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PermissionSet {
    bits: u64,
}

impl PermissionSet {
    /// The all-false set (no authenticated identity).
    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    /// Every capability granted.
    pub fn all() -> Self {
        Self::from_capabilities(Capability::ALL.iter().copied())
    }

    pub fn from_capabilities(caps: impl IntoIterator<Item = Capability>) -> Self {
        let bits = caps.into_iter().fold(0u64, |acc, cap| acc | cap.bit());
        Self { bits }
    }

    pub fn is_granted(&self, capability: Capability) -> bool {
        self.bits & capability.bit() != 0
    }

    /// Look a flag up by its serialized name. Unknown names read as `false`.
    pub fn is_granted_by_name(&self, name: &str) -> bool {
        name.parse::<Capability>()
            .map(|cap| self.is_granted(cap))
            .unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    /// Granted capabilities in declaration order.
    pub fn granted(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL
            .iter()
            .copied()
            .filter(move |cap| self.is_granted(*cap))
    }

    /// `true` when every capability of `other` is also granted here.
    pub fn is_superset_of(&self, other: &PermissionSet) -> bool {
        self.bits & other.bits == other.bits
    }

    /// `true` when at least one capability of the given scope is granted.
    pub fn grants_any_in(&self, scope: CapabilityScope) -> bool {
        self.granted().any(|cap| cap.scope() == scope)
    }
}

/// Serialized as a complete `{ "flag_name": bool }` map so consumers never
/// have to treat a missing key as "denied".
impl Serialize for PermissionSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Capability::ALL.len()))?;
        for cap in Capability::ALL {
            map.serialize_entry(cap.as_str(), &self.is_granted(*cap))?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_names_round_trip() {
        for cap in Capability::ALL {
            assert_eq!(cap.as_str().parse::<Capability>().unwrap(), *cap);
        }
        assert!("can_do_anything".parse::<Capability>().is_err());
    }

    #[test]
    fn flag_names_are_unique() {
        let mut names: Vec<&str> = Capability::ALL.iter().map(|c| c.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Capability::ALL.len());
    }

    #[test]
    fn empty_set_denies_everything() {
        let set = PermissionSet::empty();
        assert!(set.is_empty());
        assert!(Capability::ALL.iter().all(|cap| !set.is_granted(*cap)));
        assert!(!set.is_granted_by_name("view_dashboard"));
    }

    #[test]
    fn all_set_grants_everything() {
        let set = PermissionSet::all();
        assert_eq!(set.len(), Capability::ALL.len());
        assert!(set.is_superset_of(&PermissionSet::from_capabilities([Capability::ManageSystemUsers])));
    }

    #[test]
    fn unknown_flag_name_reads_false() {
        assert!(!PermissionSet::all().is_granted_by_name("launch_rockets"));
    }

    #[test]
    fn serializes_every_flag() {
        let set = PermissionSet::from_capabilities([Capability::ViewClients]);
        let json = serde_json::to_value(set).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), Capability::ALL.len());
        assert_eq!(obj["view_clients"], true);
        assert_eq!(obj["delete_clients"], false);
    }
}

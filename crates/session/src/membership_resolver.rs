//! Active tenant membership lookup.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use lexdesk_auth::ResolvedMembership;
use lexdesk_core::UserId;

use crate::config::SessionConfig;
use crate::store::MembershipStore;

/// Resolves a user's active membership together with its tenant.
///
/// Every failure mode reads as "no tenant": no active row, a store error, a
/// timeout, or a membership whose tenant row is missing.
#[derive(Clone)]
pub struct MembershipResolver {
    store: Arc<dyn MembershipStore>,
    fetch_timeout: Duration,
}

impl MembershipResolver {
    pub fn new(store: Arc<dyn MembershipStore>, config: &SessionConfig) -> Self {
        Self {
            store,
            fetch_timeout: config.membership_fetch_timeout,
        }
    }

    pub async fn resolve(&self, user_id: UserId) -> Option<ResolvedMembership> {
        let rows = match tokio::time::timeout(self.fetch_timeout, self.store.find_active(user_id)).await {
            Ok(Ok(rows)) => rows,
            Ok(Err(err)) => {
                warn!(%user_id, error = %err, "membership fetch failed, treating as no tenant");
                return None;
            }
            Err(_) => {
                warn!(%user_id, "membership fetch timed out, treating as no tenant");
                return None;
            }
        };

        let mut active = rows
            .into_iter()
            .filter(|row| row.membership.active && row.membership.user_id == user_id);

        let Some(row) = active.next() else {
            debug!(%user_id, "no active membership");
            return None;
        };

        let extra = active.count();
        if extra > 0 {
            warn!(
                %user_id,
                active_memberships = extra + 1,
                tenant_id = %row.membership.tenant_id,
                "multiple active memberships, using the first"
            );
        }

        let Some(tenant) = row.tenant else {
            warn!(%user_id, tenant_id = %row.membership.tenant_id, "membership tenant row missing, treating as no tenant");
            return None;
        };

        match ResolvedMembership::new(row.membership, tenant) {
            Ok(resolved) => Some(resolved),
            Err(err) => {
                warn!(%user_id, error = %err, "membership joined with the wrong tenant, treating as no tenant");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::memory::InMemoryMembershipStore;
    use crate::store::MembershipRow;
    use lexdesk_auth::{Membership, Role, Tenant, TenantPlan, TenantSettings};
    use lexdesk_core::TenantId;

    fn tenant(name: &str) -> Tenant {
        Tenant {
            id: TenantId::new(),
            name: name.into(),
            plan: TenantPlan::Basic,
            active: true,
            settings: TenantSettings::default(),
        }
    }

    fn row(user_id: UserId, tenant: &Tenant, role: Role, active: bool) -> MembershipRow {
        MembershipRow {
            membership: Membership {
                user_id,
                tenant_id: tenant.id,
                role,
                active,
                joined_at: Utc::now(),
            },
            tenant: Some(tenant.clone()),
        }
    }

    fn resolver(store: Arc<InMemoryMembershipStore>) -> MembershipResolver {
        let config = SessionConfig::default().with_membership_fetch_timeout(Duration::from_millis(50));
        MembershipResolver::new(store, &config)
    }

    #[tokio::test]
    async fn no_membership_is_no_tenant() {
        let store = Arc::new(InMemoryMembershipStore::new());
        assert!(resolver(store).resolve(UserId::new()).await.is_none());
    }

    #[tokio::test]
    async fn resolves_membership_with_tenant() {
        let store = Arc::new(InMemoryMembershipStore::new());
        let user_id = UserId::new();
        let office = tenant("Silva Advocacia");
        store.add(row(user_id, &office, Role::Admin, true));

        let resolved = resolver(store).resolve(user_id).await.unwrap();
        assert_eq!(resolved.tenant().id, office.id);
        assert_eq!(resolved.role(), Role::Admin);
    }

    #[tokio::test]
    async fn inactive_memberships_are_invisible() {
        let store = Arc::new(InMemoryMembershipStore::new());
        let user_id = UserId::new();
        store.add(row(user_id, &tenant("Old Office"), Role::Admin, false));
        assert!(resolver(store).resolve(user_id).await.is_none());
    }

    #[tokio::test]
    async fn first_of_multiple_actives_wins() {
        let store = Arc::new(InMemoryMembershipStore::new());
        let user_id = UserId::new();
        let first = tenant("First");
        store.add(row(user_id, &first, Role::User, true));
        store.add(row(user_id, &tenant("Second"), Role::Admin, true));

        let resolved = resolver(store).resolve(user_id).await.unwrap();
        assert_eq!(resolved.tenant().id, first.id);
        assert_eq!(resolved.role(), Role::User);
    }

    #[tokio::test]
    async fn missing_tenant_row_is_no_tenant() {
        let store = Arc::new(InMemoryMembershipStore::new());
        let user_id = UserId::new();
        let mut orphan = row(user_id, &tenant("Gone"), Role::Admin, true);
        orphan.tenant = None;
        store.add(orphan);

        assert!(resolver(store).resolve(user_id).await.is_none());
    }

    #[tokio::test]
    async fn store_failure_and_timeout_are_no_tenant() {
        let store = Arc::new(InMemoryMembershipStore::new());
        let user_id = UserId::new();
        store.add(row(user_id, &tenant("Office"), Role::Admin, true));

        store.fail_fetches(true);
        assert!(resolver(store.clone()).resolve(user_id).await.is_none());

        store.fail_fetches(false);
        store.set_fetch_delay(Duration::from_millis(200));
        assert!(resolver(store).resolve(user_id).await.is_none());
    }
}

//! Profile lookup with lazy creation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use lexdesk_auth::{Credential, NewProfile, Profile, default_role_for, email_local_part};
use lexdesk_core::{UserId, validate_email};

use crate::config::SessionConfig;
use crate::error::ResolveError;
use crate::store::{ProfileStore, StoreError};

/// Fetches a user's profile, creating it when the backend never did.
///
/// Fetches are time-bounded and never fail: a timeout or a transient store
/// error reads as "no profile" so the caller can fall back to creation.
/// Creation is idempotent under races thanks to the store's unique key, and
/// its store calls share the fetch timeout.
#[derive(Clone)]
pub struct ProfileResolver {
    store: Arc<dyn ProfileStore>,
    fetch_timeout: Duration,
    platform_owner_email: String,
}

impl ProfileResolver {
    pub fn new(store: Arc<dyn ProfileStore>, config: &SessionConfig) -> Self {
        Self {
            store,
            fetch_timeout: config.profile_fetch_timeout,
            platform_owner_email: config.platform_owner_email.clone(),
        }
    }

    pub async fn resolve(&self, user_id: UserId) -> Option<Profile> {
        match tokio::time::timeout(self.fetch_timeout, self.store.find_by_user(user_id)).await {
            Ok(Ok(profile)) => profile,
            Ok(Err(err)) => {
                warn!(%user_id, error = %err, "profile fetch failed, treating as missing");
                None
            }
            Err(_) => {
                warn!(%user_id, timeout_ms = self.fetch_timeout.as_millis() as u64, "profile fetch timed out, treating as missing");
                None
            }
        }
    }

    /// Insert a profile for `user_id`, or return the one a concurrent path
    /// created first.
    pub async fn create_if_missing(
        &self,
        user_id: UserId,
        email: &str,
        display_name: Option<&str>,
    ) -> Result<Profile, ResolveError> {
        let email = email.trim();
        validate_email(email).map_err(|err| ResolveError::CreationFailed {
            user_id,
            source: StoreError::Rejected(err.to_string()),
        })?;

        let display_name = display_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| email_local_part(email))
            .to_string();
        let role = default_role_for(email, &self.platform_owner_email);

        let new_profile = NewProfile {
            user_id,
            display_name,
            email: email.to_string(),
            role,
        };

        match self.bounded("insert", self.store.insert(new_profile)).await {
            Ok(profile) => {
                info!(%user_id, role = %profile.role, "created missing profile");
                Ok(profile)
            }
            Err(StoreError::Conflict(reason)) => {
                debug!(%user_id, reason = %reason, "profile already exists, re-fetching");
                match self.bounded("re-fetch", self.store.find_by_user(user_id)).await {
                    Ok(Some(existing)) => Ok(existing),
                    Ok(None) => Err(ResolveError::CreationFailed {
                        user_id,
                        source: StoreError::Conflict(reason),
                    }),
                    Err(source) => Err(ResolveError::CreationFailed { user_id, source }),
                }
            }
            Err(source) => {
                warn!(%user_id, error = %source, "profile creation failed");
                Err(ResolveError::CreationFailed { user_id, source })
            }
        }
    }

    async fn bounded<T>(
        &self,
        operation: &str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.fetch_timeout, call)
            .await
            .unwrap_or_else(|_| {
                Err(StoreError::Unavailable(format!(
                    "profile {operation} timed out after {} ms",
                    self.fetch_timeout.as_millis()
                )))
            })
    }

    /// Fetch, then create from the credential when nothing was found.
    pub async fn resolve_or_create(&self, credential: &Credential) -> Result<Profile, ResolveError> {
        if let Some(profile) = self.resolve(credential.user_id).await {
            return Ok(profile);
        }
        let display_name = credential.display_name(None);
        self.create_if_missing(credential.user_id, &credential.email, Some(&display_name))
            .await
    }
}

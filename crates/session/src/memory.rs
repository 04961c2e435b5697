//! In-memory adapters for dev/tests.
//!
//! Each adapter can inject latency and failures so the coordinator's
//! timeout and fallback paths can be exercised without a real backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use lexdesk_auth::{Credential, NewProfile, Profile};
use lexdesk_core::UserId;
use lexdesk_events::{EventBus, InMemoryEventBus, Subscription};

use crate::identity::{CredentialEvent, CredentialEventKind, IdentityError, IdentityProvider, SignUpMetadata};
use crate::store::{MembershipRow, MembershipStore, ProfileStore, StoreError, role_from_store};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn pause(delay: &Mutex<Duration>) {
    let delay = *lock(delay);
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Profiles
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    rows: Mutex<HashMap<UserId, Profile>>,
    fetch_delay: Mutex<Duration>,
    insert_delay: Mutex<Duration>,
    fail_fetches: AtomicBool,
    fail_inserts: AtomicBool,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a row in place, as a backend trigger would.
    pub fn seed(&self, profile: Profile) {
        lock(&self.rows).insert(profile.user_id, profile);
    }

    /// Seed a row whose role arrives as a raw stored string.
    pub fn seed_raw(
        &self,
        user_id: UserId,
        email: &str,
        display_name: &str,
        raw_role: &str,
        created_at: DateTime<Utc>,
    ) {
        self.seed(Profile {
            user_id,
            display_name: display_name.to_string(),
            email: email.to_string(),
            role: role_from_store(raw_role),
            tenant_id: None,
            created_at,
        });
    }

    pub fn get(&self, user_id: UserId) -> Option<Profile> {
        lock(&self.rows).get(&user_id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.rows).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_fetch_delay(&self, delay: Duration) {
        *lock(&self.fetch_delay) = delay;
    }

    pub fn set_insert_delay(&self, delay: Duration) {
        *lock(&self.insert_delay) = delay;
    }

    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn find_by_user(&self, user_id: UserId) -> Result<Option<Profile>, StoreError> {
        pause(&self.fetch_delay).await;
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("profile fetch failed".into()));
        }
        Ok(self.get(user_id))
    }

    async fn insert(&self, profile: NewProfile) -> Result<Profile, StoreError> {
        pause(&self.insert_delay).await;
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("profile insert failed".into()));
        }

        let mut rows = lock(&self.rows);
        if rows.contains_key(&profile.user_id) {
            return Err(StoreError::Conflict(format!("profile for user {} already exists", profile.user_id)));
        }
        let row = Profile {
            user_id: profile.user_id,
            display_name: profile.display_name,
            email: profile.email,
            role: profile.role,
            tenant_id: None,
            created_at: Utc::now(),
        };
        rows.insert(row.user_id, row.clone());
        Ok(row)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Memberships
// ─────────────────────────────────────────────────────────────────────────────

/// Returns rows in insertion order, active ones only.
#[derive(Debug, Default)]
pub struct InMemoryMembershipStore {
    rows: Mutex<Vec<MembershipRow>>,
    fetch_delay: Mutex<Duration>,
    fail_fetches: AtomicBool,
}

impl InMemoryMembershipStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, row: MembershipRow) {
        lock(&self.rows).push(row);
    }

    pub fn set_fetch_delay(&self, delay: Duration) {
        *lock(&self.fetch_delay) = delay;
    }

    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl MembershipStore for InMemoryMembershipStore {
    async fn find_active(&self, user_id: UserId) -> Result<Vec<MembershipRow>, StoreError> {
        pause(&self.fetch_delay).await;
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("membership fetch failed".into()));
        }
        Ok(lock(&self.rows)
            .iter()
            .filter(|row| row.membership.user_id == user_id && row.membership.active)
            .cloned()
            .collect())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Identity provider
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Account {
    user_id: UserId,
    email: String,
    password: String,
    confirmed: bool,
    full_name: Option<String>,
}

/// Email/password identity provider kept in memory.
///
/// Pushes a [`CredentialEvent`] on sign-in and sign-out, like a hosted
/// provider's realtime channel.
#[derive(Debug)]
pub struct InMemoryIdentityProvider {
    accounts: Mutex<HashMap<String, Account>>,
    current: Mutex<Option<Credential>>,
    bus: InMemoryEventBus<CredentialEvent>,
    probe_delay: Mutex<Duration>,
    fail_probe: AtomicBool,
    fail_sign_out: AtomicBool,
    push_events: AtomicBool,
    confirmations_sent: Mutex<Vec<String>>,
}

impl Default for InMemoryIdentityProvider {
    fn default() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            current: Mutex::new(None),
            bus: InMemoryEventBus::new(),
            probe_delay: Mutex::new(Duration::ZERO),
            fail_probe: AtomicBool::new(false),
            fail_sign_out: AtomicBool::new(false),
            push_events: AtomicBool::new(true),
            confirmations_sent: Mutex::new(Vec::new()),
        }
    }
}

fn account_key(email: &str) -> String {
    email.trim().to_lowercase()
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account directly. Returns its user id.
    pub fn add_account(&self, email: &str, password: &str, confirmed: bool) -> UserId {
        let user_id = UserId::new();
        lock(&self.accounts).insert(
            account_key(email),
            Account {
                user_id,
                email: email.trim().to_string(),
                password: password.to_string(),
                confirmed,
                full_name: None,
            },
        );
        user_id
    }

    pub fn confirm(&self, email: &str) {
        if let Some(account) = lock(&self.accounts).get_mut(&account_key(email)) {
            account.confirmed = true;
        }
    }

    pub fn user_id_of(&self, email: &str) -> Option<UserId> {
        lock(&self.accounts).get(&account_key(email)).map(|account| account.user_id)
    }

    /// Replace the provider-side session without notifying anyone (e.g. a
    /// session restored from storage before the app started).
    pub fn set_current(&self, credential: Option<Credential>) {
        *lock(&self.current) = credential;
    }

    /// Publish an arbitrary event to subscribers.
    pub fn emit(&self, event: CredentialEvent) {
        if let Err(err) = self.bus.publish(event) {
            tracing::warn!(error = ?err, "failed to publish credential event");
        }
    }

    pub fn set_probe_delay(&self, delay: Duration) {
        *lock(&self.probe_delay) = delay;
    }

    pub fn fail_probe(&self, fail: bool) {
        self.fail_probe.store(fail, Ordering::SeqCst);
    }

    pub fn fail_sign_out(&self, fail: bool) {
        self.fail_sign_out.store(fail, Ordering::SeqCst);
    }

    /// Stop (or resume) pushing events on sign-in/sign-out.
    pub fn set_push_events(&self, enabled: bool) {
        self.push_events.store(enabled, Ordering::SeqCst);
    }

    pub fn confirmations_sent(&self, email: &str) -> usize {
        let key = account_key(email);
        lock(&self.confirmations_sent).iter().filter(|sent| **sent == key).count()
    }

    fn push(&self, event: CredentialEvent) {
        if self.push_events.load(Ordering::SeqCst) {
            self.emit(event);
        }
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn current_credential(&self) -> Result<Option<Credential>, IdentityError> {
        pause(&self.probe_delay).await;
        if self.fail_probe.load(Ordering::SeqCst) {
            return Err(IdentityError::Provider("session probe failed".into()));
        }
        Ok(lock(&self.current).clone())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Credential, IdentityError> {
        let account = lock(&self.accounts)
            .get(&account_key(email))
            .cloned()
            .ok_or(IdentityError::InvalidCredentials)?;

        if account.password != password {
            return Err(IdentityError::InvalidCredentials);
        }
        if !account.confirmed {
            return Err(IdentityError::EmailNotConfirmed);
        }

        let mut credential = Credential::new(account.user_id, account.email);
        credential.metadata.full_name = account.full_name;

        *lock(&self.current) = Some(credential.clone());
        self.push(CredentialEvent::signed_in(credential.clone()));
        Ok(credential)
    }

    async fn sign_up(&self, email: &str, password: &str, metadata: SignUpMetadata) -> Result<(), IdentityError> {
        let key = account_key(email);
        {
            let mut accounts = lock(&self.accounts);
            if accounts.contains_key(&key) {
                return Err(IdentityError::AlreadyRegistered);
            }
            accounts.insert(
                key.clone(),
                Account {
                    user_id: UserId::new(),
                    email: email.trim().to_string(),
                    password: password.to_string(),
                    confirmed: false,
                    full_name: metadata.full_name,
                },
            );
        }
        lock(&self.confirmations_sent).push(key);
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(IdentityError::Provider("sign-out request failed".into()));
        }
        *lock(&self.current) = None;
        self.push(CredentialEvent::new(CredentialEventKind::SignedOut, None));
        Ok(())
    }

    async fn resend_signup_confirmation(&self, email: &str) -> Result<(), IdentityError> {
        let key = account_key(email);
        let pending = lock(&self.accounts)
            .get(&key)
            .is_some_and(|account| !account.confirmed);
        if pending {
            lock(&self.confirmations_sent).push(key);
        }
        Ok(())
    }

    fn subscribe(&self) -> Subscription<CredentialEvent> {
        self.bus.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sign_in_pushes_event_and_sets_current() {
        let idp = InMemoryIdentityProvider::new();
        let user_id = idp.add_account("ana@example.com", "secret", true);
        let mut events = idp.subscribe();

        let credential = idp.sign_in("ANA@example.com", "secret").await.unwrap();
        assert_eq!(credential.user_id, user_id);
        assert_eq!(idp.current_credential().await.unwrap(), Some(credential.clone()));
        assert_eq!(events.try_recv().unwrap(), CredentialEvent::signed_in(credential));
    }

    #[tokio::test]
    async fn sign_in_errors() {
        let idp = InMemoryIdentityProvider::new();
        idp.add_account("ana@example.com", "secret", false);

        assert_eq!(idp.sign_in("ana@example.com", "wrong").await, Err(IdentityError::InvalidCredentials));
        assert_eq!(idp.sign_in("bob@example.com", "secret").await, Err(IdentityError::InvalidCredentials));
        assert_eq!(idp.sign_in("ana@example.com", "secret").await, Err(IdentityError::EmailNotConfirmed));
    }

    #[tokio::test]
    async fn sign_up_then_resend_confirmation() {
        let idp = InMemoryIdentityProvider::new();
        idp.sign_up("new@example.com", "pw", SignUpMetadata::default()).await.unwrap();
        assert_eq!(
            idp.sign_up("new@example.com", "pw", SignUpMetadata::default()).await,
            Err(IdentityError::AlreadyRegistered)
        );

        idp.resend_signup_confirmation("new@example.com").await.unwrap();
        assert_eq!(idp.confirmations_sent("new@example.com"), 2);
    }

    #[tokio::test]
    async fn profile_insert_is_unique_per_user() {
        let store = InMemoryProfileStore::new();
        let new = NewProfile {
            user_id: UserId::new(),
            display_name: "Ana".into(),
            email: "ana@example.com".into(),
            role: lexdesk_auth::Role::User,
        };
        store.insert(new.clone()).await.unwrap();
        assert!(matches!(store.insert(new).await, Err(StoreError::Conflict(_))));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn raw_roles_are_parsed_on_seed() {
        let store = InMemoryProfileStore::new();
        let user_id = UserId::new();
        store.seed_raw(user_id, "x@example.com", "X", "owner", Utc::now());
        assert_eq!(store.get(user_id).unwrap().role, lexdesk_auth::Role::User);
    }
}

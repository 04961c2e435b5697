//! Session state machine.
//!
//! One [`SessionState`] value lives in a `watch` channel and is replaced
//! atomically. Credential changes (startup probe, provider push events,
//! `login`) bump the state's generation under the channel lock and enqueue a
//! resolution job. A single worker task drains the queue, coalescing to the
//! newest job, so at most one profile/membership resolution runs at a time;
//! its result is only applied if no newer credential change happened in the
//! meantime.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use lexdesk_auth::{Credential, Profile, ResolvedMembership, is_platform_owner_email};
use lexdesk_core::{UserId, validate_email};
use lexdesk_events::Subscription;

use crate::config::SessionConfig;
use crate::error::{ResolveError, SessionError};
use crate::guard::AccessGuard;
use crate::identity::{CredentialEvent, CredentialEventKind, IdentityProvider, SignUpMetadata};
use crate::membership_resolver::MembershipResolver;
use crate::profile_resolver::ProfileResolver;
use crate::state::{Lifecycle, SessionSnapshot, SessionState};
use crate::store::{MembershipStore, ProfileStore};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A credential waiting to be resolved, tagged with the generation that
/// observed it.
#[derive(Debug, Clone)]
struct ResolutionJob {
    generation: u64,
    credential: Credential,
}

type Resolution = Result<(Profile, Option<ResolvedMembership>), ResolveError>;

struct Tasks {
    worker: JoinHandle<()>,
    listener: JoinHandle<()>,
}

struct Inner {
    config: SessionConfig,
    identity: Arc<dyn IdentityProvider>,
    profiles: ProfileResolver,
    memberships: MembershipResolver,
    state: watch::Sender<SessionState>,
    jobs: Mutex<Option<mpsc::UnboundedSender<ResolutionJob>>>,
    shutdown: Notify,
    /// Push events carrying a credential, and whose they were.
    events_seen: AtomicU64,
    last_event_user: Mutex<Option<UserId>>,
}

/// Owns the session for one application instance.
///
/// Construct it explicitly, call [`SessionCoordinator::start`] once, and hand
/// out snapshots, receivers or [`AccessGuard`]s to readers.
pub struct SessionCoordinator {
    inner: Arc<Inner>,
    tasks: Mutex<Option<Tasks>>,
}

impl SessionCoordinator {
    pub fn new(
        config: SessionConfig,
        identity: Arc<dyn IdentityProvider>,
        profile_store: Arc<dyn ProfileStore>,
        membership_store: Arc<dyn MembershipStore>,
    ) -> Self {
        let profiles = ProfileResolver::new(profile_store, &config);
        let memberships = MembershipResolver::new(membership_store, &config);
        let (state, _) = watch::channel(SessionState::default());

        Self {
            inner: Arc::new(Inner {
                config,
                identity,
                profiles,
                memberships,
                state,
                jobs: Mutex::new(None),
                shutdown: Notify::new(),
                events_seen: AtomicU64::new(0),
                last_event_user: Mutex::new(None),
            }),
            tasks: Mutex::new(None),
        }
    }

    /// Begin initializing: subscribe to provider events, spawn the
    /// resolution worker, then probe for an existing session (bounded by
    /// `startup_probe_timeout`).
    ///
    /// Calling `start` on a running coordinator does nothing.
    pub async fn start(&self) {
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let probe_generation = {
            let mut tasks = lock(&self.tasks);
            if tasks.is_some() {
                debug!("session coordinator already started");
                return;
            }

            *lock(&self.inner.jobs) = Some(jobs_tx);
            // Enter Initializing before the listener runs, so an early push
            // event supersedes the probe instead of being reset by it.
            let probe_generation = self.inner.begin_initializing();
            // Subscribe before probing so nothing pushed during the probe is lost.
            let events = self.inner.identity.subscribe();
            *tasks = Some(Tasks {
                worker: tokio::spawn(run_worker(self.inner.clone(), jobs_rx)),
                listener: tokio::spawn(run_listener(self.inner.clone(), events)),
            });
            probe_generation
        };
        info!(generation = probe_generation, "session coordinator started, probing for existing session");

        let probe = tokio::time::timeout(
            self.inner.config.startup_probe_timeout,
            self.inner.identity.current_credential(),
        )
        .await;

        match probe {
            Ok(Ok(Some(credential))) => {
                debug!(user_id = %credential.user_id, "startup probe found a session");
                self.inner
                    .observe(Some(credential), CredentialEventKind::InitialSession, Some(probe_generation));
            }
            Ok(Ok(None)) => {
                self.inner.settle_probe(probe_generation, SessionState::unauthenticated(probe_generation));
            }
            Ok(Err(err)) => {
                warn!(error = %err, "startup probe failed");
                self.inner.settle_probe(
                    probe_generation,
                    SessionState::failed(probe_generation, None, format!("session probe failed: {err}")),
                );
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.inner.config.startup_probe_timeout.as_millis() as u64,
                    "startup probe timed out"
                );
                self.inner.settle_probe(
                    probe_generation,
                    SessionState::failed(probe_generation, None, "session probe timed out"),
                );
            }
        }
    }

    /// Stop the worker and the event listener. State is left as it was.
    pub async fn stop(&self) {
        let tasks = lock(&self.tasks).take();
        *lock(&self.inner.jobs) = None;
        self.inner.shutdown.notify_waiters();

        if let Some(tasks) = tasks {
            for handle in [tasks.worker, tasks.listener] {
                handle.abort();
                let _ = handle.await;
            }
            info!("session coordinator stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.tasks).is_some()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.borrow().snapshot()
    }

    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Receiver that sees every published state.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn guard(&self) -> AccessGuard {
        AccessGuard::new(self.inner.state.subscribe())
    }

    /// Wait until the session has left the loading states.
    pub async fn wait_until_settled(&self) -> SessionSnapshot {
        let mut rx = self.inner.state.subscribe();
        match rx.wait_for(|state| !state.lifecycle.is_loading()).await {
            Ok(state) => state.snapshot(),
            Err(_) => self.snapshot(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────────────

    /// Sign in and resolve the session before returning.
    ///
    /// The resolution is triggered here rather than left to the provider's
    /// push event, then `login` waits for it to settle and briefly polls for
    /// the push confirmation. Returns the resulting snapshot.
    pub async fn login(&self, email: &str, password: &str) -> Result<SessionSnapshot, SessionError> {
        let email = email.trim();
        validate_email(email)?;
        if password.is_empty() {
            return Err(SessionError::Validation("password is required".into()));
        }
        if !self.is_running() {
            return Err(SessionError::NotStarted);
        }

        let events_before = self.inner.events_seen.load(Ordering::SeqCst);
        let credential = self.inner.identity.sign_in(email, password).await.map_err(|err| {
            info!(error = %err, "sign-in rejected");
            SessionError::from_identity(err, email, &self.inner.config.platform_owner_email)
        })?;
        let user_id = credential.user_id;
        info!(%user_id, "signed in");

        let mut rx = self.inner.state.subscribe();
        self.inner.observe(Some(credential), CredentialEventKind::SignedIn, None);

        let settled = tokio::time::timeout(
            self.inner.config.login_resolution_timeout,
            rx.wait_for(|state| !(state.lifecycle == Lifecycle::Initializing && state.user_id() == Some(user_id))),
        )
        .await
        .is_ok();
        if !settled {
            warn!(%user_id, "session resolution still pending after login timeout");
        }

        self.await_push_confirmation(user_id, events_before).await;

        let state = self.state();
        match state.lifecycle {
            Lifecycle::Error if state.user_id() == Some(user_id) => Err(SessionError::ProfileUnavailable(
                state.error.unwrap_or_else(|| "profile could not be resolved".into()),
            )),
            _ => Ok(state.snapshot()),
        }
    }

    /// Sign-in path reserved for the platform-owner account.
    pub async fn login_platform_owner(&self, email: &str, password: &str) -> Result<SessionSnapshot, SessionError> {
        if !is_platform_owner_email(email, &self.inner.config.platform_owner_email) {
            warn!("platform-owner login attempted with another account");
            return Err(SessionError::NotPlatformOwner);
        }
        self.login(email, password).await
    }

    /// Create an account. No session results until the email is confirmed.
    pub async fn register(&self, email: &str, password: &str, display_name: &str) -> Result<(), SessionError> {
        let email = email.trim();
        validate_email(email)?;
        if password.is_empty() {
            return Err(SessionError::Validation("password is required".into()));
        }
        let full_name = Some(display_name.trim())
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        self.inner
            .identity
            .sign_up(email, password, SignUpMetadata { full_name })
            .await
            .map_err(|err| SessionError::from_identity(err, email, &self.inner.config.platform_owner_email))?;
        info!("registration submitted, awaiting email confirmation");
        Ok(())
    }

    pub async fn resend_confirmation(&self, email: &str) -> Result<(), SessionError> {
        let email = email.trim();
        validate_email(email)?;
        self.inner
            .identity
            .resend_signup_confirmation(email)
            .await
            .map_err(|err| SessionError::from_identity(err, email, &self.inner.config.platform_owner_email))?;
        debug!("signup confirmation resent");
        Ok(())
    }

    /// Sign out. Local state is cleared even when the provider call fails.
    pub async fn logout(&self) {
        if let Err(err) = self.inner.identity.sign_out().await {
            warn!(error = %err, "remote sign-out failed, clearing local session anyway");
        }
        self.inner.observe(None, CredentialEventKind::SignedOut, None);
        info!("signed out");
    }

    /// Clear the first-login flag. Idempotent.
    pub fn reset_first_login(&self) {
        self.inner.state.send_if_modified(|state| {
            if state.first_login {
                state.first_login = false;
                true
            } else {
                false
            }
        });
    }

    async fn await_push_confirmation(&self, user_id: UserId, events_before: u64) {
        let attempts = self.inner.config.login_confirm_attempts;
        for attempt in 0..=attempts {
            if self.inner.push_confirmed(user_id, events_before) {
                debug!(%user_id, attempt, "sign-in confirmed by provider event");
                return;
            }
            if attempt < attempts {
                tokio::time::sleep(self.inner.config.login_confirm_interval).await;
            }
        }
        debug!(%user_id, "no sign-in confirmation event, using resolved state");
    }
}

impl Drop for SessionCoordinator {
    fn drop(&mut self) {
        if let Some(tasks) = lock(&self.tasks).take() {
            tasks.worker.abort();
            tasks.listener.abort();
        }
    }
}

impl Inner {
    fn generation(&self) -> u64 {
        self.state.borrow().generation
    }

    fn begin_initializing(&self) -> u64 {
        let mut generation = 0;
        self.state.send_modify(|state| {
            generation = state.generation + 1;
            *state = SessionState::initializing(generation, None);
        });
        generation
    }

    /// Apply the probe's outcome unless a credential change overtook it.
    fn settle_probe(&self, probe_generation: u64, next: SessionState) {
        let lifecycle = next.lifecycle;
        let applied = self.state.send_if_modified(|state| {
            if state.generation != probe_generation {
                return false;
            }
            *state = next;
            true
        });
        if applied {
            info!(generation = probe_generation, %lifecycle, "startup probe settled");
        } else {
            debug!(generation = probe_generation, "startup probe outcome superseded");
        }
    }

    /// Record a credential change.
    ///
    /// `None` signs out immediately. A credential already ready or pending
    /// is ignored, and a token refresh for the ready user only swaps the
    /// credential. Anything else starts a new generation and queues a
    /// resolution. With `expected_generation`, nothing happens if the state
    /// has moved past that generation.
    fn observe(&self, credential: Option<Credential>, kind: CredentialEventKind, expected_generation: Option<u64>) {
        let jobs = lock(&self.jobs).clone();
        let mut outcome = "ignored";

        self.state.send_if_modified(|state| {
            if expected_generation.is_some_and(|expected| expected != state.generation) {
                outcome = "superseded";
                return false;
            }

            let Some(credential) = credential else {
                if state.lifecycle == Lifecycle::Unauthenticated {
                    return false;
                }
                *state = SessionState::unauthenticated(state.generation + 1);
                outcome = "signed_out";
                return true;
            };

            let same_credential = state.credential.as_ref() == Some(&credential);
            if same_credential && matches!(state.lifecycle, Lifecycle::Ready | Lifecycle::Initializing) {
                outcome = "duplicate";
                return false;
            }

            if kind == CredentialEventKind::TokenRefreshed
                && state.lifecycle == Lifecycle::Ready
                && state.user_id() == Some(credential.user_id)
            {
                state.credential = Some(credential);
                outcome = "token_refreshed";
                return true;
            }

            let Some(jobs) = jobs.as_ref() else {
                outcome = "not_started";
                return false;
            };

            let generation = state.generation + 1;
            *state = SessionState::initializing(generation, Some(credential.clone()));
            if jobs.send(ResolutionJob { generation, credential }).is_err() {
                *state = SessionState::failed(generation, state.credential.clone(), "resolution worker stopped");
                outcome = "worker_gone";
            } else {
                outcome = "queued";
            }
            true
        });

        debug!(?kind, outcome, generation = self.generation(), "credential change observed");
    }

    fn push_confirmed(&self, user_id: UserId, events_before: u64) -> bool {
        self.events_seen.load(Ordering::SeqCst) > events_before && *lock(&self.last_event_user) == Some(user_id)
    }

    fn record_event(&self, event: &CredentialEvent) {
        if let Some(credential) = &event.credential {
            *lock(&self.last_event_user) = Some(credential.user_id);
            self.events_seen.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn resolve(&self, credential: &Credential) -> Resolution {
        let profile = self.profiles.resolve_or_create(credential).await?;
        let membership = self.memberships.resolve(credential.user_id).await;
        Ok((profile, membership))
    }

    /// Publish a resolution result if its generation is still current.
    fn apply(&self, job: ResolutionJob, resolution: Resolution) {
        let user_id = job.credential.user_id;
        let generation = job.generation;
        let window = self.config.first_login_window_chrono();

        let next = match resolution {
            Ok((profile, membership)) => {
                SessionState::ready(generation, job.credential, profile, membership, Utc::now(), window)
            }
            Err(err) => {
                warn!(%user_id, generation, error = %err, "session resolution failed");
                SessionState::failed(generation, Some(job.credential), err.to_string())
            }
        };

        let applied = self.state.send_if_modified(|state| {
            if state.generation != generation {
                return false;
            }
            *state = next;
            true
        });

        if applied {
            let state = self.state.borrow();
            info!(
                %user_id,
                generation,
                lifecycle = %state.lifecycle,
                tenant_id = ?state.tenant.as_ref().map(|t| t.id),
                first_login = state.first_login,
                "session resolved"
            );
        } else {
            debug!(%user_id, generation, current = self.generation(), "discarding stale resolution");
        }
    }
}

/// Take the newest job, dropping everything queued before it.
fn coalesce(mut job: ResolutionJob, jobs: &mut mpsc::UnboundedReceiver<ResolutionJob>) -> ResolutionJob {
    while let Ok(next) = jobs.try_recv() {
        if next.generation >= job.generation {
            job = next;
        }
    }
    job
}

async fn run_worker(inner: Arc<Inner>, mut jobs: mpsc::UnboundedReceiver<ResolutionJob>) {
    debug!("session resolution worker started");
    loop {
        let job = tokio::select! {
            _ = inner.shutdown.notified() => break,
            job = jobs.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        let job = coalesce(job, &mut jobs);
        if job.generation != inner.generation() {
            debug!(generation = job.generation, "skipping superseded resolution job");
            continue;
        }

        let resolution = inner.resolve(&job.credential).await;
        inner.apply(job, resolution);
    }
    debug!("session resolution worker stopped");
}

async fn run_listener(inner: Arc<Inner>, mut events: Subscription<CredentialEvent>) {
    loop {
        let event = tokio::select! {
            _ = inner.shutdown.notified() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => {
                    debug!("credential event stream closed");
                    break;
                }
            },
        };

        debug!(kind = ?event.kind, user_id = ?event.credential.as_ref().map(|c| c.user_id), "credential event");
        inner.record_event(&event);
        inner.observe(event.credential, event.kind, None);
    }
}

/// Bound a wait on the state channel (used by tests and callers that want a
/// specific lifecycle).
pub async fn wait_for_lifecycle(
    rx: &mut watch::Receiver<SessionState>,
    lifecycle: Lifecycle,
    timeout: Duration,
) -> Option<SessionState> {
    match tokio::time::timeout(timeout, rx.wait_for(|state| state.lifecycle == lifecycle)).await {
        Ok(Ok(state)) => Some((*state).clone()),
        _ => None,
    }
}

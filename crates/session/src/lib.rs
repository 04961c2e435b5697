//! `lexdesk-session`: session and permission resolution.
//!
//! Turns identity-provider events into one consistent (credential, profile,
//! membership, permissions) state and exposes it to guards and the UI layer.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod guard;
pub mod identity;
pub mod membership_resolver;
pub mod memory;
pub mod profile_resolver;
pub mod state;
pub mod store;

pub use config::{DEFAULT_PLATFORM_OWNER_EMAIL, SessionConfig};
pub use coordinator::{SessionCoordinator, wait_for_lifecycle};
pub use error::{ResolveError, SessionError};
pub use guard::{AccessDecision, AccessGuard};
pub use identity::{CredentialEvent, CredentialEventKind, IdentityError, IdentityProvider, SignUpMetadata};
pub use membership_resolver::MembershipResolver;
pub use memory::{InMemoryIdentityProvider, InMemoryMembershipStore, InMemoryProfileStore};
pub use profile_resolver::ProfileResolver;
pub use state::{Lifecycle, SessionSnapshot, SessionState, SessionUser};
pub use store::{MembershipRow, MembershipStore, ProfileStore, StoreError, role_from_store};

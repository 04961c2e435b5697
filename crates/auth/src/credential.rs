use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lexdesk_core::UserId;

/// Provider-supplied user metadata (only consulted for display names).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CredentialMetadata {
    pub full_name: Option<String>,
    pub name: Option<String>,
}

/// Opaque authenticated identity issued by the identity provider.
///
/// Read-only to this workspace; two credentials are the same session when
/// every field matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Credential {
    pub user_id: UserId,
    pub email: String,
    pub issued_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: CredentialMetadata,
}

impl Credential {
    pub fn new(user_id: UserId, email: impl Into<String>) -> Self {
        Self {
            user_id,
            email: email.into(),
            issued_at: Utc::now(),
            metadata: CredentialMetadata::default(),
        }
    }

    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.metadata.full_name = Some(full_name.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.metadata.name = Some(name.into());
        self
    }

    /// Display name fallback: explicit → `full_name` → `name` → email local part.
    pub fn display_name(&self, explicit: Option<&str>) -> String {
        [explicit, self.metadata.full_name.as_deref(), self.metadata.name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|candidate| !candidate.is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| email_local_part(&self.email).to_owned())
    }
}

/// Part of an email before `@` (the whole input when there is none).
pub fn email_local_part(email: &str) -> &str {
    let email = email.trim();
    email.split_once('@').map_or(email, |(local, _)| local)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_prefers_explicit() {
        let cred = Credential::new(UserId::new(), "ana@example.com").with_full_name("Ana Lima");
        assert_eq!(cred.display_name(Some("Dra. Ana")), "Dra. Ana");
    }

    #[test]
    fn display_name_falls_back_in_order() {
        let base = Credential::new(UserId::new(), "ana@example.com");
        assert_eq!(base.clone().with_name("ana").with_full_name("Ana Lima").display_name(None), "Ana Lima");
        assert_eq!(base.clone().with_name("analima").display_name(Some("  ")), "analima");
        assert_eq!(base.display_name(None), "ana");
    }

    #[test]
    fn local_part_without_at() {
        assert_eq!(email_local_part("nobody"), "nobody");
    }
}

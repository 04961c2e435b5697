//! Coordinator configuration.

use std::time::Duration;

use serde::{Deserialize, Deserializer};

/// Default platform-owner account.
pub const DEFAULT_PLATFORM_OWNER_EMAIL: &str = "contato@vextriahub.com.br";

/// Session coordinator configuration.
///
/// Durations deserialize from integer milliseconds, except
/// `first_login_window_secs`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Email whose profile is created as `super_admin`.
    pub platform_owner_email: String,
    #[serde(rename = "profile_timeout_ms", deserialize_with = "millis")]
    pub profile_fetch_timeout: Duration,
    #[serde(rename = "membership_timeout_ms", deserialize_with = "millis")]
    pub membership_fetch_timeout: Duration,
    /// Bound on the startup "is anyone signed in?" probe.
    #[serde(rename = "probe_timeout_ms", deserialize_with = "millis")]
    pub startup_probe_timeout: Duration,
    #[serde(rename = "first_login_window_secs", deserialize_with = "secs")]
    pub first_login_window: Duration,
    /// How many times `login` checks for the provider's push confirmation.
    pub login_confirm_attempts: u32,
    #[serde(rename = "login_confirm_interval_ms", deserialize_with = "millis")]
    pub login_confirm_interval: Duration,
    /// Bound on how long `login` waits for its own resolution to settle.
    #[serde(rename = "login_timeout_ms", deserialize_with = "millis")]
    pub login_resolution_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            platform_owner_email: DEFAULT_PLATFORM_OWNER_EMAIL.to_string(),
            profile_fetch_timeout: Duration::from_millis(5_000),
            membership_fetch_timeout: Duration::from_millis(5_000),
            startup_probe_timeout: Duration::from_millis(3_000),
            first_login_window: Duration::from_secs(60),
            login_confirm_attempts: 5,
            login_confirm_interval: Duration::from_millis(100),
            login_resolution_timeout: Duration::from_millis(10_000),
        }
    }
}

fn millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}

fn secs<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_secs)
}

impl SessionConfig {
    /// Load from `LEXDESK_*` environment variables.
    ///
    /// Missing variables keep their defaults; unparsable ones are logged and
    /// ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`SessionConfig::from_env`] with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(email) = lookup("LEXDESK_PLATFORM_OWNER_EMAIL") {
            let email = email.trim();
            if email.is_empty() {
                tracing::warn!("LEXDESK_PLATFORM_OWNER_EMAIL is blank, keeping default");
            } else {
                config.platform_owner_email = email.to_string();
            }
        }

        let number = |key: &str| -> Option<u64> {
            let raw = lookup(key)?;
            match raw.trim().parse::<u64>() {
                Ok(value) => Some(value),
                Err(err) => {
                    tracing::warn!(key, value = %raw, error = %err, "ignoring unparsable config value");
                    None
                }
            }
        };

        if let Some(ms) = number("LEXDESK_PROFILE_TIMEOUT_MS") {
            config.profile_fetch_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = number("LEXDESK_MEMBERSHIP_TIMEOUT_MS") {
            config.membership_fetch_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = number("LEXDESK_PROBE_TIMEOUT_MS") {
            config.startup_probe_timeout = Duration::from_millis(ms);
        }
        if let Some(secs) = number("LEXDESK_FIRST_LOGIN_WINDOW_SECS") {
            config.first_login_window = Duration::from_secs(secs);
        }
        if let Some(attempts) = number("LEXDESK_LOGIN_CONFIRM_ATTEMPTS") {
            config.login_confirm_attempts = u32::try_from(attempts).unwrap_or(u32::MAX);
        }
        if let Some(ms) = number("LEXDESK_LOGIN_CONFIRM_INTERVAL_MS") {
            config.login_confirm_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = number("LEXDESK_LOGIN_TIMEOUT_MS") {
            config.login_resolution_timeout = Duration::from_millis(ms);
        }

        config
    }

    pub fn with_platform_owner_email(mut self, email: impl Into<String>) -> Self {
        self.platform_owner_email = email.into();
        self
    }

    pub fn with_profile_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.profile_fetch_timeout = timeout;
        self
    }

    pub fn with_membership_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.membership_fetch_timeout = timeout;
        self
    }

    pub fn with_startup_probe_timeout(mut self, timeout: Duration) -> Self {
        self.startup_probe_timeout = timeout;
        self
    }

    pub fn with_first_login_window(mut self, window: Duration) -> Self {
        self.first_login_window = window;
        self
    }

    pub fn with_login_confirmation(mut self, attempts: u32, interval: Duration) -> Self {
        self.login_confirm_attempts = attempts;
        self.login_confirm_interval = interval;
        self
    }

    pub fn with_login_resolution_timeout(mut self, timeout: Duration) -> Self {
        self.login_resolution_timeout = timeout;
        self
    }

    /// First-login window as a chrono duration (saturating).
    pub(crate) fn first_login_window_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.first_login_window).unwrap_or(chrono::Duration::MAX)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_match_reference_timeouts() {
        let config = SessionConfig::default();
        assert_eq!(config.profile_fetch_timeout, Duration::from_secs(5));
        assert_eq!(config.startup_probe_timeout, Duration::from_secs(3));
        assert_eq!(config.first_login_window, Duration::from_secs(60));
        assert_eq!(config.platform_owner_email, DEFAULT_PLATFORM_OWNER_EMAIL);
    }

    #[test]
    fn reads_overrides_from_env_lookup() {
        let config = SessionConfig::from_lookup(lookup(&[
            ("LEXDESK_PLATFORM_OWNER_EMAIL", " owner@lexdesk.test "),
            ("LEXDESK_PROFILE_TIMEOUT_MS", "250"),
            ("LEXDESK_FIRST_LOGIN_WINDOW_SECS", "120"),
            ("LEXDESK_LOGIN_CONFIRM_ATTEMPTS", "3"),
        ]));
        assert_eq!(config.platform_owner_email, "owner@lexdesk.test");
        assert_eq!(config.profile_fetch_timeout, Duration::from_millis(250));
        assert_eq!(config.first_login_window, Duration::from_secs(120));
        assert_eq!(config.login_confirm_attempts, 3);
    }

    #[test]
    fn unparsable_values_keep_defaults() {
        let config = SessionConfig::from_lookup(lookup(&[
            ("LEXDESK_PROBE_TIMEOUT_MS", "soon"),
            ("LEXDESK_PLATFORM_OWNER_EMAIL", "   "),
        ]));
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn deserializes_partial_document() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"probe_timeout_ms": 1500, "login_confirm_attempts": 2}"#).unwrap();
        assert_eq!(config.startup_probe_timeout, Duration::from_millis(1500));
        assert_eq!(config.login_confirm_attempts, 2);
        assert_eq!(config.profile_fetch_timeout, Duration::from_secs(5));
    }
}

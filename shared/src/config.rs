use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_REVEAL_CADENCE_MS: u64 = 30;
pub const DEFAULT_GRACE_PERIOD_MS: u64 = 3_000;

/// Timing and policy knobs for the deferred action coordinator.
///
/// Fixed for the lifetime of a coordinator; tests shrink or stretch the
/// durations instead of waiting on real clocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Interval between two revealed characters.
    pub reveal_cadence_ms: u64,
    /// Delay between an optimistic removal and the backend delete.
    pub grace_period_ms: u64,
    /// Starting a reveal stops every other session.
    pub exclusive_reveal: bool,
    /// Put a batch's items back into the list when the backend delete fails.
    pub restore_on_commit_failure: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            reveal_cadence_ms: DEFAULT_REVEAL_CADENCE_MS,
            grace_period_ms: DEFAULT_GRACE_PERIOD_MS,
            exclusive_reveal: true,
            restore_on_commit_failure: true,
        }
    }
}

impl CoordinatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reveal_cadence_ms == 0 {
            return Err(ConfigError::Invalid("reveal_cadence_ms must be > 0".into()));
        }
        if self.grace_period_ms == 0 {
            return Err(ConfigError::Invalid("grace_period_ms must be > 0".into()));
        }
        Ok(())
    }
}

/// Backend location and credentials handed over by the shell once the user
/// is signed in.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    base_url: String,
    auth_token: SecretString,
}

impl ApiConfig {
    pub fn new(base_url: &str, auth_token: impl Into<String>) -> Result<Self, ConfigError> {
        let parsed = Url::parse(base_url.trim()).map_err(|e| ConfigError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        if parsed.host_str().is_none() {
            return Err(ConfigError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: "missing host".into(),
            });
        }

        let auth_token = auth_token.into();
        if auth_token.trim().is_empty() {
            return Err(ConfigError::Invalid("auth token cannot be empty".into()));
        }

        Ok(Self {
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            auth_token: SecretString::new(auth_token),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Joins `path` onto the base url. `path` is expected without a leading slash.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    #[must_use]
    pub fn authorization_header(&self) -> String {
        format!("Token {}", self.auth_token.expose_secret())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_observed_timings() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.reveal_cadence_ms, 30);
        assert_eq!(config.grace_period_ms, 3_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_durations_are_rejected() {
        let config = CoordinatorConfig {
            grace_period_ms: 0,
            ..CoordinatorConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: CoordinatorConfig =
            serde_json::from_str(r#"{ "grace_period_ms": 7000 }"#).expect("valid json");
        assert_eq!(config.grace_period_ms, 7_000);
        assert_eq!(config.reveal_cadence_ms, DEFAULT_REVEAL_CADENCE_MS);
    }

    #[test]
    fn api_config_normalizes_and_joins_paths() {
        let api = ApiConfig::new("https://api.smartbites.app/api/", "abc").expect("valid");
        assert_eq!(api.base_url(), "https://api.smartbites.app/api");
        assert_eq!(
            api.endpoint("/delete-recipe/4/"),
            "https://api.smartbites.app/api/delete-recipe/4/"
        );
        assert_eq!(api.authorization_header(), "Token abc");
    }

    #[test]
    fn api_config_rejects_bad_input() {
        assert!(matches!(
            ApiConfig::new("ftp://example.com", "abc"),
            Err(ConfigError::InvalidBaseUrl { .. })
        ));
        assert!(matches!(
            ApiConfig::new("not a url", "abc"),
            Err(ConfigError::InvalidBaseUrl { .. })
        ));
        assert!(matches!(
            ApiConfig::new("https://example.com", "  "),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn token_is_redacted_in_debug_output() {
        let api = ApiConfig::new("https://example.com", "super-secret").expect("valid");
        assert!(!format!("{api:?}").contains("super-secret"));
    }
}

//! Session Configuration
//!
//! Every deployment-specific value is a named option on [`SessionConfig`].
//! Three loaders share the same option names:
//!
//! - [`SessionConfig::from_env`] reads the process environment at run time
//! - [`SessionConfig::from_build_env`] reads the environment at compile time,
//!   which is what the WASM build uses since browsers have no environment
//! - [`SessionConfig::from_toml_str`] parses an embedded TOML document
//!
//! ## Options
//!
//! | option | variable |
//! |--------|----------|
//! | `api_url` | `CHATSAN_API_URL` |
//! | `auth_url` | `CHATSAN_AUTH_URL` |
//! | `client_id` | `CHATSAN_AUTH_CLIENT_ID` |
//! | `redirect_uri` | `CHATSAN_AUTH_LOGIN_URL` |
//! | `hosted_domain` | `CHATSAN_AUTH_HD` |
//! | `callback_path` | `CHATSAN_CALLBACK_PATH` |
//! | `logout_path` | `CHATSAN_LOGOUT_PATH` |
//! | `logout_delay_ms` | `CHATSAN_LOGOUT_DELAY_MS` |
//! | `notification_ms` | `CHATSAN_NOTIFICATION_MS` |

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::ConfigError;

pub const ENV_API_URL: &str = "CHATSAN_API_URL";
pub const ENV_AUTH_URL: &str = "CHATSAN_AUTH_URL";
pub const ENV_CLIENT_ID: &str = "CHATSAN_AUTH_CLIENT_ID";
pub const ENV_REDIRECT_URI: &str = "CHATSAN_AUTH_LOGIN_URL";
pub const ENV_HOSTED_DOMAIN: &str = "CHATSAN_AUTH_HD";
pub const ENV_CALLBACK_PATH: &str = "CHATSAN_CALLBACK_PATH";
pub const ENV_LOGOUT_PATH: &str = "CHATSAN_LOGOUT_PATH";
pub const ENV_LOGOUT_DELAY_MS: &str = "CHATSAN_LOGOUT_DELAY_MS";
pub const ENV_NOTIFICATION_MS: &str = "CHATSAN_NOTIFICATION_MS";

pub const DEFAULT_CALLBACK_PATH: &str = "/login";
pub const DEFAULT_LOGOUT_PATH: &str = "/logout";
pub const DEFAULT_LOGOUT_DELAY_MS: u64 = 100;
pub const DEFAULT_NOTIFICATION_MS: u64 = 4000;

/// Configuration for the session controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Base URL of the backend API
    pub api_url: String,
    /// Identity provider authorization endpoint
    pub auth_url: String,
    /// OAuth client ID, also the expected `aud` claim
    pub client_id: String,
    /// Where the provider sends the user back to
    pub redirect_uri: String,
    /// Expected `hd` claim
    pub hosted_domain: String,
    #[serde(default = "default_callback_path")]
    pub callback_path: String,
    #[serde(default = "default_logout_path")]
    pub logout_path: String,
    /// Delay between dispatching the revoke call and clearing tokens
    #[serde(default = "default_logout_delay_ms")]
    pub logout_delay_ms: u64,
    /// Auto-dismiss time for non-error notifications
    #[serde(default = "default_notification_ms")]
    pub notification_ms: u64,
}

fn default_callback_path() -> String {
    DEFAULT_CALLBACK_PATH.to_string()
}

fn default_logout_path() -> String {
    DEFAULT_LOGOUT_PATH.to_string()
}

fn default_logout_delay_ms() -> u64 {
    DEFAULT_LOGOUT_DELAY_MS
}

fn default_notification_ms() -> u64 {
    DEFAULT_NOTIFICATION_MS
}

impl SessionConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from values captured at compile time.
    pub fn from_build_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| {
            let value = match key {
                ENV_API_URL => option_env!("CHATSAN_API_URL"),
                ENV_AUTH_URL => option_env!("CHATSAN_AUTH_URL"),
                ENV_CLIENT_ID => option_env!("CHATSAN_AUTH_CLIENT_ID"),
                ENV_REDIRECT_URI => option_env!("CHATSAN_AUTH_LOGIN_URL"),
                ENV_HOSTED_DOMAIN => option_env!("CHATSAN_AUTH_HD"),
                ENV_CALLBACK_PATH => option_env!("CHATSAN_CALLBACK_PATH"),
                ENV_LOGOUT_PATH => option_env!("CHATSAN_LOGOUT_PATH"),
                ENV_LOGOUT_DELAY_MS => option_env!("CHATSAN_LOGOUT_DELAY_MS"),
                ENV_NOTIFICATION_MS => option_env!("CHATSAN_NOTIFICATION_MS"),
                _ => None,
            };
            value.map(str::to_string)
        })
    }

    /// Parse a TOML document using the option names as keys.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: SessionConfig =
            toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()
    }

    /// Build a config from any key/value source keyed by the `CHATSAN_*` names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));
        let number = |key: &'static str, default: u64| match get(key) {
            Some(value) => value.parse::<u64>().map_err(|_| ConfigError::InvalidNumber {
                field: key,
                value,
            }),
            None => Ok(default),
        };

        let config = SessionConfig {
            api_url: required(ENV_API_URL)?,
            auth_url: required(ENV_AUTH_URL)?,
            client_id: required(ENV_CLIENT_ID)?,
            redirect_uri: required(ENV_REDIRECT_URI)?,
            hosted_domain: required(ENV_HOSTED_DOMAIN)?,
            callback_path: get(ENV_CALLBACK_PATH).unwrap_or_else(default_callback_path),
            logout_path: get(ENV_LOGOUT_PATH).unwrap_or_else(default_logout_path),
            logout_delay_ms: number(ENV_LOGOUT_DELAY_MS, DEFAULT_LOGOUT_DELAY_MS)?,
            notification_ms: number(ENV_NOTIFICATION_MS, DEFAULT_NOTIFICATION_MS)?,
        };
        config.validate()
    }

    /// Check required values and URL shapes.
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::Missing("client_id"));
        }
        if self.hosted_domain.trim().is_empty() {
            return Err(ConfigError::Missing("hosted_domain"));
        }
        check_url("api_url", &self.api_url)?;
        check_url("auth_url", &self.auth_url)?;
        check_url("redirect_uri", &self.redirect_uri)?;

        debug!(
            api_url = %self.api_url,
            auth_url = %self.auth_url,
            callback_path = %self.callback_path,
            "Session configuration loaded"
        );
        Ok(self)
    }

    /// Absolute URL for a backend path such as `auth/token`.
    pub fn api_endpoint(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.api_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn logout_delay(&self) -> Duration {
        Duration::from_millis(self.logout_delay_ms)
    }

    pub fn notification_duration(&self) -> Duration {
        Duration::from_millis(self.notification_ms)
    }
}

fn check_url(field: &'static str, raw: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::InvalidUrl {
        field,
        value: raw.to_string(),
    };
    let parsed = Url::parse(raw.trim()).map_err(|_| invalid())?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(invalid());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_values() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            (ENV_API_URL, "https://api.example.com/"),
            (ENV_AUTH_URL, "https://accounts.example.com/o/oauth2/v2/auth"),
            (ENV_CLIENT_ID, "client-123"),
            (ENV_REDIRECT_URI, "https://chat.example.com/login"),
            (ENV_HOSTED_DOMAIN, "example.com"),
        ])
    }

    #[test]
    fn test_lookup_applies_defaults() {
        let values = base_values();
        let config =
            SessionConfig::from_lookup(|key| values.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.client_id, "client-123");
        assert_eq!(config.callback_path, "/login");
        assert_eq!(config.logout_path, "/logout");
        assert_eq!(config.logout_delay(), Duration::from_millis(100));
        assert_eq!(config.notification_duration(), Duration::from_millis(4000));
    }

    #[test]
    fn test_lookup_missing_value() {
        let mut values = base_values();
        values.remove(ENV_CLIENT_ID);
        let err = SessionConfig::from_lookup(|key| values.get(key).map(|v| v.to_string()))
            .unwrap_err();
        assert_eq!(err, ConfigError::Missing(ENV_CLIENT_ID));
    }

    #[test]
    fn test_lookup_rejects_bad_number_and_url() {
        let mut values = base_values();
        values.insert(ENV_LOGOUT_DELAY_MS, "soon");
        let err = SessionConfig::from_lookup(|key| values.get(key).map(|v| v.to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { .. }));

        let mut values = base_values();
        values.insert(ENV_API_URL, "ftp://api.example.com");
        let err = SessionConfig::from_lookup(|key| values.get(key).map(|v| v.to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { field: "api_url", .. }));
    }

    #[test]
    fn test_toml_config() {
        let config = SessionConfig::from_toml_str(
            r#"
            api_url = "https://api.example.com"
            auth_url = "https://accounts.example.com/auth"
            client_id = "client-123"
            redirect_uri = "https://chat.example.com/login"
            hosted_domain = "example.com"
            logout_delay_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.logout_delay_ms, 250);
        assert_eq!(config.notification_ms, DEFAULT_NOTIFICATION_MS);

        let err = SessionConfig::from_toml_str("api_url = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_api_endpoint_join() {
        let values = base_values();
        let config =
            SessionConfig::from_lookup(|key| values.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(
            config.api_endpoint("auth/token"),
            "https://api.example.com/auth/token"
        );
        assert_eq!(
            config.api_endpoint("/rooms"),
            "https://api.example.com/rooms"
        );
        assert_eq!(
            config.api_endpoint("https://other.example.com/x"),
            "https://other.example.com/x"
        );
    }
}

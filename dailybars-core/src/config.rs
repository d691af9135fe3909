//! Client configuration: credential and service endpoint.
//!
//! The credential is read exactly once, into a [`ClientConfig`] value that is
//! then handed to the client constructor. Three sources are supported:
//! - the process environment (optionally seeded from a `.env` file)
//! - a TOML file (`dailybars.toml`), falling back to the environment for the key
//! - an explicit value, which is what tests use

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Environment variable holding the Alpha Vantage API key.
pub const API_KEY_VAR: &str = "ALPHAVANTAGE_API_KEY";

/// Optional environment override for the service base URL.
pub const BASE_URL_VAR: &str = "ALPHAVANTAGE_BASE_URL";

/// Production Alpha Vantage endpoint.
pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co";

/// Configuration failures. Always fatal to the construction attempt.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("{name} is not set (export it or add it to .env)")]
    MissingCredential { name: &'static str },

    #[error("failed to read config file {}: {reason}", .path.display())]
    Unreadable { path: PathBuf, reason: String },

    #[error("invalid config file: {0}")]
    Invalid(String),

    #[error("failed to initialise HTTP client: {0}")]
    HttpClient(String),
}

/// Opaque API credential. Never blank; `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Returns `None` for empty or whitespace-only input.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Everything the client needs at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    api_key: Option<ApiKey>,
    base_url: String,
}

/// On-disk shape of `dailybars.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    api_key: Option<String>,
    base_url: Option<String>,
}

impl ClientConfig {
    /// Config with an explicit credential and the production endpoint.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: ApiKey::new(api_key),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Config with no credential at all. Client construction will fail.
    pub fn without_credential() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Read the process environment, seeding it from `.env` first if present.
    pub fn from_env() -> Self {
        load_dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup instead of the real environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let base_url = lookup(BASE_URL_VAR)
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            api_key: lookup(API_KEY_VAR).and_then(ApiKey::new),
            base_url,
        }
    }

    /// Load a TOML config file. A key missing from the file falls back to the environment.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigurationError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigurationError::Unreadable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        let config = Self::from_toml(&content)?;
        if config.api_key.is_some() {
            return Ok(config);
        }
        load_dotenv();
        Ok(config.or_key_from(|name| std::env::var(name).ok()))
    }

    /// Parse a TOML config string. No environment fallback.
    pub fn from_toml(content: &str) -> Result<Self, ConfigurationError> {
        let file: FileConfig =
            toml::from_str(content).map_err(|e| ConfigurationError::Invalid(e.to_string()))?;
        Ok(Self {
            api_key: file.api_key.and_then(ApiKey::new),
            base_url: file
                .base_url
                .filter(|url| !url.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }

    /// Fill in a missing credential from `lookup`; an existing one is kept.
    pub fn or_key_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if self.api_key.is_none() {
            self.api_key = lookup(API_KEY_VAR).and_then(ApiKey::new);
        }
        self
    }

    pub fn api_key(&self) -> Option<&ApiKey> {
        self.api_key.as_ref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The credential, or the construction-time error naming the missing variable.
    pub fn require_api_key(&self) -> Result<&ApiKey, ConfigurationError> {
        self.api_key
            .as_ref()
            .ok_or(ConfigurationError::MissingCredential { name: API_KEY_VAR })
    }
}

fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => debug!(path = %path.display(), "loaded environment from .env"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(error = %e, "ignoring unreadable .env file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn blank_keys_are_rejected() {
        assert!(ApiKey::new("").is_none());
        assert!(ApiKey::new("   ").is_none());
        assert_eq!(ApiKey::new(" demo ").unwrap().expose(), "demo");
    }

    #[test]
    fn debug_output_redacts_key() {
        let config = ClientConfig::new("super-secret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn lookup_reads_key_and_base_url() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            (API_KEY_VAR, "abc123"),
            (BASE_URL_VAR, "http://localhost:8080"),
        ]));
        assert_eq!(config.require_api_key().unwrap().expose(), "abc123");
        assert_eq!(config.base_url(), "http://localhost:8080");
    }

    #[test]
    fn missing_key_names_the_variable() {
        let config = ClientConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);
        let err = config.require_api_key().unwrap_err();
        assert!(err.to_string().contains(API_KEY_VAR));
        assert!(matches!(
            err,
            ConfigurationError::MissingCredential { name: API_KEY_VAR }
        ));
    }

    #[test]
    fn empty_env_value_counts_as_missing() {
        let config = ClientConfig::from_lookup(lookup_from(&[(API_KEY_VAR, "")]));
        assert!(config.require_api_key().is_err());
    }

    #[test]
    fn toml_with_key_and_url() {
        let config = ClientConfig::from_toml(
            r#"
            api_key = "from-file"
            base_url = "http://127.0.0.1:9000"
            "#,
        )
        .unwrap();
        assert_eq!(config.require_api_key().unwrap().expose(), "from-file");
        assert_eq!(config.base_url(), "http://127.0.0.1:9000");
    }

    #[test]
    fn toml_without_key_falls_back_to_lookup() {
        let config = ClientConfig::from_toml("")
            .unwrap()
            .or_key_from(lookup_from(&[(API_KEY_VAR, "from-env")]));
        assert_eq!(config.require_api_key().unwrap().expose(), "from-env");
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn file_key_wins_over_lookup() {
        let config = ClientConfig::from_toml(r#"api_key = "from-file""#)
            .unwrap()
            .or_key_from(lookup_from(&[(API_KEY_VAR, "from-env")]));
        assert_eq!(config.require_api_key().unwrap().expose(), "from-file");
    }

    #[test]
    fn blank_base_url_falls_back_to_default() {
        let config = ClientConfig::from_toml("base_url = \"  \"").unwrap();
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);

        let config = ClientConfig::from_lookup(lookup_from(&[(BASE_URL_VAR, "")]));
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn unknown_toml_fields_are_rejected() {
        let err = ClientConfig::from_toml(r#"apikey = "typo""#).unwrap_err();
        assert!(matches!(err, ConfigurationError::Invalid(_)));
    }

    #[test]
    fn unreadable_file_reports_path() {
        let path = Path::new("/definitely/not/here/dailybars.toml");
        let err = ClientConfig::from_toml_file(path).unwrap_err();
        assert!(err.to_string().contains("dailybars.toml"));
    }
}

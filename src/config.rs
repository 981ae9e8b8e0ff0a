use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ReportError, Result};

pub const API_URL_ENV: &str = "ATTENDANCE_API_URL";
pub const API_TOKEN_ENV: &str = "ATTENDANCE_API_TOKEN";

/// Connection settings for the report API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the attendance API, e.g. `https://attendance.example.org/api`.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Bearer token sent with every request.
    #[serde(default)]
    pub token: Option<String>,

    /// Client-side request timeout. Unset means requests may wait indefinitely.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ReportError::Config(format!("Failed to read config file: {}", e)))?;

        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let content = substitute_env_vars(content);

        toml::from_str(&content)
            .map_err(|e| ReportError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Apply `ATTENDANCE_API_URL` / `ATTENDANCE_API_TOKEN` when set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            self.base_url = Some(url);
        }
        if let Ok(token) = std::env::var(API_TOKEN_ENV) {
            self.token = Some(token);
        }
        self
    }

    pub fn base_url(&self) -> Result<&str> {
        self.base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                ReportError::Config(format!(
                    "base_url is not set (use a config file or {})",
                    API_URL_ENV
                ))
            })
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

fn substitute_env_vars(content: &str) -> String {
    let mut result = content.to_string();
    let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid pattern");

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let config = ClientConfig::parse_toml(r#"base_url = "http://localhost:5000/""#).unwrap();
        assert_eq!(config.base_url().unwrap(), "http://localhost:5000");
        assert!(config.token.is_none());
        assert!(config.timeout().is_none());
    }

    #[test]
    fn test_env_substitution() {
        std::env::set_var("ATTENDANCE_REPORT_TEST_TOKEN", "s3cret");
        let config = ClientConfig::parse_toml(
            r#"
                base_url = "http://localhost:5000"
                token = "${ATTENDANCE_REPORT_TEST_TOKEN}"
                timeout_secs = 15
            "#,
        )
        .unwrap();
        assert_eq!(config.token.as_deref(), Some("s3cret"));
        assert_eq!(config.timeout(), Some(Duration::from_secs(15)));
    }

    #[test]
    fn test_missing_base_url_is_a_config_error() {
        let config = ClientConfig::default();
        assert!(matches!(config.base_url(), Err(ReportError::Config(_))));
    }

    #[test]
    fn test_malformed_toml() {
        assert!(ClientConfig::parse_toml("base_url = ").is_err());
    }
}

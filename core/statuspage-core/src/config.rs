//! Client configuration.
//!
//! Loaded from `~/.statuspage/client.toml` (or `STATUSPAGE_CONFIG`), then
//! overridden by environment variables. A missing file means defaults.
//!
//! ```toml
//! api_base_url = "https://status.example.com"
//!
//! [reconnect]
//! mode = "backoff"
//! initial_delay_ms = 500
//! max_delay_ms = 30000
//! max_attempts = 8
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::backoff::ReconnectPolicy;
use crate::error::{LiveError, Result};

const DEFAULT_CONFIG_RELATIVE_PATH: &str = ".statuspage/client.toml";

pub const ENV_API_BASE_URL: &str = "STATUSPAGE_API_BASE_URL";
pub const ENV_TOKEN: &str = "STATUSPAGE_TOKEN";
pub const ENV_CONFIG: &str = "STATUSPAGE_CONFIG";

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReconnectMode {
    #[default]
    Never,
    Backoff,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ReconnectConfig {
    #[serde(default)]
    pub mode: ReconnectMode,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        ReconnectConfig {
            mode: ReconnectMode::Never,
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl ReconnectConfig {
    pub fn to_policy(&self) -> ReconnectPolicy {
        match self.mode {
            ReconnectMode::Never => ReconnectPolicy::Never,
            ReconnectMode::Backoff => ReconnectPolicy::Backoff {
                initial: Duration::from_millis(self.initial_delay_ms.max(1)),
                max: Duration::from_millis(self.max_delay_ms.max(self.initial_delay_ms)),
                max_attempts: self.max_attempts,
            },
        }
    }
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    8
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    /// Never read from the file; only `STATUSPAGE_TOKEN` sets it.
    #[serde(skip)]
    pub token: Option<String>,
}

impl ClientConfig {
    /// Applies environment overrides through `lookup`, so tests need not
    /// touch the process environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base) = lookup(ENV_API_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.api_base_url = Some(base);
        }
        if let Some(token) = lookup(ENV_TOKEN).filter(|v| !v.trim().is_empty()) {
            self.token = Some(token);
        }
    }

    pub fn base_url(&self) -> Result<Url> {
        let raw = self
            .api_base_url
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .ok_or(LiveError::MissingBaseUrl)?;
        Url::parse(raw).map_err(|err| {
            LiveError::Endpoint(statuspage_protocol::EndpointError::InvalidBase {
                address: raw.to_string(),
                details: err.to_string(),
            })
        })
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        self.reconnect.to_policy()
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(DEFAULT_CONFIG_RELATIVE_PATH))
}

/// Reads the config file only. `None` falls back to `STATUSPAGE_CONFIG`, then
/// the default path.
pub fn load_client_config(path: Option<PathBuf>) -> Result<ClientConfig> {
    let config_path = match path.or_else(|| std::env::var_os(ENV_CONFIG).map(PathBuf::from)) {
        Some(path) => path,
        None => match default_config_path() {
            Some(path) => path,
            None => return Ok(ClientConfig::default()),
        },
    };
    read_config_file(&config_path)
}

/// File config with the process environment applied on top.
pub fn resolve_client_config(path: Option<PathBuf>) -> Result<ClientConfig> {
    let mut config = load_client_config(path)?;
    config.apply_env(|key| std::env::var(key).ok());
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<ClientConfig> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No client config file; using defaults");
        return Ok(ClientConfig::default());
    }

    let content = fs_err::read_to_string(path).map_err(|source| LiveError::ConfigReadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str::<ClientConfig>(&content).map_err(|err| LiveError::ConfigMalformed {
        path: path.to_path_buf(),
        details: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_when_file_missing() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let config =
            load_client_config(Some(temp_dir.path().join("missing.toml"))).expect("load config");
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.reconnect_policy(), ReconnectPolicy::Never);
        assert!(matches!(config.base_url(), Err(LiveError::MissingBaseUrl)));
    }

    #[test]
    fn parses_base_url_and_backoff() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("client.toml");
        fs_err::write(
            &path,
            r#"
api_base_url = "https://status.example.com/api"

[reconnect]
mode = "backoff"
initial_delay_ms = 250
max_attempts = 3
"#,
        )
        .expect("write config");

        let config = load_client_config(Some(path)).expect("load config");
        assert_eq!(
            config.base_url().expect("base url").as_str(),
            "https://status.example.com/api"
        );
        assert_eq!(
            config.reconnect_policy(),
            ReconnectPolicy::Backoff {
                initial: Duration::from_millis(250),
                max: Duration::from_millis(30_000),
                max_attempts: 3,
            }
        );
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("client.toml");
        fs_err::write(&path, "[reconnect]\nmode = \"sometimes\"\n").expect("write config");

        assert!(matches!(
            load_client_config(Some(path)),
            Err(LiveError::ConfigMalformed { .. })
        ));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = ClientConfig {
            api_base_url: Some("http://localhost:8080".to_string()),
            ..ClientConfig::default()
        };
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_API_BASE_URL, "https://status.example.com"),
            (ENV_TOKEN, "secret"),
        ]);
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(
            config.api_base_url.as_deref(),
            Some("https://status.example.com")
        );
        assert_eq!(config.token.as_deref(), Some("secret"));
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut config = ClientConfig {
            api_base_url: Some("http://localhost:8080".to_string()),
            ..ClientConfig::default()
        };
        config.apply_env(|_| Some("  ".to_string()));
        assert_eq!(config.api_base_url.as_deref(), Some("http://localhost:8080"));
        assert_eq!(config.token, None);
    }

    #[test]
    fn invalid_base_url_is_reported() {
        let config = ClientConfig {
            api_base_url: Some("not a url".to_string()),
            ..ClientConfig::default()
        };
        assert!(matches!(config.base_url(), Err(LiveError::Endpoint(_))));
    }
}

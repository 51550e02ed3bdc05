//! MsgSync configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main MsgSync configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Messaging REST API configuration
    pub api: ApiConfig,

    /// WebSocket transport configuration
    pub realtime: RealtimeConfig,

    /// Polling fallback configuration
    pub sync: SyncConfig,

    /// Log level override (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .msgsync.yml
        let local_config = PathBuf::from(".msgsync.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/msgsync/msgsync.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("msgsync").join("msgsync.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level from the config file, for early logging setup
    ///
    /// Full config loading may itself want to log, so the level is fished
    /// out with a minimal parse first.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let path = match config_path {
            Some(p) => p.clone(),
            None => {
                let local = PathBuf::from(".msgsync.yml");
                if local.exists() {
                    local
                } else {
                    dirs::config_dir().map(|d| d.join("msgsync").join("msgsync.yml"))?
                }
            }
        };

        let content = fs::read_to_string(path).ok()?;
        let value: serde_yaml::Value = serde_yaml::from_str(&content).ok()?;
        value.get("log-level").and_then(|v| v.as_str()).map(String::from)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Messaging REST API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Environment variable containing the bearer token
    #[serde(rename = "token-env")]
    pub token_env: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.uat1-engy-partners.com/message".to_string(),
            token_env: "MSGSYNC_TOKEN".to_string(),
            timeout_ms: 30_000,
        }
    }
}

/// WebSocket transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Explicit WebSocket URL; derived from the API base URL when unset
    #[serde(rename = "ws-url", skip_serializing_if = "Option::is_none")]
    pub ws_url: Option<String>,

    /// Initial reconnect delay in milliseconds
    #[serde(rename = "reconnect-initial-delay-ms")]
    pub reconnect_initial_delay_ms: u64,

    /// Maximum reconnect delay in milliseconds (backoff cap)
    #[serde(rename = "reconnect-max-delay-ms")]
    pub reconnect_max_delay_ms: u64,

    /// Maximum reconnect attempts before giving up; unset retries forever
    #[serde(rename = "max-reconnect-attempts", skip_serializing_if = "Option::is_none")]
    pub max_reconnect_attempts: Option<u32>,

    /// Active establishment id, forwarded as a query parameter
    #[serde(rename = "etab-id", skip_serializing_if = "Option::is_none")]
    pub etab_id: Option<String>,

    /// Active role, forwarded as a query parameter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            ws_url: None,
            reconnect_initial_delay_ms: 1_000,
            reconnect_max_delay_ms: 30_000,
            max_reconnect_attempts: Some(5),
            etab_id: None,
            role: None,
        }
    }
}

impl RealtimeConfig {
    /// Resolve the WebSocket URL, deriving it from the API base URL when
    /// not configured explicitly
    pub fn resolved_ws_url(&self, api_base_url: &str) -> String {
        match &self.ws_url {
            Some(url) => url.clone(),
            None => derive_ws_url(api_base_url),
        }
    }
}

/// Convert an http(s) API base URL into the ws(s) endpoint URL
fn derive_ws_url(base_url: &str) -> String {
    let ws_base = if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base_url.to_string()
    };

    format!("{}/ws", ws_base.trim_end_matches('/'))
}

/// Polling fallback configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Poll interval in milliseconds while the transport is down
    #[serde(rename = "poll-interval-ms")]
    pub poll_interval_ms: u64,

    /// Event bus channel capacity
    #[serde(rename = "event-channel-capacity")]
    pub event_channel_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
            event_channel_capacity: 1_024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.api.token_env, "MSGSYNC_TOKEN");
        assert_eq!(config.sync.poll_interval_ms, 5_000);
        assert_eq!(config.realtime.max_reconnect_attempts, Some(5));
        assert_eq!(config.realtime.reconnect_max_delay_ms, 30_000);
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
api:
  base-url: https://messaging.example.com/api
  token-env: MY_TOKEN
  timeout-ms: 10000

realtime:
  ws-url: wss://messaging.example.com/ws
  reconnect-initial-delay-ms: 500
  max-reconnect-attempts: 3

sync:
  poll-interval-ms: 2000
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.api.base_url, "https://messaging.example.com/api");
        assert_eq!(config.api.token_env, "MY_TOKEN");
        assert_eq!(config.realtime.ws_url.as_deref(), Some("wss://messaging.example.com/ws"));
        assert_eq!(config.realtime.reconnect_initial_delay_ms, 500);
        assert_eq!(config.realtime.max_reconnect_attempts, Some(3));
        assert_eq!(config.sync.poll_interval_ms, 2_000);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
sync:
  poll-interval-ms: 1000
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        // Specified value
        assert_eq!(config.sync.poll_interval_ms, 1_000);

        // Defaults for unspecified
        assert_eq!(config.api.token_env, "MSGSYNC_TOKEN");
        assert_eq!(config.sync.event_channel_capacity, 1_024);
        assert_eq!(config.realtime.reconnect_initial_delay_ms, 1_000);
    }

    #[test]
    fn test_load_explicit_path() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("msgsync.yml");
        std::fs::write(&path, "sync:\n  poll-interval-ms: 750\nlog-level: DEBUG\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.sync.poll_interval_ms, 750);
        assert_eq!(config.log_level.as_deref(), Some("DEBUG"));

        assert_eq!(Config::load_log_level(Some(&path)).as_deref(), Some("DEBUG"));
    }

    #[test]
    fn test_load_missing_explicit_path_is_an_error() {
        let path = PathBuf::from("/nonexistent/msgsync.yml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_derive_ws_url() {
        assert_eq!(derive_ws_url("https://api.example.com/message"), "wss://api.example.com/message/ws");
        assert_eq!(derive_ws_url("https://api.example.com/message/"), "wss://api.example.com/message/ws");
        assert_eq!(derive_ws_url("http://localhost:8080"), "ws://localhost:8080/ws");
    }

    #[test]
    fn test_resolved_ws_url_prefers_explicit() {
        let realtime = RealtimeConfig {
            ws_url: Some("wss://elsewhere.example.com/socket".to_string()),
            ..Default::default()
        };
        assert_eq!(realtime.resolved_ws_url("https://api.example.com"), "wss://elsewhere.example.com/socket");

        let derived = RealtimeConfig::default();
        assert_eq!(derived.resolved_ws_url("https://api.example.com"), "wss://api.example.com/ws");
    }
}

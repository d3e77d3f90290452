//! Configuration for the gemimg plugin.
//!
//! Loaded from a JSON file (default `~/.gemimg/config.json`), with defaults
//! matching the stock plugin distribution.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (`GEMINI_API_KEY` always wins for the key;
//!    `GOOGLE_API_KEY` only fills an empty one)
//! 2. Explicit config file values
//! 3. Default values

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".gemimg"),
        |dirs| dirs.home_dir().join(".gemimg"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Top-level plugin configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Master switch. A disabled plugin passes every message through.
    #[serde(default = "default_enable")]
    pub enable: bool,

    /// Gemini API key. Overridable via `GEMINI_API_KEY` / `GOOGLE_API_KEY`.
    #[serde(default)]
    pub gemini_api_key: String,

    /// Model used for all image calls.
    #[serde(default = "default_model")]
    pub model: String,

    /// Command prefix lists, one per handler category.
    #[serde(default)]
    pub commands: CommandsConfig,

    /// Session inactivity TTL in seconds.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    /// Inbound image cache TTL in seconds.
    #[serde(default = "default_image_cache_ttl_secs")]
    pub image_cache_ttl_secs: u64,

    /// Maximum pending images collected for a merge flow.
    #[serde(default = "default_max_merge_images")]
    pub max_merge_images: usize,

    /// Maximum conversation turns kept per session.
    #[serde(default = "default_max_history_turns")]
    pub max_history_turns: usize,

    /// Directory (relative or absolute) where produced images are saved.
    #[serde(default = "default_save_path")]
    pub save_path: String,

    /// Proxy settings for reaching the Gemini endpoint.
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Retry budget for upstream calls.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Logging settings.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Command prefix lists. Order within a list is cosmetic; matching is
/// longest-prefix-wins across all lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandsConfig {
    #[serde(default = "default_generate_commands")]
    pub generate: Vec<String>,
    #[serde(default = "default_edit_commands")]
    pub edit: Vec<String>,
    #[serde(default = "default_merge_commands")]
    pub merge: Vec<String>,
    #[serde(default = "default_reverse_commands")]
    pub reverse: Vec<String>,
    #[serde(default = "default_enhance_commands")]
    pub enhance: Vec<String>,
    #[serde(default = "default_analyze_commands")]
    pub analyze: Vec<String>,
    #[serde(default = "default_exit_commands")]
    pub exit: Vec<String>,
    #[serde(default = "default_help_commands")]
    pub help: Vec<String>,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            generate: default_generate_commands(),
            edit: default_edit_commands(),
            merge: default_merge_commands(),
            reverse: default_reverse_commands(),
            enhance: default_enhance_commands(),
            analyze: default_analyze_commands(),
            exit: default_exit_commands(),
            help: default_help_commands(),
        }
    }
}

/// Proxy settings. `use_proxy_service` routes calls through a relay that
/// accepts Bearer auth; `enable_proxy` sets an HTTP proxy for direct calls.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProxyConfig {
    #[serde(default)]
    pub enable_proxy: bool,
    #[serde(default)]
    pub proxy_url: String,
    #[serde(default)]
    pub use_proxy_service: bool,
    #[serde(default)]
    pub proxy_service_url: String,
}

/// Retry budget for upstream calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base backoff delay in milliseconds (doubles with each retry).
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    /// Maximum backoff delay in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_enable() -> bool {
    true
}

fn default_model() -> String {
    "gemini-2.0-flash-exp-image-generation".into()
}

fn default_generate_commands() -> Vec<String> {
    vec!["#生成图片".into(), "#画图".into(), "#图片生成".into()]
}

fn default_edit_commands() -> Vec<String> {
    vec!["#编辑图片".into(), "#修改图片".into()]
}

fn default_merge_commands() -> Vec<String> {
    vec!["#融合图片".into(), "#合并图片".into()]
}

fn default_reverse_commands() -> Vec<String> {
    vec!["#反推提示".into(), "#图片反推".into()]
}

fn default_enhance_commands() -> Vec<String> {
    vec!["#扩写提示".into(), "#优化提示".into()]
}

fn default_analyze_commands() -> Vec<String> {
    vec!["#分析图片".into(), "#解读图片".into()]
}

fn default_exit_commands() -> Vec<String> {
    vec![
        "#结束对话".into(),
        "#退出对话".into(),
        "#关闭对话".into(),
        "#结束".into(),
    ]
}

fn default_help_commands() -> Vec<String> {
    vec!["#画图帮助".into()]
}

fn default_session_ttl_secs() -> u64 {
    600
}

fn default_image_cache_ttl_secs() -> u64 {
    300
}

fn default_max_merge_images() -> usize {
    3
}

fn default_max_history_turns() -> usize {
    10
}

fn default_save_path() -> String {
    "temp".into()
}

fn default_max_retries() -> u32 {
    2
}

fn default_base_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    10_000
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

impl Default for Config {
    fn default() -> Self {
        // All fields have serde defaults, so an empty object is the default.
        serde_json::from_str("{}").unwrap_or_else(|_| unreachable!())
    }
}

impl Config {
    /// Load configuration from the default path, falling back to defaults if
    /// the file does not exist.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            tracing::warn!(path = %path.display(), "Config file not found, using defaults");
            Ok(Self::default().with_env_overrides())
        }
    }

    /// Load configuration from an explicit file path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("invalid config file {}: {e}", path.display())))?;
        Ok(config.with_env_overrides())
    }

    /// Apply environment-variable overrides for secrets. `GEMINI_API_KEY`
    /// overrides a configured key; `GOOGLE_API_KEY` is a fallback for an
    /// empty one.
    fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            if !key.is_empty() {
                self.gemini_api_key = key;
            }
        } else if self.gemini_api_key.is_empty() {
            if let Ok(key) = std::env::var("GOOGLE_API_KEY") {
                self.gemini_api_key = key;
            }
        }
        self
    }

    /// Validate settings that would otherwise fail at first use.
    pub fn validate(&self) -> Result<()> {
        if self.session_ttl_secs == 0 {
            return Err(Error::Config("session_ttl_secs must be positive".into()));
        }
        if self.max_merge_images < 2 {
            return Err(Error::Config("max_merge_images must be at least 2".into()));
        }
        if self.proxy.use_proxy_service && self.proxy.proxy_service_url.is_empty() {
            return Err(Error::Config(
                "use_proxy_service requires proxy_service_url".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.enable);
        assert_eq!(config.session_ttl_secs, 600);
        assert_eq!(config.image_cache_ttl_secs, 300);
        assert_eq!(config.model, "gemini-2.0-flash-exp-image-generation");
        assert!(config.commands.generate.contains(&"#生成图片".to_string()));
        assert_eq!(config.commands.exit[0], "#结束对话");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(
            &path,
            r#"{"model": "gemini-exp", "session_ttl_secs": 120, "commands": {"generate": ["$draw"]}}"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.model, "gemini-exp");
        assert_eq!(config.session_ttl_secs, 120);
        assert_eq!(config.commands.generate, vec!["$draw".to_string()]);
        // Unspecified lists still get defaults.
        assert_eq!(config.commands.exit.len(), 4);
    }

    #[test]
    fn test_env_key_overrides_file_value() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, r#"{"gemini_api_key": "from-file"}"#).unwrap();

        std::env::set_var("GEMINI_API_KEY", "from-env");
        let config = Config::load_from(&path).unwrap();
        std::env::remove_var("GEMINI_API_KEY");

        assert_eq!(config.gemini_api_key, "from-env");
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, "{not json").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validation_rejects_zero_ttl() {
        let mut config = Config::default();
        config.session_ttl_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_proxy_service_without_url() {
        let mut config = Config::default();
        config.proxy.use_proxy_service = true;
        assert!(config.validate().is_err());
    }
}

use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use teloxide::types::UserId;

use crate::api::validate_url;
use crate::quality::{Fallback, QualityPreference};
use crate::render::RenderOptions;

/// Environment variable that overrides the token from the config file.
pub const TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";

const DEFAULT_API_URL: &str =
    "https://backend.multistreaming.site/api/courses/68e7b6e6aaf4383d1192dfb6/classes?populate=full";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse config file '{}': {}", path.display(), source)
            }
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    telegram_bot_token: String,
    /// Endpoint used by /getcourse without an argument.
    default_api_url: Option<String>,
    user_agent: Option<String>,
    #[serde(default = "default_timeout")]
    request_timeout_secs: u64,
    /// Quality labels in order of preference.
    preferred_qualities: Option<Vec<String>>,
    #[serde(default)]
    quality_fallback: Fallback,
    /// List non-selected video variants under the selected one.
    #[serde(default)]
    list_alternative_qualities: bool,
    /// If non-empty, only these users may use the bot.
    #[serde(default)]
    allowed_users: Vec<u64>,
    /// Directory for logs and scratch files. Defaults to current directory.
    data_dir: Option<String>,
    #[serde(default = "default_heartbeat")]
    heartbeat_interval_secs: u64,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            telegram_bot_token: String::new(),
            default_api_url: None,
            user_agent: None,
            request_timeout_secs: default_timeout(),
            preferred_qualities: None,
            quality_fallback: Fallback::default(),
            list_alternative_qualities: false,
            allowed_users: Vec::new(),
            data_dir: None,
            heartbeat_interval_secs: default_heartbeat(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_heartbeat() -> u64 {
    300
}

pub struct Config {
    pub telegram_bot_token: String,
    pub default_api_url: String,
    pub user_agent: String,
    pub request_timeout: Duration,
    pub quality: QualityPreference,
    pub list_alternative_qualities: bool,
    pub allowed_users: HashSet<UserId>,
    /// Directory for logs and scratch files.
    pub data_dir: PathBuf,
    /// Zero disables the heartbeat.
    pub heartbeat_interval: Duration,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::load_with_token(path, std::env::var(TOKEN_ENV).ok())
    }

    /// Defaults plus the token from the environment, for running without a file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::build(ConfigFile::default(), std::env::var(TOKEN_ENV).ok())
    }

    fn load_with_token<P: AsRef<Path>>(path: P, env_token: Option<String>) -> Result<Self, ConfigError> {
        let config_path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?;
        Self::build(file, env_token)
    }

    fn build(file: ConfigFile, env_token: Option<String>) -> Result<Self, ConfigError> {
        let telegram_bot_token = env_token
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(file.telegram_bot_token)
            .trim()
            .to_string();

        if telegram_bot_token.is_empty() {
            return Err(ConfigError::Validation(format!(
                "telegram_bot_token is required (config file or {TOKEN_ENV})"
            )));
        }
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = telegram_bot_token.split(':').collect();
        if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty() {
            return Err(ConfigError::Validation(
                "telegram_bot_token appears invalid (expected format: 123456789:ABCdefGHI...)".into()
            ));
        }

        let default_api_url = file.default_api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string());
        if validate_url(&default_api_url).is_none() {
            return Err(ConfigError::Validation(format!(
                "default_api_url must be an http(s) URL, got '{default_api_url}'"
            )));
        }

        if file.request_timeout_secs == 0 {
            return Err(ConfigError::Validation("request_timeout_secs must be positive".into()));
        }

        let preferred = match file.preferred_qualities {
            Some(list) => list
                .into_iter()
                .map(|q| q.trim().to_string())
                .filter(|q| !q.is_empty())
                .collect(),
            None => QualityPreference::default().preferred,
        };

        Ok(Self {
            telegram_bot_token,
            default_api_url,
            user_agent: file.user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            request_timeout: Duration::from_secs(file.request_timeout_secs),
            quality: QualityPreference {
                preferred,
                fallback: file.quality_fallback,
            },
            list_alternative_qualities: file.list_alternative_qualities,
            allowed_users: file.allowed_users.into_iter().map(UserId).collect(),
            data_dir: file.data_dir.map(PathBuf::from).unwrap_or_else(|| PathBuf::from(".")),
            heartbeat_interval: Duration::from_secs(file.heartbeat_interval_secs),
        })
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            preferred: self.quality.clone(),
            list_alternatives: self.list_alternative_qualities,
        }
    }

    /// Where rendered files are written before upload.
    pub fn scratch_dir(&self) -> PathBuf {
        self.data_dir.join("tmp")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn load(file: &NamedTempFile) -> Result<Config, ConfigError> {
        Config::load_with_token(file.path(), None)
    }

    fn assert_err<T>(result: Result<T, ConfigError>) -> ConfigError {
        match result {
            Ok(_) => panic!("expected error, got Ok"),
            Err(e) => e,
        }
    }

    #[test]
    fn test_valid_config_defaults() {
        let file = write_config(r#"{
            "telegram_bot_token": "123456789:ABCdefGHIjklMNOpqrsTUVwxyz"
        }"#);
        let config = load(&file).expect("should load valid config");
        assert_eq!(config.default_api_url, DEFAULT_API_URL);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(300));
        assert_eq!(config.quality, QualityPreference::default());
        assert!(config.allowed_users.is_empty());
        assert_eq!(config.scratch_dir(), PathBuf::from("./tmp"));
    }

    #[test]
    fn test_full_config() {
        let file = write_config(r#"{
            "telegram_bot_token": "1:x",
            "default_api_url": "https://api.example/courses/1",
            "request_timeout_secs": 5,
            "preferred_qualities": ["1080p", " ", "720p"],
            "quality_fallback": "lowest",
            "list_alternative_qualities": true,
            "allowed_users": [7],
            "data_dir": "/var/lib/coursebot",
            "heartbeat_interval_secs": 0
        }"#);
        let config = load(&file).unwrap();
        assert_eq!(config.quality.preferred, ["1080p", "720p"]);
        assert_eq!(config.quality.fallback, Fallback::Lowest);
        assert!(config.render_options().list_alternatives);
        assert_eq!(config.allowed_users, HashSet::from([UserId(7)]));
        assert!(config.heartbeat_interval.is_zero());
    }

    #[test]
    fn test_env_token_overrides_file() {
        let file = write_config(r#"{"telegram_bot_token": "1:file"}"#);
        let config = Config::load_with_token(file.path(), Some("2:env".to_string())).unwrap();
        assert_eq!(config.telegram_bot_token, "2:env");
    }

    #[test]
    fn test_env_token_without_file() {
        let config = Config::build(ConfigFile::default(), Some("99:secret".into())).unwrap();
        assert_eq!(config.telegram_bot_token, "99:secret");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.default_api_url, DEFAULT_API_URL);
    }

    #[test]
    fn test_missing_token() {
        let file = write_config("{}");
        let err = assert_err(load(&file));
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("telegram_bot_token"));
    }

    #[test]
    fn test_invalid_token_format() {
        for token in ["invalid_token_no_colon", "notanumber:ABCdef", "123456789:"] {
            let file = write_config(&format!(r#"{{"telegram_bot_token": "{token}"}}"#));
            let err = assert_err(load(&file));
            assert!(matches!(err, ConfigError::Validation(_)), "token {token}");
        }
    }

    #[test]
    fn test_invalid_default_url() {
        let file = write_config(r#"{
            "telegram_bot_token": "1:x",
            "default_api_url": "file:///etc/passwd"
        }"#);
        let err = assert_err(load(&file));
        assert!(err.to_string().contains("default_api_url"));
    }

    #[test]
    fn test_file_not_found() {
        let err = assert_err(Config::load_with_token("/nonexistent/path/config.json", None));
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_invalid_json() {
        let file = write_config("{ invalid json }");
        let err = assert_err(load(&file));
        assert!(matches!(err, ConfigError::ParseJson { .. }));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let file = write_config(r#"{"telegram_bot_token": "1:x", "prefered_qualities": []}"#);
        let err = assert_err(load(&file));
        assert!(matches!(err, ConfigError::ParseJson { .. }));
    }
}

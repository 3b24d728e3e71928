use crate::domain::{Language, ProducerSettings};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid environment variable {name}: {reason}")]
    InvalidEnvVar { name: String, reason: String },

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// What the fetch path does when a REST call fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExceptionHandlingStrategy {
    /// Log and return the best-effort item
    #[default]
    Catch,
    /// Propagate the error to the caller
    Throw,
}

/// Feed SDK configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default)]
    pub api: ApiConfig,
    pub languages: LanguageConfig,
    /// Routes node-specific messages to this session when set
    #[serde(default)]
    pub node_id: Option<i32>,
    #[serde(default)]
    pub exception_handling: ExceptionHandlingStrategy,
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
    /// Empty means the built-in producer set
    #[serde(default)]
    pub producers: Vec<ProducerSettings>,
    /// Forward messages regardless of producer state
    #[serde(default)]
    pub replay: bool,
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    /// Access token from .env (not in YAML)
    #[serde(skip)]
    pub access_token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.betradar.com/v1".to_string(),
            access_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageConfig {
    pub default: Language,
    #[serde(default)]
    pub wanted: Vec<Language>,
}

impl LanguageConfig {
    /// Default language first, then the wanted ones without duplicates
    pub fn all(&self) -> Vec<Language> {
        let mut languages = vec![self.default.clone()];
        for language in &self.wanted {
            if !languages.contains(language) {
                languages.push(language.clone());
            }
        }
        languages
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// Maximum simultaneous REST fetches
    #[serde(default = "default_gate_size")]
    pub gate_size: usize,
    #[serde(default = "default_key_lock_timeout_ms")]
    pub key_lock_timeout_ms: u64,
    #[serde(default = "default_key_lock_poll_ms")]
    pub key_lock_poll_ms: u64,
    #[serde(default = "default_key_lock_cleanup_interval")]
    pub key_lock_cleanup_interval_secs: u64,
}

impl ConcurrencyConfig {
    pub fn key_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.key_lock_timeout_ms)
    }

    pub fn key_lock_poll_interval(&self) -> Duration {
        Duration::from_millis(self.key_lock_poll_ms)
    }
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            gate_size: default_gate_size(),
            key_lock_timeout_ms: default_key_lock_timeout_ms(),
            key_lock_poll_ms: default_key_lock_poll_ms(),
            key_lock_cleanup_interval_secs: default_key_lock_cleanup_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// An Up producer with no alive for this long is marked Down
    #[serde(default = "default_max_inactivity")]
    pub max_inactivity_seconds: u64,
    #[serde(default = "default_inactivity_check_interval")]
    pub inactivity_check_interval_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_inactivity_seconds: default_max_inactivity(),
            inactivity_check_interval_secs: default_inactivity_check_interval(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_gate_size() -> usize {
    8
}

fn default_key_lock_timeout_ms() -> u64 {
    60_000
}

fn default_key_lock_poll_ms() -> u64 {
    50
}

fn default_key_lock_cleanup_interval() -> u64 {
    60
}

fn default_max_inactivity() -> u64 {
    20
}

fn default_inactivity_check_interval() -> u64 {
    10
}

impl FeedConfig {
    /// Configuration with defaults for everything but the languages
    pub fn new(default_language: Language) -> Self {
        Self {
            api: ApiConfig::default(),
            languages: LanguageConfig {
                default: default_language,
                wanted: Vec::new(),
            },
            node_id: None,
            exception_handling: ExceptionHandlingStrategy::default(),
            concurrency: ConcurrencyConfig::default(),
            recovery: RecoveryConfig::default(),
            producers: Vec::new(),
            replay: false,
            log_level: default_log_level(),
        }
    }

    /// Load configuration from YAML file and .env
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        let mut config: FeedConfig = serde_yaml::from_str(&yaml_content)?;

        // Load .env file
        dotenv::dotenv().ok(); // Don't fail if .env doesn't exist

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(node_id) = std::env::var("ODDSFEED_NODE_ID") {
            let parsed = node_id.trim().parse::<i32>().map_err(|e| ConfigError::InvalidEnvVar {
                name: "ODDSFEED_NODE_ID".to_string(),
                reason: e.to_string(),
            })?;
            info!("Overriding node id from environment variable");
            self.node_id = Some(parsed);
        }

        if let Ok(api_url) = std::env::var("ODDSFEED_API_URL") {
            info!("Overriding API URL from environment variable");
            self.api.base_url = api_url;
        }

        if let Ok(token) = std::env::var("ODDSFEED_ACCESS_TOKEN") {
            self.api.access_token = Some(token);
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "api.base_url cannot be empty".to_string(),
            ));
        }

        if self.concurrency.gate_size == 0 {
            return Err(ConfigError::ValidationError(
                "concurrency.gate_size must be at least 1".to_string(),
            ));
        }

        if self.recovery.max_inactivity_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "recovery.max_inactivity_seconds must be greater than 0".to_string(),
            ));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "log_level must be one of: {}",
                valid_levels.join(", ")
            )));
        }

        let mut seen = HashSet::new();
        for producer in &self.producers {
            if producer.id == 0 {
                return Err(ConfigError::ValidationError(
                    "producer id 0 is reserved".to_string(),
                ));
            }
            if !seen.insert(producer.id) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate producer id {}",
                    producer.id
                )));
            }
        }

        Ok(())
    }

    /// Configured producers, or the built-in set when none are listed
    pub fn producer_settings(&self) -> Vec<ProducerSettings> {
        if self.producers.is_empty() {
            ProducerSettings::defaults()
        } else {
            self.producers.clone()
        }
    }

    /// Log configuration summary
    pub fn log(&self) {
        info!("Configuration loaded:");
        info!("  API URL: {}", self.api.base_url);
        info!(
            "  Access token: {}",
            if self.api.access_token.is_some() { "set" } else { "not set" }
        );
        info!(
            "  Languages: {}",
            self.languages
                .all()
                .iter()
                .map(Language::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );
        info!("  Node id: {:?}", self.node_id);
        info!("  Exception handling: {:?}", self.exception_handling);
        info!("  Fetch concurrency: {}", self.concurrency.gate_size);
        info!("  Max inactivity: {} seconds", self.recovery.max_inactivity_seconds);
        info!("  Producers: {}", self.producer_settings().len());
        info!("  Replay: {}", self.replay);
        info!("  Log level: {}", self.log_level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
api:
  base_url: https://stgapi.example.com/v1
languages:
  default: en
  wanted: [de, EN, fr]
exception_handling: throw
concurrency:
  gate_size: 4
producers:
  - id: 1
    name: LO
  - id: 3
    name: Ctrl
    stateful_recovery_window_minutes: 600
    disabled: true
"#;

    #[test]
    fn test_parse_yaml_with_defaults() {
        let config: FeedConfig = serde_yaml::from_str(YAML).unwrap();
        assert!(config.validate().is_ok());

        let languages = config.languages.all();
        let codes: Vec<&str> = languages.iter().map(Language::as_str).collect();
        assert_eq!(codes, vec!["en", "de", "fr"]);
        assert_eq!(config.exception_handling, ExceptionHandlingStrategy::Throw);
        assert_eq!(config.concurrency.gate_size, 4);
        assert_eq!(config.concurrency.key_lock_poll_ms, 50);
        assert_eq!(config.recovery.max_inactivity_seconds, 20);
        assert_eq!(config.producers[1].stateful_recovery_window_minutes, 600);
        assert!(config.producers[1].disabled);
        assert!(!config.replay);
    }

    #[test]
    fn test_config_validation() {
        let mut config = FeedConfig::new("en".parse().unwrap());
        assert!(config.validate().is_ok());
        assert_eq!(config.producer_settings().len(), 3);

        config.concurrency.gate_size = 0;
        assert!(config.validate().is_err());
        config.concurrency.gate_size = 2;

        config.log_level = "loud".to_string();
        assert!(config.validate().is_err());
        config.log_level = "debug".to_string();

        config.producers = vec![
            ProducerSettings::new(1, "LO", 60),
            ProducerSettings::new(1, "LO again", 60),
        ];
        assert!(config.validate().is_err());

        config.producers = vec![ProducerSettings::new(0, "Reserved", 60)];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_language_rejected() {
        let yaml = "languages:\n  default: english\n";
        assert!(serde_yaml::from_str::<FeedConfig>(yaml).is_err());
    }
}

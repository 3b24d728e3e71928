//! Integration test: Configuration utilities
//!
//! Tests config path resolution and loading the sample feed configuration.

use oddsfeed_sdk::bin_common::{load_config_from_env, ConfigType};
use oddsfeed_sdk::oddsfeed::infrastructure::{ExceptionHandlingStrategy, FeedConfig};
use std::env;
use std::io::Write;

#[test]
fn test_feed_config_path_resolution() {
    env::remove_var("ODDSFEED_CONFIG_PATH");
    let config_path = load_config_from_env(ConfigType::Feed);
    assert_eq!(config_path.to_str().unwrap(), "config/feed_config.yaml");

    env::set_var("ODDSFEED_CONFIG_PATH", "elsewhere/feed.yaml");
    let config_path = load_config_from_env(ConfigType::Feed);
    assert_eq!(config_path.to_str().unwrap(), "elsewhere/feed.yaml");
    env::remove_var("ODDSFEED_CONFIG_PATH");
}

#[test]
fn test_custom_config() {
    let custom = ConfigType::Custom("custom/path.yaml".to_string());
    assert_eq!(custom.default_path(), "custom/path.yaml");
}

#[test]
fn test_sample_config_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/feed_config.yaml");
    let config = FeedConfig::load(path).unwrap();

    let languages = config.languages.all();
    let codes: Vec<&str> = languages.iter().map(|l| l.as_str()).collect();
    assert_eq!(codes, vec!["en", "de", "fr"]);
    assert_eq!(config.exception_handling, ExceptionHandlingStrategy::Catch);
    assert_eq!(config.concurrency.gate_size, 4);
    assert_eq!(config.producer_settings().len(), 3);
    assert!(!config.replay);
}

#[test]
fn test_invalid_config_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "languages:\n  default: en\nconcurrency:\n  gate_size: 0\n"
    )
    .unwrap();

    assert!(FeedConfig::load(file.path()).is_err());
}

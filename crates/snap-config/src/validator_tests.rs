use super::*;
use crate::schema::CaasConfig;

fn caas() -> CaasConfig {
    CaasConfig::new("https://caas.example/tenant/project.preview.content", "secret")
}

#[test]
fn test_default_config_is_valid() {
    let result = ConfigValidator::validate(&Config::default(), None).unwrap();
    assert!(result.is_valid());
    assert!(result.warnings.iter().any(|w| w.path == "messenger.target_origin"));
}

#[test]
fn test_validate_zero_attempts() {
    let mut config = Config::default();
    config.messenger.handshake_attempts = 0;
    let result = ConfigValidator::validate(&config, None).unwrap();
    assert!(!result.is_valid());
    assert!(result.errors.iter().any(|e| e.path == "messenger.handshake_attempts"));
}

#[test]
fn test_validate_zero_timeout() {
    let mut config = Config::default();
    config.messenger.handshake_timeout_ms = 0;
    let result = ConfigValidator::validate(&config, None).unwrap();
    assert!(result.errors.iter().any(|e| e.path == "messenger.handshake_timeout_ms"));
}

#[test]
fn test_validate_empty_namespace() {
    let mut config = Config::default();
    config.messenger.namespace = "  ".to_string();
    let result = ConfigValidator::validate(&config, None).unwrap();
    assert!(result.errors.iter().any(|e| e.path == "messenger.namespace"));
}

#[test]
fn test_explicit_origin_has_no_warning() {
    let mut config = Config::default();
    config.messenger.target_origin = "https://host.example".to_string();
    let result = ConfigValidator::validate(&config, None).unwrap();
    assert!(result.warnings.is_empty());
}

#[test]
fn test_validate_caas_ok() {
    let config = Config {
        caas: Some(caas()),
        ..Default::default()
    };
    let result = ConfigValidator::validate(&config, None).unwrap();
    assert!(result.is_valid());
}

#[test]
fn test_validate_caas_bad_url() {
    let mut settings = caas();
    settings.preview_collection_url = "not a url".to_string();
    let config = Config {
        caas: Some(settings),
        ..Default::default()
    };
    let result = ConfigValidator::validate(&config, None).unwrap();
    assert!(result.errors.iter().any(|e| e.path == "caas.preview_collection_url"));
}

#[test]
fn test_validate_caas_missing_tenant() {
    let mut settings = caas();
    settings.preview_collection_url = "https://caas.example/".to_string();
    let config = Config {
        caas: Some(settings),
        ..Default::default()
    };
    let result = ConfigValidator::validate(&config, None).unwrap();
    assert!(result.errors.iter().any(|e| e.message.contains("tenant")));
}

#[test]
fn test_validate_caas_missing_key() {
    let mut settings = caas();
    settings.api_key = String::new();
    let config = Config {
        caas: Some(settings),
        ..Default::default()
    };
    let result = ConfigValidator::validate(&config, None).unwrap();
    assert!(result.errors.iter().any(|e| e.path == "caas.api_key"));
}

#[test]
fn test_literal_api_key_warns() {
    let config = Config {
        caas: Some(caas()),
        ..Default::default()
    };
    let raw = "[caas]\napi_key = \"secret\"";
    let result = ConfigValidator::validate(&config, Some(raw)).unwrap();
    assert!(result.is_valid());
    assert!(result.warnings.iter().any(|w| w.path == "caas.api_key"));
}

#[test]
fn test_unknown_log_level_warns() {
    let mut config = Config::default();
    config.logging.level = "verbose".to_string();
    let result = ConfigValidator::validate(&config, None).unwrap();
    assert!(result.is_valid());
    assert!(result.warnings.iter().any(|w| w.path == "logging.level"));
}

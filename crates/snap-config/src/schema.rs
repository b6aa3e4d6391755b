//! Configuration schema definitions.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub messenger: MessengerConfig,

    #[serde(default)]
    pub decoration: DecorationConfig,

    /// Present only when CaaS mode is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caas: Option<CaasConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Cross-frame messenger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessengerConfig {
    /// Key under which frame messages are namespaced.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Origin messages are posted to; `*` adopts the first inbound origin.
    #[serde(default = "default_target_origin")]
    pub target_origin: String,

    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,

    #[serde(default = "default_handshake_attempts")]
    pub handshake_attempts: u32,

    /// Run the handshake even when the page is not embedded.
    #[serde(default)]
    pub test_mode: bool,

    /// Upper bound for correlation id regeneration on collision.
    #[serde(default = "default_max_correlation_attempts")]
    pub max_correlation_attempts: u32,

    /// How long `is_connected` waits for a pending handshake.
    #[serde(default = "default_connect_wait_ms")]
    pub connect_wait_ms: u64,
}

impl MessengerConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn connect_wait(&self) -> Duration {
        Duration::from_millis(self.connect_wait_ms)
    }
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            target_origin: default_target_origin(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            handshake_attempts: default_handshake_attempts(),
            test_mode: false,
            max_correlation_attempts: default_max_correlation_attempts(),
            connect_wait_ms: default_connect_wait_ms(),
        }
    }
}

fn default_namespace() -> String {
    "tpp".to_string()
}

fn default_target_origin() -> String {
    "*".to_string()
}

fn default_handshake_timeout_ms() -> u64 {
    800
}

fn default_handshake_attempts() -> u32 {
    5
}

fn default_max_correlation_attempts() -> u32 {
    16
}

fn default_connect_wait_ms() -> u64 {
    800
}

/// Decoration overlay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecorationConfig {
    /// Attribute identifying decorated nodes.
    #[serde(default = "default_attribute")]
    pub attribute: String,

    /// Delay before hiding buttons after the pointer leaves.
    #[serde(default = "default_linger_ms")]
    pub linger_ms: u64,

    /// Minimum overlay border height in pixels.
    #[serde(default = "default_min_border_height")]
    pub min_border_height: f64,
}

impl DecorationConfig {
    pub fn linger(&self) -> Duration {
        Duration::from_millis(self.linger_ms)
    }
}

impl Default for DecorationConfig {
    fn default() -> Self {
        Self {
            attribute: default_attribute(),
            linger_ms: default_linger_ms(),
            min_border_height: default_min_border_height(),
        }
    }
}

fn default_attribute() -> String {
    "data-preview-id".to_string()
}

fn default_linger_ms() -> u64 {
    10
}

fn default_min_border_height() -> f64 {
    27.0
}

/// CaaS change-stream configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaasConfig {
    /// Preview collection, e.g. `https://host/tenant/project.preview.content`.
    pub preview_collection_url: String,

    pub api_key: String,

    #[serde(default = "default_update_timeout_ms")]
    pub update_timeout_ms: u64,

    #[serde(default = "default_reconnection_delay_ms")]
    pub reconnection_delay_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_keep_alive_interval_ms")]
    pub keep_alive_interval_ms: u64,

    /// Static language to locale mapping, used when no host is connected.
    #[serde(default)]
    pub locales: HashMap<String, String>,
}

impl CaasConfig {
    pub fn new(preview_collection_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            preview_collection_url: preview_collection_url.into(),
            api_key: api_key.into(),
            update_timeout_ms: default_update_timeout_ms(),
            reconnection_delay_ms: default_reconnection_delay_ms(),
            max_retries: default_max_retries(),
            keep_alive_interval_ms: default_keep_alive_interval_ms(),
            locales: HashMap::new(),
        }
    }

    pub fn update_timeout(&self) -> Duration {
        Duration::from_millis(self.update_timeout_ms)
    }

    pub fn reconnection_delay(&self) -> Duration {
        Duration::from_millis(self.reconnection_delay_ms)
    }

    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_millis(self.keep_alive_interval_ms)
    }
}

fn default_update_timeout_ms() -> u64 {
    5000
}

fn default_reconnection_delay_ms() -> u64 {
    1000
}

fn default_max_retries() -> u32 {
    10
}

fn default_keep_alive_interval_ms() -> u64 {
    20_000
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Optional log file; rotated daily.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_messenger_config() {
        let config = MessengerConfig::default();
        assert_eq!(config.namespace, "tpp");
        assert_eq!(config.target_origin, "*");
        assert_eq!(config.handshake_timeout(), Duration::from_millis(800));
        assert_eq!(config.handshake_attempts, 5);
        assert!(!config.test_mode);
    }

    #[test]
    fn test_default_decoration_config() {
        let config = DecorationConfig::default();
        assert_eq!(config.attribute, "data-preview-id");
        assert_eq!(config.linger(), Duration::from_millis(10));
        assert_eq!(config.min_border_height, 27.0);
    }

    #[test]
    fn test_caas_config_defaults() {
        let config = CaasConfig::new("https://caas/tenant/p.preview.content", "key");
        assert_eq!(config.update_timeout(), Duration::from_secs(5));
        assert_eq!(config.reconnection_delay(), Duration::from_secs(1));
        assert_eq!(config.max_retries, 10);
        assert_eq!(config.keep_alive_interval(), Duration::from_secs(20));
    }

    #[test]
    fn test_caas_section_deserialize() {
        let config: Config = toml::from_str(
            r#"
            [caas]
            preview_collection_url = "https://caas/t/p.preview.content"
            api_key = "k"
            update_timeout_ms = 100

            [caas.locales]
            EN = "en_GB"
            "#,
        )
        .unwrap();
        let caas = config.caas.unwrap();
        assert_eq!(caas.update_timeout_ms, 100);
        assert_eq!(caas.locales.get("EN").map(String::as_str), Some("en_GB"));
    }

    #[test]
    fn test_caas_section_requires_url() {
        let result: Result<Config, _> = toml::from_str("[caas]\napi_key = \"k\"\n");
        assert!(result.is_err());
    }
}

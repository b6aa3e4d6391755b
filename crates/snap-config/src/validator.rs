//! Configuration validation.

use url::Url;

use crate::error::ConfigError;
use crate::schema::{CaasConfig, Config};

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    ///
    /// `raw` is the file content before environment substitution, used to
    /// detect secrets written literally into the file.
    pub fn validate(config: &Config, raw: Option<&str>) -> Result<ValidationResult, ConfigError> {
        let mut result = ValidationResult::default();

        Self::validate_messenger(config, &mut result);
        Self::validate_decoration(config, &mut result);
        if let Some(caas) = &config.caas {
            Self::validate_caas(caas, raw, &mut result);
        }
        Self::validate_logging(config, &mut result);

        Ok(result)
    }

    fn validate_messenger(config: &Config, result: &mut ValidationResult) {
        let messenger = &config.messenger;

        if messenger.namespace.trim().is_empty() {
            result.add_error(ValidationError::new(
                "messenger.namespace",
                "Namespace cannot be empty",
            ));
        }

        if messenger.handshake_attempts == 0 {
            result.add_error(ValidationError::new(
                "messenger.handshake_attempts",
                "At least one handshake attempt is required",
            ));
        }

        if messenger.handshake_timeout_ms == 0 {
            result.add_error(ValidationError::new(
                "messenger.handshake_timeout_ms",
                "Handshake timeout must be greater than 0",
            ));
        }

        if messenger.max_correlation_attempts == 0 {
            result.add_error(ValidationError::new(
                "messenger.max_correlation_attempts",
                "At least one correlation attempt is required",
            ));
        }

        if messenger.target_origin == "*" {
            result.add_warning(ValidationWarning::new(
                "messenger.target_origin",
                "Wildcard origin; the first inbound origin will be adopted",
            ));
        }
    }

    fn validate_decoration(config: &Config, result: &mut ValidationResult) {
        let decoration = &config.decoration;

        if decoration.attribute.trim().is_empty() {
            result.add_error(ValidationError::new(
                "decoration.attribute",
                "Preview id attribute cannot be empty",
            ));
        }

        if decoration.min_border_height < 0.0 {
            result.add_error(ValidationError::new(
                "decoration.min_border_height",
                "Border height cannot be negative",
            ));
        }
    }

    fn validate_caas(caas: &CaasConfig, raw: Option<&str>, result: &mut ValidationResult) {
        match Url::parse(&caas.preview_collection_url) {
            Ok(url) => {
                let has_tenant = url
                    .path_segments()
                    .and_then(|mut segments| segments.next())
                    .is_some_and(|segment| !segment.is_empty());
                if !has_tenant {
                    result.add_error(ValidationError::new(
                        "caas.preview_collection_url",
                        "URL must start with the tenant path segment",
                    ));
                }
            }
            Err(e) => {
                result.add_error(ValidationError::new(
                    "caas.preview_collection_url",
                    format!("Invalid URL: {}", e),
                ));
            }
        }

        if caas.api_key.trim().is_empty() {
            result.add_error(ValidationError::new("caas.api_key", "API key is required"));
        } else if let Some(raw) = raw {
            if raw.contains(&caas.api_key) {
                result.add_warning(ValidationWarning::new(
                    "caas.api_key",
                    "API key is stored in the config file; prefer ${CAAS_API_KEY}",
                ));
            }
        }

        if caas.update_timeout_ms == 0 {
            result.add_error(ValidationError::new(
                "caas.update_timeout_ms",
                "Update timeout must be greater than 0",
            ));
        }

        if caas.keep_alive_interval_ms == 0 {
            result.add_error(ValidationError::new(
                "caas.keep_alive_interval_ms",
                "Keep-alive interval must be greater than 0",
            ));
        }
    }

    fn validate_logging(config: &Config, result: &mut ValidationResult) {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&config.logging.level.to_lowercase().as_str()) {
            result.add_warning(ValidationWarning::new(
                "logging.level",
                format!("Unknown log level '{}', falling back to info", config.logging.level),
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;

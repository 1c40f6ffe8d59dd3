use std::env;
use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;
const CONFIG_DIR: &str = "config";

/// Runtime settings, layered from config files and `APP_*` environment
/// variables. Every field has a default, so the app also runs with no
/// config directory at all.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Deployment profile, e.g. "development" or "production".
    #[validate(length(min = 1, message = "environment must not be empty"))]
    pub environment: String,

    /// Level for the crate's own spans unless `RUST_LOG` overrides it.
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Emit log lines as JSON instead of human-readable text.
    #[serde(default)]
    pub log_json: bool,

    /// Capacity of the bounded event channel.
    #[serde(default = "default_event_buffer_size")]
    #[validate(range(min = 1, message = "event_buffer_size must be greater than 0"))]
    pub event_buffer_size: usize,
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

/// Why configuration loading failed.
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration could not be read: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration rejected: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_event_buffer_size() -> usize {
    DEFAULT_EVENT_BUFFER_SIZE
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    match level.to_ascii_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => {
            let mut err = ValidationError::new("log_level");
            err.message = Some("expected one of trace, debug, info, warn, error".into());
            Err(err)
        }
    }
}

/// Installs the global tracing subscriber. A non-empty `RUST_LOG` wins
/// over the configured level.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let directive = match env::var("RUST_LOG") {
        Ok(custom) if !custom.trim().is_empty() => custom,
        _ => format!("pcp_confeccao={}", level),
    };

    if json {
        let _ = fmt().with_env_filter(directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(directive).try_init();
    }
}

/// Loads the runtime settings.
///
/// Sources, later ones winning: the struct defaults, `config/default`,
/// `config/{env}`, `config/local`, then `APP_*` environment variables
/// (e.g. `APP_LOG_LEVEL=debug`).
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    // RUN_ENV and APP_ENV select which file layer applies; they do not
    // set the `environment` value themselves.
    let run_env = ["RUN_ENV", "APP_ENV"]
        .iter()
        .find_map(|name| env::var(name).ok())
        .unwrap_or_else(|| DEFAULT_ENV.to_string());
    info!(environment = %run_env, "Loading configuration");

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "No {} directory; running on built-in defaults and APP_* variables",
            CONFIG_DIR
        );
    }

    let mut builder = Config::builder().set_default("environment", DEFAULT_ENV)?;
    for layer in ["default", run_env.as_str(), "local"] {
        builder = builder.add_source(
            File::with_name(&format!("{}/{}", CONFIG_DIR, layer)).required(false),
        );
    }
    let sources = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let settings: AppConfig = sources.try_deserialize()?;
    settings.validate().map_err(|err| {
        error!("Invalid configuration: {}", err);
        AppConfigError::Validation(err)
    })?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        AppConfig {
            environment: "development".into(),
            log_level: default_log_level(),
            log_json: false,
            event_buffer_size: default_event_buffer_size(),
        }
    }

    #[test]
    fn test_defaults_pass_validation() {
        let settings = valid_config();
        assert!(settings.validate().is_ok());
        assert!(settings.is_development());
        assert!(!settings.is_production());
    }

    #[test]
    fn test_zero_event_buffer_is_rejected() {
        let mut settings = valid_config();
        settings.event_buffer_size = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_unknown_log_level_is_rejected() {
        let mut settings = valid_config();
        settings.log_level = "loud".into();
        assert!(settings.validate().is_err());
    }
}

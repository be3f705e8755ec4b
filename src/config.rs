use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_SUBMIT_TIMEOUT_SECS: u64 = 30;
const CONFIG_DIR: &str = "config";
const ENV_PREFIX: &str = "PYRHOUSE";

/// Client configuration with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL of the PyrHouse REST API
    #[validate(url)]
    pub api_base_url: String,

    /// Bearer token sent with every request
    #[serde(default)]
    pub api_token: Option<String>,

    /// Abort a transfer submission after this many seconds (1 - 300)
    #[serde(default = "default_submit_timeout_secs")]
    #[validate(range(min = 1, max = 300))]
    pub submit_timeout_secs: u64,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,
}

impl ClientConfig {
    /// Creates a configuration with defaults for everything but the API location
    pub fn new(api_base_url: impl Into<String>, api_token: Option<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            api_token,
            submit_timeout_secs: default_submit_timeout_secs(),
            environment: default_environment(),
            log_level: default_log_level(),
            log_json: false,
        }
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ClientConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("Invalid configuration: {0}")]
    Validation(#[from] ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_submit_timeout_secs() -> u64 {
    DEFAULT_SUBMIT_TIMEOUT_SECS
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("pyrhouse_client={},pyrhouse_cli={}", level, level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let builder = fmt()
        .with_env_filter(EnvFilter::new(filter_directive))
        .with_writer(std::io::stderr);
    if json {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}

/// Loads client configuration from the current directory
pub fn load_config() -> Result<ClientConfig, ClientConfigError> {
    load_config_from(Path::new("."))
}

/// Loads client configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (PYRHOUSE__*)
pub fn load_config_from(root: &Path) -> Result<ClientConfig, ClientConfigError> {
    let run_env = env::var("PYRHOUSE_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    let config_dir = root.join(CONFIG_DIR);
    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    let default_file = config_dir.join("default");
    let env_file = config_dir.join(&run_env);
    let config = Config::builder()
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("submit_timeout_secs", DEFAULT_SUBMIT_TIMEOUT_SECS)?
        .add_source(File::with_name(&default_file.to_string_lossy()).required(false))
        .add_source(File::with_name(&env_file.to_string_lossy()).required(false))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?;

    if config.get_string("api_base_url").is_err() {
        error!(
            "API base URL is not configured. \
             Set PYRHOUSE__API_BASE_URL or add api_base_url to config/default.toml."
        );
        return Err(ClientConfigError::Load(ConfigError::NotFound(
            "api_base_url is required but not configured".into(),
        )));
    }

    let client_config: ClientConfig = config.try_deserialize()?;

    client_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        ClientConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(client_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup_test_config(content: &str, filename: &str) -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_DIR);
        fs::create_dir(&config_path).unwrap();
        fs::write(config_path.join(filename), content).unwrap();
        temp_dir
    }

    #[test]
    fn new_config_validates() {
        let cfg = ClientConfig::new("https://pyrhouse.example/api", None);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.submit_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn rejects_bad_values() {
        let mut cfg = ClientConfig::new("not a url", None);
        cfg.submit_timeout_secs = 0;
        cfg.log_level = "loud".into();

        let errors = cfg.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("api_base_url"));
        assert!(fields.contains_key("submit_timeout_secs"));
        assert!(fields.contains_key("log_level"));
    }

    #[test]
    fn loads_layered_file() {
        let dir = setup_test_config(
            r#"
                api_base_url = "https://pyrhouse.example/api"
                submit_timeout_secs = 12
                log_level = "debug"
            "#,
            "default.toml",
        );

        let cfg = load_config_from(dir.path()).unwrap();
        assert_eq!(cfg.api_base_url, "https://pyrhouse.example/api");
        assert_eq!(cfg.submit_timeout_secs, 12);
        assert_eq!(cfg.log_level(), "debug");
        assert!(!cfg.log_json);
    }

    #[test]
    fn invalid_file_values_fail_validation() {
        let dir = setup_test_config(
            r#"
                api_base_url = "https://pyrhouse.example/api"
                submit_timeout_secs = 900
            "#,
            "default.toml",
        );

        let result = load_config_from(dir.path());
        assert!(matches!(result, Err(ClientConfigError::Validation(_))));
    }
}

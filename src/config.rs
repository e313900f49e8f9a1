use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env as std_env;

const DEFAULT_LOG_LEVEL: &str = "info";

/// Application configuration, loaded from an optional `config/default` file
/// overlaid with `APP__`-prefixed environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub log_level: String,
    pub log_json: bool,
    pub auto_migrate: bool,

    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    /// Access token lifetime in seconds.
    pub jwt_expiration: u64,

    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_connect_timeout_secs: u64,

    pub rate_limit_requests_per_window: u32,
    pub rate_limit_window_seconds: u64,
    pub rate_limit_login_requests_per_window: u32,
    pub rate_limit_sweep_interval_seconds: u64,
}

impl AppConfig {
    pub fn log_level(&self) -> &str {
        if self.log_level.trim().is_empty() {
            DEFAULT_LOG_LEVEL
        } else {
            &self.log_level
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppConfigError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let cfg: AppConfig = Config::builder()
        .set_default("database_url", "sqlite://signcraft.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", 8080)?
        .set_default("environment", "development")?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("auto_migrate", true)?
        .set_default("jwt_secret", "dev-secret-change-me")?
        .set_default("jwt_issuer", "signcraft-api")?
        .set_default("jwt_audience", "signcraft-dashboard")?
        .set_default("jwt_expiration", 3600)?
        .set_default("db_max_connections", 10)?
        .set_default("db_min_connections", 1)?
        .set_default("db_connect_timeout_secs", 30)?
        .set_default("rate_limit_requests_per_window", 100)?
        .set_default("rate_limit_window_seconds", 60)?
        .set_default("rate_limit_login_requests_per_window", 5)?
        .set_default("rate_limit_sweep_interval_seconds", 60)?
        .add_source(File::with_name("config/default").required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?
        .try_deserialize()?;

    if !cfg.is_development() && cfg.jwt_secret == "dev-secret-change-me" {
        return Err(AppConfigError::Invalid(
            "APP__JWT_SECRET must be set outside development".to_string(),
        ));
    }

    Ok(cfg)
}

pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("signcraft_api={},tower_http=info", level);
    let filter_directive = std_env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);
    let filter = EnvFilter::new(filter_directive);

    if json {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_environment() {
        let cfg = load_config().expect("defaults should satisfy the schema");
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.rate_limit_login_requests_per_window, 5);
        assert_eq!(cfg.rate_limit_requests_per_window, 100);
        assert!(cfg.is_development());
    }
}

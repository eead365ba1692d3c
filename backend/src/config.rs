//! Configuration management for the security incident dashboard
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with IDB_ prefix
//! 4. The conventional DATABASE_URL, JWT_SECRET and PORT variables

use std::path::PathBuf;

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Report generation configuration
    pub reports: ReportsConfig,

    /// Log output configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key for signing JWT tokens
    pub secret: String,

    /// Access token expiration in seconds
    pub access_token_expiry: i64,

    /// Refresh token expiration in seconds
    pub refresh_token_expiry: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportsConfig {
    /// Directory generated report files are written to
    pub output_dir: PathBuf,

    /// Maximum number of reports waiting for generation
    pub queue_capacity: usize,

    /// TrueType font embedded in PDF reports; Arabic text needs one
    pub pdf_font_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of human-readable ones
    pub json: bool,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("IDB_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let mut builder = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 5000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("jwt.access_token_expiry", 86400)?
            .set_default("jwt.refresh_token_expiry", 604800)?
            .set_default("reports.output_dir", "reports")?
            .set_default("reports.queue_capacity", 64)?
            .set_default("logging.json", false)?;

        if environment == "development" {
            builder = builder
                .set_default("database.url", "postgres://localhost/incident_dashboard")?
                .set_default("jwt.secret", "development-secret-key")?;
        }

        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse::<i64>().ok());

        let config = builder
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (IDB prefix)
            .add_source(
                Environment::with_prefix("IDB")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("jwt.secret", std::env::var("JWT_SECRET").ok())?
            .set_override_option("server.port", port)?
            .build()?;

        config.try_deserialize()
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

use coach_core::{CoachConfig, DimensionWeights};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Postgres connection string; training records stay in memory without it.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub coach: CoachConfig,
    /// JSON catalog replacing the built-in archetype and topic table.
    pub catalog_path: Option<PathBuf>,
    /// Directory of `.md`/`.txt` handbooks layered over the built-in knowledge.
    pub knowledge_path: Option<PathBuf>,
    pub wecom_webhook_url: Option<String>,
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn invalid(name: &str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidValue(name.to_string(), reason.to_string())
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| invalid("BIND_ADDRESS", e))?;

        let database_url = optional_var("DATABASE_URL");

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            invalid(
                "RUST_LOG",
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let weights = match optional_var("RUBRIC_WEIGHTS") {
            Some(raw) => {
                let values = raw
                    .split(',')
                    .map(|w| w.trim().parse::<u32>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| invalid("RUBRIC_WEIGHTS", e))?;
                DimensionWeights::from_slice(&values).map_err(|e| invalid("RUBRIC_WEIGHTS", e))?
            }
            None => DimensionWeights::default(),
        };

        let denylist: Vec<String> = optional_var("DENYLIST")
            .map(|raw| raw.split(',').map(|t| t.trim().to_string()).collect())
            .unwrap_or_default();

        let max_turns = match optional_var("MAX_TURNS") {
            Some(raw) => raw.trim().parse::<u32>().map_err(|e| invalid("MAX_TURNS", e))?,
            None => coach_core::config::DEFAULT_MAX_TURNS,
        };

        let coach = CoachConfig::new(weights, denylist, max_turns).map_err(|e| {
            let var = match e {
                coach_core::evaluation::RubricError::ZeroMaxTurns => "MAX_TURNS",
                coach_core::evaluation::RubricError::EmptyDenylistTerm => "DENYLIST",
                _ => "RUBRIC_WEIGHTS",
            };
            invalid(var, e)
        })?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            coach,
            catalog_path: optional_var("CATALOG_PATH").map(PathBuf::from),
            knowledge_path: optional_var("KNOWLEDGE_PATH").map(PathBuf::from),
            wecom_webhook_url: optional_var("WECOM_WEBHOOK_URL"),
        })
    }
}

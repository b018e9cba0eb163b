use std::env;

use crate::oauth::Consumer;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub public_path: String,
    pub db_path: String,
    pub bind: String,
    pub port: u16,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub callback_url: String,
    pub scope: String,
    pub max_read_all_rounds: u32,
}

impl AppConfig {
    /// Reads `RL_*` variables. Call `dotenvy::dotenv()` first to pick up a
    /// `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = parse_or("RL_PORT", 8080)?;
        let config = Self {
            public_path: var_or("RL_PUBLIC_PATH", "static"),
            db_path: var_or("RL_DATABASE_URL", "readlater.db"),
            bind: var_or("RL_BIND", "127.0.0.1"),
            port,
            consumer_key: required("RL_CONSUMER_KEY")?,
            consumer_secret: required("RL_CONSUMER_SECRET")?,
            callback_url: env::var("RL_CALLBACK_URL")
                .unwrap_or_else(|_| format!("http://127.0.0.1:{port}/oauth/callback")),
            scope: var_or("RL_SCOPE", "read_public,write_public"),
            max_read_all_rounds: parse_or("RL_MAX_READ_ALL_ROUNDS", 20)?,
        };

        log::info!("Using public path: {}", config.public_path);
        log::info!("Using database path: {}", config.db_path);
        log::info!("Using OAuth callback: {}", config.callback_url);
        Ok(config)
    }

    pub fn consumer(&self) -> Consumer {
        Consumer {
            key: self.consumer_key.clone(),
            secret: self.consumer_secret.clone(),
        }
    }
}

fn var_or(var: &'static str, default: &str) -> String {
    env::var(var).unwrap_or_else(|_| default.to_string())
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    match env::var(var) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(var)),
    }
}

fn parse_or<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        Err(_) => Ok(default),
    }
}

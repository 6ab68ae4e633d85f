use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    Missing(&'static str),
    #[error("environment variable {0} has an invalid value")]
    Invalid(&'static str),
}

/// Process configuration, read once at startup and handed to the server and
/// extractors through `web::Data` instead of being re-read from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match env::var("PORT") {
            Ok(value) => value.parse().map_err(|_| ConfigError::Invalid("PORT"))?,
            Err(_) => 8080,
        };
        let token_ttl_hours = match env::var("TOKEN_TTL_HOURS") {
            Ok(value) => value
                .parse()
                .map_err(|_| ConfigError::Invalid("TOKEN_TTL_HOURS"))?,
            Err(_) => 168,
        };
        Ok(AppConfig {
            port,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            jwt_secret: env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?,
            token_ttl_hours,
        })
    }
}

use crate::error::{AppError, Result};
use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub server_address: String,
    pub upload_dir: String,
    pub jwt_secret: Option<String>,
    pub geocode_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://wayfare.db?mode=rwc".to_string()),

            server_address: env::var("SERVER_ADDRESS")
                .unwrap_or_else(|_| "127.0.0.1:5000".to_string()),

            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "./uploads".to_string()),

            jwt_secret: env::var("JWT_SECRET").ok().filter(|s| !s.is_empty()),

            geocode_timeout: Duration::from_secs(
                env::var("GEOCODE_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .map_err(|_| AppError::Config("Invalid GEOCODE_TIMEOUT_SECS".to_string()))?,
            ),
        })
    }
}

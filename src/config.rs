use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub assistant_timeout_ms: u64,
    pub root_phone: String,
    pub root_pin: String,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            assistant_timeout_ms: parse_or_default("ASSISTANT_TIMEOUT_MS", 10_000)?,
            root_phone: env::var("ROOT_PHONE").unwrap_or_else(|_| "08000000000".to_string()),
            root_pin: env::var("ROOT_PIN").unwrap_or_else(|_| "0000".to_string()),
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

//! Configuration module
//!
//! Environment-based configuration for the API server: database, auth token
//! lifetimes, and HTTP settings.

use std::env;

use anyhow::{bail, Context, Result};

// Defaults
const DEFAULT_SERVER_PORT: u16 = 8080;
const DEFAULT_MAX_CONNECTIONS: u32 = 20;
const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 30;
const DEFAULT_ACCESS_TOKEN_TTL_MINUTES: i64 = 15;
const DEFAULT_REFRESH_TOKEN_TTL_DAYS: i64 = 7;
const DEFAULT_AUTH_MAX_FAILURES: u32 = 10;
const DEFAULT_AUTH_FAILURE_WINDOW_SECS: u64 = 60;
const DEFAULT_REQUEST_BODY_LIMIT_BYTES: usize = 1024 * 1024;

const MIN_JWT_SECRET_LEN: usize = 32;

/// Application configuration, loaded once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub jwt_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    pub cors_origins: Vec<String>,
    pub environment: String,
    pub auth_max_failures: u32,
    pub auth_failure_window_secs: u64,
    pub request_body_limit_bytes: usize,
}

impl Config {
    /// Load configuration from the environment (and `.env` if present).
    /// Fails fast on missing required variables or an unusably short secret.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            bail!(
                "JWT_SECRET must be at least {} characters",
                MIN_JWT_SECRET_LEN
            );
        }

        Ok(Self {
            server_port: parse_env("SERVER_PORT", DEFAULT_SERVER_PORT)?,
            database_url,
            db_max_connections: parse_env("DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
            db_timeout_seconds: parse_env("DB_TIMEOUT_SECONDS", DEFAULT_CONNECTION_TIMEOUT_SECS)?,
            jwt_secret,
            access_token_ttl_minutes: parse_env(
                "ACCESS_TOKEN_TTL_MINUTES",
                DEFAULT_ACCESS_TOKEN_TTL_MINUTES,
            )?,
            refresh_token_ttl_days: parse_env(
                "REFRESH_TOKEN_TTL_DAYS",
                DEFAULT_REFRESH_TOKEN_TTL_DAYS,
            )?,
            cors_origins: env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            auth_max_failures: parse_env("AUTH_MAX_FAILURES", DEFAULT_AUTH_MAX_FAILURES)?,
            auth_failure_window_secs: parse_env(
                "AUTH_FAILURE_WINDOW_SECS",
                DEFAULT_AUTH_FAILURE_WINDOW_SECS,
            )?,
            request_body_limit_bytes: parse_env(
                "REQUEST_BODY_LIMIT_BYTES",
                DEFAULT_REQUEST_BODY_LIMIT_BYTES,
            )?,
        })
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid {}: {}", key, e)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_defaults_when_unset() {
        std::env::remove_var("OPSDESK_TEST_UNSET_KEY");
        let value: u16 = parse_env("OPSDESK_TEST_UNSET_KEY", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        std::env::set_var("OPSDESK_TEST_GARBAGE_KEY", "not-a-number");
        let result: Result<u16> = parse_env("OPSDESK_TEST_GARBAGE_KEY", 1);
        assert!(result.is_err());
        std::env::remove_var("OPSDESK_TEST_GARBAGE_KEY");
    }
}

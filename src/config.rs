use std::env;

use thiserror::Error;

use crate::token::TokenSettings;

const LOCAL_JWT_SECRET: &str = "super-secure-test-secret-value-local";

/// AppConfig
///
/// Holds the application's entire configuration state. The struct is immutable once
/// loaded and is pulled into handlers and extractors via `FromRef`, the same way the
/// repositories and the job queue are.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and fail-fast behaviour.
    pub env: Env,
    // Postgres connection string. `None` in local mode selects the in-memory store.
    pub db_url: Option<String>,
    // Secret used to sign and verify every issued JWT (HS256).
    pub jwt_secret: String,
    pub access_token_expire_minutes: i64,
    pub refresh_token_expire_minutes: i64,
    // Pagination defaults applied by the CRUD service layer.
    pub default_page_size: u32,
    pub max_page_size: u32,
    // Finished jobs remembered for status queries before the oldest are forgotten.
    pub job_history_size: usize,
    pub bind_addr: String,
    // Empty means "allow any origin".
    pub cors_origins: Vec<String>,
    // Seeded at startup when no user with this email exists yet.
    pub first_superuser_email: String,
    pub first_superuser_password: String,
}

/// Env
///
/// Defines the runtime context: pretty logs and relaxed secrets locally, JSON logs and
/// mandatory secrets in production.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value:?}")]
    Invalid { key: &'static str, value: String },
}

impl Default for AppConfig {
    /// Safe, non-panicking configuration used for test setup.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db_url: None,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            access_token_expire_minutes: 60 * 24 * 8,
            refresh_token_expire_minutes: 60 * 24 * 30,
            default_page_size: 20,
            max_page_size: 100,
            job_history_size: 1000,
            bind_addr: "0.0.0.0:8000".to_string(),
            cors_origins: Vec::new(),
            first_superuser_email: "admin@example.com".to_string(),
            first_superuser_password: "admin12345".to_string(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads every parameter from environment variables. Production demands an explicit
    /// `JWT_SECRET_KEY` and `DATABASE_URL`; local mode falls back to development defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let jwt_secret = match (env::var("JWT_SECRET_KEY"), &env) {
            (Ok(secret), _) if !secret.is_empty() => secret,
            (_, Env::Production) => return Err(ConfigError::Missing("JWT_SECRET_KEY")),
            (_, Env::Local) => defaults.jwt_secret,
        };

        let db_url = match (env::var("DATABASE_URL").ok(), &env) {
            (Some(url), _) if !url.is_empty() => Some(url),
            (_, Env::Production) => return Err(ConfigError::Missing("DATABASE_URL")),
            (_, Env::Local) => None,
        };

        let max_page_size = parse_or("MAX_PAGE_SIZE", defaults.max_page_size)?;
        let default_page_size =
            parse_or("DEFAULT_PAGE_SIZE", defaults.default_page_size)?.min(max_page_size);

        Ok(Self {
            env,
            db_url,
            jwt_secret,
            access_token_expire_minutes: parse_minutes(
                "ACCESS_TOKEN_EXPIRE_MINUTES",
                defaults.access_token_expire_minutes,
            )?,
            refresh_token_expire_minutes: parse_minutes(
                "REFRESH_TOKEN_EXPIRE_MINUTES",
                defaults.refresh_token_expire_minutes,
            )?,
            default_page_size,
            max_page_size,
            job_history_size: parse_or("JOB_HISTORY_SIZE", defaults.job_history_size)?,
            bind_addr: env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            cors_origins: env::var("BACKEND_CORS_ORIGINS")
                .map(|raw| split_origins(&raw))
                .unwrap_or_default(),
            first_superuser_email: env::var("FIRST_SUPERUSER_EMAIL")
                .unwrap_or(defaults.first_superuser_email),
            first_superuser_password: env::var("FIRST_SUPERUSER_PASSWORD")
                .unwrap_or(defaults.first_superuser_password),
        })
    }

    /// Builds the explicit settings value the token service is constructed from.
    pub fn token_settings(&self) -> TokenSettings {
        TokenSettings {
            secret: self.jwt_secret.clone(),
            access_ttl_secs: self.access_token_expire_minutes.saturating_mul(60),
            refresh_ttl_secs: self.refresh_token_expire_minutes.saturating_mul(60),
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        _ => Ok(default),
    }
}

/// A token lifetime must be positive and still fit in seconds once multiplied out.
fn parse_minutes(key: &'static str, default: i64) -> Result<i64, ConfigError> {
    let minutes = parse_or(key, default)?;
    if minutes <= 0 || minutes.checked_mul(60).is_none() {
        return Err(ConfigError::Invalid {
            key,
            value: minutes.to_string(),
        });
    }
    Ok(minutes)
}

/// Comma-separated origin list; blank entries are dropped.
pub fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

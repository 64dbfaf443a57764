//! # Application Configuration
//!
//! Typed settings loaded once at startup and injected into the application
//! state. Nothing downstream reads process environment variables directly;
//! the error responder, cookie flags and email transport all branch on
//! [`Config`].

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

use crate::utils::secret::get_secret;

/// Errors raised while assembling [`Config`] from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting `{0}`")]
    Missing(&'static str),
    #[error("invalid value `{value}` for `{name}`")]
    Invalid { name: &'static str, value: String },
}

/// Deployment mode. Controls error verbosity and cookie security.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl std::str::FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "development" | "dev" | "test" => Ok(Environment::Development),
            _ => Err(ConfigError::Invalid {
                name: "APP_ENV",
                value: s.to_string(),
            }),
        }
    }
}

/// Fixed-window request ceiling applied per client IP on `/api` routes.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 1000,
            window: Duration::from_secs(60 * 60),
        }
    }
}

/// Credentials for the external email API.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: SecretString,
    pub sender: String,
}

/// Complete application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub port: u16,
    pub database_url: SecretString,
    pub jwt_secret: SecretString,
    /// Lifetime of issued access tokens.
    pub jwt_expires_in: Duration,
    /// Lifetime of the `jwt` session cookie.
    pub jwt_cookie_expires_in: Duration,
    /// Externally visible base URL, used in emailed links.
    pub public_url: String,
    pub rate_limit: RateLimitConfig,
    pub static_dir: PathBuf,
    /// `None` selects the logging mock emailer.
    pub mail: Option<MailConfig>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `APP_ENV` - `production` or `development` (default `development`)
    /// - `PORT` - listening port (default `3000`)
    /// - `DATABASE_URL` / `DATABASE_URL_FILE` - Postgres connection string
    /// - `JWT_SECRET` / `JWT_SECRET_FILE` - HMAC secret for tokens
    /// - `JWT_EXPIRES_IN` - token lifetime such as `90d`, `12h`, `30m` (default `90d`)
    /// - `JWT_COOKIE_EXPIRES_IN` - cookie lifetime in days (default `90`)
    /// - `PUBLIC_URL` - base URL used in emails (default `http://127.0.0.1:<PORT>`)
    /// - `RATE_LIMIT_MAX`, `RATE_LIMIT_WINDOW_SECS` - API rate ceiling
    /// - `STATIC_DIR` - directory served under `/static` (default `public`)
    /// - `MAIL_API_URL`, `MAIL_API_KEY` / `MAIL_API_KEY_FILE`, `SENDER_EMAIL` - optional mail API
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = match env::var("APP_ENV") {
            Ok(value) => value.parse()?,
            Err(_) => Environment::Development,
        };

        let port = parse_var("PORT", 3000u16)?;

        let database_url =
            get_secret("DATABASE_URL_FILE", "DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let jwt_secret =
            get_secret("JWT_SECRET_FILE", "JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let jwt_expires_in = match env::var("JWT_EXPIRES_IN") {
            Ok(value) => parse_duration(&value).ok_or(ConfigError::Invalid {
                name: "JWT_EXPIRES_IN",
                value,
            })?,
            Err(_) => Duration::from_secs(90 * 24 * 60 * 60),
        };
        let cookie_days = parse_var("JWT_COOKIE_EXPIRES_IN", 90u64)?;

        let public_url = env::var("PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://127.0.0.1:{port}"))
            .trim_end_matches('/')
            .to_string();

        let defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            max_requests: parse_var("RATE_LIMIT_MAX", defaults.max_requests)?,
            window: Duration::from_secs(parse_var(
                "RATE_LIMIT_WINDOW_SECS",
                defaults.window.as_secs(),
            )?),
        };

        let static_dir = env::var("STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("public"));

        let mail = match env::var("MAIL_API_URL") {
            Ok(api_url) => Some(MailConfig {
                api_url,
                api_key: get_secret("MAIL_API_KEY_FILE", "MAIL_API_KEY")
                    .ok_or(ConfigError::Missing("MAIL_API_KEY"))?,
                sender: env::var("SENDER_EMAIL").map_err(|_| ConfigError::Missing("SENDER_EMAIL"))?,
            }),
            Err(_) => None,
        };

        Ok(Self {
            environment,
            port,
            database_url,
            jwt_secret,
            jwt_expires_in,
            jwt_cookie_expires_in: Duration::from_secs(cookie_days.saturating_mul(24 * 60 * 60)),
            public_url,
            rate_limit,
            static_dir,
            mail,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

/// Parses durations written as `<number><unit>` with unit `s`, `m`, `h` or `d`.
/// A bare number is read as seconds.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let amount: u64 = digits.parse().ok()?;
    let seconds = match unit {
        "" | "s" => amount,
        "m" => amount.checked_mul(60)?,
        "h" => amount.checked_mul(60 * 60)?,
        "d" => amount.checked_mul(24 * 60 * 60)?,
        _ => return None,
    };
    Some(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_duration_units() {
        assert_eq!(parse_duration("90d"), Some(Duration::from_secs(90 * 86_400)));
        assert_eq!(parse_duration("12h"), Some(Duration::from_secs(12 * 3_600)));
        assert_eq!(parse_duration("30m"), Some(Duration::from_secs(1_800)));
        assert_eq!(parse_duration("45"), Some(Duration::from_secs(45)));
        assert_eq!(parse_duration("5w"), None);
        assert_eq!(parse_duration("d"), None);
    }

    #[test]
    fn parses_environment_names() {
        assert_eq!("PRODUCTION".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("development".parse::<Environment>().unwrap(), Environment::Development);
        assert!("staging".parse::<Environment>().is_err());
    }
}

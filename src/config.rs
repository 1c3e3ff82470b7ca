/*
 * Responsibility
 * - Read environment / .env once at startup (auth key, Mailgun, CORS, timeouts)
 * - Validate values (missing required keys fail startup)
 * - The resulting Config is immutable and handed to app::run's builders
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

pub const DEFAULT_MAILGUN_API_BASE: &str = "https://api.eu.mailgun.net/v3";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: Option<&str>) -> Self {
        match raw.unwrap_or("development").to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    pub cors_allowed_origins: Vec<String>,

    // Raw key material; normalized and parsed by services::auth::key.
    pub auth_public_key: String,
    pub auth_issuer: Option<String>,
    pub auth_audience: Option<String>,
    pub access_token_leeway_seconds: u64,

    pub mailgun_api_key: String,
    pub mailgun_api_base: Url,
    pub mailgun_blocked_lists: Vec<String>,
    pub mailgun_hidden_lists: Vec<String>,
    pub backend_timeout: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print secrets
        f.debug_struct("Config")
            .field("addr", &self.addr)
            .field("app_env", &self.app_env)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("auth_issuer", &self.auth_issuer)
            .field("auth_audience", &self.auth_audience)
            .field(
                "access_token_leeway_seconds",
                &self.access_token_leeway_seconds,
            )
            .field("mailgun_api_base", &self.mailgun_api_base.as_str())
            .field("mailgun_blocked_lists", &self.mailgun_blocked_lists)
            .field("mailgun_hidden_lists", &self.mailgun_hidden_lists)
            .field("backend_timeout", &self.backend_timeout)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// `from_env` passes `std::env::var`; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port: u16 = match lookup("PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid("PORT"))?,
            None => 8080,
        };

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(lookup("APP_ENV").as_deref());

        let cors_allowed_origins = split_list(lookup("CORS_ALLOWED_ORIGINS"));

        let auth_public_key = lookup("AUTH_PUBLIC_KEY")
            .or_else(|| lookup("KEYCLOAK_PUBLIC_KEY"))
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("AUTH_PUBLIC_KEY"))?;

        let auth_issuer = non_empty(lookup("AUTH_ISSUER"));
        let auth_audience = non_empty(lookup("AUTH_AUDIENCE"));

        let access_token_leeway_seconds = match lookup("ACCESS_TOKEN_LEEWAY_SECONDS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::Invalid("ACCESS_TOKEN_LEEWAY_SECONDS"))?,
            None => 0,
        };

        let mailgun_api_key = non_empty(lookup("MAILGUN_API_KEY"))
            .ok_or(ConfigError::Missing("MAILGUN_API_KEY"))?;

        let mailgun_api_base = non_empty(lookup("MAILGUN_API_BASE"))
            .unwrap_or_else(|| DEFAULT_MAILGUN_API_BASE.to_string());
        let mailgun_api_base =
            Url::parse(&mailgun_api_base).map_err(|_| ConfigError::Invalid("MAILGUN_API_BASE"))?;

        let mailgun_blocked_lists = split_list(lookup("MAILGUN_BLOCKED_MAILING_LISTS"));
        let mailgun_hidden_lists = split_list(lookup("MAILGUN_HIDDEN_MAILING_LISTS"));

        let backend_timeout_seconds = match lookup("BACKEND_TIMEOUT_SECONDS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .ok_or(ConfigError::Invalid("BACKEND_TIMEOUT_SECONDS"))?,
            None => 30,
        };

        Ok(Self {
            addr,
            app_env,
            cors_allowed_origins,
            auth_public_key,
            auth_issuer,
            auth_audience,
            access_token_leeway_seconds,
            mailgun_api_key,
            mailgun_api_base,
            mailgun_blocked_lists,
            mailgun_hidden_lists,
            backend_timeout: Duration::from_secs(backend_timeout_seconds),
        })
    }

    /// Whole-request budget: backend timeout plus a small margin for auth and encoding.
    pub fn request_timeout(&self) -> Duration {
        self.backend_timeout + Duration::from_secs(5)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn split_list(value: Option<String>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
}

/*
 * Responsibility
 * - 環境変数から設定を読み込む (development では .env も読む)
 * - 必須値のバリデーション (secret や URL が無ければ起動失敗)
 * - request pipeline / profile cache が使う timeout や TTL のデフォルト
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn from_env() -> Self {
        Self::parse(&std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()))
    }

    fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug)]
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

/// Secrets shared with the identity service and the browser client.
///
/// Debug output never prints the key material.
#[derive(Clone)]
pub struct Secrets {
    pub jwt_secret: String,
    pub csrf_secret: String,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    pub database_url: String,
    pub redis_url: String,
    pub profile_api_base_url: String,

    pub secrets: Secrets,
    pub access_token_leeway_seconds: u64,
    pub csrf_token_ttl_seconds: u64,

    pub profile_cache_ttl: Duration,
    pub store_timeout: Duration,

    pub request_timeout: Duration,
    pub request_body_limit_bytes: usize,
    pub cors_allowed_origins: Vec<String>,

    pub forbidden_words: Vec<String>,
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    let value = std::env::var(key).map_err(|_| ConfigError::Missing(key))?;
    if value.trim().is_empty() {
        return Err(ConfigError::Missing(key));
    }
    Ok(value)
}

fn number_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

fn comma_list(key: &'static str) -> Vec<String> {
    std::env::var(key)
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port: u16 = number_or("PORT", 3000)?;
        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::from_env();

        let database_url = required("DATABASE_URL")?;
        let redis_url = required("REDIS_URL")?;
        let profile_api_base_url = required("PROFILE_API_BASE_URL")?
            .trim_end_matches('/')
            .to_string();
        url::Url::parse(&profile_api_base_url)
            .map_err(|_| ConfigError::Invalid("PROFILE_API_BASE_URL"))?;

        let secrets = Secrets {
            jwt_secret: required("JWT_SECRET_KEY")?,
            csrf_secret: required("CSRF_SECRET")?,
        };

        let access_token_leeway_seconds = number_or("ACCESS_TOKEN_LEEWAY_SECONDS", 0)?;
        let csrf_token_ttl_seconds = number_or("CSRF_TOKEN_TTL_SECONDS", 3600)?;
        if csrf_token_ttl_seconds == 0 {
            return Err(ConfigError::Invalid("CSRF_TOKEN_TTL_SECONDS"));
        }

        let profile_cache_ttl = Duration::from_secs(number_or("PROFILE_CACHE_TTL_SECONDS", 60)?);
        let store_timeout = Duration::from_secs(number_or("STORE_TIMEOUT_SECONDS", 10)?);
        let request_timeout = Duration::from_secs(number_or("REQUEST_TIMEOUT_SECONDS", 30)?);
        let request_body_limit_bytes = number_or("REQUEST_BODY_LIMIT_BYTES", 1024 * 1024)?;

        Ok(Self {
            addr,
            app_env,
            database_url,
            redis_url,
            profile_api_base_url,
            secrets,
            access_token_leeway_seconds,
            csrf_token_ttl_seconds,
            profile_cache_ttl,
            store_timeout,
            request_timeout,
            request_body_limit_bytes,
            cors_allowed_origins: comma_list("CORS_ALLOWED_ORIGINS"),
            forbidden_words: comma_list("FORBIDDEN_WORDS"),
        })
    }
}

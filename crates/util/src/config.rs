use std::{env, fmt, net::SocketAddr, time::Duration};

use super::{server_bind_address, split_list, DEFAULT_DATABASE_URL};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_CLIENT_TIMEOUT_MS: u64 = 10_000;

/// Application runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }

    /// Returns `true` when the current environment should behave as development.
    pub fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }

    /// Returns the canonical name used for logging/metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// Runtime configuration of the catalog server resolved from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    pub database_url: String,
    pub database_max_connections: u32,
    pub cors_allowed_origins: Vec<String>,
    pub seed_demo_data: bool,
}

impl AppConfig {
    /// Constructs the configuration by reading and validating environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_value = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let environment = Environment::from_str(&env_value)?;
        let bind_addr = server_bind_address().map_err(ConfigError::BindAddress)?;

        let database_url = env::var("DATABASE_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let database_max_connections = match env::var("DATABASE_MAX_CONNECTIONS") {
            Ok(raw) => match raw.trim().parse::<u32>() {
                Ok(value) if value > 0 => value,
                _ => return Err(ConfigError::MaxConnections(raw)),
            },
            Err(_) => DEFAULT_MAX_CONNECTIONS,
        };

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|raw| split_list(&raw))
            .unwrap_or_default();

        let seed_demo_data = env::var("SEED_DEMO_DATA")
            .map(|raw| matches!(raw.trim(), "true" | "1"))
            .unwrap_or(false);

        Ok(Self {
            bind_addr,
            environment,
            database_url,
            database_max_connections,
            cors_allowed_origins,
            seed_demo_data,
        })
    }
}

/// Settings for consumers of the catalog HTTP API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the API, always ending with `/`.
    pub api_base_url: String,
    pub timeout: Duration,
}

impl ClientConfig {
    /// Reads `CATALOG_API_URL` (required) and `CATALOG_API_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base = env::var("CATALOG_API_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::MissingApiUrl)?;

        let timeout_ms = match env::var("CATALOG_API_TIMEOUT_MS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::ClientTimeout(raw.clone()))?,
            Err(_) => DEFAULT_CLIENT_TIMEOUT_MS,
        };

        Ok(Self::new(base, Duration::from_millis(timeout_ms)))
    }

    pub fn new(api_base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            api_base_url: normalize_base_url(api_base_url.into()),
            timeout,
        }
    }
}

/// Ensures relative paths join below the base URL instead of replacing its last segment.
pub fn normalize_base_url(mut value: String) -> String {
    value = value.trim().to_string();
    if !value.ends_with('/') {
        value.push('/');
    }
    value
}

/// Errors that can occur during configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    InvalidEnvironment(String),
    BindAddress(std::net::AddrParseError),
    MaxConnections(String),
    MissingApiUrl,
    ClientTimeout(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnvironment(value) => write!(
                f,
                "APP_ENV must be one of 'development', 'production', or 'test' (got {value})"
            ),
            Self::BindAddress(err) => write!(f, "invalid APP_BIND_ADDR value: {err}"),
            Self::MaxConnections(value) => write!(
                f,
                "DATABASE_MAX_CONNECTIONS must be a positive integer (got {value})"
            ),
            Self::MissingApiUrl => write!(f, "missing CATALOG_API_URL environment variable"),
            Self::ClientTimeout(value) => write!(
                f,
                "CATALOG_API_TIMEOUT_MS must be a number of milliseconds (got {value})"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
pub(crate) static ENV_GUARD: std::sync::LazyLock<std::sync::Mutex<()>> =
    std::sync::LazyLock::new(|| std::sync::Mutex::new(()));

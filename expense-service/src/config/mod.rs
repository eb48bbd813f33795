use serde::Deserialize;
use service_core::config::{self as core_config, get_env, get_env_parsed, Environment};
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct ExpenseConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub store: StoreConfig,
    pub jwt: JwtConfig,
    pub cookies: CookieConfig,
    pub security: SecurityConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Mongo,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StoreBackend::Mongo),
            "memory" | "mock" => Ok(StoreBackend::Memory),
            _ => Err(format!("Invalid store backend: {}", s)),
        }
    }
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackend::Mongo => write!(f, "mongo"),
            StoreBackend::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub mongodb: Option<MongoConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    /// HS256 secret shared by access and refresh tokens.
    pub access_key: String,
    pub access_token_expiry_minutes: i64,
    pub refresh_token_expiry_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CookieConfig {
    pub path: String,
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub login_attempts: u32,
    pub login_window_seconds: u64,
    pub register_attempts: u32,
    pub register_window_seconds: u64,
}

/// Optional variables are never mandatory, even in production.
fn optional_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ExpenseConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        let environment = Environment::from_env()?;
        let is_prod = environment.is_prod();

        let backend: StoreBackend = get_env_parsed("STORE_BACKEND", "mongo", is_prod)?;
        let mongodb = match backend {
            StoreBackend::Mongo => Some(MongoConfig {
                uri: get_env("MONGODB_URI", Some("mongodb://localhost:27017"), is_prod)?,
                database: get_env("MONGODB_DATABASE", Some("expense_tracker"), is_prod)?,
            }),
            StoreBackend::Memory => None,
        };

        let config = ExpenseConfig {
            common,
            environment,
            service_name: get_env("SERVICE_NAME", Some("expense-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: optional_env("OTLP_ENDPOINT"),
            store: StoreConfig { backend, mongodb },
            jwt: JwtConfig {
                access_key: get_env("ACCESS_KEY", None, is_prod)?,
                access_token_expiry_minutes: get_env_parsed(
                    "ACCESS_TOKEN_EXPIRY_MINUTES",
                    "60",
                    is_prod,
                )?,
                refresh_token_expiry_days: get_env_parsed("REFRESH_TOKEN_EXPIRY_DAYS", "7", is_prod)?,
            },
            cookies: CookieConfig {
                path: get_env("COOKIE_PATH", Some("/api"), is_prod)?,
                domain: optional_env("COOKIE_DOMAIN"),
            },
            security: SecurityConfig {
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            },
            rate_limit: RateLimitConfig {
                login_attempts: get_env_parsed("LOGIN_ATTEMPTS", "10", is_prod)?,
                login_window_seconds: get_env_parsed("LOGIN_WINDOW_SECONDS", "60", is_prod)?,
                register_attempts: get_env_parsed("REGISTER_ATTEMPTS", "5", is_prod)?,
                register_window_seconds: get_env_parsed("REGISTER_WINDOW_SECONDS", "3600", is_prod)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.jwt.access_key.is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "ACCESS_KEY must not be empty"
            )));
        }

        if self.jwt.access_token_expiry_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "ACCESS_TOKEN_EXPIRY_MINUTES must be positive"
            )));
        }

        if self.jwt.refresh_token_expiry_days <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "REFRESH_TOKEN_EXPIRY_DAYS must be positive"
            )));
        }

        // Cookies are sent with credentials, which browsers refuse for `*`.
        if self.security.allowed_origins.iter().any(|o| o == "*") {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Wildcard CORS origin cannot be used with credentialed cookies"
            )));
        }

        if self.environment.is_prod() && self.store.backend == StoreBackend::Memory {
            tracing::warn!("In-memory store selected in production; data will not survive restarts");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ExpenseConfig {
        ExpenseConfig {
            common: core_config::Config { port: 8080 },
            environment: Environment::Dev,
            service_name: "expense-service".to_string(),
            service_version: "test".to_string(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
            store: StoreConfig {
                backend: StoreBackend::Memory,
                mongodb: None,
            },
            jwt: JwtConfig {
                access_key: "secret".to_string(),
                access_token_expiry_minutes: 60,
                refresh_token_expiry_days: 7,
            },
            cookies: CookieConfig {
                path: "/api".to_string(),
                domain: None,
            },
            security: SecurityConfig {
                allowed_origins: vec!["http://localhost:3000".to_string()],
            },
            rate_limit: RateLimitConfig {
                login_attempts: 5,
                login_window_seconds: 60,
                register_attempts: 5,
                register_window_seconds: 60,
            },
        }
    }

    #[test]
    fn test_store_backend_parsing() {
        assert_eq!("Mongo".parse::<StoreBackend>(), Ok(StoreBackend::Mongo));
        assert_eq!("memory".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert!("postgres".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_wildcard_origin_rejected() {
        let mut config = config();
        config.security.allowed_origins = vec!["*".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_access_key_rejected() {
        let mut config = config();
        config.jwt.access_key.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_positive_expiry_rejected() {
        let mut config = config();
        config.jwt.refresh_token_expiry_days = 0;
        assert!(config.validate().is_err());
    }
}

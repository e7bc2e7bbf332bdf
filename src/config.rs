use chrono::Duration;
use derive_more::{Display, Error};
use log::{info, warn};
use std::env;

const DEV_JWT_SECRET: &str = "dev-only-jwt-secret-change-me";

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("missing environment variable '{_0}'")]
    Missing(#[error(not(source))] &'static str),

    #[display("invalid value for '{name}': {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_host: String,
    pub server_port: u16,
    pub database_path: String,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub environment: Environment,
}

impl AppConfig {
    /// Reads configuration from the process environment. The binary loads
    /// `.env` before calling this, ahead of logger setup.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let environment = match get("APP_ENV").as_deref() {
            None | Some("development") | Some("dev") => Environment::Development,
            Some("production") | Some("prod") => Environment::Production,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "APP_ENV",
                    value: other.to_string(),
                })
            }
        };

        let server_host = get("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let server_port = parse_or("SERVER_PORT", get("SERVER_PORT"), 8080u16)?;
        let database_path = get("DATABASE_PATH").unwrap_or_else(|| "todo.db".to_string());

        let jwt_secret = match get("JWT_SECRET").filter(|s| !s.is_empty()) {
            Some(secret) => secret,
            None if environment == Environment::Production => {
                return Err(ConfigError::Missing("JWT_SECRET"))
            }
            None => {
                warn!("JWT_SECRET is not set; using the development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        let ttl_hours = parse_or("JWT_EXPIRES_HOURS", get("JWT_EXPIRES_HOURS"), 168i64)?;
        if ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                name: "JWT_EXPIRES_HOURS",
                value: ttl_hours.to_string(),
            });
        }

        info!("configuration loaded ({environment:?})");

        Ok(Self {
            server_host,
            server_port,
            database_path,
            jwt_secret,
            token_ttl: Duration::hours(ttl_hours),
            environment,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_in_development() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.environment, Environment::Development);
        assert_eq!(cfg.server_host, "127.0.0.1");
        assert_eq!(cfg.server_port, 8080);
        assert_eq!(cfg.database_path, "todo.db");
        assert_eq!(cfg.jwt_secret, DEV_JWT_SECRET);
        assert_eq!(cfg.token_ttl, Duration::days(7));
    }

    #[test]
    fn production_requires_a_secret() {
        let err = config(&[("APP_ENV", "production")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("JWT_SECRET")));

        let err = config(&[("APP_ENV", "production"), ("JWT_SECRET", "")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("JWT_SECRET")));

        let cfg = config(&[("APP_ENV", "production"), ("JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(cfg.jwt_secret, "s3cret");
    }

    #[test]
    fn rejects_bad_numbers() {
        assert!(matches!(
            config(&[("SERVER_PORT", "eighty")]),
            Err(ConfigError::Invalid { name: "SERVER_PORT", .. })
        ));
        assert!(matches!(
            config(&[("JWT_EXPIRES_HOURS", "0")]),
            Err(ConfigError::Invalid { name: "JWT_EXPIRES_HOURS", .. })
        ));
        assert!(matches!(
            config(&[("APP_ENV", "staging")]),
            Err(ConfigError::Invalid { name: "APP_ENV", .. })
        ));
    }

    #[test]
    fn reads_overrides() {
        let cfg = config(&[
            ("SERVER_HOST", "0.0.0.0"),
            ("SERVER_PORT", "3000"),
            ("DATABASE_PATH", "/tmp/todos.db"),
            ("JWT_EXPIRES_HOURS", "2"),
        ])
        .unwrap();
        assert_eq!(cfg.server_host, "0.0.0.0");
        assert_eq!(cfg.server_port, 3000);
        assert_eq!(cfg.database_path, "/tmp/todos.db");
        assert_eq!(cfg.token_ttl, Duration::hours(2));
    }
}

//! Configuration management for the Keystead API
//!
//! Configuration is read from environment variables, with an optional `.env`
//! file loaded first for development.
//!
//! # Environment Variables
//!
//! - `API_HOST`: Host to bind to (default: 0.0.0.0)
//! - `API_PORT`: Port to bind to (default: 8080)
//! - `DATABASE_URL`: PostgreSQL connection string (optional; in-memory store when absent)
//! - `DATABASE_MAX_CONNECTIONS`: Maximum pool connections (default: 10)
//! - `JWT_SECRET`: Token signing secret (required, at least 32 characters)
//! - `DATA_ENCRYPTION_KEY`: Account payload encryption secret (required, at least 32 characters)
//! - `EMAIL_RELAY_URL`: HTTP email relay endpoint (optional; emails are logged when absent)
//! - `EMAIL_FROM`: Sender address (default: no-reply@keystead.local)
//! - `CORS_ORIGINS`: Comma separated allowed origins, or `*` (default: *)

use serde::{Deserialize, Serialize};
use std::env;

const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,

    /// `None` selects the in-memory store
    pub database: Option<DatabaseConfig>,

    pub jwt: JwtConfig,

    pub crypto: CryptoConfig,

    pub email: EmailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,

    pub port: u16,

    /// Allowed CORS origins; empty means any origin
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoConfig {
    pub data_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// `None` selects the logging sender
    pub relay_url: Option<String>,

    pub from: String,
}

impl Config {
    /// Loads configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing, a number fails to
    /// parse, or a secret is shorter than 32 characters.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let api_host = var("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let api_port = var("API_PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse::<u16>()?;

        let cors_origins = var("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty() && *origin != "*")
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let database = match var("DATABASE_URL") {
            Some(url) => Some(DatabaseConfig {
                url,
                max_connections: var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|| "10".to_string())
                    .parse::<u32>()?,
            }),
            None => None,
        };

        let jwt_secret = var("JWT_SECRET")
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;
        if jwt_secret.len() < MIN_SECRET_LEN {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let data_key = var("DATA_ENCRYPTION_KEY").ok_or_else(|| {
            anyhow::anyhow!("DATA_ENCRYPTION_KEY environment variable is required")
        })?;
        if data_key.len() < MIN_SECRET_LEN {
            anyhow::bail!("DATA_ENCRYPTION_KEY must be at least 32 characters long");
        }

        Ok(Self {
            api: ApiConfig {
                host: api_host,
                port: api_port,
                cors_origins,
            },
            database,
            jwt: JwtConfig { secret: jwt_secret },
            crypto: CryptoConfig { data_key },
            email: EmailConfig {
                relay_url: var("EMAIL_RELAY_URL"),
                from: var("EMAIL_FROM").unwrap_or_else(|| "no-reply@keystead.local".to_string()),
            },
        })
    }

    /// Returns the socket address string to bind to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const JWT: &str = "test-secret-key-at-least-32-bytes-long";
    const DATA: &str = "test-data-key-that-is-at-least-32-long";

    fn load(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("JWT_SECRET", JWT), ("DATA_ENCRYPTION_KEY", DATA)]).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert!(config.database.is_none());
        assert!(config.email.relay_url.is_none());
        assert_eq!(config.email.from, "no-reply@keystead.local");
        assert!(config.api.cors_origins.is_empty());
    }

    #[test]
    fn test_full_configuration() {
        let config = load(&[
            ("API_HOST", "127.0.0.1"),
            ("API_PORT", "9000"),
            ("DATABASE_URL", "postgresql://localhost/keystead"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
            ("JWT_SECRET", JWT),
            ("DATA_ENCRYPTION_KEY", DATA),
            ("EMAIL_RELAY_URL", "http://relay.local/send"),
            ("CORS_ORIGINS", "https://a.example, https://b.example"),
        ])
        .unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:9000");
        let database = config.database.unwrap();
        assert_eq!(database.max_connections, 4);
        assert_eq!(config.email.relay_url.as_deref(), Some("http://relay.local/send"));
        assert_eq!(
            config.api.cors_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }

    #[test]
    fn test_secrets_are_required_and_long() {
        assert!(load(&[("DATA_ENCRYPTION_KEY", DATA)]).is_err());
        assert!(load(&[("JWT_SECRET", JWT)]).is_err());
        assert!(load(&[("JWT_SECRET", "short"), ("DATA_ENCRYPTION_KEY", DATA)]).is_err());
        assert!(load(&[("JWT_SECRET", JWT), ("DATA_ENCRYPTION_KEY", "short")]).is_err());
    }

    #[test]
    fn test_invalid_port() {
        assert!(load(&[
            ("API_PORT", "not-a-port"),
            ("JWT_SECRET", JWT),
            ("DATA_ENCRYPTION_KEY", DATA)
        ])
        .is_err());
    }
}

//! Application configuration

use std::env;
use std::str::FromStr;

/// Broadcast bus backend, chosen once at composition time. Business
/// logic only ever sees the `BroadcastBus` trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastBackend {
    /// In-process fanout for single-process deployments.
    Local,
    /// Redis pub/sub for multi-process deployments.
    Redis,
}

impl FromStr for BroadcastBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "redis" => Ok(Self::Redis),
            _ => Err(ConfigError::Invalid(
                "BROADCAST_BACKEND must be 'local' or 'redis'",
            )),
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // Broadcast bus
    pub broadcast_backend: BroadcastBackend,
    pub redis_url: String,

    // Authentication
    pub jwt_secret: String,

    // Gateway
    pub heartbeat_interval_secs: u64,

    // Catalog service (product tagging)
    pub catalog_base_url: String,
    pub catalog_timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Server
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8001".to_string()),

            // Database
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),

            // Broadcast bus
            broadcast_backend: env::var("BROADCAST_BACKEND")
                .unwrap_or_else(|_| "local".to_string())
                .parse()?,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),

            // Authentication
            jwt_secret: {
                let secret =
                    env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
                // Shared-secret HS256 signing key must be cryptographically strong
                if secret.len() < 32 {
                    return Err(ConfigError::WeakSecret(
                        "JWT_SECRET must be at least 32 characters",
                    ));
                }
                secret
            },

            // Gateway
            heartbeat_interval_secs: env::var("HEARTBEAT_INTERVAL_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),

            // Catalog service
            catalog_base_url: env::var("CATALOG_BASE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:5000".to_string()),
            catalog_timeout_ms: env::var("CATALOG_TIMEOUT_MS")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .unwrap_or(5000),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Weak secret: {0}")]
    WeakSecret(&'static str),
    #[error("Invalid configuration value: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure config tests run serially (they modify shared env vars)
    static CONFIG_TEST_MUTEX: Mutex<()> = Mutex::new(());

    fn setup_minimal_config() {
        env::set_var("DATABASE_URL", "postgres://test");
        // Must be at least 32 characters
        env::set_var(
            "JWT_SECRET",
            "test-jwt-secret-must-be-at-least-32-characters-long",
        );
        env::remove_var("BROADCAST_BACKEND");
    }

    fn cleanup_config() {
        env::remove_var("DATABASE_URL");
        env::remove_var("JWT_SECRET");
        env::remove_var("BROADCAST_BACKEND");
    }

    #[test]
    fn test_config_validation() {
        let _lock = CONFIG_TEST_MUTEX.lock().unwrap();

        // === Missing DATABASE_URL ===
        cleanup_config();
        env::set_var(
            "JWT_SECRET",
            "test-jwt-secret-must-be-at-least-32-characters-long",
        );
        let result = Config::from_env();
        assert!(matches!(result, Err(ConfigError::Missing("DATABASE_URL"))));

        // === Weak JWT secret rejected ===
        setup_minimal_config();
        env::set_var("JWT_SECRET", "short");
        let result = Config::from_env();
        assert!(matches!(result, Err(ConfigError::WeakSecret(_))));

        // === Invalid broadcast backend rejected ===
        setup_minimal_config();
        env::set_var("BROADCAST_BACKEND", "kafka");
        let result = Config::from_env();
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        // === Valid minimal config defaults to the local bus ===
        setup_minimal_config();
        let config = Config::from_env().unwrap();
        assert_eq!(config.broadcast_backend, BroadcastBackend::Local);
        assert_eq!(config.heartbeat_interval_secs, 30);
        assert_eq!(config.catalog_timeout_ms, 5000);

        // === Redis backend selected explicitly ===
        env::set_var("BROADCAST_BACKEND", "redis");
        let config = Config::from_env().unwrap();
        assert_eq!(config.broadcast_backend, BroadcastBackend::Redis);

        cleanup_config();
    }

    #[test]
    fn test_backend_parse() {
        assert_eq!(
            "LOCAL".parse::<BroadcastBackend>().unwrap(),
            BroadcastBackend::Local
        );
        assert_eq!(
            "redis".parse::<BroadcastBackend>().unwrap(),
            BroadcastBackend::Redis
        );
        assert!("rabbitmq".parse::<BroadcastBackend>().is_err());
    }
}

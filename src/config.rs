// src/config.rs

use std::{env, net::SocketAddr, str::FromStr, time::Duration};

use dotenvy::dotenv;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub rust_log: String,
    pub bind_addr: SocketAddr,
    /// How long a completed session stays addressable before it is archived.
    pub session_retention_secs: u64,
    /// How long a stored result is kept. 0 keeps it until cleared.
    pub result_retention_secs: u64,
    pub sweep_interval_secs: u64,
    pub timeout_retry_backoff_ms: u64,
    pub timeout_max_retries: u32,
}

/// Settings the session engine needs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub session_retention: Duration,
    /// `None` keeps results until they are cleared.
    pub result_retention: Option<Duration>,
    pub timeout_retry_backoff: Duration,
    pub timeout_max_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            session_retention: Duration::from_secs(3600),
            result_retention: Some(Duration::from_secs(30 * 24 * 3600)),
            timeout_retry_backoff: Duration::from_millis(500),
            timeout_max_retries: 5,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{key} has an invalid value: {raw}")),
        Err(_) => default,
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let defaults = EngineConfig::default();

        Self {
            database_url,
            jwt_secret,
            rust_log,
            bind_addr: env_or("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000))),
            session_retention_secs: env_or(
                "SESSION_RETENTION_SECS",
                defaults.session_retention.as_secs(),
            ),
            result_retention_secs: env_or(
                "RESULT_RETENTION_SECS",
                defaults.result_retention.map_or(0, |d| d.as_secs()),
            ),
            sweep_interval_secs: env_or("SWEEP_INTERVAL_SECS", 60),
            timeout_retry_backoff_ms: env_or(
                "TIMEOUT_RETRY_BACKOFF_MS",
                defaults.timeout_retry_backoff.as_millis() as u64,
            ),
            timeout_max_retries: env_or("TIMEOUT_MAX_RETRIES", defaults.timeout_max_retries),
        }
    }

    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            session_retention: Duration::from_secs(self.session_retention_secs),
            result_retention: (self.result_retention_secs > 0)
                .then(|| Duration::from_secs(self.result_retention_secs)),
            timeout_retry_backoff: Duration::from_millis(self.timeout_retry_backoff_ms),
            timeout_max_retries: self.timeout_max_retries,
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

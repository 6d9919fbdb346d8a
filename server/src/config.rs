//! Process configuration loaded from the environment (§6). The teacher
//! reads env vars ad hoc (`DbConfig::default()`, inline `std::env::var`
//! calls in `main.rs`); this consolidates the larger environment this
//! service requires into one place, still using the teacher's
//! `unwrap_or_else`-default idiom rather than a config-file crate.

use std::time::Duration;

use crate::seal::{SealKey, SealError};

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout: Duration,
    pub db_idle_timeout: Duration,

    pub pds_url: String,
    pub plc_directory_url: String,
    /// Host suffix for community handles: `c-<name>.<instance_host>` (§4.3).
    pub instance_host: String,
    /// Base URL of the relay this instance subscribes to for `com.atproto.sync.subscribeRepos` (§4.5).
    pub relay_url: String,

    pub seal_key: SealKey,
    pub cursor_hmac_secret: Vec<u8>,

    pub server_port: u16,
    pub enable_metrics: bool,

    pub unfurl_timeout: Duration,
    pub pds_write_timeout: Duration,
    pub identity_lookup_timeout: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("SEAL_SECRET is invalid: {0}")]
    BadSealSecret(#[from] SealError),
    #[error("CURSOR_HMAC_SECRET must be valid base64: {0}")]
    BadCursorSecret(base64::DecodeError),
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_required(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::Missing(name))
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        use base64::{engine::general_purpose::STANDARD, Engine};

        let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| {
            format!(
                "postgres://{}:{}@{}:{}/{}",
                env_or("POSTGRES_USER", "postgres"),
                env_or("POSTGRES_PASSWORD", "postgres"),
                env_or("POSTGRES_HOST", "localhost"),
                env_or("POSTGRES_PORT", "5432"),
                env_or("POSTGRES_DB", "coves")
            )
        });

        let seal_secret = env_required("SEAL_SECRET")?;
        let seal_key = SealKey::from_base64(&seal_secret)?;

        let cursor_hmac_secret = STANDARD
            .decode(env_required("CURSOR_HMAC_SECRET")?)
            .map_err(ConfigError::BadCursorSecret)?;

        Ok(Self {
            database_url,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", "10").parse().unwrap_or(10),
            db_min_connections: env_or("DB_MIN_CONNECTIONS", "2").parse().unwrap_or(2),
            db_acquire_timeout: Duration::from_secs(30),
            db_idle_timeout: Duration::from_secs(600),

            pds_url: env_or("PDS_URL", "https://pds.example.com"),
            plc_directory_url: env_or("PLC_DIRECTORY_URL", "https://plc.directory"),
            instance_host: env_or("INSTANCE_HOST", "coves.social"),
            relay_url: env_or("RELAY_URL", "https://bsky.network"),

            seal_key,
            cursor_hmac_secret,

            server_port: env_or("SERVER_PORT", "8080").parse().unwrap_or(8080),
            enable_metrics: matches!(
                std::env::var("ENABLE_METRICS").as_deref(),
                Ok("1") | Ok("true") | Ok("TRUE") | Ok("yes") | Ok("YES")
            ),

            unfurl_timeout: Duration::from_secs(30),
            pds_write_timeout: Duration::from_secs(10),
            identity_lookup_timeout: Duration::from_secs(5),
        })
    }
}

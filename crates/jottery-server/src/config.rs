//! Server configuration from environment variables.
//!
//! Defaults yield a runnable server with no configuration:
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `DATABASE_URL` | `sqlite:jottery.db?mode=rwc` | SQLite store location |
//! | `PORT` | `3030` | Listen port |
//! | `MAX_PAYLOAD_SIZE` | `10485760` | Request body cap in bytes |
//!
//! Log level comes from `RUST_LOG` via `tracing_subscriber::EnvFilter`.

use jottery_core::defaults;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub max_payload_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: defaults::SERVER_DATABASE_URL.to_string(),
            port: defaults::SERVER_PORT,
            max_payload_size: defaults::MAX_PAYLOAD_SIZE,
        }
    }
}

impl Config {
    /// Read configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| defaults::SERVER_DATABASE_URL.to_string());
        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(defaults::SERVER_PORT);
        let max_payload_size = std::env::var("MAX_PAYLOAD_SIZE")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::MAX_PAYLOAD_SIZE);

        Self {
            database_url,
            port,
            max_payload_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_runnable() {
        let config = Config::default();
        assert_eq!(config.port, 3030);
        assert_eq!(config.max_payload_size, 10 * 1024 * 1024);
        assert!(config.database_url.starts_with("sqlite:"));
    }
}

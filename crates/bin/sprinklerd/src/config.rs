//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `sprinkler.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::time::Duration;

use chrono_tz::Tz;
use serde::Deserialize;

use sprinkler_adapter_virtual::DEFAULT_MAX_LINE;
use sprinkler_app::commands::DEFAULT_MANUAL_ZONE_SECONDS;
use sprinkler_app::update_fanout::DEFAULT_QUEUE_DEPTH;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Sequencing and store tuning.
    pub controller: ControllerConfig,
    /// Output line backend.
    pub outputs: OutputsConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Controller tuning.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// IANA time zone that program start times are written in.
    pub timezone: String,
    /// Bound on waiting for the store lock, a queue slot or a worker reply.
    pub lock_timeout_ms: u64,
    /// Capacity of the engine command queue and the change signal queue.
    pub queue_depth: usize,
    /// How often the engine checks for due programs.
    pub poll_interval_ms: u64,
    /// Run time of a manual zone test when the request names none.
    pub manual_zone_seconds: u32,
}

/// Output line backend selection.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OutputsConfig {
    /// Drive simulated lines instead of hardware.
    pub virtual_enabled: bool,
    /// Highest line number available on the board.
    pub max_line: u8,
}

impl Config {
    /// Load configuration from `sprinkler.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if a
    /// value fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("sprinkler.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SPRINKLER_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("SPRINKLER_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Ok(val) = std::env::var("SPRINKLER_DATABASE_URL") {
            self.database.url = val;
        }
        if let Ok(val) = std::env::var("SPRINKLER_TIMEZONE") {
            self.controller.timezone = val;
        }
        if let Ok(val) = std::env::var("SPRINKLER_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        self.timezone()?;
        if self.controller.queue_depth == 0 {
            return Err(ConfigError::Validation(
                "queue_depth must be non-zero".to_string(),
            ));
        }
        if self.controller.lock_timeout_ms == 0 || self.controller.poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "lock_timeout_ms and poll_interval_ms must be non-zero".to_string(),
            ));
        }
        if self.controller.manual_zone_seconds == 0 {
            return Err(ConfigError::Validation(
                "manual_zone_seconds must be non-zero".to_string(),
            ));
        }
        if !self.outputs.virtual_enabled {
            return Err(ConfigError::Validation(
                "no output backend enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    /// The controller's time zone.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for an unknown zone name.
    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.controller.timezone.parse().map_err(|_| {
            ConfigError::Validation(format!("unknown timezone {:?}", self.controller.timezone))
        })
    }
}

impl ControllerConfig {
    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:sprinkler.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "sprinklerd=info,sprinkler=info,tower_http=debug".to_string(),
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            lock_timeout_ms: 1000,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            poll_interval_ms: 1000,
            manual_zone_seconds: DEFAULT_MANUAL_ZONE_SECONDS,
        }
    }
}

impl Default for OutputsConfig {
    fn default() -> Self {
        Self {
            virtual_enabled: true,
            max_line: DEFAULT_MAX_LINE,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.database.url, "sqlite:sprinkler.db?mode=rwc");
        assert_eq!(config.controller.timezone, "UTC");
        assert_eq!(config.controller.queue_depth, 10);
        assert_eq!(config.controller.manual_zone_seconds, 30);
        assert!(config.outputs.virtual_enabled);
        assert_eq!(config.outputs.max_line, 39);
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.controller.lock_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [server]
            host = '127.0.0.1'
            port = 9090

            [database]
            url = 'sqlite:test.db'

            [logging]
            filter = 'debug'

            [controller]
            timezone = 'Europe/Paris'
            lock_timeout_ms = 250
            queue_depth = 4
            poll_interval_ms = 500
            manual_zone_seconds = 90

            [outputs]
            virtual_enabled = true
            max_line = 16
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.database.url, "sqlite:test.db");
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.timezone().unwrap(), chrono_tz::Europe::Paris);
        assert_eq!(config.controller.lock_timeout(), Duration::from_millis(250));
        assert_eq!(config.controller.queue_depth, 4);
        assert_eq!(config.controller.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.controller.manual_zone_seconds, 90);
        assert_eq!(config.outputs.max_line, 16);
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn should_reject_zero_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_accept_defaults() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn should_reject_unknown_timezone() {
        let mut config = Config::default();
        config.controller.timezone = "Mars/Olympus".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Validation(msg) if msg.contains("Mars/Olympus")));
    }

    #[test]
    fn should_reject_zero_queue_depth() {
        let mut config = Config::default();
        config.controller.queue_depth = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_zero_manual_duration() {
        let mut config = Config::default();
        config.controller.manual_zone_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_missing_output_backend() {
        let mut config = Config::default();
        config.outputs.virtual_enabled = false;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_format_bind_addr() {
        let mut config = Config::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 9090;
        assert_eq!(config.bind_addr(), "127.0.0.1:9090");
    }

    #[test]
    fn should_parse_partial_toml_with_defaults() {
        let toml = "
            [controller]
            timezone = 'America/New_York'
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.timezone().unwrap(), chrono_tz::America::New_York);
        assert_eq!(config.controller.poll_interval_ms, 1000);
        assert_eq!(config.database_url(), "sqlite:sprinkler.db?mode=rwc");
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }
}

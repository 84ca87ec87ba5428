//! Configuration System using Figment
//!
//! Configuration is loaded from:
//! 1. `config/lab_scpi.toml` (base configuration, optional)
//! 2. Environment variables prefixed with `LAB_SCPI_`, nested keys split on `__`
//!
//! Every field has a default, so an empty or missing file yields a usable configuration.
//!
//! # Example
//! ```no_run
//! use lab_scpi::config::LabConfig;
//!
//! let config = LabConfig::load()?;
//! println!("Logging sessions to {}", config.session.log_dir.display());
//! # Ok::<(), lab_scpi::error::ScpiError>(())
//! ```

use crate::error::{AppResult, ScpiError};
use crate::storage::ArrayFormat;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/lab_scpi.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabConfig {
    /// Diagnostics settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Session journal and array file settings
    #[serde(default)]
    pub session: SessionSettings,
    /// Communication channel settings
    #[serde(default)]
    pub transport: TransportSettings,
    /// Status polling settings
    #[serde(default)]
    pub polling: PollingSettings,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Output format for diagnostics (pretty, compact, json)
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

/// Session journal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Directory holding one `.log` journal per instrument
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Directory for arrays saved during a session
    #[serde(default = "default_array_dir")]
    pub array_dir: PathBuf,
    /// Vector answers with more values than this are saved to a file
    #[serde(default = "default_array_threshold")]
    pub array_threshold: usize,
    /// File format for saved arrays
    #[serde(default)]
    pub array_format: ArrayFormat,
}

/// Transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportSettings {
    /// Resource address (`SIM`, `TCPIP0::host::5025::SOCKET`, `GPIB0::8::INSTR`, ...)
    #[serde(default = "default_resource")]
    pub resource: String,
    /// I/O timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Appended to every command
    #[serde(default = "default_write_terminator")]
    pub write_terminator: String,
    /// Marks the end of a reply
    #[serde(default = "default_read_terminator")]
    pub read_terminator: char,
    /// Serial line speed
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

/// Polling configuration for completion waits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingSettings {
    /// Delay between two polls in milliseconds
    #[serde(default = "default_poll_interval")]
    pub interval_ms: u64,
    /// Give up after this many milliseconds
    #[serde(default = "default_poll_timeout")]
    pub timeout_ms: u64,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_array_dir() -> PathBuf {
    PathBuf::from("data/temp")
}

fn default_array_threshold() -> usize {
    16
}

fn default_resource() -> String {
    "SIM".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_write_terminator() -> String {
    "\n".to_string()
}

fn default_read_terminator() -> char {
    '\n'
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_poll_interval() -> u64 {
    100
}

fn default_poll_timeout() -> u64 {
    30_000
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            array_dir: default_array_dir(),
            array_threshold: default_array_threshold(),
            array_format: ArrayFormat::default(),
        }
    }
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            resource: default_resource(),
            timeout_ms: default_timeout_ms(),
            write_terminator: default_write_terminator(),
            read_terminator: default_read_terminator(),
            baud_rate: default_baud_rate(),
        }
    }
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval(),
            timeout_ms: default_poll_timeout(),
        }
    }
}

impl TransportSettings {
    /// I/O timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl PollingSettings {
    /// Delay between polls.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Overall poll deadline.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl LabConfig {
    /// Load configuration from `config/lab_scpi.toml` and environment variables
    ///
    /// Environment variables override the file with prefix `LAB_SCPI_`.
    /// Example: `LAB_SCPI_TRANSPORT__RESOURCE=GPIB0::8::INSTR`
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config: LabConfig = Self::figment(path.as_ref()).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Figment stack used by [`LabConfig::load_from`].
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(LabConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("LAB_SCPI_").split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(ScpiError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.application.log_format.to_lowercase().as_str()) {
            return Err(ScpiError::Configuration(format!(
                "Invalid log_format '{}'. Must be one of: {}",
                self.application.log_format,
                valid_formats.join(", ")
            )));
        }

        if self.transport.timeout_ms == 0 {
            return Err(ScpiError::Configuration(
                "transport.timeout_ms must be greater than 0".into(),
            ));
        }

        if self.transport.write_terminator.is_empty() {
            return Err(ScpiError::Configuration(
                "transport.write_terminator must not be empty".into(),
            ));
        }

        if self.polling.interval_ms == 0 {
            return Err(ScpiError::Configuration(
                "polling.interval_ms must be greater than 0".into(),
            ));
        }

        if self.polling.timeout_ms < self.polling.interval_ms {
            return Err(ScpiError::Configuration(format!(
                "polling.timeout_ms ({}) is shorter than polling.interval_ms ({})",
                self.polling.timeout_ms, self.polling.interval_ms
            )));
        }

        Ok(())
    }

    /// Same configuration talking to another resource.
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.transport.resource = resource.into();
        self
    }

    /// Same configuration writing journals and arrays below `dir`.
    pub fn with_output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.session.log_dir = dir.as_ref().join("logs");
        self.session.array_dir = dir.as_ref().join("data");
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_validate() {
        let config = LabConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.transport.resource, "SIM");
        assert_eq!(config.session.array_threshold, 16);
        assert_eq!(config.polling.interval(), Duration::from_millis(100));
    }

    #[test]
    fn invalid_log_level() {
        let mut config = LabConfig::default();
        config.application.log_level = "verbose".into();
        assert!(matches!(
            config.validate(),
            Err(ScpiError::Configuration(msg)) if msg.contains("verbose")
        ));
    }

    #[test]
    fn poll_timeout_shorter_than_interval() {
        let mut config = LabConfig::default();
        config.polling.interval_ms = 500;
        config.polling.timeout_ms = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn file_and_env_are_merged() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "lab.toml",
                r#"
                [transport]
                resource = "TCPIP0::10.0.0.5::5025::SOCKET"
                timeout_ms = 250

                [session]
                array_threshold = 4
                array_format = "csv"
                "#,
            )?;
            jail.set_env("LAB_SCPI_POLLING__INTERVAL_MS", "20");

            let config: LabConfig = LabConfig::figment(Path::new("lab.toml")).extract()?;
            assert_eq!(config.transport.resource, "TCPIP0::10.0.0.5::5025::SOCKET");
            assert_eq!(config.transport.timeout_ms, 250);
            assert_eq!(config.transport.write_terminator, "\n");
            assert_eq!(config.session.array_threshold, 4);
            assert_eq!(config.session.array_format, ArrayFormat::Csv);
            assert_eq!(config.polling.interval_ms, 20);
            Ok(())
        });
    }

    #[test]
    fn missing_file_yields_defaults() {
        Jail::expect_with(|_jail| {
            let config: LabConfig = LabConfig::figment(Path::new("absent.toml")).extract()?;
            assert_eq!(config.application.log_level, "info");
            Ok(())
        });
    }
}

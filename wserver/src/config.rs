//! Server configuration.
//!
//! Configuration comes from an optional TOML file; the `wserver` binary then
//! applies its command-line overrides. Every field has a default, so an empty
//! file is a valid configuration.
//!
//! ```toml
//! [server]
//! socket_path = "/tmp/wmediumd.sock"
//! drain_timeout_ms = 500
//!
//! [medium]
//! default_snr = 25
//! stations = ["02:00:00:00:00:01", "02:00:00:00:00:02"]
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::medium::{DEFAULT_SNR, MediumError, StationTable};
use crate::protocol::MacAddr;

pub const DEFAULT_SOCKET_PATH: &str = "/var/run/wmediumd.sock";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration value: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Filesystem path of the control socket.
    pub socket_path: PathBuf,
    /// Install a SIGINT handler that shuts the server down.
    pub handle_interrupt: bool,
    /// Exit the process after an interrupt-triggered shutdown.
    pub exit_on_interrupt: bool,
    /// How long the interrupt path waits for connections to drain.
    pub drain_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            handle_interrupt: true,
            exit_on_interrupt: true,
            drain_timeout_ms: 1000,
        }
    }
}

impl ServerConfig {
    /// Config for embedding: serves `socket_path` and leaves signals alone.
    #[must_use]
    pub fn embedded(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            handle_interrupt: false,
            exit_on_interrupt: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

/// Initial contents of the station registry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MediumConfig {
    /// SNR of every link involving a newly added station.
    pub default_snr: i32,
    pub stations: Vec<MacAddr>,
}

impl Default for MediumConfig {
    fn default() -> Self {
        Self {
            default_snr: DEFAULT_SNR,
            stations: Vec::new(),
        }
    }
}

impl MediumConfig {
    /// Builds a registry holding the configured stations, in order.
    ///
    /// # Errors
    ///
    /// [`MediumError::Duplicate`] if a station is listed twice, or
    /// [`MediumError::IdsExhausted`] if more than 255 are listed.
    pub fn build(&self) -> Result<StationTable, MediumError> {
        StationTable::with_stations(self.default_snr, self.stations.iter().copied())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub medium: MediumConfig,
}

impl Config {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] on malformed TOML, unknown keys, or bad MAC
    /// strings; [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_toml_str(s: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses the TOML file at `path`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Read`] if the file cannot be read, otherwise as
    /// [`Config::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Checks values serde cannot.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.socket_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("server.socket_path is empty".into()));
        }
        if self.medium.stations.len() > usize::from(u8::MAX) {
            return Err(ConfigError::Invalid(format!(
                "medium.stations lists {} stations, at most {} fit",
                self.medium.stations.len(),
                u8::MAX
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::medium::Medium;
    use std::io::Write;

    #[test]
    fn empty_document_is_default() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.server.socket_path, Path::new(DEFAULT_SOCKET_PATH));
        assert!(config.server.handle_interrupt);
        assert!(config.server.exit_on_interrupt);
        assert_eq!(config.server.drain_timeout(), Duration::from_secs(1));
        assert_eq!(config.medium.default_snr, 30);
    }

    #[test]
    fn parses_all_fields() {
        let config = Config::from_toml_str(
            r#"
            [server]
            socket_path = "/tmp/w.sock"
            handle_interrupt = false
            exit_on_interrupt = false
            drain_timeout_ms = 250

            [medium]
            default_snr = 12
            stations = ["02:00:00:00:00:01", "02:00:00:00:00:0A"]
            "#,
        )
        .unwrap();

        assert_eq!(config.server.socket_path, Path::new("/tmp/w.sock"));
        assert!(!config.server.handle_interrupt);
        assert_eq!(config.server.drain_timeout_ms, 250);
        assert_eq!(config.medium.default_snr, 12);
        assert_eq!(
            config.medium.stations[1],
            MacAddr::new([0x02, 0, 0, 0, 0, 0x0a])
        );
    }

    #[test]
    fn rejects_unknown_keys_and_bad_macs() {
        assert!(matches!(
            Config::from_toml_str("[server]\nport = 4"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            Config::from_toml_str("[medium]\nstations = [\"02:00\"]"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn rejects_empty_socket_path() {
        assert!(matches!(
            Config::from_toml_str("[server]\nsocket_path = \"\""),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn builds_station_table_in_order() {
        let config = Config::from_toml_str(
            "[medium]\ndefault_snr = 7\nstations = [\"02:00:00:00:00:01\", \"02:00:00:00:00:02\"]",
        )
        .unwrap();
        let table = config.medium.build().unwrap();
        let second = table.find(MacAddr::new([2, 0, 0, 0, 0, 2])).unwrap();
        assert_eq!(second.index, 1);
        assert_eq!(second.id.as_u8(), 2);
        assert_eq!(table.snr(0, 1), Some(7));
    }

    #[test]
    fn duplicate_station_fails_build() {
        let config = MediumConfig {
            default_snr: 30,
            stations: vec![MacAddr::new([2, 0, 0, 0, 0, 1]); 2],
        };
        assert!(matches!(config.build(), Err(MediumError::Duplicate(_))));
    }

    #[test]
    fn load_reports_missing_file_and_reads_real_one() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(Config::load(&missing), Err(ConfigError::Read { .. })));

        let path = dir.path().join("wserver.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "[server]\nsocket_path = \"/tmp/x.sock\"").unwrap();
        drop(file);
        let config = Config::load(&path).unwrap();
        assert_eq!(config.server.socket_path, Path::new("/tmp/x.sock"));
    }
}

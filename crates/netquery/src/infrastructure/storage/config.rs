//! TOML-based configuration for netquery.
//!
//! Reads `AppConfig` from an explicit path (`--config`) or from the
//! platform-appropriate config file:
//! - Windows:  `%APPDATA%\NetQuery\config.toml`
//! - Linux:    `~/.config/netquery/config.toml`
//! - macOS:    `~/Library/Application Support/NetQuery/config.toml`
//!
//! Example:
//!
//! ```toml
//! [general]
//! log_level = "debug"
//!
//! [network]
//! port = 2342
//! bind_address = "0.0.0.0"
//! broadcast_address = "192.168.1.255"
//!
//! [responder]
//! description = "Friday deathmatch"
//! game_mode = "commercial"
//! game_mission = "doom2"
//! max_players = 4
//! ```
//!
//! # Serde default values
//!
//! Every field carries `#[serde(default = "...")]` and every section
//! `#[serde(default)]`, so an empty file, a missing file, and a file from an
//! older release all load.  Command-line flags are applied on top by the
//! binary.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use netquery_core::{protocol::messages::DEFAULT_PORT, GameMission, GameMode, QueryData};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// `init-config` found a file already in place and was not told to
    /// overwrite it.
    #[error("config file {} already exists", .0.display())]
    AlreadyExists(PathBuf),

    /// An address field does not hold an IP address.
    #[error("invalid {field} {value:?}: {source}")]
    InvalidAddress {
        field: &'static str,
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level application configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub responder: ResponderConfig,
}

/// Settings that apply to every subcommand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralConfig {
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    /// `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Port and address settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// Game port: broadcast queries go here, and `serve` listens here.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Local IP address to bind sockets to.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Destination IP for broadcast queries.  A subnet broadcast such as
    /// `192.168.1.255` restricts the search to one interface.
    #[serde(default = "default_broadcast_address")]
    pub broadcast_address: String,
}

/// Payload the `serve` subcommand answers queries with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponderConfig {
    #[serde(default = "default_responder_version")]
    pub version: String,
    #[serde(default = "default_description")]
    pub description: String,
    #[serde(default)]
    pub num_players: u8,
    #[serde(default = "default_max_players")]
    pub max_players: u8,
    #[serde(default = "default_game_mode")]
    pub game_mode: GameMode,
    #[serde(default = "default_game_mission")]
    pub game_mission: GameMission,
    /// Whether to report a game in progress.
    #[serde(default)]
    pub game_running: bool,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_broadcast_address() -> String {
    "255.255.255.255".to_string()
}
fn default_responder_version() -> String {
    format!("netquery {}", env!("CARGO_PKG_VERSION"))
}
fn default_description() -> String {
    "netquery responder".to_string()
}
fn default_max_players() -> u8 {
    4
}
fn default_game_mode() -> GameMode {
    GameMode::Indetermined
}
fn default_game_mission() -> GameMission {
    GameMission::None
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            broadcast_address: default_broadcast_address(),
        }
    }
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            version: default_responder_version(),
            description: default_description(),
            num_players: 0,
            max_players: default_max_players(),
            game_mode: default_game_mode(),
            game_mission: default_game_mission(),
            game_running: false,
        }
    }
}

impl NetworkConfig {
    /// Parsed `bind_address`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddress`] if the field is not an IP.
    pub fn bind_ip(&self) -> Result<IpAddr, ConfigError> {
        parse_ip("bind_address", &self.bind_address)
    }

    /// Broadcast destination: `broadcast_address` on the game port.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddress`] if the field is not an IP.
    pub fn broadcast_socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        Ok(SocketAddr::new(
            parse_ip("broadcast_address", &self.broadcast_address)?,
            self.port,
        ))
    }
}

impl ResponderConfig {
    /// Builds the QUERY_RESPONSE payload this config describes.
    pub fn to_query_data(&self) -> QueryData {
        QueryData {
            version: self.version.clone(),
            server_running: self.game_running,
            num_players: self.num_players,
            max_players: self.max_players,
            game_mode: self.game_mode,
            game_mission: self.game_mission,
            description: self.description.clone(),
        }
    }
}

fn parse_ip(field: &'static str, value: &str) -> Result<IpAddr, ConfigError> {
    value
        .parse()
        .map_err(|source| ConfigError::InvalidAddress {
            field,
            value: value.to_string(),
            source,
        })
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from `path`, or from the default location when `path`
/// is `None`.
///
/// A missing file yields `AppConfig::default()`.  So does a missing platform
/// directory when no explicit path was given: netquery works without any
/// config at all.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match config_file_path() {
            Ok(p) => p,
            Err(ConfigError::NoPlatformConfigDir) => return Ok(AppConfig::default()),
            Err(e) => return Err(e),
        },
    };
    load_config_from(&path)
}

/// Loads `AppConfig` from an explicit file.
///
/// # Errors
///
/// See [`load_config`].
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let cfg: AppConfig = toml::from_str(&content)?;
            debug!("loaded config from {}", path.display());
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("no config at {}, using defaults", path.display());
            Ok(AppConfig::default())
        }
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes `config` as a fresh config file at `path`, or at the default
/// location when `path` is `None`, and returns where it was written.
///
/// # Errors
///
/// Returns [`ConfigError::AlreadyExists`] if the file exists and `overwrite`
/// is false, plus any error from [`config_file_path`] or [`save_config`].
pub fn init_config(
    config: &AppConfig,
    path: Option<&Path>,
    overwrite: bool,
) -> Result<PathBuf, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_file_path()?,
    };
    if !overwrite && path.exists() {
        return Err(ConfigError::AlreadyExists(path));
    }
    save_config(config, &path)?;
    debug!("wrote config to {}", path.display());
    Ok(path)
}

/// Resolves the platform config directory, including the `netquery` part.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("NetQuery"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("netquery"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("NetQuery")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

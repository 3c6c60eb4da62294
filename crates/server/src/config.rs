use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const CONFIG_VERSION: u32 = 1;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DATABASE: &str = "music.db";
const DEFAULT_ARTWORK: &str = "art";
const DEFAULT_BROWSE_SECS: u64 = 30;
const DEFAULT_INTERVAL_SECS: u64 = 60;
const DEFAULT_CHUNK_KIB: usize = 64;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub version: u32,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_addr: Option<String>,
    pub database_path: String,
    pub artwork_path: String,
    pub scan_on_startup: bool,
    pub discovery_enabled: bool,
    pub discovery_browse_secs: u64,
    pub discovery_interval_secs: u64,
    pub stream_chunk_kib: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            port: DEFAULT_PORT,
            bind_addr: None,
            database_path: DEFAULT_DATABASE.to_string(),
            artwork_path: DEFAULT_ARTWORK.to_string(),
            scan_on_startup: true,
            discovery_enabled: true,
            discovery_browse_secs: DEFAULT_BROWSE_SECS,
            discovery_interval_secs: DEFAULT_INTERVAL_SECS,
            stream_chunk_kib: DEFAULT_CHUNK_KIB,
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> String {
        match self.bind_addr.as_deref().map(str::trim) {
            Some(addr) if !addr.is_empty() => addr.to_string(),
            _ => format!("0.0.0.0:{}", self.port),
        }
    }

    pub fn stream_chunk_bytes(&self) -> usize {
        self.stream_chunk_kib.max(1) * 1024
    }

    fn normalize(&mut self) {
        if self.version < CONFIG_VERSION {
            self.version = CONFIG_VERSION;
        }
        if self.port == 0 {
            self.port = self
                .bind_addr
                .as_deref()
                .and_then(parse_port)
                .unwrap_or(DEFAULT_PORT);
        }
        if self.database_path.trim().is_empty() {
            self.database_path = DEFAULT_DATABASE.to_string();
        }
        if self.artwork_path.trim().is_empty() {
            self.artwork_path = DEFAULT_ARTWORK.to_string();
        }
        if self.discovery_browse_secs == 0 {
            self.discovery_browse_secs = DEFAULT_BROWSE_SECS;
        }
        if self.discovery_interval_secs == 0 {
            self.discovery_interval_secs = DEFAULT_INTERVAL_SECS;
        }
        if self.stream_chunk_kib == 0 {
            self.stream_chunk_kib = DEFAULT_CHUNK_KIB;
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "io error: {}", err),
            ConfigError::Yaml(err) => write!(f, "yaml error: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Yaml(err)
    }
}

pub fn config_path_from_env() -> PathBuf {
    match env::var("HOMEMUSIC_CONFIG") {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => default_config_path(),
    }
}

fn default_config_path() -> PathBuf {
    match env::current_exe() {
        Ok(exe) => exe
            .parent()
            .map(|dir| dir.join("config.yaml"))
            .unwrap_or_else(|| PathBuf::from("config.yaml")),
        Err(_) => PathBuf::from("config.yaml"),
    }
}

/// Returns the config and whether a default one had to be written.
pub fn load_or_create_config(path: &Path) -> Result<(ServerConfig, bool), ConfigError> {
    if path.exists() {
        let contents = fs::read_to_string(path)?;
        let mut config: ServerConfig = if contents.trim().is_empty() {
            ServerConfig::default()
        } else {
            serde_yaml::from_str(&contents)?
        };
        config.normalize();
        return Ok((config, false));
    }

    let config = ServerConfig::default();
    save_config(path, &config)?;
    Ok((config, true))
}

pub fn save_config(path: &Path, config: &ServerConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let contents = serde_yaml::to_string(config)?;
    fs::write(path, contents)?;
    Ok(())
}

/// Relative paths in the config are relative to the config file.
pub fn resolve_path(config_path: &Path, value: &str) -> PathBuf {
    let raw = PathBuf::from(value.trim());
    if raw.is_absolute() {
        return raw;
    }
    let base = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    base.join(raw)
}

fn parse_port(value: &str) -> Option<u16> {
    let port = value.rsplit(':').next()?.trim();
    port.parse::<u16>().ok().filter(|port| *port != 0)
}

//! INI configuration file.
//!
//! ```ini
//! [server]
//! base_url = http://localhost:8080
//! status_url =
//! timeout_secs = 30
//! max_concurrent_requests = 6
//! user_agent =
//!
//! [preview]
//! chunk_size = 100
//! prefetch = true
//! max_resubscribes = 3
//!
//! [logging]
//! level = info
//! directory =
//!
//! [export]
//! directory =
//! ```
//!
//! Missing keys keep their defaults; values go through the same validation as
//! `config set`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;

use super::error::ConfigError;
use super::keys::ConfigKey;
use super::preview::{PreviewConfig, DEFAULT_CHUNK_SIZE};
use crate::fetch::{ClientConfig, DEFAULT_MAX_CONCURRENT_REQUESTS, DEFAULT_TIMEOUT_SECS};
use crate::logging::LoggingConfig;
use crate::readiness::DEFAULT_MAX_RESUBSCRIBES;
use crate::status::ws_url_for;

/// Server used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Directory holding the configuration file.
pub fn config_directory() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chunkview")
}

/// Location of the configuration file.
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub base_url: String,
    /// Status channel base; derived from `base_url` when unset.
    pub status_url: Option<String>,
    pub timeout_secs: u64,
    pub max_concurrent_requests: usize,
    pub user_agent: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            status_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewSettings {
    pub chunk_size: u32,
    pub prefetch: bool,
    pub max_resubscribes: u32,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            prefetch: true,
            max_resubscribes: DEFAULT_MAX_RESUBSCRIBES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: String,
    /// Log file directory; stderr only when unset.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSettings {
    /// Export target; the working directory when unset.
    pub directory: Option<PathBuf>,
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub server: ServerSettings,
    pub preview: PreviewSettings,
    pub logging: LoggingSettings,
    pub export: ExportSettings,
}

impl ConfigFile {
    /// Load from the default location, falling back to defaults if absent.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ini_str(&text)
    }

    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let mut config = Self::default();
        for key in ConfigKey::all() {
            if let Some(value) = ini.get_from(Some(key.section()), key.key_name()) {
                key.set(&mut config, value)?;
            }
        }
        Ok(config)
    }

    /// Render every key, including unset optional ones.
    pub fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            ini.with_section(Some(key.section()))
                .set(key.key_name(), key.get(self));
        }
        ini
    }

    /// Save to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        self.to_ini()
            .write_to_file(path)
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
    }

    /// HTTP client settings.
    pub fn client_config(&self) -> ClientConfig {
        let config = ClientConfig::new(self.server.base_url.clone())
            .with_timeout(Duration::from_secs(self.server.timeout_secs))
            .with_max_concurrent_requests(self.server.max_concurrent_requests);
        match &self.server.user_agent {
            Some(agent) => config.with_user_agent(agent.clone()),
            None => config,
        }
    }

    /// Status channel base URL.
    pub fn status_url(&self) -> String {
        self.server
            .status_url
            .as_deref()
            .map(ws_url_for)
            .unwrap_or_else(|| ws_url_for(&self.server.base_url))
    }

    pub fn preview_config(&self) -> PreviewConfig {
        PreviewConfig::new()
            .with_chunk_size(self.preview.chunk_size)
            .with_prefetch(self.preview.prefetch)
            .with_max_resubscribes(self.preview.max_resubscribes)
    }

    pub fn logging_config(&self) -> LoggingConfig {
        let config = LoggingConfig::new(self.logging.level.clone());
        match &self.logging.directory {
            Some(directory) => config.with_directory(directory.clone()),
            None => config,
        }
    }

    pub fn export_directory(&self) -> PathBuf {
        self.export
            .directory
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

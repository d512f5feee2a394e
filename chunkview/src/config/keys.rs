//! Named configuration keys for `config get` / `config set`.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use tracing_subscriber::EnvFilter;

use super::error::ConfigError;
use super::file::ConfigFile;

/// A `section.key` setting in the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    ServerBaseUrl,
    ServerStatusUrl,
    ServerTimeoutSecs,
    ServerMaxConcurrentRequests,
    ServerUserAgent,
    PreviewChunkSize,
    PreviewPrefetch,
    PreviewMaxResubscribes,
    LoggingLevel,
    LoggingDirectory,
    ExportDirectory,
}

impl ConfigKey {
    /// Every key, in file order.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::ServerBaseUrl,
            ConfigKey::ServerStatusUrl,
            ConfigKey::ServerTimeoutSecs,
            ConfigKey::ServerMaxConcurrentRequests,
            ConfigKey::ServerUserAgent,
            ConfigKey::PreviewChunkSize,
            ConfigKey::PreviewPrefetch,
            ConfigKey::PreviewMaxResubscribes,
            ConfigKey::LoggingLevel,
            ConfigKey::LoggingDirectory,
            ConfigKey::ExportDirectory,
        ]
    }

    /// Full `section.key` name.
    pub fn name(&self) -> &'static str {
        match self {
            ConfigKey::ServerBaseUrl => "server.base_url",
            ConfigKey::ServerStatusUrl => "server.status_url",
            ConfigKey::ServerTimeoutSecs => "server.timeout_secs",
            ConfigKey::ServerMaxConcurrentRequests => "server.max_concurrent_requests",
            ConfigKey::ServerUserAgent => "server.user_agent",
            ConfigKey::PreviewChunkSize => "preview.chunk_size",
            ConfigKey::PreviewPrefetch => "preview.prefetch",
            ConfigKey::PreviewMaxResubscribes => "preview.max_resubscribes",
            ConfigKey::LoggingLevel => "logging.level",
            ConfigKey::LoggingDirectory => "logging.directory",
            ConfigKey::ExportDirectory => "export.directory",
        }
    }

    pub fn section(&self) -> &'static str {
        self.name()
            .split_once('.')
            .map(|(section, _)| section)
            .unwrap_or_default()
    }

    pub fn key_name(&self) -> &'static str {
        self.name()
            .split_once('.')
            .map(|(_, key)| key)
            .unwrap_or_default()
    }

    /// Current value as written to the file. Empty when unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            ConfigKey::ServerBaseUrl => config.server.base_url.clone(),
            ConfigKey::ServerStatusUrl => config.server.status_url.clone().unwrap_or_default(),
            ConfigKey::ServerTimeoutSecs => config.server.timeout_secs.to_string(),
            ConfigKey::ServerMaxConcurrentRequests => {
                config.server.max_concurrent_requests.to_string()
            }
            ConfigKey::ServerUserAgent => config.server.user_agent.clone().unwrap_or_default(),
            ConfigKey::PreviewChunkSize => config.preview.chunk_size.to_string(),
            ConfigKey::PreviewPrefetch => config.preview.prefetch.to_string(),
            ConfigKey::PreviewMaxResubscribes => config.preview.max_resubscribes.to_string(),
            ConfigKey::LoggingLevel => config.logging.level.clone(),
            ConfigKey::LoggingDirectory => path_string(&config.logging.directory),
            ConfigKey::ExportDirectory => path_string(&config.export.directory),
        }
    }

    /// Validate `value` and store it. An empty value clears optional keys.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        match self {
            ConfigKey::ServerBaseUrl => {
                config.server.base_url = self.parse_url(value, &["http://", "https://"])?;
            }
            ConfigKey::ServerStatusUrl => {
                config.server.status_url = if value.is_empty() {
                    None
                } else {
                    Some(self.parse_url(value, &["ws://", "wss://", "http://", "https://"])?)
                };
            }
            ConfigKey::ServerTimeoutSecs => config.server.timeout_secs = self.parse_positive(value)?,
            ConfigKey::ServerMaxConcurrentRequests => {
                config.server.max_concurrent_requests = self.parse_positive(value)?;
            }
            ConfigKey::ServerUserAgent => config.server.user_agent = non_empty(value),
            ConfigKey::PreviewChunkSize => config.preview.chunk_size = self.parse_positive(value)?,
            ConfigKey::PreviewPrefetch => config.preview.prefetch = self.parse_bool(value)?,
            ConfigKey::PreviewMaxResubscribes => {
                config.preview.max_resubscribes = value
                    .parse()
                    .map_err(|_| ConfigError::invalid(self.name(), value, "expected a number"))?;
            }
            ConfigKey::LoggingLevel => {
                if value.is_empty() || EnvFilter::try_new(value).is_err() {
                    return Err(ConfigError::invalid(
                        self.name(),
                        value,
                        "expected a level such as info or a filter such as chunkview=debug",
                    ));
                }
                config.logging.level = value.to_string();
            }
            ConfigKey::LoggingDirectory => config.logging.directory = non_empty(value).map(PathBuf::from),
            ConfigKey::ExportDirectory => config.export.directory = non_empty(value).map(PathBuf::from),
        }
        Ok(())
    }

    fn parse_url(&self, value: &str, schemes: &[&str]) -> Result<String, ConfigError> {
        if schemes.iter().any(|scheme| value.starts_with(scheme)) && value.len() > 8 {
            Ok(value.trim_end_matches('/').to_string())
        } else {
            Err(ConfigError::invalid(
                self.name(),
                value,
                format!("expected a URL starting with {}", schemes.join(" or ")),
            ))
        }
    }

    fn parse_positive<T>(&self, value: &str) -> Result<T, ConfigError>
    where
        T: FromStr + PartialOrd + Default,
    {
        match value.parse::<T>() {
            Ok(n) if n > T::default() => Ok(n),
            _ => Err(ConfigError::invalid(
                self.name(),
                value,
                "expected a positive number",
            )),
        }
    }

    fn parse_bool(&self, value: &str) -> Result<bool, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(ConfigError::invalid(self.name(), value, "expected true or false")),
        }
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ConfigKey::all()
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn path_string(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default()
}

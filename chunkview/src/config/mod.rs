//! Configuration.
//!
//! - [`ConfigFile`] - the INI file at `~/.config/chunkview/config.ini`
//! - [`ConfigKey`] - `section.key` names used by `config get|set|list`
//! - [`PreviewConfig`] - builder-style settings consumed by the navigator

mod error;
mod file;
mod keys;
mod preview;

pub use error::ConfigError;
pub use file::{
    config_directory, config_file_path, ConfigFile, ExportSettings, LoggingSettings,
    PreviewSettings, ServerSettings, DEFAULT_BASE_URL,
};
pub use keys::ConfigKey;
pub use preview::{PreviewConfig, DEFAULT_CHUNK_SIZE};

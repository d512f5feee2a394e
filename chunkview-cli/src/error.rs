//! CLI error type.

use std::fmt;

use chunkview::config::ConfigError;
use chunkview::logging::LoggingError;
use chunkview::PreviewError;

/// Errors surfaced to the user by `main`.
#[derive(Debug)]
pub enum CliError {
    /// Configuration could not be read, written or applied.
    Config(String),
    /// Logging could not be initialized.
    Logging(String),
    /// The preview library reported an error.
    Preview(PreviewError),
    /// Terminal or runtime I/O failed.
    Io(std::io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Logging(msg) => write!(f, "Logging error: {}", msg),
            CliError::Preview(e) => write!(f, "{}", e),
            CliError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Preview(e) => Some(e),
            CliError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e.to_string())
    }
}

impl From<PreviewError> for CliError {
    fn from(e: PreviewError) -> Self {
        CliError::Preview(e)
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e)
    }
}

//! Dataset handle validation.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::PreviewError;

/// Maximum length of a dataset handle.
pub const MAX_HANDLE_LEN: usize = 128;

fn handle_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("handle pattern is valid"))
}

/// Opaque identifier of a server-side dataset.
///
/// A handle is 1 to [`MAX_HANDLE_LEN`] characters drawn from ASCII letters,
/// digits, `-` and `_`. Anything else is rejected before a single request is
/// issued, because the identifier is interpolated into request paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatasetHandle(String);

impl DatasetHandle {
    /// Parse and validate a handle.
    pub fn parse(raw: &str) -> Result<Self, PreviewError> {
        if raw.is_empty() || raw.len() > MAX_HANDLE_LEN || !handle_pattern().is_match(raw) {
            return Err(PreviewError::InvalidHandle {
                handle: raw.to_string(),
            });
        }
        Ok(Self(raw.to_string()))
    }

    /// The handle as it appears in request paths.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for DatasetHandle {
    type Err = PreviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DatasetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DatasetHandle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

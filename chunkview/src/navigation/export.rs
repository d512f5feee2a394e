//! Export of the visible chunk.
//!
//! Formatting belongs to the collaborator behind [`ChunkExporter`]; the
//! controller only hands over the rows of the chunk currently on screen.
//! [`JsonExporter`] writes them as a JSON array file.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::dataset::Record;
use crate::error::{PreviewError, PreviewResult};

/// Where an export ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub path: PathBuf,
    pub rows: usize,
}

impl fmt::Display for ExportArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rows written to {}", self.rows, self.path.display())
    }
}

/// Turns a slice of rows into an artifact.
///
/// Called from a blocking thread, so implementations may do synchronous I/O.
pub trait ChunkExporter: Send + Sync {
    fn export(&self, rows: &[Record], filename_hint: &str) -> PreviewResult<ExportArtifact>;
}

/// Writes rows as a pretty-printed JSON array into a directory.
#[derive(Debug, Clone)]
pub struct JsonExporter {
    directory: PathBuf,
}

impl JsonExporter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Target path for `hint`: unsafe characters replaced, `.json` appended.
    pub fn path_for(&self, hint: &str) -> PathBuf {
        let stem: String = hint
            .trim()
            .trim_end_matches(".json")
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let stem = stem.trim_start_matches('.');
        let stem = if stem.is_empty() { "chunk" } else { stem };
        self.directory.join(format!("{}.json", stem))
    }
}

impl ChunkExporter for JsonExporter {
    fn export(&self, rows: &[Record], filename_hint: &str) -> PreviewResult<ExportArtifact> {
        fs::create_dir_all(&self.directory).map_err(|e| {
            PreviewError::Export(format!("{}: {}", self.directory.display(), e))
        })?;

        let path = self.path_for(filename_hint);
        let file = File::create(&path)
            .map_err(|e| PreviewError::Export(format!("{}: {}", path.display(), e)))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, rows)
            .map_err(|e| PreviewError::Export(e.to_string()))?;
        writer
            .flush()
            .map_err(|e| PreviewError::Export(format!("{}: {}", path.display(), e)))?;

        info!(path = %path.display(), rows = rows.len(), "Exported chunk");
        Ok(ExportArtifact {
            path,
            rows: rows.len(),
        })
    }
}

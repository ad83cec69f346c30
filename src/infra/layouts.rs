//! Filesystem-backed layout source lookup.
//!
//! Layouts are plain files addressed by a name-to-path convention
//! (`<directory>/<name>.html`). This is a pure accessor: caching is the
//! layout cache's responsibility.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

const SOURCE: &str = "infra::layouts";

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("layout `{name}` not found")]
    NotFound { name: String },
    #[error("layout name `{name}` is not a plain file name")]
    InvalidName { name: String },
    #[error("failed to read layout `{name}`: {source}")]
    Io {
        name: String,
        source: std::io::Error,
    },
}

/// Read-only library of named layout source files.
#[derive(Debug, Clone)]
pub struct LayoutLibrary {
    directory: PathBuf,
}

impl LayoutLibrary {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Load the raw source text for a named layout.
    pub async fn load(&self, name: &str) -> Result<String, LayoutError> {
        if !is_plain_name(name) {
            return Err(LayoutError::InvalidName {
                name: name.to_string(),
            });
        }

        let path = self.directory.join(format!("{name}.html"));
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => {
                debug!(
                    target = SOURCE,
                    op = "load",
                    layout = name,
                    path = %path.display(),
                    bytes = text.len(),
                    "Loaded layout source from storage"
                );
                Ok(text)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(LayoutError::NotFound {
                name: name.to_string(),
            }),
            Err(err) => Err(LayoutError::Io {
                name: name.to_string(),
                source: err,
            }),
        }
    }
}

/// Layout names must be plain file stems: no separators, no traversal, no
/// hidden-file prefixes.
fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

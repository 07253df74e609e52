//! Input resolution: validate a user-supplied path and name its subject.
//!
//! A bill is identified by its file **base name** alone. Every cache entry
//! and every expected-values fixture is keyed by it, so
//! `invoices/2025/GasInvoice.pdf` and `archive/GasInvoice.pdf` share cache
//! entries and will overwrite each other's results. Keep base names unique
//! within one output directory.

use crate::error::BillError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The document currently being processed, identified by base name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subject {
    path: PathBuf,
    filename: String,
}

impl Subject {
    /// Derive the subject of `path` without touching the file system.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, BillError> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| BillError::InvalidInput {
                input: path.display().to_string(),
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            filename,
        })
    }

    /// Base name of the source file, e.g. `GasInvoice_2025-12-04.pdf`.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Path the subject was resolved from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Resolve a local bill file, checking it exists and is readable.
pub fn resolve_local(path: impl AsRef<Path>) -> Result<Subject, BillError> {
    let path = path.as_ref();

    if !path.is_file() {
        return Err(BillError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    // Check read permission by attempting to open
    match std::fs::File::open(path) {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(BillError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(BillError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    }

    let subject = Subject::from_path(path)?;
    debug!("Resolved bill '{}' at {}", subject.filename(), path.display());
    Ok(subject)
}

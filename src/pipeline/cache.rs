//! File cache store: one pretty-printed JSON file per (subject, stage).
//!
//! ```text
//! <output_dir>/<basename>.md5.json      fingerprint of the source bytes
//! <output_dir>/<basename>.parse.json    Parse response
//! <output_dir>/<basename>.schema.json   schema used for the last extraction
//! <output_dir>/<basename>.extract.json  Extract response
//! ```
//!
//! Writes are plain overwrites, not temp-file-and-rename. A crash mid-write
//! leaves a truncated entry, which [`load`] reports as
//! [`CacheError::Deserialize`] and the processor treats as a miss.

use crate::error::{BillError, CacheError};
use crate::pipeline::input::Subject;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// The four entries kept per subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEntry {
    Fingerprint,
    Parse,
    Schema,
    Extract,
}

impl CacheEntry {
    pub fn suffix(&self) -> &'static str {
        match self {
            CacheEntry::Fingerprint => ".md5.json",
            CacheEntry::Parse => ".parse.json",
            CacheEntry::Schema => ".schema.json",
            CacheEntry::Extract => ".extract.json",
        }
    }

    /// Path of this entry for `subject` under `output_dir`.
    pub fn path(&self, output_dir: &Path, subject: &Subject) -> PathBuf {
        output_dir.join(format!("{}{}", subject.filename(), self.suffix()))
    }
}

/// Read and deserialise the JSON entry at `path`.
pub fn load<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, CacheError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => CacheError::NotFound {
            path: path.to_path_buf(),
        },
        _ => CacheError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })?;
    serde_json::from_str(&text).map_err(|e| CacheError::Deserialize {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Serialise `value` to `path`, creating parent directories as needed.
///
/// Output is UTF-8 with a 4-space indent; non-ASCII text is written as-is.
pub fn save<T: Serialize + ?Sized>(path: impl AsRef<Path>, value: &T) -> Result<(), BillError> {
    let path = path.as_ref();
    let write_failed = |detail: String| BillError::CacheWriteFailed {
        path: path.to_path_buf(),
        detail,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| write_failed(e.to_string()))?;
    }

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut ser)
        .map_err(|e| write_failed(e.to_string()))?;
    buf.push(b'\n');

    let mut file = std::fs::File::create(path).map_err(|e| write_failed(e.to_string()))?;
    file.write_all(&buf)
        .map_err(|e| write_failed(e.to_string()))?;
    debug!("Wrote cache entry {} ({} bytes)", path.display(), buf.len());
    Ok(())
}

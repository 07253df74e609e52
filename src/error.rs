//! Error types for the utility-bill-processor library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`BillError`] is **fatal**: the document cannot be processed (input file
//!   missing, output directory unwritable, remote service unreachable or
//!   misconfigured). Returned as `Err(BillError)` from every public
//!   [`crate::BillProcessor`] operation.
//!
//! * [`CacheError`] is **recoverable**: a cache entry is absent, unreadable, or
//!   malformed. The processor never surfaces it; every variant is treated as a
//!   cache miss and the stage falls through to a fresh remote call.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the utility-bill-processor library.
#[derive(Debug, Error)]
pub enum BillError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Bill file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The path has no usable file name (e.g. `..` or `/`).
    #[error("Invalid input '{input}': not a path to a file")]
    InvalidInput { input: String },

    /// The input exists but reading it failed part-way.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The output (cache) directory could not be created.
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A freshly fetched result could not be written to the cache.
    #[error("Failed to write cache entry '{path}': {detail}")]
    CacheWriteFailed { path: PathBuf, detail: String },

    // ── Remote service errors ─────────────────────────────────────────────
    /// No remote service could be configured (missing API key etc.).
    #[error("Document service is not configured.\n{hint}")]
    ServiceNotConfigured { hint: String },

    /// The service rejected the credential (401/403); retrying will not help.
    #[error("Authentication error from document service during {operation}: {detail}")]
    AuthError { operation: String, detail: String },

    /// The remote Parse or Extract call failed.
    #[error("Remote {operation} failed{}: {detail}", http_status(.status))]
    Remote {
        operation: String,
        status: Option<u16>,
        detail: String,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BillError {
    /// Build a [`BillError::Remote`] without an HTTP status.
    pub fn remote(operation: impl Into<String>, detail: impl ToString) -> Self {
        BillError::Remote {
            operation: operation.into(),
            status: None,
            detail: detail.to_string(),
        }
    }

    /// True for failures of the remote service itself (transport, HTTP, auth).
    ///
    /// Harnesses use this to decide between "skip this document" and "abort".
    pub fn is_remote(&self) -> bool {
        matches!(self, BillError::Remote { .. } | BillError::AuthError { .. })
    }
}

fn http_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {code})"),
        None => String::new(),
    }
}

/// A recoverable failure reading a cache entry.
///
/// Produced by [`crate::pipeline::cache::load`]. All variants mean the same
/// thing to the processor: the entry cannot be trusted, call the service.
#[derive(Debug, Error)]
pub enum CacheError {
    /// No entry exists at this path.
    #[error("cache entry '{path}' does not exist")]
    NotFound { path: PathBuf },

    /// The entry exists but could not be read.
    #[error("cache entry '{path}' is unreadable: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The entry was read but is not valid JSON for the requested type.
    #[error("cache entry '{path}' is malformed: {source}")]
    Deserialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_display_with_status() {
        let e = BillError::Remote {
            operation: "parse".into(),
            status: Some(503),
            detail: "upstream unavailable".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("parse"), "got: {msg}");
        assert!(msg.contains("HTTP 503"), "got: {msg}");
        assert!(msg.contains("upstream unavailable"), "got: {msg}");
    }

    #[test]
    fn remote_display_without_status() {
        let e = BillError::remote("extract", "connection reset");
        let msg = e.to_string();
        assert!(!msg.contains("HTTP"), "got: {msg}");
        assert!(msg.contains("connection reset"));
    }

    #[test]
    fn remote_classification() {
        assert!(BillError::remote("parse", "x").is_remote());
        assert!(BillError::AuthError {
            operation: "parse".into(),
            detail: "bad key".into()
        }
        .is_remote());
        assert!(!BillError::FileNotFound {
            path: PathBuf::from("a.pdf")
        }
        .is_remote());
    }

    #[test]
    fn file_not_found_names_path() {
        let e = BillError::FileNotFound {
            path: PathBuf::from("/tmp/GasInvoice.pdf"),
        };
        assert!(e.to_string().contains("GasInvoice.pdf"));
    }
}

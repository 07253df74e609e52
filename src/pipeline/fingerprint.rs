//! Content fingerprint: MD5 over a file's bytes.
//!
//! MD5 is used for change detection only. It decides whether a cached parse
//! still describes the file on disk; it is not a security boundary.

use crate::error::BillError;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

const CHUNK_SIZE: usize = 4096;

/// The `<basename>.md5.json` cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintRecord {
    pub hash: String,
}

/// Hash the file at `path` in fixed-size chunks; returns lowercase hex.
pub fn fingerprint(path: impl AsRef<Path>) -> Result<String, BillError> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => BillError::FileNotFound {
            path: path.to_path_buf(),
        },
        ErrorKind::PermissionDenied => BillError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => BillError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    let mut hasher = Md5::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).map_err(|e| BillError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

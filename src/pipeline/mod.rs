//! Pipeline stages for utility-bill processing.
//!
//! Each submodule implements exactly one step, independent of the remote
//! service, so each is testable on its own with nothing but a temp dir.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ fingerprint ──▶ cache ──▶ (remote parse) ──▶ select ──▶ cache ──▶ (remote extract)
//! (path)     (md5)          (.md5/.parse)                 (schema)   (.schema/.extract)
//! ```
//!
//! 1. [`input`] validates the file and derives its [`input::Subject`]
//! 2. [`fingerprint`] hashes the file's bytes to detect changes
//! 3. [`cache`] reads and writes JSON entries under the output directory
//! 4. [`select`] looks up marker phrases to choose a [`crate::bills::BillKind`]

pub mod cache;
pub mod fingerprint;
pub mod input;
pub mod select;

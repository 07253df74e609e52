//! Result types produced by the remote service and the processor.
//!
//! [`ParseResult`] and [`ExtractResult`] mirror the service's JSON responses
//! and are what the cache stores verbatim. Fields this crate does not read
//! are kept in `extra` maps so a cached response round-trips losslessly.

use crate::bills::BillKind;
use crate::pipeline::input::Subject;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Response of the remote Parse operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseResult {
    /// Authoritative document text, as Markdown.
    pub markdown: String,

    /// Document segments in reading order.
    #[serde(default)]
    pub chunks: Vec<Chunk>,

    /// Everything else in the response (splits, metadata, …).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One parsed segment of a document. Passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub markdown: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub chunk_type: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response of the remote Extract operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractResult {
    /// Field name → extracted value; keys follow the schema that was sent.
    pub extraction: Map<String, Value>,

    /// Per-field provenance (chunk references, confidence).
    #[serde(default)]
    pub extraction_metadata: Value,

    /// Call metadata (timings, credit usage, model version).
    #[serde(default)]
    pub metadata: Value,
}

impl ExtractResult {
    /// Deserialise the extraction into one of the typed bill structs.
    ///
    /// ```rust
    /// use utility_bill_processor::{ExtractResult, bills::WaterBill};
    ///
    /// # fn demo(result: &ExtractResult) -> Result<(), serde_json::Error> {
    /// let bill: WaterBill = result.to_bill()?;
    /// println!("{} m³", bill.usage_cubic_meters);
    /// # Ok(())
    /// # }
    /// ```
    pub fn to_bill<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.extraction.clone()))
    }
}

/// Where a stage's result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheOrigin {
    /// Read back from a valid cache entry; no remote call was made.
    Cache,
    /// Fetched from the remote service (and persisted).
    Remote,
}

/// Handle returned by [`crate::BillProcessor::parse`].
///
/// Carries the document's [`Subject`] so the extract stage (and any caller
/// looking up per-document fixtures) knows which cache entries belong to it.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub subject: Subject,
    pub result: ParseResult,
    pub origin: CacheOrigin,
}

impl ParsedDocument {
    pub fn markdown(&self) -> &str {
        &self.result.markdown
    }

    /// Base name of the parsed file.
    pub fn current_filename(&self) -> &str {
        self.subject.filename()
    }
}

/// Outcome of a full parse → select → extract run.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedBill {
    pub filename: String,
    pub kind: BillKind,
    pub parse_origin: CacheOrigin,
    pub extract_origin: CacheOrigin,
    pub extract: ExtractResult,
}

//! The bill processor: parse and extract stages with a side-cache.
//!
//! Both stages share one shape:
//!
//! ```text
//! START ─┬─ use_cache ──▶ CACHE_CHECK ──┬─ hit ──────────────────────────▶ DONE
//!        │                              └─ miss ─┐
//!        └─ !use_cache ──────────────────────────┴▶ REMOTE_CALL ▶ PERSIST ▶ DONE
//! ```
//!
//! A cache entry is trusted only while its freshness token matches: the
//! source file's fingerprint for parse, the schema document for extract.
//! Every cache read problem (absent, unreadable, malformed, stale) is a miss.
//! A failing remote call is terminal for that document and never retried.

use crate::ade::AdeClient;
use crate::bills::BillKind;
use crate::config::ProcessorConfig;
use crate::error::BillError;
use crate::output::{CacheOrigin, ExtractResult, ParseResult, ParsedDocument, ProcessedBill};
use crate::pipeline::cache::{self, CacheEntry};
use crate::pipeline::fingerprint::{fingerprint, FingerprintRecord};
use crate::pipeline::input::{self, Subject};
use crate::pipeline::select;
use crate::service::DocumentService;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Orchestrates fingerprinting, cache lookups, remote calls and cache writes.
///
/// Holds no per-document state: the [`Subject`] returned inside
/// [`ParsedDocument`] is passed back into [`BillProcessor::extract`]. One
/// processor can therefore be shared (`Arc<BillProcessor>`) across tasks,
/// though tasks writing the same base name still race on the cache files.
pub struct BillProcessor {
    config: ProcessorConfig,
    service: Arc<dyn DocumentService>,
}

impl std::fmt::Debug for BillProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillProcessor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BillProcessor {
    /// Build a processor and create its output directory.
    ///
    /// # Errors
    /// - [`BillError::ServiceNotConfigured`] when no service is injected and
    ///   `VISION_AGENT_API_KEY` is unset
    /// - [`BillError::OutputDirFailed`] when the output directory cannot be created
    pub fn new(config: ProcessorConfig) -> Result<Self, BillError> {
        let service = resolve_service(&config)?;

        std::fs::create_dir_all(&config.output_dir).map_err(|e| BillError::OutputDirFailed {
            path: config.output_dir.clone(),
            source: e,
        })?;
        debug!("Output directory ready: {}", config.output_dir.display());

        Ok(Self { config, service })
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    /// Parse a bill into Markdown, reusing the cached parse when the file is unchanged.
    ///
    /// The file is hashed even with `use_cache` off, so the token written
    /// next to the fresh result stays valid for later cache-enabled runs.
    ///
    /// # Errors
    /// - [`BillError::FileNotFound`] / [`BillError::PermissionDenied`] for a bad input path
    /// - [`BillError::Remote`] / [`BillError::AuthError`] when the service call fails
    pub async fn parse(&self, input_path: impl AsRef<Path>) -> Result<ParsedDocument, BillError> {
        let input_path = input_path.as_ref();
        let subject = input::resolve_local(input_path)?;
        let actual_hash = fingerprint(input_path)?;
        debug!("'{}' fingerprint {}", subject.filename(), actual_hash);

        let token = FingerprintRecord { hash: actual_hash };

        if self.config.use_cache {
            if let Some(result) = self.cached::<ParseResult, _>(
                &subject,
                CacheEntry::Fingerprint,
                &token,
                CacheEntry::Parse,
            ) {
                return Ok(ParsedDocument {
                    subject,
                    result,
                    origin: CacheOrigin::Cache,
                });
            }
        }

        let start = Instant::now();
        let result = self
            .service
            .parse(subject.path(), &self.config.parse_model)
            .await?;
        info!(
            "Parsed '{}': {} chars, {} chunks in {}ms",
            subject.filename(),
            result.markdown.len(),
            result.chunks.len(),
            start.elapsed().as_millis()
        );

        self.persist(&subject, CacheEntry::Parse, &result, CacheEntry::Fingerprint, &token);

        Ok(ParsedDocument {
            subject,
            result,
            origin: CacheOrigin::Remote,
        })
    }

    /// Extract fields from `markdown` using `schema`, reusing the cached
    /// extraction when it was produced with a structurally equal schema.
    ///
    /// # Errors
    /// [`BillError::Remote`] / [`BillError::AuthError`] when the service call fails.
    pub async fn extract(
        &self,
        subject: &Subject,
        markdown: &str,
        schema: &Value,
    ) -> Result<ExtractResult, BillError> {
        self.extract_with_origin(subject, markdown, schema)
            .await
            .map(|(result, _)| result)
    }

    async fn extract_with_origin(
        &self,
        subject: &Subject,
        markdown: &str,
        schema: &Value,
    ) -> Result<(ExtractResult, CacheOrigin), BillError> {
        if self.config.use_cache {
            if let Some(result) = self.cached::<ExtractResult, _>(
                subject,
                CacheEntry::Schema,
                schema,
                CacheEntry::Extract,
            ) {
                return Ok((result, CacheOrigin::Cache));
            }
        }

        let start = Instant::now();
        let result = self
            .service
            .extract(markdown, schema, &self.config.extract_model)
            .await?;
        info!(
            "Extracted {} fields for '{}' in {}ms",
            result.extraction.len(),
            subject.filename(),
            start.elapsed().as_millis()
        );

        self.persist(subject, CacheEntry::Extract, &result, CacheEntry::Schema, schema);

        Ok((result, CacheOrigin::Remote))
    }

    /// Run the whole pipeline for one file: parse → select schema → extract.
    pub async fn process(&self, input_path: impl AsRef<Path>) -> Result<ProcessedBill, BillError> {
        let parsed = self.parse(input_path).await?;
        let kind: BillKind = select::select_schema(parsed.markdown());
        let schema = kind.json_schema();
        info!("'{}' classified as {} bill", parsed.current_filename(), kind);

        let (extract, extract_origin) = self
            .extract_with_origin(&parsed.subject, parsed.markdown(), &schema)
            .await?;

        Ok(ProcessedBill {
            filename: parsed.current_filename().to_string(),
            kind,
            parse_origin: parsed.origin,
            extract_origin,
            extract,
        })
    }

    /// Synchronous wrapper around [`BillProcessor::process`].
    ///
    /// Creates a temporary tokio runtime internally; do not call from async code.
    pub fn process_blocking(&self, input_path: impl AsRef<Path>) -> Result<ProcessedBill, BillError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| BillError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.process(input_path))
    }

    // ── Cache helpers ────────────────────────────────────────────────────

    /// Return the cached `result_entry` if `token_entry` holds `expected`.
    fn cached<T, K>(
        &self,
        subject: &Subject,
        token_entry: CacheEntry,
        expected: &K,
        result_entry: CacheEntry,
    ) -> Option<T>
    where
        T: DeserializeOwned,
        K: DeserializeOwned + PartialEq,
    {
        let dir = self.output_dir();
        let token_path = token_entry.path(dir, subject);

        let stored: K = match cache::load(&token_path) {
            Ok(token) => token,
            Err(e) => {
                warn!("Cache miss: {}", e);
                return None;
            }
        };
        if stored != *expected {
            info!(
                "Cache stale for '{}': {} no longer matches",
                subject.filename(),
                token_path.display()
            );
            return None;
        }

        let result_path = result_entry.path(dir, subject);
        match cache::load(&result_path) {
            Ok(result) => {
                info!("Using results from cache: {}", result_path.display());
                Some(result)
            }
            Err(e) => {
                warn!("Cache miss: {}", e);
                None
            }
        }
    }

    /// Write a fresh result, then its freshness token.
    ///
    /// The previous token is removed first, so a failure at any step leaves
    /// the pair as a miss rather than an old token vouching for a new
    /// result. Failures are logged, not returned.
    fn persist<T, K>(
        &self,
        subject: &Subject,
        result_entry: CacheEntry,
        result: &T,
        token_entry: CacheEntry,
        token: &K,
    ) where
        T: Serialize,
        K: Serialize + ?Sized,
    {
        let dir = self.output_dir();
        let token_path = token_entry.path(dir, subject);
        match std::fs::remove_file(&token_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(
                    "Cannot invalidate {}: {}; leaving cache untouched",
                    token_path.display(),
                    e
                );
                return;
            }
        }
        if let Err(e) = cache::save(result_entry.path(dir, subject), result) {
            warn!("{}", e);
            return;
        }
        if let Err(e) = cache::save(&token_path, token) {
            warn!("{}", e);
        }
    }
}

/// Use the injected service if there is one, else build the HTTP client.
fn resolve_service(config: &ProcessorConfig) -> Result<Arc<dyn DocumentService>, BillError> {
    if let Some(ref service) = config.service {
        return Ok(Arc::clone(service));
    }
    let client = AdeClient::from_env(config.region)?;
    Ok(Arc::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Map};

    struct EchoService;

    #[async_trait]
    impl DocumentService for EchoService {
        async fn parse(&self, document: &Path, _model: &str) -> Result<ParseResult, BillError> {
            let text = std::fs::read_to_string(document).unwrap_or_default();
            Ok(ParseResult {
                markdown: text,
                chunks: vec![],
                extra: Map::new(),
            })
        }

        async fn extract(
            &self,
            markdown: &str,
            _schema: &Value,
            _model: &str,
        ) -> Result<ExtractResult, BillError> {
            let mut extraction = Map::new();
            extraction.insert("chars".into(), json!(markdown.chars().count()));
            Ok(ExtractResult {
                extraction,
                extraction_metadata: Value::Null,
                metadata: Value::Null,
            })
        }
    }

    fn processor(dir: &Path, use_cache: bool) -> BillProcessor {
        let config = ProcessorConfig::builder()
            .output_dir(dir.join("output"))
            .use_cache(use_cache)
            .service(Arc::new(EchoService))
            .build()
            .unwrap();
        BillProcessor::new(config).unwrap()
    }

    #[test]
    fn new_creates_nested_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let p = processor(dir.path(), false);
        assert!(p.output_dir().is_dir());
    }

    #[test]
    fn new_fails_when_output_dir_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("taken");
        std::fs::write(&file, b"").unwrap();
        let config = ProcessorConfig::builder()
            .output_dir(&file)
            .service(Arc::new(EchoService))
            .build()
            .unwrap();
        let err = BillProcessor::new(config).unwrap_err();
        assert!(matches!(err, BillError::OutputDirFailed { .. }), "got: {err}");
    }

    #[test]
    fn parse_missing_input_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let p = processor(dir.path(), true);
        let err = tokio_test::block_on(p.parse(dir.path().join("absent.pdf"))).unwrap_err();
        assert!(matches!(err, BillError::FileNotFound { .. }));
    }

    #[test]
    fn process_selects_schema_from_parsed_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let bill = dir.path().join("water.pdf");
        std::fs::write(&bill, "Λογαριασμός Ύδρευσης").unwrap();

        let p = processor(dir.path(), false);
        let out = tokio_test::block_on(p.process(&bill)).unwrap();
        assert_eq!(out.kind, BillKind::Water);
        assert_eq!(out.filename, "water.pdf");
        assert_eq!(out.parse_origin, CacheOrigin::Remote);
        assert_eq!(
            out.extract.extraction["chars"],
            json!("Λογαριασμός Ύδρευσης".chars().count())
        );
    }

    #[test]
    fn process_blocking_runs_outside_a_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let bill = dir.path().join("bill.pdf");
        std::fs::write(&bill, "plain text").unwrap();

        let p = processor(dir.path(), true);
        let first = p.process_blocking(&bill).unwrap();
        let second = p.process_blocking(&bill).unwrap();
        assert_eq!(first.kind, BillKind::Base);
        assert_eq!(second.parse_origin, CacheOrigin::Cache);
        assert_eq!(second.extract_origin, CacheOrigin::Cache);
        assert_eq!(first.extract, second.extract);
    }

    #[test]
    fn persist_writes_token_and_result() {
        let dir = tempfile::tempdir().unwrap();
        let bill = dir.path().join("gas.pdf");
        std::fs::write(&bill, "ΠΡΟΜΗΘΕΙΑ ΦΥΣΙΚΟΥ ΑΕΡΙΟΥ").unwrap();

        let p = processor(dir.path(), false);
        tokio_test::block_on(p.process(&bill)).unwrap();

        let subject = Subject::from_path(&bill).unwrap();
        for entry in [
            CacheEntry::Fingerprint,
            CacheEntry::Parse,
            CacheEntry::Schema,
            CacheEntry::Extract,
        ] {
            assert!(entry.path(p.output_dir(), &subject).is_file(), "{entry:?}");
        }
        let schema: Value = cache::load(CacheEntry::Schema.path(p.output_dir(), &subject)).unwrap();
        assert_eq!(schema, BillKind::Gas.json_schema());
    }
}

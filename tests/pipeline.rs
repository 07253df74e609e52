//! Cache state-machine tests for the bill processor.
//!
//! A counting fake stands in for the hosted service, so every test can
//! assert exactly how many remote calls a run made and what ended up on
//! disk. No network access is needed.
//!
//! Run with:
//!   cargo test --test pipeline

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use utility_bill_processor::pipeline::cache::{self, CacheEntry};
use utility_bill_processor::{
    BillError, BillKind, BillProcessor, CacheOrigin, DocumentService, ExtractResult, ParseResult,
    ProcessorConfig, Subject,
};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Parse echoes the file's text; Extract answers every schema property.
#[derive(Default)]
struct CountingService {
    parse_calls: AtomicUsize,
    extract_calls: AtomicUsize,
    fail: AtomicBool,
}

impl CountingService {
    fn parses(&self) -> usize {
        self.parse_calls.load(Ordering::SeqCst)
    }

    fn extracts(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentService for CountingService {
    async fn parse(&self, document: &Path, _model: &str) -> Result<ParseResult, BillError> {
        self.parse_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(BillError::remote("parse", "service unavailable"));
        }
        let bytes = tokio::fs::read(document)
            .await
            .map_err(|e| BillError::remote("parse", e))?;
        Ok(ParseResult {
            markdown: String::from_utf8_lossy(&bytes).into_owned(),
            chunks: vec![],
            extra: Map::new(),
        })
    }

    async fn extract(
        &self,
        _markdown: &str,
        schema: &Value,
        _model: &str,
    ) -> Result<ExtractResult, BillError> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(BillError::remote("extract", "service unavailable"));
        }
        let extraction = schema["properties"]
            .as_object()
            .map(|props| {
                props
                    .keys()
                    .map(|k| (k.clone(), Value::Null))
                    .collect::<Map<String, Value>>()
            })
            .unwrap_or_default();
        Ok(ExtractResult {
            extraction,
            extraction_metadata: json!({}),
            metadata: json!({"credit_usage": 1}),
        })
    }
}

struct Fixture {
    dir: tempfile::TempDir,
    service: Arc<CountingService>,
}

/// Route library logs through the test harness; `RUST_LOG=debug` shows cache decisions.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl Fixture {
    fn new() -> Self {
        init_tracing();
        Self {
            dir: tempfile::tempdir().unwrap(),
            service: Arc::new(CountingService::default()),
        }
    }

    fn output_dir(&self) -> PathBuf {
        self.dir.path().join("output")
    }

    fn processor(&self, use_cache: bool) -> BillProcessor {
        let config = ProcessorConfig::builder()
            .output_dir(self.output_dir())
            .use_cache(use_cache)
            .service(self.service.clone())
            .build()
            .unwrap();
        BillProcessor::new(config).unwrap()
    }

    fn bill(&self, name: &str, text: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    fn entry(&self, entry: CacheEntry, bill: &Path) -> PathBuf {
        entry.path(&self.output_dir(), &Subject::from_path(bill).unwrap())
    }
}

const GAS_TEXT: &str = "# ΠΡΟΜΗΘΕΙΑ ΦΥΣΙΚΟΥ ΑΕΡΙΟΥ\n\nΣύνολο λογαριασμού: 42,10 €\n";

// ── Parse stage ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_parse_cache_hit_skips_remote() {
    let fx = Fixture::new();
    let bill = fx.bill("GasInvoice.pdf", GAS_TEXT);
    let p = fx.processor(true);

    let first = p.parse(&bill).await.unwrap();
    let second = p.parse(&bill).await.unwrap();

    assert_eq!(fx.service.parses(), 1);
    assert_eq!(first.origin, CacheOrigin::Remote);
    assert_eq!(second.origin, CacheOrigin::Cache);
    assert_eq!(first.result, second.result);

    let on_disk: ParseResult = cache::load(fx.entry(CacheEntry::Parse, &bill)).unwrap();
    assert_eq!(on_disk, first.result);
}

#[tokio::test]
async fn test_changed_bytes_invalidate_parse_cache() {
    let fx = Fixture::new();
    let bill = fx.bill("bill.pdf", "version one");
    let p = fx.processor(true);

    p.parse(&bill).await.unwrap();
    std::fs::write(&bill, "version two").unwrap();
    let reparsed = p.parse(&bill).await.unwrap();

    assert_eq!(fx.service.parses(), 2);
    assert_eq!(reparsed.origin, CacheOrigin::Remote);
    assert_eq!(reparsed.markdown(), "version two");

    // The fresh result is cached again.
    let again = p.parse(&bill).await.unwrap();
    assert_eq!(again.origin, CacheOrigin::Cache);
    assert_eq!(fx.service.parses(), 2);
}

#[tokio::test]
async fn test_fingerprint_file_holds_md5_of_source() {
    let fx = Fixture::new();
    let bill = fx.bill("empty.pdf", "");
    fx.processor(true).parse(&bill).await.unwrap();

    let token: Value = cache::load(fx.entry(CacheEntry::Fingerprint, &bill)).unwrap();
    assert_eq!(token, json!({"hash": "d41d8cd98f00b204e9800998ecf8427e"}));
}

#[tokio::test]
async fn test_truncated_parse_entry_is_a_miss() {
    let fx = Fixture::new();
    let bill = fx.bill("bill.pdf", "Λογαριασμός Ύδρευσης");
    let p = fx.processor(true);
    p.parse(&bill).await.unwrap();

    let parse_path = fx.entry(CacheEntry::Parse, &bill);
    std::fs::write(&parse_path, "{\"markdown\": \"Λογαρ").unwrap();

    let recovered = p.parse(&bill).await.unwrap();
    assert_eq!(recovered.origin, CacheOrigin::Remote);
    assert_eq!(fx.service.parses(), 2);

    // The entry was rewritten and is valid again.
    let on_disk: ParseResult = cache::load(&parse_path).unwrap();
    assert_eq!(on_disk.markdown, "Λογαριασμός Ύδρευσης");
}

#[tokio::test]
async fn test_garbage_fingerprint_entry_is_a_miss() {
    let fx = Fixture::new();
    let bill = fx.bill("bill.pdf", "text");
    let p = fx.processor(true);
    p.parse(&bill).await.unwrap();

    std::fs::write(fx.entry(CacheEntry::Fingerprint, &bill), "not json at all").unwrap();
    let again = p.parse(&bill).await.unwrap();
    assert_eq!(again.origin, CacheOrigin::Remote);
    assert_eq!(fx.service.parses(), 2);
}

#[tokio::test]
async fn test_matching_token_without_result_is_a_miss() {
    let fx = Fixture::new();
    let bill = fx.bill("bill.pdf", "text");
    let p = fx.processor(true);
    p.parse(&bill).await.unwrap();

    std::fs::remove_file(fx.entry(CacheEntry::Parse, &bill)).unwrap();
    let again = p.parse(&bill).await.unwrap();
    assert_eq!(again.origin, CacheOrigin::Remote);
    assert_eq!(fx.service.parses(), 2);
}

#[tokio::test]
async fn test_failed_result_write_drops_the_old_token() {
    let fx = Fixture::new();
    let bill = fx.bill("bill.pdf", "version one");
    let p = fx.processor(true);
    p.parse(&bill).await.unwrap();

    // A directory in place of the parse entry makes the next result write fail.
    let parse_path = fx.entry(CacheEntry::Parse, &bill);
    std::fs::remove_file(&parse_path).unwrap();
    std::fs::create_dir(&parse_path).unwrap();
    std::fs::write(&bill, "version two").unwrap();

    let fresh = p.parse(&bill).await.unwrap();
    assert_eq!(fresh.markdown(), "version two");
    assert!(!fx.entry(CacheEntry::Fingerprint, &bill).exists());

    // Reverting the bytes cannot resurrect the old pair.
    std::fs::write(&bill, "version one").unwrap();
    let again = p.parse(&bill).await.unwrap();
    assert_eq!(again.origin, CacheOrigin::Remote);
    assert_eq!(fx.service.parses(), 3);
}

#[tokio::test]
async fn test_remote_failure_propagates_and_persists_nothing() {
    let fx = Fixture::new();
    let bill = fx.bill("bill.pdf", "text");
    fx.service.fail.store(true, Ordering::SeqCst);
    let p = fx.processor(true);

    let err = p.parse(&bill).await.unwrap_err();
    assert!(err.is_remote(), "got: {err}");
    assert!(!fx.entry(CacheEntry::Parse, &bill).exists());
    assert!(!fx.entry(CacheEntry::Fingerprint, &bill).exists());
}

#[tokio::test]
async fn test_cache_disabled_always_calls_remote_but_persists() {
    let fx = Fixture::new();
    let bill = fx.bill("bill.pdf", GAS_TEXT);

    let uncached = fx.processor(false);
    uncached.parse(&bill).await.unwrap();
    let second = uncached.parse(&bill).await.unwrap();
    assert_eq!(second.origin, CacheOrigin::Remote);
    assert_eq!(fx.service.parses(), 2);
    assert!(fx.entry(CacheEntry::Parse, &bill).is_file());
    assert!(fx.entry(CacheEntry::Fingerprint, &bill).is_file());

    // A later cache-enabled run trusts what the uncached run wrote.
    let cached = fx.processor(true).parse(&bill).await.unwrap();
    assert_eq!(cached.origin, CacheOrigin::Cache);
    assert_eq!(fx.service.parses(), 2);
}

#[tokio::test]
async fn test_missing_input_never_reaches_service() {
    let fx = Fixture::new();
    let err = fx
        .processor(true)
        .parse(fx.dir.path().join("nope.pdf"))
        .await
        .unwrap_err();
    assert!(matches!(err, BillError::FileNotFound { .. }));
    assert_eq!(fx.service.parses(), 0);
}

#[tokio::test]
async fn test_current_filename_is_base_name() {
    let fx = Fixture::new();
    std::fs::create_dir_all(fx.dir.path().join("invoices/2025")).unwrap();
    let bill = fx.bill("invoices/2025/PowerInvoice_2025-11.pdf", "text");

    let parsed = fx.processor(false).parse(&bill).await.unwrap();
    assert_eq!(parsed.current_filename(), "PowerInvoice_2025-11.pdf");
    assert!(fx
        .output_dir()
        .join("PowerInvoice_2025-11.pdf.parse.json")
        .is_file());
}

// ── Extract stage ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_extract_cache_is_keyed_on_schema() {
    let fx = Fixture::new();
    let bill = fx.bill("bill.pdf", GAS_TEXT);
    let p = fx.processor(true);
    let parsed = p.parse(&bill).await.unwrap();

    let gas = BillKind::Gas.json_schema();
    let power = BillKind::Power.json_schema();

    let a = p.extract(&parsed.subject, parsed.markdown(), &gas).await.unwrap();
    let b = p.extract(&parsed.subject, parsed.markdown(), &gas).await.unwrap();
    assert_eq!(fx.service.extracts(), 1);
    assert_eq!(a, b);

    let c = p.extract(&parsed.subject, parsed.markdown(), &power).await.unwrap();
    assert_eq!(fx.service.extracts(), 2);
    assert!(c.extraction.contains_key("television_fee"));

    let stored: Value = cache::load(fx.entry(CacheEntry::Schema, &bill)).unwrap();
    assert_eq!(stored, power);
}

#[tokio::test]
async fn test_extract_cache_ignores_markdown_changes() {
    // Only the schema guards the extract entry. A reparse leaves the extract
    // entries alone, so a changed bill with the same schema still gets the
    // old extraction back.
    let fx = Fixture::new();
    let bill = fx.bill("bill.pdf", GAS_TEXT);
    let p = fx.processor(true);
    let parsed = p.parse(&bill).await.unwrap();
    let schema = BillKind::Base.json_schema();

    p.extract(&parsed.subject, "first", &schema).await.unwrap();
    let again = p.extract(&parsed.subject, "second", &schema).await.unwrap();
    assert_eq!(fx.service.extracts(), 1);
    assert!(again.extraction.contains_key("issuer_name"));
}

#[tokio::test]
async fn test_corrupt_extract_entry_is_a_miss() {
    let fx = Fixture::new();
    let bill = fx.bill("bill.pdf", GAS_TEXT);
    let p = fx.processor(true);
    let parsed = p.parse(&bill).await.unwrap();
    let schema = BillKind::Gas.json_schema();

    p.extract(&parsed.subject, parsed.markdown(), &schema).await.unwrap();
    std::fs::write(fx.entry(CacheEntry::Extract, &bill), r#"{"extraction": 5}"#).unwrap();

    let again = p.extract(&parsed.subject, parsed.markdown(), &schema).await.unwrap();
    assert_eq!(fx.service.extracts(), 2);
    assert!(again.extraction.contains_key("usage_cubic_meters"));
}

// ── Whole pipeline ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_gas_bill_end_to_end() {
    let fx = Fixture::new();
    let bill = fx.bill("GasInvoice_2025-12-04.pdf", GAS_TEXT);

    let out = fx.processor(true).process(&bill).await.unwrap();
    assert_eq!(out.kind, BillKind::Gas);
    assert_eq!(out.filename, "GasInvoice_2025-12-04.pdf");
    for key in [
        "commission_of_natural_gas",
        "usage_cubic_meters",
        "issuer_name",
        "customer_id_number",
        "bill_total_amount",
    ] {
        assert!(out.extract.extraction.contains_key(key), "missing {key}");
    }
    assert!(!out.extract.extraction.contains_key("television_fee"));

    for entry in [
        CacheEntry::Fingerprint,
        CacheEntry::Parse,
        CacheEntry::Schema,
        CacheEntry::Extract,
    ] {
        assert!(fx.entry(entry, &bill).is_file(), "{entry:?} not written");
    }
}

#[tokio::test]
async fn test_second_run_is_fully_cached() {
    let fx = Fixture::new();
    let bill = fx.bill("bill.pdf", GAS_TEXT);

    let first = fx.processor(true).process(&bill).await.unwrap();
    let second = fx.processor(true).process(&bill).await.unwrap();

    assert_eq!(fx.service.parses(), 1);
    assert_eq!(fx.service.extracts(), 1);
    assert_eq!(second.parse_origin, CacheOrigin::Cache);
    assert_eq!(second.extract_origin, CacheOrigin::Cache);
    assert_eq!(first.extract, second.extract);
}

#[tokio::test]
async fn test_unknown_bill_falls_back_to_base_schema() {
    let fx = Fixture::new();
    let bill = fx.bill("phone.pdf", "Telephone bill, March 2025");

    let out = fx.processor(false).process(&bill).await.unwrap();
    assert_eq!(out.kind, BillKind::Base);
    assert!(out.extract.extraction.contains_key("issuer_name"));
    assert!(!out.extract.extraction.contains_key("commission_of_natural_gas"));
    assert!(!out.extract.extraction.contains_key("water_charges"));
}

#[tokio::test]
async fn test_processor_is_shareable_across_tasks() {
    let fx = Fixture::new();
    let gas = fx.bill("gas.pdf", GAS_TEXT);
    let water = fx.bill("water.pdf", "Λογαριασμός Ύδρευσης");
    let p = Arc::new(fx.processor(true));

    let a = tokio::spawn({
        let p = Arc::clone(&p);
        async move { p.process(&gas).await }
    });
    let b = tokio::spawn({
        let p = Arc::clone(&p);
        async move { p.process(&water).await }
    });

    assert_eq!(a.await.unwrap().unwrap().kind, BillKind::Gas);
    assert_eq!(b.await.unwrap().unwrap().kind, BillKind::Water);
    assert_eq!(fx.service.parses(), 2);
}

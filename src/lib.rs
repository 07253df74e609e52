//! # utility-bill-processor
//!
//! Extract structured data (issuer, customer, amounts, dates) from scanned
//! utility bills (electricity, gas and water) using a hosted
//! document-understanding API, with a local cache so unchanged bills are
//! never sent twice.
//!
//! ## Pipeline Overview
//!
//! ```text
//! bill.pdf
//!  │
//!  ├─ 1. Input        validate the file, name it by base name
//!  ├─ 2. Fingerprint  MD5 of the bytes (change detection)
//!  ├─ 3. Parse        remote OCR/layout → Markdown      (cached: .md5.json + .parse.json)
//!  ├─ 4. Select       marker phrase → Gas | Power | Water | Base schema
//!  └─ 5. Extract      remote field extraction → JSON    (cached: .schema.json + .extract.json)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use utility_bill_processor::{BillProcessor, ProcessorConfig, Region};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Credential comes from VISION_AGENT_API_KEY
//!     let config = ProcessorConfig::builder()
//!         .region(Region::Eu)
//!         .output_dir("output/")
//!         .use_cache(true)
//!         .build()?;
//!     let processor = BillProcessor::new(config)?;
//!
//!     let parsed = processor.parse("invoices/GasInvoice_2025-12-04.pdf").await?;
//!     let schema = utility_bill_processor::select_schema(parsed.markdown()).json_schema();
//!     let result = processor.extract(&parsed.subject, parsed.markdown(), &schema).await?;
//!
//!     for (field, value) in &result.extraction {
//!         println!("{field:<30} {value}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ubp` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! utility-bill-processor = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod ade;
pub mod bills;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod processor;
pub mod regression;
pub mod service;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use ade::AdeClient;
pub use bills::BillKind;
pub use config::{ProcessorConfig, ProcessorConfigBuilder, Region};
pub use error::{BillError, CacheError};
pub use output::{CacheOrigin, Chunk, ExtractResult, ParseResult, ParsedDocument, ProcessedBill};
pub use pipeline::input::Subject;
pub use pipeline::select::{select_schema, BILL_MARKERS};
pub use processor::BillProcessor;
pub use service::DocumentService;

//! The narrow capability the processor needs from the remote service.
//!
//! Only two operations are consumed: turn a document into Markdown, and
//! turn Markdown plus a JSON schema into field values. The production
//! implementation is [`crate::ade::AdeClient`]; tests inject a fake that
//! counts calls instead of touching the network.

use crate::error::BillError;
use crate::output::{ExtractResult, ParseResult};
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

/// A hosted document-understanding service.
///
/// Implementations must be `Send + Sync` so a processor can be shared
/// behind an `Arc`. Failures are reported as [`BillError::Remote`] or
/// [`BillError::AuthError`]; the processor never retries them.
#[async_trait]
pub trait DocumentService: Send + Sync {
    /// OCR and layout-parse the local file at `document`.
    async fn parse(&self, document: &Path, model: &str) -> Result<ParseResult, BillError>;

    /// Extract the fields described by `schema` from `markdown`.
    async fn extract(
        &self,
        markdown: &str,
        schema: &Value,
        model: &str,
    ) -> Result<ExtractResult, BillError>;
}

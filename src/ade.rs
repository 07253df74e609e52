//! HTTP client for the hosted Agentic Document Extraction (ADE) API.
//!
//! Two endpoints are used, both multipart POSTs authenticated with a bearer
//! token:
//!
//! ```text
//! POST {base}/v1/ade/parse    document=<file bytes>  model=dpt-2-latest
//! POST {base}/v1/ade/extract  schema=<json text>     markdown=<.md part>  model=extract-latest
//! ```
//!
//! There is no retry and no client-side timeout: a failed call surfaces as
//! [`BillError::Remote`] and the caller decides whether to skip the document.

use crate::config::Region;
use crate::error::BillError;
use crate::output::{ExtractResult, ParseResult};
use crate::service::DocumentService;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// Environment variable holding the API credential.
pub const API_KEY_ENV: &str = "VISION_AGENT_API_KEY";

const PARSE_PATH: &str = "/v1/ade/parse";
const EXTRACT_PATH: &str = "/v1/ade/extract";

/// [`DocumentService`] backed by the ADE REST API.
#[derive(Clone)]
pub struct AdeClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl fmt::Debug for AdeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdeClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl AdeClient {
    /// Create a client for `region` with an explicit credential.
    pub fn new(region: Region, api_key: impl Into<String>) -> Result<Self, BillError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(BillError::ServiceNotConfigured {
                hint: "The API key is empty.".into(),
            });
        }
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| BillError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: region.base_url().to_string(),
            api_key,
        })
    }

    /// Create a client for `region`, reading the credential from
    /// `VISION_AGENT_API_KEY`.
    pub fn from_env(region: Region) -> Result<Self, BillError> {
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Self::new(region, key),
            _ => Err(BillError::ServiceNotConfigured {
                hint: format!(
                    "Set {API_KEY_ENV} to your document-extraction API key,\n\
                     or inject a service with ProcessorConfigBuilder::service()."
                ),
            }),
        }
    }

    /// Point the client at a different host (proxy, mock server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        form: Form,
    ) -> Result<T, BillError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| BillError::remote(operation, e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(BillError::AuthError {
                operation: operation.to_string(),
                detail: format!("HTTP {status}: {body}"),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BillError::Remote {
                operation: operation.to_string(),
                status: Some(status.as_u16()),
                detail: body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| BillError::remote(operation, format!("unexpected response body: {e}")))
    }
}

#[async_trait]
impl DocumentService for AdeClient {
    async fn parse(&self, document: &Path, model: &str) -> Result<ParseResult, BillError> {
        let bytes = tokio::fs::read(document)
            .await
            .map_err(|e| BillError::ReadFailed {
                path: document.to_path_buf(),
                source: e,
            })?;
        let filename = document
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());

        info!("Parsing '{}' ({} bytes) with {}", filename, bytes.len(), model);

        let part = Part::bytes(bytes)
            .file_name(filename.clone())
            .mime_str(content_type(&filename).essence_str())
            .map_err(|e| BillError::Internal(format!("invalid MIME type: {e}")))?;
        let form = Form::new()
            .part("document", part)
            .text("model", model.to_string());

        self.post_form("parse", PARSE_PATH, form).await
    }

    async fn extract(
        &self,
        markdown: &str,
        schema: &Value,
        model: &str,
    ) -> Result<ExtractResult, BillError> {
        info!("Extracting fields from {} chars of markdown with {}", markdown.len(), model);

        let markdown_part = Part::text(markdown.to_string())
            .file_name("document.md")
            .mime_str("text/markdown")
            .map_err(|e| BillError::Internal(format!("invalid MIME type: {e}")))?;
        let form = Form::new()
            .text("schema", schema.to_string())
            .part("markdown", markdown_part)
            .text("model", model.to_string());

        self.post_form("extract", EXTRACT_PATH, form).await
    }
}

/// MIME type guessed from a file name's extension, `application/octet-stream` when unknown.
fn content_type(filename: &str) -> mime_guess::Mime {
    mime_guess::from_path(filename).first_or_octet_stream()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_from_extension() {
        assert_eq!(content_type("GasInvoice_2025-12-04.pdf").essence_str(), "application/pdf");
        assert_eq!(content_type("scan.JPG").essence_str(), "image/jpeg");
        assert_eq!(content_type("scan.webp").essence_str(), "image/webp");
        assert_eq!(content_type("scan.gif").essence_str(), "image/gif");
        assert_eq!(content_type("scan.bmp").essence_str(), "image/bmp");
        assert_eq!(content_type("noext").essence_str(), "application/octet-stream");
    }

    #[test]
    fn empty_key_is_rejected() {
        let err = AdeClient::new(Region::Eu, "   ").unwrap_err();
        assert!(matches!(err, BillError::ServiceNotConfigured { .. }));
    }

    #[test]
    fn base_url_follows_region_and_override() {
        let client = AdeClient::new(Region::Us, "k").unwrap();
        assert_eq!(client.base_url(), "https://api.va.landing.ai");
        let client = client.with_base_url("http://localhost:8080/");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn debug_redacts_key() {
        let client = AdeClient::new(Region::Eu, "secret-key").unwrap();
        let dbg = format!("{client:?}");
        assert!(!dbg.contains("secret-key"), "got: {dbg}");
    }

    #[tokio::test]
    async fn unreachable_host_is_a_remote_error() {
        let client = AdeClient::new(Region::Eu, "k")
            .unwrap()
            .with_base_url("http://127.0.0.1:9");
        let err = client
            .extract("# bill", &serde_json::json!({}), "extract-latest")
            .await
            .unwrap_err();
        assert!(err.is_remote(), "got: {err}");
    }
}

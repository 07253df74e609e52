//! Configuration types for utility-bill processing.
//!
//! All processor behaviour is controlled through [`ProcessorConfig`], built
//! via its [`ProcessorConfigBuilder`]. The API credential is deliberately not
//! part of it: [`crate::ade::AdeClient::from_env`] reads it from
//! `VISION_AGENT_API_KEY` so it never ends up in a config dump or a log line.

use crate::error::BillError;
use crate::service::DocumentService;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Default model for the remote Parse operation.
pub const DEFAULT_PARSE_MODEL: &str = "dpt-2-latest";

/// Default model for the remote Extract operation.
pub const DEFAULT_EXTRACT_MODEL: &str = "extract-latest";

/// Default cache directory, relative to the working directory.
pub const DEFAULT_OUTPUT_DIR: &str = "./output";

/// Configuration for a [`crate::BillProcessor`].
///
/// # Example
/// ```rust
/// use utility_bill_processor::{ProcessorConfig, Region};
///
/// let config = ProcessorConfig::builder()
///     .region(Region::Eu)
///     .output_dir("output/")
///     .use_cache(true)
///     .build()
///     .unwrap();
/// assert!(config.use_cache);
/// ```
#[derive(Clone)]
pub struct ProcessorConfig {
    /// Hosted-service region. Default: [`Region::Eu`].
    pub region: Region,

    /// Directory holding the `<basename>.*.json` cache entries. Default: `./output`.
    ///
    /// Created (with parents) when the processor is constructed.
    pub output_dir: PathBuf,

    /// Consult the cache before calling the service. Default: false.
    ///
    /// Results are written to `output_dir` either way; this flag only
    /// controls whether existing entries are read back.
    pub use_cache: bool,

    /// Model identifier for the Parse call. Default: `dpt-2-latest`.
    pub parse_model: String,

    /// Model identifier for the Extract call. Default: `extract-latest`.
    pub extract_model: String,

    /// Pre-constructed document service. Takes precedence over `region`.
    pub service: Option<Arc<dyn DocumentService>>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            region: Region::default(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            use_cache: false,
            parse_model: DEFAULT_PARSE_MODEL.to_string(),
            extract_model: DEFAULT_EXTRACT_MODEL.to_string(),
            service: None,
        }
    }
}

impl fmt::Debug for ProcessorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorConfig")
            .field("region", &self.region)
            .field("output_dir", &self.output_dir)
            .field("use_cache", &self.use_cache)
            .field("parse_model", &self.parse_model)
            .field("extract_model", &self.extract_model)
            .field(
                "service",
                &self.service.as_ref().map(|_| "<dyn DocumentService>"),
            )
            .finish()
    }
}

impl ProcessorConfig {
    /// Create a new builder for `ProcessorConfig`.
    pub fn builder() -> ProcessorConfigBuilder {
        ProcessorConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ProcessorConfig`].
#[derive(Debug)]
pub struct ProcessorConfigBuilder {
    config: ProcessorConfig,
}

impl ProcessorConfigBuilder {
    pub fn region(mut self, region: Region) -> Self {
        self.config.region = region;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn use_cache(mut self, v: bool) -> Self {
        self.config.use_cache = v;
        self
    }

    pub fn parse_model(mut self, model: impl Into<String>) -> Self {
        self.config.parse_model = model.into();
        self
    }

    pub fn extract_model(mut self, model: impl Into<String>) -> Self {
        self.config.extract_model = model.into();
        self
    }

    pub fn service(mut self, service: Arc<dyn DocumentService>) -> Self {
        self.config.service = Some(service);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ProcessorConfig, BillError> {
        let c = &self.config;
        if c.output_dir.as_os_str().is_empty() {
            return Err(BillError::InvalidConfig(
                "output_dir must not be empty".into(),
            ));
        }
        if c.parse_model.trim().is_empty() {
            return Err(BillError::InvalidConfig(
                "parse_model must not be empty".into(),
            ));
        }
        if c.extract_model.trim().is_empty() {
            return Err(BillError::InvalidConfig(
                "extract_model must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Deployment region of the hosted document-understanding service.
///
/// Documents and extractions stay inside the chosen region, so EU customers'
/// bills should go to [`Region::Eu`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    /// United States (the service's "production" environment).
    Us,
    /// European Union. (default)
    #[default]
    Eu,
}

impl Region {
    /// Base URL of the API in this region.
    pub fn base_url(&self) -> &'static str {
        match self {
            Region::Us => "https://api.va.landing.ai",
            Region::Eu => "https://api.va.eu-west-1.landing.ai",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Us => "us",
            Region::Eu => "eu",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = BillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "eu" => Ok(Region::Eu),
            "us" | "production" => Ok(Region::Us),
            other => Err(BillError::InvalidConfig(format!(
                "unknown region '{other}' (expected: eu, us)"
            ))),
        }
    }
}

//! Serializable client configuration, for hosts that parse their own config
//! files and hand the relevant section over.

use crate::client::builder::ExportClientBuilder;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportConfig {
    /// Collector URL, e.g. `https://collector:4317`.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<String>,
}

impl ExportConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_ms: None,
            headers: BTreeMap::new(),
            compression: None,
        }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid export config: {}", e),
                ErrorContext::new().with_source("export_config"),
            )
        })
    }

    /// A builder pre-populated from this config. TLS and the sink are set on the builder.
    pub fn into_builder(self) -> ExportClientBuilder {
        let mut builder = ExportClientBuilder::new(self.url).headers(self.headers);
        if let Some(ms) = self.timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        if let Some(name) = self.compression {
            builder = builder.compressor(name);
        }
        builder
    }
}

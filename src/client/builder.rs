use crate::client::core::ExportClient;
use crate::client::endpoint::ExportEndpoint;
use crate::client::policy::RetryPolicy;
use crate::telemetry::ExportSink;
use crate::{Error, ErrorContext, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tonic::transport::ClientTlsConfig;

/// Request timeout used when neither the builder nor the environment sets one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Builder for [`ExportClient`].
///
/// Unset knobs fall back to the environment, then to defaults:
/// - `OTLP_EXPORT_TIMEOUT_MS` (default 5000)
/// - `OTLP_EXPORT_COMPRESSION` (default none)
pub struct ExportClientBuilder {
    url: String,
    timeout: Option<Duration>,
    tls: Option<ClientTlsConfig>,
    headers: Vec<(String, String)>,
    compressor: Option<String>,
    sink: Arc<dyn ExportSink>,
    retry_policy: RetryPolicy,
}

impl ExportClientBuilder {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: None,
            tls: None,
            headers: Vec::new(),
            compressor: None,
            sink: crate::telemetry::tracing_sink(),
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Bound for dial + probe, and separately for each `store`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// TLS settings for non-`http` schemes. Defaults to the platform roots.
    pub fn tls_config(mut self, tls: ClientTlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Add one static header sent with every call.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Compressor name: `none`, `gzip` or `zstd`.
    pub fn compressor(mut self, name: impl Into<String>) -> Self {
        self.compressor = Some(name.into());
        self
    }

    /// Inject a diagnostics sink. Default forwards to `tracing`.
    pub fn sink(mut self, sink: Arc<dyn ExportSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Override the transport-level retry policy.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Validate the configuration and build the client. Does not connect.
    pub fn build(self) -> Result<ExportClient> {
        let timeout = match self.timeout {
            Some(t) => t,
            None => env_timeout()?.unwrap_or(DEFAULT_TIMEOUT),
        };
        let compressor = self
            .compressor
            .or_else(|| std::env::var("OTLP_EXPORT_COMPRESSION").ok());

        let endpoint = ExportEndpoint::resolve(
            &self.url,
            timeout,
            self.tls,
            &self.headers,
            compressor.as_deref(),
        )?;

        Ok(ExportClient {
            endpoint,
            retry: self.retry_policy,
            sink: self.sink,
            connection: Mutex::new(None),
        })
    }
}

fn env_timeout() -> Result<Option<Duration>> {
    let raw = match std::env::var("OTLP_EXPORT_TIMEOUT_MS") {
        Ok(raw) => raw,
        Err(_) => return Ok(None),
    };
    raw.trim()
        .parse::<u64>()
        .map(|ms| Some(Duration::from_millis(ms)))
        .map_err(|_| {
            Error::configuration_with_context(
                "OTLP_EXPORT_TIMEOUT_MS is not a number of milliseconds",
                ErrorContext::new()
                    .with_field_path("OTLP_EXPORT_TIMEOUT_MS")
                    .with_details(raw.clone())
                    .with_source("client_builder"),
            )
        })
}

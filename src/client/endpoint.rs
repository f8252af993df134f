//! Endpoint resolution: turns the user-facing URL, headers and compressor name
//! into the immutable descriptor the connection manager dials.

use crate::{Error, ErrorContext, Result};
use std::time::Duration;
use tonic::codec::CompressionEncoding;
use tonic::metadata::{Ascii, MetadataKey, MetadataMap, MetadataValue};
use tonic::transport::{ClientTlsConfig, Endpoint};
use url::Url;

/// Immutable description of the single export destination.
#[derive(Debug, Clone)]
pub struct ExportEndpoint {
    url: Url,
    address: String,
    plaintext: bool,
    timeout: Duration,
    tls: Option<ClientTlsConfig>,
    metadata: MetadataMap,
    compression: Option<CompressionEncoding>,
}

impl ExportEndpoint {
    pub(crate) fn resolve(
        url: &str,
        timeout: Duration,
        tls: Option<ClientTlsConfig>,
        headers: &[(String, String)],
        compressor: Option<&str>,
    ) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid endpoint URL: {}", e),
                ErrorContext::new()
                    .with_field_path("url")
                    .with_details(url.to_string())
                    .with_source("endpoint_resolver"),
            )
        })?;
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| {
                Error::configuration_with_context(
                    "endpoint URL has no host",
                    ErrorContext::new()
                        .with_field_path("url")
                        .with_details(url.to_string())
                        .with_source("endpoint_resolver"),
                )
            })?;
        let address = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        if timeout.is_zero() {
            return Err(Error::configuration_with_context(
                "timeout must be greater than zero",
                ErrorContext::new()
                    .with_field_path("timeout")
                    .with_source("endpoint_resolver"),
            ));
        }

        Ok(Self {
            plaintext: url.scheme() == "http",
            address,
            timeout,
            tls,
            metadata: metadata_from_headers(headers)?,
            compression: compressor.map(parse_compression).transpose()?.flatten(),
            url,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// `host[:port]` as dialed.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// True when the scheme is `http`; every other scheme uses TLS.
    pub fn is_plaintext(&self) -> bool {
        self.plaintext
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Static metadata attached to every call.
    pub fn metadata(&self) -> &MetadataMap {
        &self.metadata
    }

    pub fn compression(&self) -> Option<CompressionEncoding> {
        self.compression
    }

    pub(crate) fn channel_uri(&self) -> String {
        let scheme = if self.plaintext { "http" } else { "https" };
        format!("{}://{}", scheme, self.address)
    }

    /// Channel configuration for a blocking dial bounded by the endpoint timeout.
    pub(crate) fn to_channel_endpoint(&self) -> Result<Endpoint> {
        let endpoint = Endpoint::from_shared(self.channel_uri())?.connect_timeout(self.timeout);
        if self.plaintext {
            return Ok(endpoint);
        }
        let tls = self
            .tls
            .clone()
            .unwrap_or_else(|| ClientTlsConfig::new().with_native_roots());
        Ok(endpoint.tls_config(tls)?)
    }
}

/// Map a compressor name to an encoding. Empty and `"none"` disable compression.
pub fn parse_compression(name: &str) -> Result<Option<CompressionEncoding>> {
    match name.trim().to_ascii_lowercase().as_str() {
        "" | "none" => Ok(None),
        "gzip" => Ok(Some(CompressionEncoding::Gzip)),
        "zstd" => Ok(Some(CompressionEncoding::Zstd)),
        other => Err(Error::configuration_with_context(
            format!("unsupported compressor: {}", other),
            ErrorContext::new()
                .with_field_path("compression")
                .with_details("supported: none, gzip, zstd")
                .with_source("endpoint_resolver"),
        )),
    }
}

/// Validate static headers into gRPC ASCII metadata.
pub fn metadata_from_headers(headers: &[(String, String)]) -> Result<MetadataMap> {
    let mut metadata = MetadataMap::new();
    for (name, value) in headers {
        let key = MetadataKey::<Ascii>::from_bytes(name.as_bytes()).map_err(|_| {
            Error::configuration_with_context(
                "invalid header name",
                ErrorContext::new()
                    .with_field_path(format!("headers.{}", name))
                    .with_source("endpoint_resolver"),
            )
        })?;
        let value = MetadataValue::<Ascii>::try_from(value.as_str()).map_err(|_| {
            Error::configuration_with_context(
                "invalid header value",
                ErrorContext::new()
                    .with_field_path(format!("headers.{}", name))
                    .with_source("endpoint_resolver"),
            )
        })?;
        metadata.insert(key, value);
    }
    Ok(metadata)
}

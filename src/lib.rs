//! # otlp-metrics-export
//!
//! A single-endpoint export client that delivers batches of OpenTelemetry
//! resource metrics to a collector over OTLP/gRPC.
//!
//! ## Overview
//!
//! - **Lazy connection**: the channel is dialed on first use, proven live with
//!   an empty Export, and reused until [`ExportClient::close`].
//! - **Chunked delivery**: [`ExportClient::store`] splits a batch into requests
//!   of at most 500 records and sends them concurrently under one deadline.
//! - **Two retry layers**: a per-call [`RetryPolicy`] on the OTLP retryable
//!   status codes, and an outer probe loop that runs until the connect deadline.
//! - **Classification**: [`is_recoverable`] tells transient failures apart from
//!   requests the collector will never accept.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use otlp_metrics_export::{ExportClient, ResourceMetrics};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> otlp_metrics_export::Result<()> {
//!     let client = ExportClient::builder("http://localhost:4317")
//!         .timeout(Duration::from_secs(5))
//!         .header("authorization", "Bearer token")
//!         .compressor("gzip")
//!         .build()?;
//!
//!     let batch: Vec<ResourceMetrics> = Vec::new();
//!     client.store(batch).await?;
//!     client.close().await
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Export client, builder, endpoint, retry policy, classification |
//! | [`batch`] | Chunk partitioning and concurrent fan-out |
//! | [`context`] | Deadlines and cancellation |
//! | [`transport`] | gRPC channel and Export call |
//! | [`telemetry`] | Diagnostic events and sinks |
//! | [`config`] | Serializable configuration |

pub mod batch;
pub mod client;
pub mod config;
pub mod context;
pub mod telemetry;
pub mod transport;

pub mod error;
pub use error::{Error, ErrorContext};

pub use client::{
    is_recoverable, ExportClient, ExportClientBuilder, ExportEndpoint, RetryPolicy,
};
pub use config::ExportConfig;
pub use context::CallContext;
pub use telemetry::{ExportEvent, ExportSink};

pub use opentelemetry_proto::tonic::metrics::v1::ResourceMetrics;

// Re-exported so callers build TLS settings and inspect statuses with the same versions.
pub use opentelemetry_proto;
pub use tonic;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

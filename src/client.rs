//! Export client for a single OTLP/gRPC metrics endpoint.
//!
//! Keep the public surface small: build, `store`, `close`. Connection
//! management, probing and classification live in submodules under
//! `src/client/`.

pub mod builder;
mod connection;
pub mod core;
pub mod endpoint;
pub mod error_classification;
pub mod policy;
mod probe;

pub use builder::{ExportClientBuilder, DEFAULT_TIMEOUT};
pub use core::ExportClient;
pub use endpoint::ExportEndpoint;
pub use error_classification::{is_recoverable, is_retryable_code, RETRYABLE_CODES};
pub use policy::{RetryPolicy, METRICS_EXPORT_METHOD, TRACE_EXPORT_METHOD};

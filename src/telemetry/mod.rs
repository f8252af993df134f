//! Export diagnostics.
//!
//! The client never logs through a process-wide handle. Each [`ExportClient`]
//! is handed an [`ExportSink`] at construction and reports typed
//! [`ExportEvent`]s to it; the default [`TracingSink`] turns them into
//! `tracing` events. Events are for operational visibility only and never
//! feed back into control flow.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ExportEvent`] | Typed diagnostic event |
//! | [`ExportSink`] | Trait for event destinations |
//! | [`TracingSink`] | Default sink, forwards to `tracing` |
//! | [`NoopSink`] | Discards everything |
//! | [`InMemorySink`] | Bounded in-memory sink for tests and inspection |
//! | [`CompositeSink`] | Multi-destination composite sink |
//!
//! [`ExportClient`]: crate::ExportClient

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tonic::metadata::MetadataMap;
use tracing::{debug, error, info};

/// Diagnostic events emitted by the export client.
#[derive(Debug, Clone)]
pub enum ExportEvent {
    /// A new connection is being dialed.
    Connecting { endpoint: String, timeout: Duration },
    /// A dial attempt failed and will be retried within the connect deadline.
    DialRetry { attempt: u32, error: String },
    /// The liveness probe hit a recoverable error and will loop again.
    ProbeRetry { error: String },
    /// Dial and probe succeeded; the connection is stored for reuse.
    Connected { endpoint: String },
    /// One chunk was accepted by the collector.
    ChunkDelivered {
        chunk: usize,
        records: usize,
        size: usize,
        trailers: MetadataMap,
    },
    /// One chunk failed.
    ChunkFailed {
        chunk: usize,
        records: usize,
        size: usize,
        error: String,
        trailers: MetadataMap,
        recoverable: bool,
    },
    /// The connection was torn down.
    Closed { endpoint: String },
}

impl ExportEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ExportEvent::Connecting { .. } => "connecting",
            ExportEvent::DialRetry { .. } => "dial_retry",
            ExportEvent::ProbeRetry { .. } => "probe_retry",
            ExportEvent::Connected { .. } => "connected",
            ExportEvent::ChunkDelivered { .. } => "chunk_delivered",
            ExportEvent::ChunkFailed { .. } => "chunk_failed",
            ExportEvent::Closed { .. } => "closed",
        }
    }
}

/// Destination for [`ExportEvent`]s. Implementations must be cheap and non-blocking.
pub trait ExportSink: Send + Sync {
    fn record(&self, event: &ExportEvent);
}

/// Forwards events to `tracing`, with the levels the events warrant.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ExportSink for TracingSink {
    fn record(&self, event: &ExportEvent) {
        match event {
            ExportEvent::Connecting { endpoint, timeout } => {
                debug!(
                    endpoint = endpoint.as_str(),
                    timeout_ms = timeout.as_millis() as u64,
                    "new OpenTelemetry connection"
                );
            }
            ExportEvent::DialRetry { attempt, error } => {
                debug!(attempt, error = error.as_str(), "dial failed, still trying");
            }
            ExportEvent::ProbeRetry { error } => {
                info!(error = error.as_str(), "ping recoverable error, still trying");
            }
            ExportEvent::Connected { endpoint } => {
                debug!(endpoint = endpoint.as_str(), "connection ready");
            }
            ExportEvent::ChunkDelivered {
                chunk,
                records,
                size,
                trailers,
            } => {
                debug!(chunk, records, size, trailers = ?trailers, "successful write");
            }
            ExportEvent::ChunkFailed {
                chunk,
                records,
                size,
                error,
                trailers,
                recoverable,
            } => {
                error!(
                    chunk,
                    records,
                    size,
                    error = error.as_str(),
                    trailers = ?trailers,
                    recoverable,
                    "export failure"
                );
            }
            ExportEvent::Closed { endpoint } => {
                debug!(endpoint = endpoint.as_str(), "connection closed");
            }
        }
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ExportSink for NoopSink {
    fn record(&self, _event: &ExportEvent) {}
}

pub fn tracing_sink() -> Arc<dyn ExportSink> {
    Arc::new(TracingSink)
}

pub fn noop_sink() -> Arc<dyn ExportSink> {
    Arc::new(NoopSink)
}

/// Bounded in-memory sink; the oldest events are dropped first.
pub struct InMemorySink {
    events: Mutex<VecDeque<ExportEvent>>,
    max_events: usize,
}

impl InMemorySink {
    pub fn new(max: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            max_events: max.max(1),
        }
    }

    pub fn events(&self) -> Vec<ExportEvent> {
        match self.events.lock() {
            Ok(events) => events.iter().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn count(&self, name: &str) -> usize {
        self.events().iter().filter(|e| e.name() == name).count()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemorySink {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl ExportSink for InMemorySink {
    fn record(&self, event: &ExportEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push_back(event.clone());
            while events.len() > self.max_events {
                events.pop_front();
            }
        }
    }
}

/// Composite sink for multiple destinations.
#[derive(Default)]
pub struct CompositeSink {
    sinks: Vec<Arc<dyn ExportSink>>,
}

impl CompositeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sink(mut self, sink: Arc<dyn ExportSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl ExportSink for CompositeSink {
    fn record(&self, event: &ExportEvent) {
        for s in &self.sinks {
            s.record(event);
        }
    }
}

use crate::batch::{partition, BatchExecutor, MAX_RECORDS_PER_REQUEST};
use crate::client::endpoint::ExportEndpoint;
use crate::client::error_classification::is_recoverable;
use crate::client::policy::RetryPolicy;
use crate::context::CallContext;
use crate::telemetry::{ExportEvent, ExportSink};
use crate::transport::GrpcTransport;
use crate::Result;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::metrics::v1::ResourceMetrics;
use prost::Message;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::Instrument;
use uuid::Uuid;

/// Export client for one OTLP/gRPC metrics endpoint.
///
/// The connection is dialed lazily on the first non-empty [`store`](Self::store)
/// (or an explicit [`connect`](Self::connect)) and reused until
/// [`close`](Self::close). Hosts exporting to several destinations build one
/// client per destination.
pub struct ExportClient {
    pub(crate) endpoint: ExportEndpoint,
    pub(crate) retry: RetryPolicy,
    pub(crate) sink: Arc<dyn ExportSink>,
    pub(crate) connection: Mutex<Option<GrpcTransport>>,
}

impl ExportClient {
    /// Start building a client for `url`.
    pub fn builder(url: impl Into<String>) -> crate::client::builder::ExportClientBuilder {
        crate::client::builder::ExportClientBuilder::new(url)
    }

    /// The resolved destination this client exports to.
    pub fn endpoint(&self) -> &ExportEndpoint {
        &self.endpoint
    }

    /// Retry policy applied to every Export call.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Deliver `batch`, bounded by the endpoint timeout.
    pub async fn store(&self, batch: Vec<ResourceMetrics>) -> Result<()> {
        self.store_with_context(&CallContext::background(), batch)
            .await
    }

    /// Deliver `batch` under a caller-supplied context.
    ///
    /// The batch is split into chunks of at most 500 records, one Export per
    /// chunk, all in flight together under a single deadline. Every chunk is
    /// allowed to finish; the first failure to complete is returned and the
    /// rest are only reported to the sink. An empty batch never connects.
    pub async fn store_with_context(
        &self,
        ctx: &CallContext,
        batch: Vec<ResourceMetrics>,
    ) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let transport = self.connected_transport(ctx).await?;

        let ctx = ctx.with_timeout(self.endpoint.timeout());
        let records = batch.len();
        let chunks = partition(batch, MAX_RECORDS_PER_REQUEST);
        let span = tracing::debug_span!(
            "otlp_store",
            dispatch_id = %Uuid::new_v4(),
            records,
            chunks = chunks.len()
        );

        let sink = self.sink.as_ref();
        let transport = &transport;
        let dispatch_ctx = &ctx;
        let result = BatchExecutor::new()
            .execute_concurrent(chunks, move |chunk, resource_metrics| async move {
                deliver_chunk(transport, dispatch_ctx, sink, chunk, resource_metrics).await
            })
            .instrument(span)
            .await;
        ctx.cancel();

        match result.into_first_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

async fn deliver_chunk(
    transport: &GrpcTransport,
    ctx: &CallContext,
    sink: &dyn ExportSink,
    chunk: usize,
    resource_metrics: Vec<ResourceMetrics>,
) -> Result<()> {
    let records = resource_metrics.len();
    let request = ExportMetricsServiceRequest { resource_metrics };
    let size = request.encoded_len();

    match transport.export(ctx, request).await {
        Ok(trailers) => {
            sink.record(&ExportEvent::ChunkDelivered {
                chunk,
                records,
                size,
                trailers,
            });
            Ok(())
        }
        Err(err) => {
            let trailers = err
                .status()
                .map(|status| status.metadata().clone())
                .unwrap_or_default();
            sink.record(&ExportEvent::ChunkFailed {
                chunk,
                records,
                size,
                error: err.describe(),
                trailers,
                recoverable: is_recoverable(&err),
            });
            Err(err)
        }
    }
}

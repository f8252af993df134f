use crate::client::endpoint::ExportEndpoint;
use crate::client::policy::{RetryPolicy, METRICS_EXPORT_METHOD};
use crate::context::CallContext;
use crate::telemetry::{ExportEvent, ExportSink};
use crate::{Error, Result};
use opentelemetry_proto::tonic::collector::metrics::v1::metrics_service_client::MetricsServiceClient;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use std::time::Duration;
use tonic::metadata::MetadataMap;
use tonic::transport::Channel;
use tonic::Request;

const DIAL_BACKOFF_BASE: Duration = Duration::from_millis(100);
const DIAL_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// A dialed gRPC channel to the metrics service.
///
/// Cloning is cheap and clones share the underlying connection, so one
/// transport serves every concurrent chunk. Every call carries the static
/// metadata and goes through the service-level [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct GrpcTransport {
    client: MetricsServiceClient<Channel>,
    metadata: MetadataMap,
    retry: RetryPolicy,
}

impl GrpcTransport {
    /// Blocking dial: keep trying until connected or `ctx` ends.
    ///
    /// Failed attempts back off from 100ms up to 1s. When the context ends the
    /// context error is returned; no connection is left behind.
    pub async fn dial(
        endpoint: &ExportEndpoint,
        retry: RetryPolicy,
        ctx: &CallContext,
        sink: &dyn ExportSink,
    ) -> Result<Self> {
        let channel_endpoint = endpoint.to_channel_endpoint()?;
        let mut attempt = 0u32;
        let channel = loop {
            attempt += 1;
            let connecting = channel_endpoint.connect();
            match ctx.run(async { connecting.await.map_err(Error::from) }).await {
                Ok(channel) => break channel,
                Err(err) if err.is_context_error() => return Err(err),
                Err(err) => {
                    sink.record(&ExportEvent::DialRetry {
                        attempt,
                        error: err.describe(),
                    });
                    ctx.sleep(dial_backoff(attempt)).await?;
                }
            }
        };

        let mut client = MetricsServiceClient::new(channel);
        if let Some(encoding) = endpoint.compression() {
            client = client.send_compressed(encoding).accept_compressed(encoding);
        }
        Ok(Self {
            client,
            metadata: endpoint.metadata().clone(),
            retry,
        })
    }

    /// One Export call (with transport-level retries), bounded by `ctx`.
    ///
    /// Returns the response metadata, which includes the trailers.
    pub async fn export(
        &self,
        ctx: &CallContext,
        request: ExportMetricsServiceRequest,
    ) -> Result<MetadataMap> {
        self.retry
            .execute(ctx, METRICS_EXPORT_METHOD, || {
                let mut client = self.client.clone();
                let mut call = Request::new(request.clone());
                *call.metadata_mut() = self.metadata.clone();
                if let Some(remaining) = ctx.remaining() {
                    call.set_timeout(remaining);
                }
                async move {
                    client
                        .export(call)
                        .await
                        .map(|response| response.metadata().clone())
                }
            })
            .await
    }
}

fn dial_backoff(attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
    DIAL_BACKOFF_BASE.saturating_mul(factor).min(DIAL_BACKOFF_MAX)
}

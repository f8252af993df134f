//! Liveness probe: an empty Export used to prove a freshly dialed channel is
//! actually served.

use crate::client::error_classification::is_recoverable;
use crate::context::CallContext;
use crate::telemetry::{ExportEvent, ExportSink};
use crate::transport::GrpcTransport;
use crate::{Error, Result};
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use std::future::Future;
use std::time::Duration;

/// Pause between probe iterations. Backoff within a call belongs to the retry policy.
pub(crate) const PROBE_RETRY_INTERVAL: Duration = Duration::from_millis(50);

pub(crate) async fn probe_liveness(
    transport: &GrpcTransport,
    ctx: &CallContext,
    sink: &dyn ExportSink,
) -> Result<()> {
    probe_with(ctx, sink, move || {
        transport.export(ctx, ExportMetricsServiceRequest::default())
    })
    .await
}

/// Repeat `ping` until it succeeds, `ctx` ends, or it fails non-recoverably.
pub(crate) async fn probe_with<T, F, Fut>(
    ctx: &CallContext,
    sink: &dyn ExportSink,
    mut ping: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    loop {
        let err = match ping().await {
            Ok(_) => return Ok(()),
            Err(err) => err,
        };
        if let Some(ctx_err) = ctx.err() {
            return Err(ctx_err);
        }
        if !is_recoverable(&err) {
            return Err(Error::NonRecoverablePing(Box::new(err)));
        }
        sink.record(&ExportEvent::ProbeRetry {
            error: err.describe(),
        });
        ctx.sleep(PROBE_RETRY_INTERVAL).await?;
    }
}

//! Connection management: lazy dial, liveness probe, reuse, teardown.

use crate::context::CallContext;
use crate::telemetry::ExportEvent;
use crate::transport::GrpcTransport;
use crate::Result;

use super::core::ExportClient;
use super::probe::probe_liveness;

impl ExportClient {
    /// Dial and probe the endpoint unless a connection is already stored.
    ///
    /// Dial and probe share one sub-context bounded by the endpoint timeout.
    /// On any failure nothing is stored and the next call dials again.
    pub async fn connect(&self, ctx: &CallContext) -> Result<()> {
        self.connected_transport(ctx).await.map(|_| ())
    }

    /// Probe the stored connection, or connect (which probes) if there is none.
    pub async fn ping(&self, ctx: &CallContext) -> Result<()> {
        let stored = self.connection.lock().await.clone();
        match stored {
            Some(transport) => {
                let ctx = ctx.with_timeout(self.endpoint.timeout());
                probe_liveness(&transport, &ctx, self.sink.as_ref()).await
            }
            None => self.connect(ctx).await,
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.lock().await.is_some()
    }

    /// Tear down the connection. Idempotent; a client that never connected is fine.
    ///
    /// Calls already in flight keep their clone of the channel until they finish.
    pub async fn close(&self) -> Result<()> {
        let transport = self.connection.lock().await.take();
        if let Some(transport) = transport {
            drop(transport);
            self.sink.record(&ExportEvent::Closed {
                endpoint: self.endpoint.url().to_string(),
            });
        }
        Ok(())
    }

    /// The stored transport, dialing and probing first if needed.
    ///
    /// The slot lock is held across dial and probe, so concurrent first
    /// callers wait for a single dial instead of racing their own.
    pub(crate) async fn connected_transport(&self, ctx: &CallContext) -> Result<GrpcTransport> {
        let mut slot = ctx.run(async { Ok(self.connection.lock().await) }).await?;
        if let Some(transport) = slot.as_ref() {
            return Ok(transport.clone());
        }

        let ctx = ctx.with_timeout(self.endpoint.timeout());
        let endpoint = self.endpoint.url().to_string();
        self.sink.record(&ExportEvent::Connecting {
            endpoint: endpoint.clone(),
            timeout: self.endpoint.timeout(),
        });

        let transport =
            GrpcTransport::dial(&self.endpoint, self.retry.clone(), &ctx, self.sink.as_ref())
                .await?;
        probe_liveness(&transport, &ctx, self.sink.as_ref()).await?;

        self.sink.record(&ExportEvent::Connected { endpoint });
        *slot = Some(transport.clone());
        Ok(transport)
    }
}

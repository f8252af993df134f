//! In-process OTLP metrics collector for integration tests

#![allow(dead_code)]

use otlp_metrics_export::opentelemetry_proto::tonic::collector::metrics::v1::metrics_service_server::{
    MetricsService, MetricsServiceServer,
};
use otlp_metrics_export::opentelemetry_proto::tonic::collector::metrics::v1::{
    ExportMetricsServiceRequest, ExportMetricsServiceResponse,
};
use otlp_metrics_export::ResourceMetrics;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{Request, Response, Status};

/// One received Export call.
#[derive(Debug, Clone)]
pub struct ReceivedCall {
    /// `schema_url` of each record, in request order.
    pub records: Vec<String>,
    pub authorization: Option<String>,
}

#[derive(Default)]
struct State {
    calls: Mutex<Vec<ReceivedCall>>,
    reject_with: Mutex<Option<Status>>,
    transient_failures: Mutex<usize>,
    data_delay: Mutex<Option<Duration>>,
}

#[derive(Clone, Default)]
struct Service {
    state: Arc<State>,
}

#[tonic::async_trait]
impl MetricsService for Service {
    async fn export(
        &self,
        request: Request<ExportMetricsServiceRequest>,
    ) -> Result<Response<ExportMetricsServiceResponse>, Status> {
        let authorization = request
            .metadata()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let records = request
            .into_inner()
            .resource_metrics
            .into_iter()
            .map(|rm| rm.schema_url)
            .collect::<Vec<_>>();
        let delay = if records.is_empty() {
            None
        } else {
            *self.state.data_delay.lock().unwrap()
        };
        self.state.calls.lock().unwrap().push(ReceivedCall {
            records,
            authorization,
        });
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        {
            let mut transient = self.state.transient_failures.lock().unwrap();
            if *transient > 0 {
                *transient -= 1;
                return Err(Status::unavailable("collector warming up"));
            }
        }
        if let Some(status) = self.state.reject_with.lock().unwrap().as_ref() {
            return Err(Status::new(status.code(), status.message()));
        }

        let mut response = Response::new(ExportMetricsServiceResponse::default());
        response
            .metadata_mut()
            .insert("x-collector", "mock".parse().unwrap());
        Ok(response)
    }
}

/// Running mock collector; shuts down on drop.
pub struct MockCollector {
    pub addr: SocketAddr,
    state: Arc<State>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl MockCollector {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let service = Service::default();
        let state = service.state.clone();
        let (tx, rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            tonic::transport::Server::builder()
                .add_service(MetricsServiceServer::new(service))
                .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async {
                    let _ = rx.await;
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown: Some(tx),
            handle: Some(handle),
        }
    }

    /// Plaintext URL for this collector.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Reject every following call with `status`.
    pub fn reject_with(&self, status: Status) {
        *self.state.reject_with.lock().unwrap() = Some(status);
    }

    /// Fail the next `n` calls with `UNAVAILABLE`.
    pub fn fail_next(&self, n: usize) {
        *self.state.transient_failures.lock().unwrap() = n;
    }

    /// Hold every call that carries records for `delay` before answering.
    pub fn delay_data_calls(&self, delay: Duration) {
        *self.state.data_delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> Vec<ReceivedCall> {
        self.state.calls.lock().unwrap().clone()
    }

    /// Calls that carried records, i.e. everything except liveness probes.
    pub fn data_calls(&self) -> Vec<ReceivedCall> {
        self.calls()
            .into_iter()
            .filter(|c| !c.records.is_empty())
            .collect()
    }

    pub fn probe_count(&self) -> usize {
        self.calls().iter().filter(|c| c.records.is_empty()).count()
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for MockCollector {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// `n` records tagged `record-0`, `record-1`, ... through `schema_url`.
pub fn tagged_records(n: usize) -> Vec<ResourceMetrics> {
    (0..n)
        .map(|i| ResourceMetrics {
            schema_url: format!("record-{}", i),
            ..Default::default()
        })
        .collect()
}

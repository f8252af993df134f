//! Store integration tests against an in-process collector

mod mock_collector;

use mock_collector::{tagged_records, MockCollector};
use otlp_metrics_export::telemetry::{ExportEvent, InMemorySink};
use otlp_metrics_export::{is_recoverable, CallContext, Error, ExportClient, RetryPolicy};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tonic::{Code, Status};

fn client_for(collector: &MockCollector, sink: Arc<InMemorySink>) -> ExportClient {
    ExportClient::builder(collector.url())
        .timeout(Duration::from_secs(5))
        .header("authorization", "Bearer test-token")
        .sink(sink)
        .build()
        .unwrap()
}

#[tokio::test]
async fn large_batch_is_split_into_ordered_chunks() {
    let collector = MockCollector::start().await;
    let sink = Arc::new(InMemorySink::default());
    let client = client_for(&collector, sink.clone());

    client.store(tagged_records(1200)).await.unwrap();

    let mut calls = collector.data_calls();
    assert_eq!(calls.len(), 3);
    let mut sizes: Vec<usize> = calls.iter().map(|c| c.records.len()).collect();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![200, 500, 500]);

    // Chunks may arrive in any order; each is a contiguous run of the input.
    calls.sort_by_key(|c| {
        c.records[0]
            .trim_start_matches("record-")
            .parse::<usize>()
            .unwrap()
    });
    let rebuilt: Vec<String> = calls.into_iter().flat_map(|c| c.records).collect();
    let expected: Vec<String> = (0..1200).map(|i| format!("record-{}", i)).collect();
    assert_eq!(rebuilt, expected);

    assert_eq!(sink.count("chunk_delivered"), 3);
    collector.stop().await;
}

#[tokio::test]
async fn exactly_one_full_chunk_is_one_request() {
    let collector = MockCollector::start().await;
    let client = client_for(&collector, Arc::new(InMemorySink::default()));

    client.store(tagged_records(500)).await.unwrap();
    client.store(tagged_records(1)).await.unwrap();

    let sizes: Vec<usize> = collector
        .data_calls()
        .iter()
        .map(|c| c.records.len())
        .collect();
    assert_eq!(sizes, vec![500, 1]);
    collector.stop().await;
}

#[tokio::test]
async fn empty_batch_never_connects() {
    let collector = MockCollector::start().await;
    let sink = Arc::new(InMemorySink::default());
    let client = client_for(&collector, sink.clone());

    client.store(Vec::new()).await.unwrap();

    assert!(!client.is_connected().await);
    assert!(collector.calls().is_empty());
    assert!(sink.is_empty());
    collector.stop().await;
}

#[tokio::test]
async fn connection_is_reused_across_stores() {
    let collector = MockCollector::start().await;
    let sink = Arc::new(InMemorySink::default());
    let client = client_for(&collector, sink.clone());

    for _ in 0..3 {
        client.store(tagged_records(10)).await.unwrap();
    }

    assert_eq!(sink.count("connected"), 1);
    assert_eq!(collector.probe_count(), 1);
    assert_eq!(collector.data_calls().len(), 3);
    collector.stop().await;
}

#[tokio::test]
async fn concurrent_first_stores_dial_once() {
    let collector = MockCollector::start().await;
    let sink = Arc::new(InMemorySink::default());
    let client = Arc::new(client_for(&collector, sink.clone()));

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.store(tagged_records(5)).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(sink.count("connecting"), 1);
    assert_eq!(collector.probe_count(), 1);
    collector.stop().await;
}

#[tokio::test]
async fn static_headers_reach_the_collector() {
    let collector = MockCollector::start().await;
    let client = client_for(&collector, Arc::new(InMemorySink::default()));

    client.store(tagged_records(3)).await.unwrap();

    for call in collector.calls() {
        assert_eq!(call.authorization.as_deref(), Some("Bearer test-token"));
    }
    collector.stop().await;
}

#[tokio::test]
async fn delivered_chunks_report_response_metadata() {
    let collector = MockCollector::start().await;
    let sink = Arc::new(InMemorySink::default());
    let client = client_for(&collector, sink.clone());

    client.store(tagged_records(2)).await.unwrap();

    let delivered = sink
        .events()
        .into_iter()
        .find_map(|e| match e {
            ExportEvent::ChunkDelivered {
                records,
                size,
                trailers,
                ..
            } => Some((records, size, trailers)),
            _ => None,
        })
        .unwrap();
    assert_eq!(delivered.0, 2);
    assert!(delivered.1 > 0);
    assert_eq!(
        delivered.2.get("x-collector").and_then(|v| v.to_str().ok()),
        Some("mock")
    );
    collector.stop().await;
}

#[tokio::test]
async fn rejected_chunks_fail_the_store_with_a_permanent_error() {
    let collector = MockCollector::start().await;
    let sink = Arc::new(InMemorySink::default());
    let client = client_for(&collector, sink.clone());
    client.connect(&CallContext::background()).await.unwrap();

    collector.reject_with(Status::invalid_argument("bad datapoint"));
    let err = client.store(tagged_records(1200)).await.unwrap_err();

    assert_eq!(err.status().map(|s| s.code()), Some(Code::InvalidArgument));
    assert!(!is_recoverable(&err));
    // Every chunk still completes and reports its own failure.
    assert_eq!(sink.count("chunk_failed"), 3);
    assert_eq!(collector.data_calls().len(), 3);
    collector.stop().await;
}

#[tokio::test]
async fn transient_failures_are_retried_inside_the_call() {
    let collector = MockCollector::start().await;
    let client = client_for(&collector, Arc::new(InMemorySink::default()));
    client.connect(&CallContext::background()).await.unwrap();

    collector.fail_next(2);
    client.store(tagged_records(7)).await.unwrap();

    let data = collector.data_calls();
    assert_eq!(data.len(), 3);
    assert!(data.iter().all(|c| c.records.len() == 7));
    collector.stop().await;
}

#[tokio::test]
async fn exhausted_retries_surface_a_recoverable_error() {
    let collector = MockCollector::start().await;
    let client = ExportClient::builder(collector.url())
        .timeout(Duration::from_secs(5))
        .retry_policy(RetryPolicy::disabled())
        .sink(Arc::new(InMemorySink::default()))
        .build()
        .unwrap();
    client.connect(&CallContext::background()).await.unwrap();

    collector.reject_with(Status::unavailable("overloaded"));
    let err = client.store(tagged_records(3)).await.unwrap_err();

    assert!(matches!(err, Error::Status(ref s) if s.code() == Code::Unavailable));
    assert!(is_recoverable(&err));
    collector.stop().await;
}

#[tokio::test]
async fn cancelled_context_stops_the_store() {
    let collector = MockCollector::start().await;
    let client = client_for(&collector, Arc::new(InMemorySink::default()));

    let ctx = CallContext::background();
    ctx.cancel();
    let err = client
        .store_with_context(&ctx, tagged_records(3))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert!(is_recoverable(&err));
    assert!(collector.calls().is_empty());
    collector.stop().await;
}

#[tokio::test]
async fn hung_collector_cannot_hold_the_store_past_its_deadline() {
    let collector = MockCollector::start().await;
    let sink = Arc::new(InMemorySink::default());
    let timeout = Duration::from_secs(1);
    let client = ExportClient::builder(collector.url())
        .timeout(timeout)
        .sink(sink.clone())
        .build()
        .unwrap();
    client.connect(&CallContext::background()).await.unwrap();

    collector.delay_data_calls(Duration::from_secs(30));
    let started = Instant::now();
    let err = client.store(tagged_records(1200)).await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, Error::DeadlineExceeded), "got {err:?}");
    assert!(is_recoverable(&err));
    assert!(elapsed >= timeout, "returned early after {elapsed:?}");
    assert!(elapsed < timeout * 3, "held for {elapsed:?}");
    assert_eq!(sink.count("chunk_failed"), 3);
    // The collector is still sleeping on the abandoned calls; drop it without waiting.
    drop(collector);
}

#[tokio::test]
async fn caller_cancellation_interrupts_in_flight_chunks() {
    let collector = MockCollector::start().await;
    let sink = Arc::new(InMemorySink::default());
    let client = client_for(&collector, sink.clone());
    client.connect(&CallContext::background()).await.unwrap();
    collector.delay_data_calls(Duration::from_secs(30));

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let err = client
        .store_with_context(&CallContext::with_cancellation(token), tagged_records(600))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled), "got {err:?}");
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(sink.count("chunk_failed"), 2);
    drop(collector);
}

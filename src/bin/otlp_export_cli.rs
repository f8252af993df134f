//! otlp-export-cli: probe a collector or push synthetic metrics to it.
//!
//! Usage:
//!   otlp-export-cli probe <url> [OPTIONS]        Dial and probe the endpoint
//!   otlp-export-cli send <url> [OPTIONS]         Store a batch of synthetic gauges

use anyhow::{bail, Context};
use otlp_metrics_export::opentelemetry_proto::tonic::common::v1::{
    any_value, AnyValue, InstrumentationScope, KeyValue,
};
use otlp_metrics_export::opentelemetry_proto::tonic::metrics::v1::{
    metric, number_data_point, Gauge, Metric, NumberDataPoint, ScopeMetrics,
};
use otlp_metrics_export::opentelemetry_proto::tonic::resource::v1::Resource;
use otlp_metrics_export::{is_recoverable, CallContext, ExportClient, ResourceMetrics};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse()?),
        )
        .try_init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    match args[1].as_str() {
        "probe" => cmd_probe(&args[2..]).await,
        "send" => cmd_send(&args[2..]).await,
        "version" | "--version" | "-V" => {
            println!("otlp-export-cli {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!(
        r#"otlp-export-cli: OTLP/gRPC metrics export tool

USAGE:
    otlp-export-cli <COMMAND> <url> [OPTIONS]

COMMANDS:
    probe <url>                 Dial the collector and send an empty Export
    send <url>                  Store a batch of synthetic gauge records
    version                     Show version information
    help                        Show this help message

OPTIONS:
    --records <n>               Records to send (default 1000)
    --timeout-ms <ms>           Connect and store timeout
    --header <name=value>       Static header, may repeat
    --compression <name>        none, gzip or zstd

ENVIRONMENT:
    OTLP_EXPORT_TIMEOUT_MS      Default timeout when --timeout-ms is absent
    OTLP_EXPORT_COMPRESSION     Default compressor when --compression is absent
    RUST_LOG                    Log filter"#
    );
}

struct Options {
    url: String,
    records: usize,
    timeout: Option<Duration>,
    headers: Vec<(String, String)>,
    compression: Option<String>,
}

fn parse_options(args: &[String]) -> anyhow::Result<Options> {
    let mut iter = args.iter();
    let url = match iter.next() {
        Some(url) if !url.starts_with("--") => url.clone(),
        _ => bail!("missing collector url"),
    };
    let mut opts = Options {
        url,
        records: 1000,
        timeout: None,
        headers: Vec::new(),
        compression: None,
    };

    while let Some(flag) = iter.next() {
        let value = iter
            .next()
            .with_context(|| format!("{flag} needs a value"))?;
        match flag.as_str() {
            "--records" => {
                opts.records = value.parse().context("--records must be a number")?;
            }
            "--timeout-ms" => {
                let ms: u64 = value.parse().context("--timeout-ms must be a number")?;
                opts.timeout = Some(Duration::from_millis(ms));
            }
            "--header" => {
                let (name, val) = value
                    .split_once('=')
                    .context("--header expects name=value")?;
                opts.headers.push((name.to_string(), val.to_string()));
            }
            "--compression" => opts.compression = Some(value.clone()),
            other => bail!("unknown option: {other}"),
        }
    }
    Ok(opts)
}

fn build_client(opts: &Options) -> anyhow::Result<ExportClient> {
    let mut builder = ExportClient::builder(opts.url.clone()).headers(opts.headers.clone());
    if let Some(timeout) = opts.timeout {
        builder = builder.timeout(timeout);
    }
    if let Some(name) = &opts.compression {
        builder = builder.compressor(name.clone());
    }
    Ok(builder.build()?)
}

async fn cmd_probe(args: &[String]) -> anyhow::Result<()> {
    let opts = parse_options(args)?;
    let client = build_client(&opts)?;

    match client.ping(&CallContext::background()).await {
        Ok(()) => {
            println!("✅ {} is live", client.endpoint().url());
            client.close().await?;
            Ok(())
        }
        Err(err) => {
            println!(
                "❌ {} probe failed ({}): {}",
                client.endpoint().url(),
                if is_recoverable(&err) { "recoverable" } else { "permanent" },
                err.describe()
            );
            std::process::exit(2);
        }
    }
}

async fn cmd_send(args: &[String]) -> anyhow::Result<()> {
    let opts = parse_options(args)?;
    let client = build_client(&opts)?;
    let batch = synthetic_batch(opts.records);

    let started = std::time::Instant::now();
    let outcome = client.store(batch).await;
    client.close().await?;

    match outcome {
        Ok(()) => {
            println!(
                "✅ stored {} records in {:.1?}",
                opts.records,
                started.elapsed()
            );
            Ok(())
        }
        Err(err) => {
            println!(
                "❌ store failed ({}): {}",
                if is_recoverable(&err) { "recoverable" } else { "permanent" },
                err.describe()
            );
            std::process::exit(2);
        }
    }
}

fn synthetic_batch(records: usize) -> Vec<ResourceMetrics> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();

    (0..records)
        .map(|i| ResourceMetrics {
            resource: Some(Resource {
                attributes: vec![string_attribute("service.name", "otlp-export-cli")],
                ..Default::default()
            }),
            scope_metrics: vec![ScopeMetrics {
                scope: Some(InstrumentationScope {
                    name: "otlp-export-cli".to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    ..Default::default()
                }),
                metrics: vec![Metric {
                    name: "cli.synthetic.value".to_string(),
                    description: "Synthetic gauge emitted by otlp-export-cli".to_string(),
                    unit: "1".to_string(),
                    data: Some(metric::Data::Gauge(Gauge {
                        data_points: vec![NumberDataPoint {
                            attributes: vec![string_attribute("series", &i.to_string())],
                            time_unix_nano: now,
                            value: Some(number_data_point::Value::AsInt(i as i64)),
                            ..Default::default()
                        }],
                    })),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        })
        .collect()
}

fn string_attribute(key: &str, value: &str) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: Some(AnyValue {
            value: Some(any_value::Value::StringValue(value.to_string())),
        }),
    }
}

//! Simulates a few instrumented flows and ships their metrics.
//!
//! Set `METRICS_URL` to post batches over HTTP; otherwise they are kept in
//! memory and summarized at exit. An optional first argument is a JSON
//! `BatcherConfig` file.

use std::{sync::Arc, time::Duration};

use metric_batcher::{BatcherConfig, HttpSink, InMemorySink, MetricBatcher, MetricSink};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => {
            let mut config = BatcherConfig::new("MetricBatcherDemo/Monitoring");
            config.flush_threshold = 10;
            config.flush_interval = Duration::from_secs(2);
            config
                .custom_dimensions
                .insert("Environment".into(), "Development".into());
            config
        }
    };

    match std::env::var("METRICS_URL") {
        Ok(url) => run(config, HttpSink::new(url)).await,
        Err(_) => {
            let sink = Arc::new(InMemorySink::new());
            run(config, Arc::clone(&sink)).await?;
            for (namespace, batch) in sink.batches() {
                println!("{namespace}: {} points", batch.len());
            }
            Ok(())
        }
    }
}

async fn run<S>(config: BatcherConfig, sink: S) -> anyhow::Result<()>
where
    S: MetricSink + 'static,
{
    let batcher = MetricBatcher::new(config, sink)?;
    let recorder = batcher.recorder();
    let models = ["claude-3-sonnet", "nova-pro", "nova-lite"];
    for round in 0..3_u64 {
        for (i, model) in models.iter().enumerate() {
            let flow = format!("flow-{i}");
            recorder.on_flow_start(&flow);
            let elapsed = Duration::from_millis(200 + 50 * round + 10 * i as u64);
            tokio::time::sleep(Duration::from_millis(100)).await;
            recorder.on_generate(model, 300 + 25 * round, elapsed);
            if (round + i as u64) % 4 == 3 {
                recorder.on_flow_error(&flow, elapsed, "model invocation timeout");
            } else {
                recorder.on_flow_end(&flow, elapsed);
            }
        }
    }
    batcher.close().await?;
    Ok(())
}

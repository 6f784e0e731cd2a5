use std::{sync::Arc, time::Duration};

use tokio::{
    task::{JoinError, JoinHandle, JoinSet},
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    buf::MetricBuf, config::BatcherConfig, exporter::MetricSink, flush::Flusher,
    recorder::MetricRecorder, Dimensions, Error, FlushError, MetricPoint,
};

/// Cloneable producer handle of a [`MetricBatcher`].
///
/// Submitting never waits on the sink.
#[derive(Debug, Clone)]
pub struct MetricSubmitter {
    buf: Arc<MetricBuf>,
    custom_dimensions: Arc<Dimensions>,
}
impl MetricSubmitter {
    /// Merges the configured custom dimensions into `point` and buffers it.
    ///
    /// Fails with [`Error::InvalidPoint`] for malformed points and
    /// [`Error::Closed`] once the batcher has begun closing.
    pub fn submit(&self, mut point: MetricPoint) -> Result<(), Error> {
        point.merge_dimensions(&self.custom_dimensions);
        self.buf.append(point)?;
        Ok(())
    }

    /// Points currently waiting for delivery.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

/// Buffers submitted points and flushes them to a sink on a count threshold,
/// on a timer, and once more on [`MetricBatcher::close`].
#[derive(Debug)]
pub struct MetricBatcher<S> {
    config: BatcherConfig,
    submitter: MetricSubmitter,
    flusher: Arc<Flusher<S>>,
    stop: CancellationToken,
    task: Option<JoinHandle<()>>,
}
impl<S> MetricBatcher<S>
where
    S: MetricSink + 'static,
{
    /// Validates `config` and starts the background flush loop on the current runtime.
    pub fn new(config: BatcherConfig, sink: S) -> Result<Self, Error> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()?;

        let flush_threshold = config.effective_flush_threshold();
        let buf = Arc::new(MetricBuf::new(flush_threshold));
        let flusher = Arc::new(Flusher::new(
            Arc::clone(&buf),
            sink,
            config.namespace.clone(),
        ));
        let submitter = MetricSubmitter {
            buf,
            custom_dimensions: Arc::new(config.custom_dimensions.clone()),
        };
        let stop = CancellationToken::new();
        let task = runtime.spawn(flush_loop(
            Arc::clone(&flusher),
            config.flush_interval,
            stop.clone(),
        ));
        info!(
            namespace = %config.namespace,
            flush_threshold,
            flush_interval = ?config.flush_interval,
            "metric batcher started"
        );
        Ok(Self {
            config,
            submitter,
            flusher,
            stop,
            task: Some(task),
        })
    }

    pub fn submit(&self, point: MetricPoint) -> Result<(), Error> {
        self.submitter.submit(point)
    }
    pub fn submitter(&self) -> MetricSubmitter {
        self.submitter.clone()
    }
    pub fn buffered(&self) -> usize {
        self.submitter.buffered()
    }
    pub fn recorder(&self) -> MetricRecorder {
        MetricRecorder::new(self.submitter(), &self.config)
    }
    pub fn config(&self) -> &BatcherConfig {
        &self.config
    }

    /// Stops the timer, waits for in-flight flushes, then runs one last flush
    /// over whatever is still buffered and returns its outcome.
    ///
    /// Points of batches that fail in this last pass are not retried again.
    pub async fn close(mut self) -> Result<(), Error> {
        self.flusher.buf().close();
        self.stop.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "metric flush loop ended abnormally");
            }
        }
        let remaining = self.flusher.buf().len();
        let res = self.flusher.flush_pending().await;
        info!(
            namespace = %self.config.namespace,
            remaining,
            ok = res.is_ok(),
            "metric batcher closed"
        );
        res.map_err(Error::from)
    }
}
impl<S> Drop for MetricBatcher<S> {
    fn drop(&mut self) {
        self.stop.cancel();
        if self.task.is_some() {
            warn!(
                namespace = %self.config.namespace,
                "metric batcher dropped without close; buffered points will not be flushed"
            );
        }
    }
}

async fn flush_loop<S>(flusher: Arc<Flusher<S>>, interval: Duration, stop: CancellationToken)
where
    S: MetricSink + 'static,
{
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut in_flight = JoinSet::new();
    loop {
        tokio::select! {
            () = stop.cancelled() => break,
            _ = ticker.tick() => {
                debug!("timer flush");
                log_flush(flusher.flush_pending().await);
            }
            () = flusher.buf().flush_requested() => {
                debug!("threshold flush");
                let flusher = Arc::clone(&flusher);
                in_flight.spawn(async move { flusher.flush_pending().await });
            }
            Some(res) = in_flight.join_next() => log_joined(res),
        }
    }
    while let Some(res) = in_flight.join_next().await {
        log_joined(res);
    }
}

fn log_joined(res: Result<Result<(), FlushError>, JoinError>) {
    match res {
        Ok(res) => log_flush(res),
        Err(e) => error!(error = %e, "metric flush task failed"),
    }
}

fn log_flush(res: Result<(), FlushError>) {
    if let Err(e) = res {
        error!(
            failed_batches = e.failed_batches,
            requeued_points = e.requeued_points,
            error = %e,
            "metric flush failed"
        );
    }
}

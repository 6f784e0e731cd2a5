use std::sync::Arc;

use tracing::{debug, warn};

use crate::{buf::MetricBuf, exporter::MetricSink, FlushError, MetricPoint, MAX_BATCH_SIZE};

/// Splits `points` into consecutive, order-preserving batches of at most `max_len` points.
pub fn batches(points: &[MetricPoint], max_len: usize) -> core::slice::Chunks<'_, MetricPoint> {
    points.chunks(max_len.max(1))
}

/// Moves buffered points to a sink, returning rejected batches to the buffer.
#[derive(Debug)]
pub struct Flusher<S> {
    buf: Arc<MetricBuf>,
    sink: S,
    namespace: String,
}
impl<S> Flusher<S>
where
    S: MetricSink,
{
    pub fn new(buf: Arc<MetricBuf>, sink: S, namespace: String) -> Self {
        Self {
            buf,
            sink,
            namespace,
        }
    }

    pub fn buf(&self) -> &Arc<MetricBuf> {
        &self.buf
    }

    /// Swaps the buffer out and delivers its contents.
    pub async fn flush_pending(&self) -> Result<(), FlushError> {
        let points = self.buf.swap();
        self.flush(points).await
    }

    /// Sends `points` batch by batch.
    ///
    /// A rejected batch is requeued and the remaining batches are still attempted.
    pub async fn flush(&self, points: Vec<MetricPoint>) -> Result<(), FlushError> {
        if points.is_empty() {
            return Ok(());
        }
        let mut total_batches = 0;
        let mut failed_batches = 0;
        let mut requeued_points = 0;
        let mut cause = None;
        for batch in batches(&points, MAX_BATCH_SIZE) {
            total_batches += 1;
            match self.sink.send(&self.namespace, batch).await {
                Ok(()) => {
                    debug!(namespace = %self.namespace, points = batch.len(), "metric batch delivered");
                }
                Err(e) => {
                    warn!(
                        namespace = %self.namespace,
                        points = batch.len(),
                        error = %e,
                        "metric batch rejected, requeueing"
                    );
                    self.buf.requeue(batch);
                    failed_batches += 1;
                    requeued_points += batch.len();
                    cause.get_or_insert(e);
                }
            }
        }
        match cause {
            None => Ok(()),
            Some(cause) => Err(FlushError {
                failed_batches,
                total_batches,
                requeued_points,
                cause,
            }),
        }
    }
}

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::{Error, MetricPoint};

/// Ordered, mutex-guarded store of points waiting for delivery.
///
/// Not capped: the length may exceed the threshold while a flush is in flight
/// or while failed batches are waiting to be retried.
#[derive(Debug)]
pub struct MetricBuf {
    pending: Mutex<Pending>,
    threshold: usize,
    flush_requested: Notify,
}
#[derive(Debug)]
struct Pending {
    points: Vec<MetricPoint>,
    closed: bool,
}
impl MetricBuf {
    pub fn new(threshold: usize) -> Self {
        let pending = Pending {
            points: Vec::new(),
            closed: false,
        };
        Self {
            pending: Mutex::new(pending),
            threshold,
            flush_requested: Notify::new(),
        }
    }

    /// Appends a point and returns the new buffer length.
    ///
    /// Reaching the threshold requests a flush without waiting for it.
    pub fn append(&self, point: MetricPoint) -> Result<usize, Error> {
        point.validate()?;
        let len = {
            let mut pending = self.pending.lock();
            if pending.closed {
                return Err(Error::Closed);
            }
            pending.points.push(point);
            pending.points.len()
        };
        if len >= self.threshold {
            self.flush_requested.notify_one();
        }
        Ok(len)
    }

    /// Detaches everything buffered so far and leaves an empty buffer behind.
    pub fn swap(&self) -> Vec<MetricPoint> {
        let mut pending = self.pending.lock();
        std::mem::take(&mut pending.points)
    }

    /// Rejects all later appends. Requeues are still accepted.
    pub fn close(&self) {
        self.pending.lock().closed = true;
    }

    /// Puts points of a failed batch back for the next flush pass.
    ///
    /// Does not request a flush so a failing sink is not retried in a tight loop.
    pub fn requeue(&self, batch: &[MetricPoint]) {
        self.pending.lock().points.extend_from_slice(batch);
    }

    pub fn len(&self) -> usize {
        self.pending.lock().points.len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolves once some append has crossed the threshold.
    pub async fn flush_requested(&self) {
        self.flush_requested.notified().await;
    }
}

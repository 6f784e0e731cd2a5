use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::{codec, MetricPoint};

/// Remote destination for metric batches.
///
/// A call carries between one and [`crate::MAX_BATCH_SIZE`] points. Any error
/// fails the whole batch.
#[async_trait]
pub trait MetricSink: core::fmt::Debug + Send + Sync {
    async fn send(&self, namespace: &str, points: &[MetricPoint]) -> anyhow::Result<()>;
}

#[async_trait]
impl<S> MetricSink for Arc<S>
where
    S: MetricSink + ?Sized,
{
    async fn send(&self, namespace: &str, points: &[MetricPoint]) -> anyhow::Result<()> {
        (**self).send(namespace, points).await
    }
}

pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts each batch, encoded with [`codec::encode_batch`], to a fixed URL.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: ureq::Agent,
    url: String,
}
impl HttpSink {
    pub fn new(url: String) -> Self {
        Self::with_timeout(url, DEFAULT_HTTP_TIMEOUT)
    }
    pub fn with_timeout(url: String, timeout: Duration) -> Self {
        let client = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { client, url }
    }
}
#[async_trait]
impl MetricSink for HttpSink {
    async fn send(&self, namespace: &str, points: &[MetricPoint]) -> anyhow::Result<()> {
        let mut buf = Vec::new();
        codec::encode_batch(&mut buf, namespace, points)?;
        let client = self.client.clone();
        let url = self.url.clone();
        // Blocking I/O
        tokio::task::spawn_blocking(move || {
            client
                .post(&url)
                .set("Content-Type", codec::CONTENT_TYPE)
                .send_bytes(&buf)
        })
        .await??;
        Ok(())
    }
}

/// Keeps every delivered batch in memory.
///
/// Failures can be injected to exercise the retry path.
#[derive(Debug, Default)]
pub struct InMemorySink {
    batches: Mutex<Vec<(String, Vec<MetricPoint>)>>,
    attempts: AtomicUsize,
    fail_next: AtomicUsize,
    failing: AtomicBool,
    attempted: Notify,
}
impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects the next `n` sends.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }
    /// Rejects every send until switched off again.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delivered batches with their namespace, in delivery order.
    pub fn batches(&self) -> Vec<(String, Vec<MetricPoint>)> {
        self.batches.lock().clone()
    }
    /// Delivered points flattened across batches.
    pub fn points(&self) -> Vec<MetricPoint> {
        self.batches
            .lock()
            .iter()
            .flat_map(|(_, points)| points.iter().cloned())
            .collect()
    }
    /// Number of send calls, successful or not.
    pub fn send_count(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Resolves once at least `n` send calls have completed.
    pub async fn wait_for_sends(&self, n: usize) {
        loop {
            let attempted = self.attempted.notified();
            if self.send_count() >= n {
                return;
            }
            attempted.await;
        }
    }

    fn should_fail(&self) -> bool {
        if self.failing.load(Ordering::SeqCst) {
            return true;
        }
        self.fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}
#[async_trait]
impl MetricSink for InMemorySink {
    async fn send(&self, namespace: &str, points: &[MetricPoint]) -> anyhow::Result<()> {
        let res = if self.should_fail() {
            Err(anyhow::anyhow!("injected send failure"))
        } else {
            self.batches
                .lock()
                .push((namespace.to_owned(), points.to_vec()));
            Ok(())
        };
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.attempted.notify_waiters();
        res
    }
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed point rejected at submission; never buffered or retried.
    #[error("invalid metric point: {0}")]
    InvalidPoint(String),

    #[error("invalid batcher configuration: {0}")]
    InvalidConfig(String),

    #[error("metric batcher is closed")]
    Closed,

    #[error("metric batcher must start inside a tokio runtime: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    #[error(transparent)]
    Delivery(#[from] FlushError),
}

/// Outcome of a flush pass in which at least one batch was rejected by the sink.
///
/// The points of every failed batch were already put back into the buffer.
#[derive(Debug, Error)]
#[error(
    "{failed_batches} of {total_batches} metric batches failed ({requeued_points} points requeued): {cause:#}"
)]
pub struct FlushError {
    pub failed_batches: usize,
    pub total_batches: usize,
    pub requeued_points: usize,
    /// First failure reported by the sink in this pass.
    pub cause: anyhow::Error,
}

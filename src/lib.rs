//! In-memory buffering and batched delivery of metric points.
//!
//! Producers hand points to a [`MetricBatcher`] through [`MetricBatcher::submit`]
//! (or a cloned [`MetricSubmitter`]). Points are flushed to a [`MetricSink`] once
//! the buffer reaches the configured threshold or the flush interval elapses,
//! and a final flush happens on [`MetricBatcher::close`].

use std::{
    collections::BTreeMap,
    time::{SystemTime, UNIX_EPOCH},
};

pub mod batcher;
pub mod buf;
pub mod classify;
pub mod codec;
pub mod config;
pub mod error;
pub mod exporter;
pub mod flush;
pub mod recorder;

pub use batcher::{MetricBatcher, MetricSubmitter};
pub use classify::{error_category, ErrorCategory};
pub use config::BatcherConfig;
pub use error::{Error, FlushError};
pub use exporter::{HttpSink, InMemorySink, MetricSink};
pub use recorder::MetricRecorder;

/// Per-call point limit imposed by the remote metrics protocol.
pub const MAX_BATCH_SIZE: usize = 20;

pub type MetricName = String;
pub type Dimensions = BTreeMap<String, String>;

/// A single named, timestamped, dimensioned observation.
///
/// Read-only once built; submission validates it again before buffering.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    name: MetricName,
    value: f64,
    timestamp: SystemTime,
    dimensions: Dimensions,
}
impl MetricPoint {
    pub fn new(name: impl Into<MetricName>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            timestamp: SystemTime::now(),
            dimensions: Dimensions::new(),
        }
    }

    pub fn at(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = timestamp;
        self
    }
    pub fn with_dimension(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.dimensions.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn value(&self) -> f64 {
        self.value
    }
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }
    pub fn dimensions(&self) -> &Dimensions {
        &self.dimensions
    }

    /// Rejects points the remote protocol cannot represent.
    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |reason: String| Err(Error::InvalidPoint(reason));
        if self.name.is_empty() {
            return invalid("metric name is empty".into());
        }
        if self.name.len() > codec::MAX_STR_LEN {
            return invalid(format!(
                "metric name is {} bytes, limit is {}",
                self.name.len(),
                codec::MAX_STR_LEN
            ));
        }
        if !self.value.is_finite() {
            return invalid(format!(
                "metric `{}` has non-finite value {}",
                self.name, self.value
            ));
        }
        let since_epoch = match self.timestamp.duration_since(UNIX_EPOCH) {
            Ok(since_epoch) => since_epoch,
            Err(_) => {
                return invalid(format!("metric `{}` is timestamped before 1970", self.name));
            }
        };
        if u64::try_from(since_epoch.as_millis()).is_err() {
            return invalid(format!("metric `{}` timestamp is out of range", self.name));
        }
        if self.dimensions.len() > codec::MAX_DIMENSIONS {
            return invalid(format!(
                "metric `{}` has {} dimensions, limit is {}",
                self.name,
                self.dimensions.len(),
                codec::MAX_DIMENSIONS
            ));
        }
        let oversized = self
            .dimensions
            .iter()
            .find(|(key, value)| key.len() > codec::MAX_STR_LEN || value.len() > codec::MAX_STR_LEN);
        if let Some((key, _)) = oversized {
            return invalid(format!(
                "metric `{}` dimension `{}` exceeds {} bytes",
                self.name,
                key.get(..32).unwrap_or(key),
                codec::MAX_STR_LEN
            ));
        }
        Ok(())
    }

    /// Adds `defaults` for every key the point does not already carry.
    pub(crate) fn merge_dimensions(&mut self, defaults: &Dimensions) {
        for (key, value) in defaults {
            self.dimensions
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn empty_name_is_rejected() {
        let err = MetricPoint::new("", 1.0).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidPoint(_)));
    }

    #[test]
    fn non_finite_value_is_rejected() {
        assert!(MetricPoint::new("a", f64::NAN).validate().is_err());
        assert!(MetricPoint::new("a", f64::INFINITY).validate().is_err());
        assert!(MetricPoint::new("a", -3.5).validate().is_ok());
    }

    #[test]
    fn pre_epoch_timestamp_is_rejected() {
        let point = MetricPoint::new("m", 1.0).at(UNIX_EPOCH - Duration::from_secs(1));
        assert!(matches!(point.validate(), Err(Error::InvalidPoint(_))));
        assert!(MetricPoint::new("m", 1.0).at(UNIX_EPOCH).validate().is_ok());
    }

    #[test]
    fn oversized_name_is_rejected() {
        let at_limit = MetricPoint::new("n".repeat(codec::MAX_STR_LEN), 1.0);
        assert!(at_limit.validate().is_ok());
        let over = MetricPoint::new("n".repeat(70_000), 1.0);
        assert!(matches!(over.validate(), Err(Error::InvalidPoint(_))));
    }

    #[test]
    fn oversized_dimension_key_or_value_is_rejected() {
        let long = "d".repeat(codec::MAX_STR_LEN + 1);
        let key = MetricPoint::new("m", 1.0).with_dimension(long.clone(), "v");
        assert!(matches!(key.validate(), Err(Error::InvalidPoint(_))));
        let value = MetricPoint::new("m", 1.0).with_dimension("k", long);
        assert!(matches!(value.validate(), Err(Error::InvalidPoint(_))));
    }

    #[test]
    fn too_many_dimensions_is_rejected() {
        let mut point = MetricPoint::new("m", 1.0);
        for i in 0..=codec::MAX_DIMENSIONS {
            point = point.with_dimension(i.to_string(), "");
        }
        assert!(matches!(point.validate(), Err(Error::InvalidPoint(_))));
    }

    #[test]
    fn valid_points_always_encode() {
        let point = MetricPoint::new("n".repeat(codec::MAX_STR_LEN), 1.0)
            .at(UNIX_EPOCH)
            .with_dimension("k", "v".repeat(codec::MAX_STR_LEN));
        point.validate().unwrap();
        codec::encode_batch(&mut Vec::new(), "ns", &[point]).unwrap();
    }

    #[test]
    fn point_dimensions_win_over_defaults() {
        let mut defaults = Dimensions::new();
        defaults.insert("Environment".into(), "prod".into());
        defaults.insert("ModelID".into(), "default".into());
        let mut point = MetricPoint::new("TokensUsed", 12.0).with_dimension("ModelID", "nova");
        point.merge_dimensions(&defaults);
        assert_eq!(point.dimensions["ModelID"], "nova");
        assert_eq!(point.dimensions["Environment"], "prod");
        assert_eq!(point.dimensions.len(), 2);
    }

    #[test]
    fn repeated_dimension_key_keeps_last_value() {
        let point = MetricPoint::new("a", 1.0)
            .with_dimension("k", "1")
            .with_dimension("k", "2");
        assert_eq!(point.dimensions.len(), 1);
        assert_eq!(point.dimensions["k"], "2");
    }
}

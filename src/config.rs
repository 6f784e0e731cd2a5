use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::{Dimensions, Error};

pub const DEFAULT_FLUSH_THRESHOLD: usize = 20;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);

/// Settings for one [`crate::MetricBatcher`].
///
/// Deserializable so hosts can embed it in their own config files; durations
/// use humantime syntax, e.g. `"30s"` or `"1m 30s"`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatcherConfig {
    /// Remote grouping key for every point of this batcher.
    pub namespace: String,
    /// Buffer length that triggers an immediate flush; `0` selects the default.
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: usize,
    #[serde(
        default = "default_flush_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub flush_interval: Duration,
    /// Merged into every submitted point; dimensions set on the point take precedence.
    #[serde(default)]
    pub custom_dimensions: Dimensions,
    #[serde(default = "enabled")]
    pub enable_flow_metrics: bool,
    #[serde(default = "enabled")]
    pub enable_model_metrics: bool,
}
impl BatcherConfig {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            custom_dimensions: Dimensions::new(),
            enable_flow_metrics: true,
            enable_model_metrics: true,
        }
    }

    /// Threshold actually used for flushing, with `0` meaning [`DEFAULT_FLUSH_THRESHOLD`].
    pub fn effective_flush_threshold(&self) -> usize {
        match self.flush_threshold {
            0 => DEFAULT_FLUSH_THRESHOLD,
            n => n,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.namespace.trim().is_empty() {
            return Err(Error::InvalidConfig("namespace is required".into()));
        }
        if self.namespace.len() > crate::codec::MAX_STR_LEN {
            return Err(Error::InvalidConfig(format!(
                "namespace exceeds {} bytes",
                crate::codec::MAX_STR_LEN
            )));
        }
        if self.flush_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "flush_interval must be greater than zero".into(),
            ));
        }
        if self.custom_dimensions.keys().any(|key| key.is_empty()) {
            return Err(Error::InvalidConfig(
                "custom dimension names must not be empty".into(),
            ));
        }
        Ok(())
    }
}

fn default_flush_threshold() -> usize {
    DEFAULT_FLUSH_THRESHOLD
}
fn default_flush_interval() -> Duration {
    DEFAULT_FLUSH_INTERVAL
}
fn enabled() -> bool {
    true
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    humantime::parse_duration(&text).map_err(serde::de::Error::custom)
}

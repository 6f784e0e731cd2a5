//! Flow and model instrumentation hooks.
//!
//! Each hook turns one event into a few dimensioned points and submits them.
//! Hooks never fail the caller; rejected points are logged and dropped.

use core::fmt;
use std::time::Duration;

use tracing::warn;

use crate::{batcher::MetricSubmitter, config::BatcherConfig, error_category, MetricPoint};

pub const FLOW_STARTED: &str = "FlowStarted";
pub const FLOW_COMPLETED: &str = "FlowCompleted";
pub const FLOW_ERROR: &str = "FlowError";
pub const FLOW_DURATION: &str = "FlowDuration";
pub const TOKENS_USED: &str = "TokensUsed";
pub const GENERATION_DURATION: &str = "GenerationDuration";
pub const GENERATION_COUNT: &str = "GenerationCount";

#[derive(Debug, Clone)]
pub struct MetricRecorder {
    submitter: MetricSubmitter,
    flow_metrics: bool,
    model_metrics: bool,
}
impl MetricRecorder {
    pub fn new(submitter: MetricSubmitter, config: &BatcherConfig) -> Self {
        Self {
            submitter,
            flow_metrics: config.enable_flow_metrics,
            model_metrics: config.enable_model_metrics,
        }
    }

    pub fn on_flow_start(&self, flow: &str) {
        if !self.flow_metrics {
            return;
        }
        self.record(MetricPoint::new(FLOW_STARTED, 1.0).with_dimension("FlowName", flow));
    }

    pub fn on_flow_end(&self, flow: &str, duration: Duration) {
        if !self.flow_metrics {
            return;
        }
        let completed = MetricPoint::new(FLOW_COMPLETED, 1.0)
            .with_dimension("FlowName", flow)
            .with_dimension("Status", "Success");
        let duration = MetricPoint {
            name: FLOW_DURATION.into(),
            value: millis(duration),
            ..completed.clone()
        };
        self.record(completed);
        self.record(duration);
    }

    pub fn on_flow_error<E>(&self, flow: &str, duration: Duration, err: &E)
    where
        E: fmt::Display + ?Sized,
    {
        if !self.flow_metrics {
            return;
        }
        let failed = MetricPoint::new(FLOW_ERROR, 1.0)
            .with_dimension("FlowName", flow)
            .with_dimension("Status", "Error")
            .with_dimension("ErrorType", error_category(Some(err)).as_str());
        let duration = MetricPoint {
            name: FLOW_DURATION.into(),
            value: millis(duration),
            ..failed.clone()
        };
        self.record(failed);
        self.record(duration);
    }

    pub fn on_generate(&self, model: &str, tokens_used: u64, duration: Duration) {
        if !self.model_metrics {
            return;
        }
        let base = MetricPoint::new(TOKENS_USED, tokens_used as f64).with_dimension("ModelID", model);
        let generation_duration = MetricPoint {
            name: GENERATION_DURATION.into(),
            value: millis(duration),
            ..base.clone()
        };
        let generation_count = MetricPoint {
            name: GENERATION_COUNT.into(),
            value: 1.0,
            ..base.clone()
        };
        self.record(base);
        self.record(generation_duration);
        self.record(generation_count);
    }

    fn record(&self, point: MetricPoint) {
        let name = point.name.clone();
        if let Err(e) = self.submitter.submit(point) {
            warn!(metric = %name, error = %e, "metric point dropped");
        }
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_millis() as f64
}

//! Step-level scrape telemetry: how long each phase took and whether it worked
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::time::Instant;

use crate::metrics::{MetricDescription, MetricSink, Sample};

const SUBSYSTEM: &str = "scrape";

static STEP_DURATION: LazyLock<Arc<MetricDescription>> = LazyLock::new(|| {
    MetricDescription::gauge(
        SUBSYSTEM,
        "duration_seconds",
        "Duration of a device scrape step",
        &["device", "step", "success"],
    )
});

static COLLECTOR_DURATION: LazyLock<Arc<MetricDescription>> = LazyLock::new(|| {
    MetricDescription::gauge(
        SUBSYSTEM,
        "collector_duration_seconds",
        "Duration of a device collector scrape",
        &["device", "collector", "success"],
    )
});

/// A named phase of one device's scrape
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Resolve,
    Connect,
    /// The whole collect phase of a device
    Collect,
    /// One feature collector, by name
    Collector(String),
}

impl Step {
    pub fn as_str(&self) -> &str {
        match self {
            Step::Resolve => "resolve",
            Step::Connect => "connect",
            Step::Collect => "collect",
            Step::Collector(name) => name,
        }
    }
}

/// Result of one attempted step
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub device: String,
    pub step: Step,
    pub success: bool,
    pub duration: Duration,
}

impl StepOutcome {
    /// Render as a duration sample labelled with device, step and success
    pub fn into_sample(self) -> Sample {
        let desc = match self.step {
            Step::Collector(_) => Arc::clone(&COLLECTOR_DURATION),
            _ => Arc::clone(&STEP_DURATION),
        };

        Sample::new(
            desc,
            self.duration.as_secs_f64(),
            vec![
                self.device,
                self.step.as_str().to_string(),
                self.success.to_string(),
            ],
        )
    }

    /// Recover an outcome from a telemetry sample; `None` for feature metrics
    pub fn from_sample(sample: &Sample) -> Option<Self> {
        let desc = sample.desc();
        let (step_label, is_collector) = if desc.fq_name() == STEP_DURATION.fq_name() {
            ("step", false)
        } else if desc.fq_name() == COLLECTOR_DURATION.fq_name() {
            ("collector", true)
        } else {
            return None;
        };

        let step = match (is_collector, sample.label(step_label)?) {
            (true, name) => Step::Collector(name.to_string()),
            (false, "resolve") => Step::Resolve,
            (false, "connect") => Step::Connect,
            (false, "collect") => Step::Collect,
            (false, _) => return None,
        };

        Some(Self {
            device: sample.label("device")?.to_string(),
            step,
            success: sample.label("success")? == "true",
            duration: Duration::from_secs_f64(sample.value().max(0.0)),
        })
    }
}

/// Push the telemetry descriptions
pub fn describe(descs: &mut Vec<Arc<MetricDescription>>) {
    descs.push(Arc::clone(&STEP_DURATION));
    descs.push(Arc::clone(&COLLECTOR_DURATION));
}

/// Measures a step from creation until it is reported
#[derive(Debug, Clone, Copy)]
pub struct StepTimer {
    started: Instant,
}

impl StepTimer {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Emit the outcome of `step` for `device` with the time elapsed so far
    pub fn report(&self, sink: &MetricSink, device: &str, step: Step, success: bool) {
        let outcome = StepOutcome {
            device: device.to_string(),
            step,
            success,
            duration: self.elapsed(),
        };
        sink.send(outcome.into_sample());
    }
}

//! Correlated batch generation.
//!
//! All four generators share one `base_time`, one [`ScenarioRegistry`] and one
//! [`EmissionsEstimator`], and draw from a single caller-owned random source.
//! Generation never fails: degenerate settings produce fewer records, not errors.

pub mod deployments;
pub mod incidents;
pub mod logs;
pub mod metrics;

use crate::carbon::EmissionsEstimator;
use crate::config::Config;
use crate::records::{Deployment, Incident, LogEvent, MetricSample, Record};
use crate::scenario::ScenarioRegistry;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Serialize;
use tracing::debug;

pub use deployments::DeploymentHistoryGenerator;
pub use incidents::{IncidentGenerator, IncidentSpec};
pub use logs::LogEventGenerator;
pub use metrics::MetricsSeriesGenerator;

/// Time anchors for one run.
///
/// Scenario offsets are relative to `base_time`; incident history is relative to `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeline {
    pub now: DateTime<Utc>,
    pub base_time: DateTime<Utc>,
}

impl Timeline {
    pub fn new(now: DateTime<Utc>, base_offset_minutes: i64) -> Self {
        Self {
            now,
            base_time: now + Duration::minutes(base_offset_minutes),
        }
    }

    pub fn at_offset(&self, offset_minutes: i64) -> DateTime<Utc> {
        self.base_time + Duration::minutes(offset_minutes)
    }
}

/// Offsets in `[start, end)` every `step` minutes. Empty when `step` is not positive.
pub fn offsets(start: i64, end: i64, step: i64) -> impl Iterator<Item = i64> {
    let (end, step) = if step > 0 { (end, step as usize) } else { (start, 1) };
    (start..end).step_by(step)
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchCounts {
    pub metrics: usize,
    pub logs: usize,
    pub deployments: usize,
    pub incidents: usize,
}

impl BatchCounts {
    pub fn total(&self) -> usize {
        self.metrics + self.logs + self.deployments + self.incidents
    }
}

/// Everything one run produces, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    pub metrics: Vec<MetricSample>,
    pub logs: Vec<LogEvent>,
    pub deployments: Vec<Deployment>,
    pub incidents: Vec<Incident>,
}

impl Batch {
    pub fn counts(&self) -> BatchCounts {
        BatchCounts {
            metrics: self.metrics.len(),
            logs: self.logs.len(),
            deployments: self.deployments.len(),
            incidents: self.incidents.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.counts().total()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flattens the batch in bulk-load order: metrics, logs, deployments, incidents.
    pub fn into_records(self) -> Vec<Record> {
        let mut records = Vec::with_capacity(self.len());
        records.extend(self.metrics.into_iter().map(Record::Metric));
        records.extend(self.logs.into_iter().map(Record::Log));
        records.extend(self.deployments.into_iter().map(Record::Deployment));
        records.extend(self.incidents.into_iter().map(Record::Incident));
        records
    }
}

pub struct BatchGenerator<'a> {
    config: &'a Config,
    registry: ScenarioRegistry,
    estimator: EmissionsEstimator,
}

impl<'a> BatchGenerator<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            registry: ScenarioRegistry::from_config(config),
            estimator: EmissionsEstimator::from_config(&config.carbon),
        }
    }

    pub fn registry(&self) -> &ScenarioRegistry {
        &self.registry
    }

    pub fn estimator(&self) -> &EmissionsEstimator {
        &self.estimator
    }

    pub fn generate<R: Rng + ?Sized>(&self, timeline: &Timeline, rng: &mut R) -> Batch {
        let config = self.config;

        let metrics = MetricsSeriesGenerator::new(
            &self.registry,
            &self.estimator,
            &config.services,
            &config.regions,
            &config.metrics,
        )
        .generate(timeline, rng);
        debug!(count = metrics.len(), "Generated metric samples");

        let logs = LogEventGenerator::new(&self.registry, &config.logs).generate(timeline, rng);
        debug!(count = logs.len(), "Generated log events");

        let deployments = DeploymentHistoryGenerator::new(
            &self.registry,
            &config.services,
            &config.regions,
            &config.deployments,
            self.earliest_offset_minutes(),
        )
        .generate(timeline, rng);
        debug!(count = deployments.len(), "Generated deployments");

        let incidents = IncidentGenerator::new(&self.estimator, config).generate(timeline, rng);
        debug!(count = incidents.len(), "Generated incidents");

        Batch {
            metrics,
            logs,
            deployments,
            incidents,
        }
    }

    /// Earliest offset any metric or log record can carry.
    fn earliest_offset_minutes(&self) -> i64 {
        let logs = &self.config.logs;
        self.config
            .metrics
            .start_offset_minutes
            .min(logs.primary.start_offset_minutes)
            .min(logs.secondary.start_offset_minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_offsets_half_open() {
        let all: Vec<i64> = offsets(-10, 10, 5).collect();
        assert_eq!(all, vec![-10, -5, 0, 5]);
    }

    #[test]
    fn test_offsets_non_positive_step_is_empty() {
        assert_eq!(offsets(0, 10, 0).count(), 0);
        assert_eq!(offsets(0, 10, -5).count(), 0);
    }

    #[test]
    fn test_timeline_anchor() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let timeline = Timeline::new(now, -60);
        assert_eq!(timeline.base_time, Utc.with_ymd_and_hms(2025, 3, 1, 11, 0, 0).unwrap());
        assert_eq!(timeline.at_offset(30), Utc.with_ymd_and_hms(2025, 3, 1, 11, 30, 0).unwrap());
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(87.456), 87.46);
        assert_eq!(round2(30.0), 30.0);
    }

    #[test]
    fn test_empty_batch_records() {
        let batch = Batch::default();
        assert!(batch.is_empty());
        assert!(batch.into_records().is_empty());
    }
}

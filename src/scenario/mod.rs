//! Spike scenarios keyed by service and region.
//!
//! A scenario pins a spike window (relative to the run's `base_time`) to one
//! service/region pair together with the deployment that caused it and the
//! healthy deployment that preceded it. Every generator that needs to know
//! whether a point in time is "bad" asks the registry, which keeps metrics,
//! logs and deployments aligned.

use crate::config::types::{Config, ScenarioConfig};
use std::collections::BTreeMap;

/// Half-open window `[start, start + duration)` in minutes relative to `base_time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpikeWindow {
    pub start_offset_minutes: i64,
    pub duration_minutes: i64,
}

impl SpikeWindow {
    pub fn new(start_offset_minutes: i64, duration_minutes: i64) -> Self {
        Self {
            start_offset_minutes,
            duration_minutes,
        }
    }

    pub fn end_offset_minutes(&self) -> i64 {
        self.start_offset_minutes + self.duration_minutes
    }

    pub fn contains(&self, offset_minutes: i64) -> bool {
        self.start_offset_minutes <= offset_minutes && offset_minutes < self.end_offset_minutes()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentAnchor {
    pub id: String,
    pub version: String,
    pub lead_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogTaxonomy {
    pub error_type: String,
    pub error_message: String,
    pub ok_message: String,
}

#[derive(Debug, Clone)]
pub struct Scenario {
    pub service: String,
    pub region: String,
    pub window: SpikeWindow,
    pub bad_deployment: DeploymentAnchor,
    pub good_deployment: DeploymentAnchor,
    pub log: LogTaxonomy,
    pub primary: bool,
}

impl Scenario {
    pub fn deployment_id_at(&self, offset_minutes: i64) -> &str {
        if self.window.contains(offset_minutes) {
            &self.bad_deployment.id
        } else {
            &self.good_deployment.id
        }
    }

    /// Offset at which a deployment with the given lead landed.
    pub fn deployed_at_offset(&self, anchor: &DeploymentAnchor) -> i64 {
        self.window.start_offset_minutes - anchor.lead_minutes
    }
}

impl From<&ScenarioConfig> for Scenario {
    fn from(config: &ScenarioConfig) -> Self {
        let anchor = |a: &crate::config::types::DeploymentAnchorConfig| DeploymentAnchor {
            id: a.id.clone(),
            version: a.version.clone(),
            lead_minutes: a.lead_minutes,
        };

        Self {
            service: config.service.clone(),
            region: config.region.clone(),
            window: SpikeWindow::new(config.start_offset_minutes, config.duration_minutes),
            bad_deployment: anchor(&config.bad_deployment),
            good_deployment: anchor(&config.good_deployment),
            log: LogTaxonomy {
                error_type: config.log.error_type.clone(),
                error_message: config.log.error_message.clone(),
                ok_message: config.log.ok_message.clone(),
            },
            primary: config.primary,
        }
    }
}

/// Id of the deployment serving a pair that has no scenario.
pub fn stable_deployment_id(service: &str, region: &str) -> String {
    format!("deploy-{}-{}-stable", service, region)
}

#[derive(Debug, Clone, Default)]
pub struct ScenarioRegistry {
    scenarios: BTreeMap<(String, String), Scenario>,
}

impl ScenarioRegistry {
    pub fn new(scenarios: impl IntoIterator<Item = Scenario>) -> Self {
        let scenarios = scenarios
            .into_iter()
            .map(|s| ((s.service.clone(), s.region.clone()), s))
            .collect();
        Self { scenarios }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.scenarios.iter().map(Scenario::from))
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    pub fn get(&self, service: &str, region: &str) -> Option<&Scenario> {
        self.scenarios
            .get(&(service.to_string(), region.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scenario> {
        self.scenarios.values()
    }

    pub fn primary(&self) -> Option<&Scenario> {
        self.iter().find(|s| s.primary)
    }

    pub fn secondaries(&self) -> impl Iterator<Item = &Scenario> {
        self.iter().filter(|s| !s.primary)
    }

    /// Pairs without a scenario are never in a spike.
    pub fn in_spike(&self, service: &str, region: &str, offset_minutes: i64) -> bool {
        self.get(service, region)
            .map(|s| s.window.contains(offset_minutes))
            .unwrap_or(false)
    }

    /// Deployment active for a pair at an offset: the scenario's bad deployment
    /// inside its window, the good one outside, the stable id for unregistered pairs.
    pub fn deployment_id_at(&self, service: &str, region: &str, offset_minutes: i64) -> String {
        match self.get(service, region) {
            Some(scenario) => scenario.deployment_id_at(offset_minutes).to_string(),
            None => stable_deployment_id(service, region),
        }
    }
}

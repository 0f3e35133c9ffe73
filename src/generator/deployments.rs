use super::Timeline;
use crate::config::types::{DeploymentsConfig, ServiceConfig, StatusWeights};
use crate::records::{Deployment, DeploymentStatus};
use crate::scenario::{stable_deployment_id, DeploymentAnchor, Scenario, ScenarioRegistry};
use chrono::Duration;
use rand::seq::IndexedRandom;
use rand::Rng;

/// Deployment history that explains the spikes.
///
/// Emits each scenario's healthy and faulty deployments, a stable deployment
/// for every pair without a scenario (so every id referenced by metrics has a
/// matching record), and a daily backfill of older deployments.
pub struct DeploymentHistoryGenerator<'a> {
    registry: &'a ScenarioRegistry,
    services: &'a [ServiceConfig],
    regions: &'a [String],
    settings: &'a DeploymentsConfig,
    earliest_offset_minutes: i64,
}

impl<'a> DeploymentHistoryGenerator<'a> {
    pub fn new(
        registry: &'a ScenarioRegistry,
        services: &'a [ServiceConfig],
        regions: &'a [String],
        settings: &'a DeploymentsConfig,
        earliest_offset_minutes: i64,
    ) -> Self {
        Self {
            registry,
            services,
            regions,
            settings,
            earliest_offset_minutes,
        }
    }

    pub fn generate<R: Rng + ?Sized>(&self, timeline: &Timeline, rng: &mut R) -> Vec<Deployment> {
        let mut deployments = Vec::new();

        for scenario in self.registry.iter() {
            deployments.push(anchor_deployment(scenario, &scenario.bad_deployment, timeline));
            deployments.push(anchor_deployment(scenario, &scenario.good_deployment, timeline));
        }

        let stable_at = timeline.at_offset(self.earliest_offset_minutes) - Duration::days(1);
        for service in self.services {
            for region in self.regions {
                if self.registry.get(&service.name, region).is_some() {
                    continue;
                }
                deployments.push(Deployment {
                    timestamp: stable_at,
                    service: service.name.clone(),
                    region: region.clone(),
                    deployment_id: stable_deployment_id(&service.name, region),
                    version: format!("v1.{}.{}", rng.random_range(0..10), rng.random_range(0..10)),
                    status: DeploymentStatus::Succeeded,
                });
            }
        }

        for days_ago in 1..=i64::from(self.settings.history_days) {
            for service in self.services {
                for region in self.regions {
                    let timestamp = timeline.base_time
                        - Duration::days(days_ago)
                        - Duration::hours(rng.random_range(0..=23))
                        - Duration::minutes(rng.random_range(0..=59));

                    deployments.push(Deployment {
                        timestamp,
                        service: service.name.clone(),
                        region: region.clone(),
                        deployment_id: history_deployment_id(&service.name, region, days_ago),
                        version: format!(
                            "v{}.{}.{}",
                            2 + days_ago / 10,
                            rng.random_range(0..10),
                            rng.random_range(0..10)
                        ),
                        status: weighted_status(self.settings.status_weights, rng),
                    });
                }
            }
        }

        deployments
    }
}

fn anchor_deployment(scenario: &Scenario, anchor: &DeploymentAnchor, timeline: &Timeline) -> Deployment {
    Deployment {
        timestamp: timeline.at_offset(scenario.deployed_at_offset(anchor)),
        service: scenario.service.clone(),
        region: scenario.region.clone(),
        deployment_id: anchor.id.clone(),
        version: anchor.version.clone(),
        status: DeploymentStatus::Succeeded,
    }
}

pub fn history_deployment_id(service: &str, region: &str, days_ago: i64) -> String {
    format!("deploy-{}-{}-{:02}", service, region.replace('-', ""), days_ago)
}

fn weighted_status<R: Rng + ?Sized>(weights: StatusWeights, rng: &mut R) -> DeploymentStatus {
    let choices = [
        (DeploymentStatus::Succeeded, weights.succeeded),
        (DeploymentStatus::Failed, weights.failed),
        (DeploymentStatus::RolledBack, weights.rolled_back),
    ];

    choices
        .choose_weighted(rng, |(_, weight)| *weight)
        .map(|(status, _)| *status)
        .unwrap_or(DeploymentStatus::Succeeded)
}

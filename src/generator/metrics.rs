use super::{offsets, round2, Timeline};
use crate::carbon::EmissionsEstimator;
use crate::config::types::{MetricsConfig, ServiceConfig};
use crate::records::MetricSample;
use crate::scenario::ScenarioRegistry;
use rand::Rng;

pub const CLOUD_PROVIDER: &str = "gcp";

/// Resource samples for every service/region pair at a fixed step.
///
/// Inside a scenario's spike window values come from the service's spike
/// profile, outside from the shared baseline profile.
pub struct MetricsSeriesGenerator<'a> {
    registry: &'a ScenarioRegistry,
    estimator: &'a EmissionsEstimator,
    services: &'a [ServiceConfig],
    regions: &'a [String],
    settings: &'a MetricsConfig,
}

impl<'a> MetricsSeriesGenerator<'a> {
    pub fn new(
        registry: &'a ScenarioRegistry,
        estimator: &'a EmissionsEstimator,
        services: &'a [ServiceConfig],
        regions: &'a [String],
        settings: &'a MetricsConfig,
    ) -> Self {
        Self {
            registry,
            estimator,
            services,
            regions,
            settings,
        }
    }

    pub fn generate<R: Rng + ?Sized>(&self, timeline: &Timeline, rng: &mut R) -> Vec<MetricSample> {
        let settings = self.settings;
        let window_minutes = settings.step_minutes as f64;
        let mut samples = Vec::new();

        for offset in offsets(
            settings.start_offset_minutes,
            settings.end_offset_minutes,
            settings.step_minutes,
        ) {
            let timestamp = timeline.at_offset(offset);

            for service in self.services {
                for region in self.regions {
                    let in_spike = self.registry.in_spike(&service.name, region, offset);
                    let profile = if in_spike {
                        &service.spike
                    } else {
                        &settings.baseline
                    };

                    let cpu = profile.cpu_pct.sample(rng);
                    let memory = profile.memory_pct.sample(rng);
                    let requests = profile.requests_per_min.sample(rng);

                    // Priced from the unrounded draw
                    let co2 = self.estimator.estimate(cpu, region, window_minutes);

                    samples.push(MetricSample {
                        timestamp,
                        service: service.name.clone(),
                        region: region.clone(),
                        cloud_provider: CLOUD_PROVIDER.to_string(),
                        cpu_pct: round2(cpu),
                        memory_pct: round2(memory),
                        requests_per_min: round2(requests),
                        estimated_co2_grams: co2,
                        emissions_kg_co2e: co2 / 1000.0,
                        deployment_id: self.registry.deployment_id_at(&service.name, region, offset),
                    });
                }
            }
        }

        samples
    }
}

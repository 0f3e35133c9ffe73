use super::{offsets, Timeline};
use crate::config::types::{LogTimelineConfig, LogsConfig};
use crate::records::{LogEvent, LogLevel};
use crate::scenario::{Scenario, ScenarioRegistry};
use rand::Rng;

/// Application logs around each scenario's spike.
///
/// The primary scenario is walked on the finer `logs.primary` timeline, every
/// other scenario on `logs.secondary`. Each step yields a burst of retrying
/// errors inside the spike window and a single success outside it.
pub struct LogEventGenerator<'a> {
    registry: &'a ScenarioRegistry,
    settings: &'a LogsConfig,
}

impl<'a> LogEventGenerator<'a> {
    pub fn new(registry: &'a ScenarioRegistry, settings: &'a LogsConfig) -> Self {
        Self { registry, settings }
    }

    pub fn generate<R: Rng + ?Sized>(&self, timeline: &Timeline, rng: &mut R) -> Vec<LogEvent> {
        let mut events = Vec::new();

        if let Some(primary) = self.registry.primary() {
            walk_scenario(primary, &self.settings.primary, timeline, rng, &mut events);
        }
        for scenario in self.registry.secondaries() {
            walk_scenario(scenario, &self.settings.secondary, timeline, rng, &mut events);
        }

        events
    }
}

fn walk_scenario<R: Rng + ?Sized>(
    scenario: &Scenario,
    settings: &LogTimelineConfig,
    timeline: &Timeline,
    rng: &mut R,
    events: &mut Vec<LogEvent>,
) {
    for offset in offsets(
        settings.start_offset_minutes,
        settings.end_offset_minutes,
        settings.step_minutes,
    ) {
        let timestamp = timeline.at_offset(offset);
        let deployment_id = scenario.deployment_id_at(offset);

        if scenario.window.contains(offset) {
            for _ in 0..settings.burst_size {
                events.push(LogEvent {
                    timestamp,
                    service: scenario.service.clone(),
                    region: scenario.region.clone(),
                    level: LogLevel::Error,
                    message: scenario.log.error_message.clone(),
                    error_type: Some(scenario.log.error_type.clone()),
                    deployment_id: deployment_id.to_string(),
                    retry: true,
                    latency_ms: settings.error_latency_ms.sample(rng),
                });
            }
        } else {
            events.push(LogEvent {
                timestamp,
                service: scenario.service.clone(),
                region: scenario.region.clone(),
                level: LogLevel::Info,
                message: scenario.log.ok_message.clone(),
                error_type: None,
                deployment_id: deployment_id.to_string(),
                retry: false,
                latency_ms: settings.ok_latency_ms.sample(rng),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{DeploymentAnchor, LogTaxonomy, SpikeWindow};
    use chrono::{TimeZone, Utc};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn scenario(service: &str, start: i64, duration: i64, primary: bool, error_type: &str) -> Scenario {
        Scenario {
            service: service.to_string(),
            region: "europe-west1".to_string(),
            window: SpikeWindow::new(start, duration),
            bad_deployment: DeploymentAnchor {
                id: format!("deploy-{}-bad", service),
                version: "v1.4.0".to_string(),
                lead_minutes: 10,
            },
            good_deployment: DeploymentAnchor {
                id: format!("deploy-{}-good", service),
                version: "v1.3.5".to_string(),
                lead_minutes: 120,
            },
            log: LogTaxonomy {
                error_type: error_type.to_string(),
                error_message: format!("{} failed, retrying", service),
                ok_message: format!("{} succeeded", service),
            },
            primary,
        }
    }

    fn timeline() -> Timeline {
        Timeline::new(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(), -60)
    }

    #[test]
    fn test_primary_burst_and_normal_traffic() {
        let registry = ScenarioRegistry::new(vec![scenario("checkout", 0, 60, true, "UpstreamTimeout")]);
        let settings = LogsConfig::default();
        let mut rng = StdRng::seed_from_u64(1);

        let events = LogEventGenerator::new(&registry, &settings).generate(&timeline(), &mut rng);

        // [-60, 120) step 2: 30 steps in spike x 5, 60 steps outside x 1
        let errors: Vec<&LogEvent> = events.iter().filter(|e| e.level == LogLevel::Error).collect();
        let infos: Vec<&LogEvent> = events.iter().filter(|e| e.level == LogLevel::Info).collect();
        assert_eq!(errors.len(), 150);
        assert_eq!(infos.len(), 60);

        for event in errors {
            assert!(event.retry);
            assert_eq!(event.error_type.as_deref(), Some("UpstreamTimeout"));
            assert_eq!(event.deployment_id, "deploy-checkout-bad");
            assert!(event.latency_ms >= 800.0 && event.latency_ms < 1500.0);
        }
        for event in infos {
            assert!(!event.retry);
            assert!(event.error_type.is_none());
            assert_eq!(event.deployment_id, "deploy-checkout-good");
            assert!(event.latency_ms >= 120.0 && event.latency_ms < 250.0);
        }
    }

    #[test]
    fn test_secondary_uses_coarser_timeline() {
        let registry = ScenarioRegistry::new(vec![scenario("inventory", -60, 45, false, "DbLockTimeout")]);
        let settings = LogsConfig::default();
        let mut rng = StdRng::seed_from_u64(2);
        let timeline = timeline();

        let events = LogEventGenerator::new(&registry, &settings).generate(&timeline, &mut rng);

        // [-120, 120) step 5: 9 steps in [-60, -15) x 3, 39 steps outside x 1
        assert_eq!(events.len(), 9 * 3 + 39);
        for event in &events {
            let offset = (event.timestamp - timeline.base_time).num_minutes();
            let expected = if (-60..-15).contains(&offset) {
                "deploy-inventory-bad"
            } else {
                "deploy-inventory-good"
            };
            assert_eq!(event.deployment_id, expected);
        }
    }

    #[test]
    fn test_no_scenarios_no_logs() {
        let registry = ScenarioRegistry::default();
        let settings = LogsConfig::default();
        let mut rng = StdRng::seed_from_u64(3);

        let events = LogEventGenerator::new(&registry, &settings).generate(&timeline(), &mut rng);
        assert!(events.is_empty());
    }
}

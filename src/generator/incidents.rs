use super::Timeline;
use crate::carbon::EmissionsEstimator;
use crate::config::types::IncidentsConfig;
use crate::config::Config;
use crate::records::{Incident, IncidentStatus, Severity};
use chrono::{DateTime, Duration, Utc};
use rand::seq::IndexedRandom;
use rand::Rng;

/// Affected orders per minute of a high-severity incident.
pub const BASE_ORDERS_PER_MINUTE: f64 = 5.0 / 60.0;

const SEVERITY_WEIGHTS: [(Severity, u32); 4] = [
    (Severity::Low, 1),
    (Severity::Medium, 2),
    (Severity::High, 3),
    (Severity::Critical, 1),
];

pub fn severity_multiplier(severity: Severity) -> f64 {
    match severity {
        Severity::Low => 0.3,
        Severity::Medium => 0.6,
        Severity::High => 1.0,
        Severity::Critical => 1.5,
    }
}

/// A hand-written incident included in every batch.
#[derive(Debug, Clone, Copy)]
pub struct CuratedIncident {
    pub days_ago: i64,
    pub title: &'static str,
    pub summary: &'static str,
    pub service: &'static str,
    pub region: &'static str,
    pub tags: &'static [&'static str],
    pub severity: Severity,
    pub status: IncidentStatus,
    pub duration_minutes: f64,
    pub orders_affected: u64,
}

pub const CURATED_INCIDENTS: [CuratedIncident; 4] = [
    CuratedIncident {
        days_ago: 30,
        title: "Retry-induced carbon spike in us-central1",
        summary: "A misconfigured checkout deployment caused retry storms, driving up user-facing checkout failures, latency, and CO2 emissions by ~30% for 2 hours.",
        service: "checkout",
        region: "us-central1",
        tags: &["carbon", "retries", "checkout"],
        severity: Severity::High,
        status: IncidentStatus::Resolved,
        duration_minutes: 120.0,
        orders_affected: 850,
    },
    CuratedIncident {
        days_ago: 60,
        title: "Excess compute waste from error loop in payments",
        summary: "Payments service entered an error loop due to a bad feature flag, causing intermittent card declines and retries for users and wasting CPU.",
        service: "payments",
        region: "europe-west1",
        tags: &["waste", "errors", "payments"],
        severity: Severity::Medium,
        status: IncidentStatus::Resolved,
        duration_minutes: 90.0,
        orders_affected: 430,
    },
    CuratedIncident {
        days_ago: 10,
        title: "Inventory replication lag causing carbon-heavy retries",
        summary: "Inventory service in europe-west1 experienced replication lag, causing inconsistent stock levels for users, repeated retry storms, and elevated CO2 emissions.",
        service: "inventory",
        region: "europe-west1",
        tags: &["carbon", "retries", "inventory"],
        severity: Severity::High,
        status: IncidentStatus::Resolved,
        duration_minutes: 180.0,
        orders_affected: 620,
    },
    CuratedIncident {
        days_ago: 5,
        title: "Carbon spike from overprovisioned inventory capacity in us-central1",
        summary: "Overprovisioned inventory pods in us-central1 ran at high idle CPU for several hours, wasting compute and increasing emissions even though user-facing behavior remained stable.",
        service: "inventory",
        region: "us-central1",
        tags: &["carbon", "waste", "overprovisioning", "inventory"],
        severity: Severity::Medium,
        status: IncidentStatus::Resolved,
        duration_minutes: 240.0,
        orders_affected: 0,
    },
];

/// How an incident is framed in its title, summary and tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Narrative {
    /// Errors and retry storms first, carbon as a side effect.
    IncidentFirst,
    /// Idle overprovisioning first, no user-facing failure.
    CarbonWasteFirst,
}

impl Narrative {
    pub fn for_index(index: usize) -> Self {
        if index % 2 == 0 {
            Narrative::IncidentFirst
        } else {
            Narrative::CarbonWasteFirst
        }
    }

    fn title(&self, service: &str, region: &str) -> String {
        match self {
            Narrative::IncidentFirst => {
                format!("{} error spike causing retries in {}", capitalize(service), region)
            }
            Narrative::CarbonWasteFirst => {
                format!("Carbon waste from idle {} capacity in {}", service, region)
            }
        }
    }

    fn summary(&self, service: &str, region: &str, duration_minutes: f64) -> String {
        let minutes = duration_minutes as i64;
        match self {
            Narrative::IncidentFirst => format!(
                "{} experienced elevated error rates and retry storms in {}, \
                 driving up CPU and wasting capacity for approximately {} minutes.",
                capitalize(service),
                region,
                minutes
            ),
            Narrative::CarbonWasteFirst => format!(
                "Overprovisioned {} pods in {} ran far above needed capacity for \
                 about {} minutes, leading to avoidable CO2 emissions.",
                service, region, minutes
            ),
        }
    }

    fn tags(&self, service: &str) -> Vec<String> {
        let tags: [&str; 4] = match self {
            Narrative::IncidentFirst => ["incident", "errors", "retries", "carbon"],
            Narrative::CarbonWasteFirst => ["carbon", "waste", "overprovisioning", service],
        };
        tags.iter().map(|t| t.to_string()).collect()
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

/// Either literal incident content or a slot to fill with random draws.
#[derive(Debug, Clone, Copy)]
pub enum IncidentSpec {
    Curated(&'static CuratedIncident),
    Randomized { index: usize },
}

/// Incident content before wasted emissions, revenue and embedding are derived.
#[derive(Debug, Clone)]
struct IncidentDraft {
    timestamp: DateTime<Utc>,
    title: String,
    summary: String,
    service: String,
    region: String,
    tags: Vec<String>,
    severity: Severity,
    status: IncidentStatus,
    duration_minutes: f64,
    utilization_pct: f64,
    orders_affected: u64,
}

pub struct IncidentGenerator<'a> {
    estimator: &'a EmissionsEstimator,
    config: &'a Config,
    settings: &'a IncidentsConfig,
}

impl<'a> IncidentGenerator<'a> {
    pub fn new(estimator: &'a EmissionsEstimator, config: &'a Config) -> Self {
        Self {
            estimator,
            config,
            settings: &config.incidents,
        }
    }

    /// Curated anchors first, then one randomized slot per configured incident.
    pub fn specs(&self) -> Vec<IncidentSpec> {
        CURATED_INCIDENTS
            .iter()
            .map(IncidentSpec::Curated)
            .chain((0..self.settings.random_count).map(|index| IncidentSpec::Randomized { index }))
            .collect()
    }

    pub fn generate<R: Rng + ?Sized>(&self, timeline: &Timeline, rng: &mut R) -> Vec<Incident> {
        let mut incidents = Vec::new();
        for spec in self.specs() {
            if let Some(draft) = self.draft(spec, timeline.now, rng) {
                incidents.push(self.emit(draft, rng));
            }
        }
        incidents
    }

    fn draft<R: Rng + ?Sized>(
        &self,
        spec: IncidentSpec,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Option<IncidentDraft> {
        match spec {
            IncidentSpec::Curated(curated) => Some(IncidentDraft {
                timestamp: now - Duration::days(curated.days_ago),
                title: curated.title.to_string(),
                summary: curated.summary.to_string(),
                service: curated.service.to_string(),
                region: curated.region.to_string(),
                tags: curated.tags.iter().map(|t| t.to_string()).collect(),
                severity: curated.severity,
                status: curated.status,
                duration_minutes: curated.duration_minutes,
                utilization_pct: self.settings.curated_cpu_pct,
                orders_affected: curated.orders_affected,
            }),
            IncidentSpec::Randomized { index } => {
                let service = self.config.services.choose(rng)?.name.clone();
                let region = self.config.regions.choose(rng)?.clone();
                let severity = SEVERITY_WEIGHTS
                    .choose_weighted(rng, |(_, weight)| *weight)
                    .map(|(severity, _)| *severity)
                    .unwrap_or(Severity::High);
                let status = *IncidentStatus::ALL.choose(rng)?;
                let timestamp = now
                    - Duration::days(rng.random_range(1..=self.settings.lookback_days.max(1)))
                    - Duration::hours(rng.random_range(0..=23))
                    - Duration::minutes(rng.random_range(0..=59));
                let duration_minutes = self.settings.duration_minutes.sample(rng);
                let utilization_pct = self.settings.excess_cpu_pct.sample(rng);

                let jitter = rng.random_range(0.7..1.3);
                let orders_affected = (duration_minutes
                    * BASE_ORDERS_PER_MINUTE
                    * severity_multiplier(severity)
                    * jitter)
                    .floor() as u64;

                let narrative = Narrative::for_index(index);
                Some(IncidentDraft {
                    timestamp,
                    title: narrative.title(&service, &region),
                    summary: narrative.summary(&service, &region, duration_minutes),
                    tags: narrative.tags(&service),
                    service,
                    region,
                    severity,
                    status,
                    duration_minutes,
                    utilization_pct,
                    orders_affected,
                })
            }
        }
    }

    fn emit<R: Rng + ?Sized>(&self, draft: IncidentDraft, rng: &mut R) -> Incident {
        let wasted_co2_grams =
            self.estimator
                .estimate(draft.utilization_pct, &draft.region, draft.duration_minutes);
        let revenue_lost_usd = draft.orders_affected as f64 * self.config.order_value_usd(&draft.service);

        Incident {
            timestamp: draft.timestamp,
            title: draft.title,
            summary: draft.summary,
            service: draft.service,
            region: draft.region,
            tags: draft.tags,
            severity: draft.severity,
            status: draft.status,
            duration_minutes: draft.duration_minutes,
            orders_affected: draft.orders_affected,
            revenue_lost_usd,
            wasted_co2_grams,
            wasted_emissions_kg_co2e: wasted_co2_grams / 1000.0,
            embedding: placeholder_embedding(self.settings.embedding_dims, rng),
        }
    }
}

/// Uniform `[-1, 1)` components. Stands in for a model-generated embedding.
pub fn placeholder_embedding<R: Rng + ?Sized>(dims: usize, rng: &mut R) -> Vec<f32> {
    (0..dims).map(|_| rng.random_range(-1.0f32..1.0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::generate::generate_starter_config;
    use crate::config::load_config_str;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn config() -> Config {
        load_config_str(&generate_starter_config()).unwrap()
    }

    fn timeline() -> Timeline {
        Timeline::new(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(), -60)
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("checkout"), "Checkout");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_curated_incidents_lead_the_batch() {
        let config = config();
        let estimator = EmissionsEstimator::from_config(&config.carbon);
        let mut rng = StdRng::seed_from_u64(21);
        let timeline = timeline();

        let incidents = IncidentGenerator::new(&estimator, &config).generate(&timeline, &mut rng);
        assert_eq!(incidents.len(), CURATED_INCIDENTS.len() + config.incidents.random_count);

        let first = &incidents[0];
        assert_eq!(first.title, "Retry-induced carbon spike in us-central1");
        assert_eq!(first.timestamp, timeline.now - Duration::days(30));
        assert_eq!(first.orders_affected, 850);
        assert!((first.revenue_lost_usd - 850.0 * 85.0).abs() < 1e-9);
        let expected_co2 = estimator.estimate(60.0, "us-central1", 120.0);
        assert!((first.wasted_co2_grams - expected_co2).abs() < 1e-12);

        let overprovisioned = &incidents[3];
        assert_eq!(overprovisioned.orders_affected, 0);
        assert_eq!(overprovisioned.revenue_lost_usd, 0.0);
        assert!(overprovisioned.wasted_co2_grams > 0.0);
    }

    #[test]
    fn test_randomized_incident_invariants() {
        let config = config();
        let estimator = EmissionsEstimator::from_config(&config.carbon);
        let mut rng = StdRng::seed_from_u64(99);
        let timeline = timeline();

        let incidents = IncidentGenerator::new(&estimator, &config).generate(&timeline, &mut rng);

        for incident in &incidents[CURATED_INCIDENTS.len()..] {
            assert!(incident.wasted_co2_grams >= 0.0);
            assert!(incident.duration_minutes >= 15.0 && incident.duration_minutes < 180.0);
            let expected = incident.orders_affected as f64 * config.order_value_usd(&incident.service);
            assert!((incident.revenue_lost_usd - expected).abs() < 1e-6);
            assert_eq!(incident.embedding.len(), 384);
            assert!(incident.embedding.iter().all(|v| (-1.0..1.0).contains(v)));

            let age = timeline.now - incident.timestamp;
            assert!(age >= Duration::days(1) && age < Duration::days(91));

            // Upper bound: critical severity and maximum jitter
            let ceiling = incident.duration_minutes * BASE_ORDERS_PER_MINUTE * 1.5 * 1.3;
            assert!((incident.orders_affected as f64) <= ceiling);
        }
    }

    #[test]
    fn test_narratives_alternate_by_index() {
        let config = config();
        let estimator = EmissionsEstimator::from_config(&config.carbon);
        let mut rng = StdRng::seed_from_u64(4);

        let incidents = IncidentGenerator::new(&estimator, &config).generate(&timeline(), &mut rng);
        let randomized = &incidents[CURATED_INCIDENTS.len()..];

        for (index, incident) in randomized.iter().enumerate() {
            if index % 2 == 0 {
                assert!(incident.title.contains("error spike causing retries"));
                assert_eq!(incident.tags, vec!["incident", "errors", "retries", "carbon"]);
            } else {
                assert!(incident.title.starts_with("Carbon waste from idle"));
                assert_eq!(incident.tags[..3], ["carbon", "waste", "overprovisioning"]);
                assert_eq!(incident.tags[3], incident.service);
            }
        }
    }

    #[test]
    fn test_specs_order() {
        let config = config();
        let estimator = EmissionsEstimator::from_config(&config.carbon);
        let specs = IncidentGenerator::new(&estimator, &config).specs();

        assert_eq!(specs.len(), 4 + 40);
        assert!(matches!(specs[0], IncidentSpec::Curated(_)));
        assert!(matches!(specs[4], IncidentSpec::Randomized { index: 0 }));
    }

    #[test]
    fn test_severity_multiplier_ordering() {
        let multipliers: Vec<f64> = Severity::ALL.iter().map(|s| severity_multiplier(*s)).collect();
        assert!(multipliers.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(severity_multiplier(Severity::High), 1.0);
    }
}

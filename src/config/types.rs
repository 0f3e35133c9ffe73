use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub carbon: CarbonConfig,
    pub services: Vec<ServiceConfig>,
    pub regions: Vec<String>,
    #[serde(default)]
    pub scenarios: Vec<ScenarioConfig>,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logs: LogsConfig,
    #[serde(default)]
    pub deployments: DeploymentsConfig,
    #[serde(default)]
    pub incidents: IncidentsConfig,
    pub sink: SinkConfig,
}

impl Config {
    pub fn service(&self, name: &str) -> Option<&ServiceConfig> {
        self.services.iter().find(|s| s.name == name)
    }

    pub fn service_names(&self) -> Vec<String> {
        self.services.iter().map(|s| s.name.clone()).collect()
    }

    /// Average order value for a service, falling back to the incident default.
    pub fn order_value_usd(&self, service: &str) -> f64 {
        self.service(service)
            .map(|s| s.average_order_value_usd)
            .unwrap_or(self.incidents.default_order_value_usd)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Fixed seed for reproducible batches. Drawn from the OS when absent.
    pub seed: Option<u64>,
    /// Offset of the scenario anchor (`base_time`) from the run's wall clock.
    pub base_offset_minutes: i64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: None,
            base_offset_minutes: -60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CarbonConfig {
    pub watts_at_full_load: f64,
    pub default_intensity_g_per_kwh: f64,
    pub grid_intensity_g_per_kwh: HashMap<String, f64>,
}

impl Default for CarbonConfig {
    fn default() -> Self {
        Self {
            watts_at_full_load: 50.0,
            default_intensity_g_per_kwh: 450.0,
            grid_intensity_g_per_kwh: HashMap::from([
                ("us-central1".to_string(), 400.0),
                ("europe-west1".to_string(), 250.0),
            ]),
        }
    }
}

/// A `[min, max)` range for uniform sampling, written as a two-element list in YAML.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleRange(pub f64, pub f64);

impl SampleRange {
    pub fn min(&self) -> f64 {
        self.0
    }

    pub fn max(&self) -> f64 {
        self.1
    }

    pub fn is_valid(&self) -> bool {
        self.0.is_finite() && self.1.is_finite() && (self.1 - self.0).is_finite() && self.0 <= self.1
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.0 && value <= self.1
    }

    /// Draws a value uniformly. A degenerate range always yields its minimum.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.0 < self.1 {
            rng.random_range(self.0..self.1)
        } else {
            self.0
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceProfile {
    pub cpu_pct: SampleRange,
    pub memory_pct: SampleRange,
    pub requests_per_min: SampleRange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub average_order_value_usd: f64,
    pub spike: ResourceProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub service: String,
    pub region: String,
    pub start_offset_minutes: i64,
    pub duration_minutes: i64,
    #[serde(default)]
    pub primary: bool,
    pub bad_deployment: DeploymentAnchorConfig,
    pub good_deployment: DeploymentAnchorConfig,
    pub log: LogTaxonomyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentAnchorConfig {
    pub id: String,
    pub version: String,
    /// Minutes before the spike start at which this deployment landed.
    pub lead_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogTaxonomyConfig {
    pub error_type: String,
    pub error_message: String,
    pub ok_message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub start_offset_minutes: i64,
    pub end_offset_minutes: i64,
    pub step_minutes: i64,
    pub baseline: ResourceProfile,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            start_offset_minutes: -120,
            end_offset_minutes: 120,
            step_minutes: 5,
            baseline: ResourceProfile {
                cpu_pct: SampleRange(30.0, 60.0),
                memory_pct: SampleRange(40.0, 70.0),
                requests_per_min: SampleRange(200.0, 400.0),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsConfig {
    pub primary: LogTimelineConfig,
    pub secondary: LogTimelineConfig,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            primary: LogTimelineConfig {
                start_offset_minutes: -60,
                end_offset_minutes: 120,
                step_minutes: 2,
                burst_size: 5,
                error_latency_ms: SampleRange(800.0, 1500.0),
                ok_latency_ms: SampleRange(120.0, 250.0),
            },
            secondary: LogTimelineConfig {
                start_offset_minutes: -120,
                end_offset_minutes: 120,
                step_minutes: 5,
                burst_size: 3,
                error_latency_ms: SampleRange(700.0, 1400.0),
                ok_latency_ms: SampleRange(100.0, 260.0),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogTimelineConfig {
    pub start_offset_minutes: i64,
    pub end_offset_minutes: i64,
    pub step_minutes: i64,
    pub burst_size: usize,
    pub error_latency_ms: SampleRange,
    pub ok_latency_ms: SampleRange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentsConfig {
    pub history_days: u32,
    pub status_weights: StatusWeights,
}

impl Default for DeploymentsConfig {
    fn default() -> Self {
        Self {
            history_days: 14,
            status_weights: StatusWeights::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StatusWeights {
    pub succeeded: u32,
    pub failed: u32,
    pub rolled_back: u32,
}

impl Default for StatusWeights {
    fn default() -> Self {
        Self {
            succeeded: 6,
            failed: 2,
            rolled_back: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IncidentsConfig {
    pub random_count: usize,
    pub lookback_days: i64,
    pub embedding_dims: usize,
    /// Utilization used to price the waste of curated incidents.
    pub curated_cpu_pct: f64,
    pub excess_cpu_pct: SampleRange,
    pub duration_minutes: SampleRange,
    pub default_order_value_usd: f64,
}

impl Default for IncidentsConfig {
    fn default() -> Self {
        Self {
            random_count: 40,
            lookback_days: 90,
            embedding_dims: 384,
            curated_cpu_pct: 60.0,
            excess_cpu_pct: SampleRange(10.0, 60.0),
            duration_minutes: SampleRange(15.0, 180.0),
            default_order_value_usd: 80.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SinkConfig {
    Duckdb {
        path: PathBuf,
    },
    /// Needs `endpoint` or `cloud_id`; `cloud_id` wins when both are set.
    Elasticsearch {
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default)]
        cloud_id: Option<String>,
        api_key: String,
        #[serde(default = "default_index_prefix")]
        index_prefix: String,
        #[serde(default = "default_chunk_size")]
        chunk_size: usize,
    },
}

fn default_index_prefix() -> String {
    "spiketrace".to_string()
}

fn default_chunk_size() -> usize {
    500
}

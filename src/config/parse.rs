use super::types::*;
use crate::config::{expand_env_vars, expand_tilde, unexpanded_env_vars};
use crate::storage::elasticsearch::endpoint_from_cloud_id;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let yaml_string = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    load_config_str(&yaml_string).map_err(|e| match e {
        ConfigError::YamlParse(err) => ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), err),
        )),
        other => other,
    })
}

/// Parse and validate a config held in memory.
pub fn load_config_str(yaml: &str) -> Result<Config, ConfigError> {
    let yaml_string = expand_env_vars(yaml);
    check_unexpanded_vars(&yaml_string)?;

    let mut config: Config = serde_yaml::from_str(&yaml_string)?;
    expand_paths(&mut config);
    validate_config(&config)?;

    Ok(config)
}

/// Sink credentials usually come from the environment, so an unset variable
/// is reported by name instead of surfacing as a failed login later.
fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let unexpanded = unexpanded_env_vars(yaml_string);

    if unexpanded.is_empty() {
        return Ok(());
    }

    let error_msg = if unexpanded.len() == 1 {
        format!(
            "Environment variable $env{{{0}}} is not set.\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variable: export {0}=...\n\
             2. Replace $env{{{0}}} in the config file with an actual value",
            unexpanded[0]
        )
    } else {
        format!(
            "Environment variables are not set: {}\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variables\n\
             2. Replace the variables in the config file with actual values",
            unexpanded.join(", ")
        )
    };

    Err(ConfigError::Validation(error_msg))
}

fn expand_paths(config: &mut Config) {
    if let SinkConfig::Duckdb { path } = &mut config.sink {
        *path = expand_tilde(path);
    }
}

/// Largest magnitude accepted for any offset or duration in minutes (ten years).
pub const MAX_OFFSET_MINUTES: i64 = 10 * 366 * 24 * 60;

/// Largest look-back accepted for day-based history.
pub const MAX_HISTORY_DAYS: i64 = 36_500;

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    validate_offset(
        "generator.base_offset_minutes",
        config.generator.base_offset_minutes,
        &mut errors,
    );
    validate_enumerations(config, &mut errors);
    validate_carbon(&config.carbon, &mut errors);
    validate_scenarios(config, &mut errors);
    validate_metrics(&config.metrics, &mut errors);
    validate_log_timeline("logs.primary", &config.logs.primary, &mut errors);
    validate_log_timeline("logs.secondary", &config.logs.secondary, &mut errors);
    validate_deployments(&config.deployments, &mut errors);
    validate_incidents(&config.incidents, &mut errors);
    validate_sink(&config.sink, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

fn validate_enumerations(config: &Config, errors: &mut Vec<String>) {
    if config.services.is_empty() {
        errors.push("services: at least one service is required".to_string());
    }
    if config.regions.is_empty() {
        errors.push("regions: at least one region is required".to_string());
    }

    let mut service_names = HashSet::new();
    for (i, service) in config.services.iter().enumerate() {
        if service.name.is_empty() {
            errors.push(format!("services[{}]: name cannot be empty", i));
        } else if !service_names.insert(service.name.as_str()) {
            errors.push(format!("services[{}]: duplicate service '{}'", i, service.name));
        }

        if !is_non_negative(service.average_order_value_usd) {
            errors.push(format!(
                "service '{}': average_order_value_usd must be non-negative",
                service.name
            ));
        }

        validate_profile(&format!("service '{}' spike", service.name), &service.spike, errors);
    }

    let mut region_names = HashSet::new();
    for (i, region) in config.regions.iter().enumerate() {
        if region.is_empty() {
            errors.push(format!("regions[{}]: region cannot be empty", i));
        } else if !region_names.insert(region.as_str()) {
            errors.push(format!("regions[{}]: duplicate region '{}'", i, region));
        }
    }
}

fn validate_carbon(carbon: &CarbonConfig, errors: &mut Vec<String>) {
    if !is_non_negative(carbon.watts_at_full_load) {
        errors.push("carbon.watts_at_full_load must be non-negative".to_string());
    }
    if !is_non_negative(carbon.default_intensity_g_per_kwh) {
        errors.push("carbon.default_intensity_g_per_kwh must be non-negative".to_string());
    }

    let mut regions: Vec<&String> = carbon.grid_intensity_g_per_kwh.keys().collect();
    regions.sort();
    for region in regions {
        let intensity = carbon.grid_intensity_g_per_kwh[region];
        if !is_non_negative(intensity) {
            errors.push(format!(
                "carbon.grid_intensity_g_per_kwh.{}: intensity must be non-negative, got {}",
                region, intensity
            ));
        }
    }
}

fn validate_scenarios(config: &Config, errors: &mut Vec<String>) {
    let mut keys = HashSet::new();
    let mut primaries = 0;

    for (i, scenario) in config.scenarios.iter().enumerate() {
        let prefix = format!("scenarios[{}] ({}/{})", i, scenario.service, scenario.region);

        if config.service(&scenario.service).is_none() {
            errors.push(format!(
                "{}: references non-existent service '{}'",
                prefix, scenario.service
            ));
        }
        if !config.regions.contains(&scenario.region) {
            errors.push(format!(
                "{}: references non-existent region '{}'",
                prefix, scenario.region
            ));
        }
        if !keys.insert((scenario.service.as_str(), scenario.region.as_str())) {
            errors.push(format!("{}: duplicate scenario for this service/region", prefix));
        }
        if scenario.duration_minutes <= 0 {
            errors.push(format!("{}: duration_minutes must be positive", prefix));
        }
        validate_offset(
            &format!("{}: start_offset_minutes", prefix),
            scenario.start_offset_minutes,
            errors,
        );
        validate_offset(
            &format!("{}: duration_minutes", prefix),
            scenario.duration_minutes,
            errors,
        );
        if scenario.bad_deployment.id == scenario.good_deployment.id {
            errors.push(format!(
                "{}: bad and good deployments share id '{}'",
                prefix, scenario.bad_deployment.id
            ));
        }
        for (label, anchor) in [
            ("bad_deployment", &scenario.bad_deployment),
            ("good_deployment", &scenario.good_deployment),
        ] {
            if anchor.id.is_empty() {
                errors.push(format!("{}: {}.id cannot be empty", prefix, label));
            }
            if anchor.lead_minutes < 0 {
                errors.push(format!("{}: {}.lead_minutes cannot be negative", prefix, label));
            }
            validate_offset(
                &format!("{}: {}.lead_minutes", prefix, label),
                anchor.lead_minutes,
                errors,
            );
        }
        if scenario.primary {
            primaries += 1;
        }
    }

    if primaries > 1 {
        errors.push(format!(
            "scenarios: at most one scenario may be primary, found {}",
            primaries
        ));
    }
}

fn validate_metrics(metrics: &MetricsConfig, errors: &mut Vec<String>) {
    validate_horizon(
        "metrics",
        metrics.start_offset_minutes,
        metrics.end_offset_minutes,
        metrics.step_minutes,
        errors,
    );
    validate_profile("metrics.baseline", &metrics.baseline, errors);
}

fn validate_log_timeline(context: &str, timeline: &LogTimelineConfig, errors: &mut Vec<String>) {
    validate_horizon(
        context,
        timeline.start_offset_minutes,
        timeline.end_offset_minutes,
        timeline.step_minutes,
        errors,
    );
    if timeline.burst_size == 0 {
        errors.push(format!("{}: burst_size must be at least 1", context));
    }
    validate_range(&format!("{}.error_latency_ms", context), &timeline.error_latency_ms, errors);
    validate_range(&format!("{}.ok_latency_ms", context), &timeline.ok_latency_ms, errors);
}

fn validate_deployments(deployments: &DeploymentsConfig, errors: &mut Vec<String>) {
    let weights = deployments.status_weights;
    if u64::from(weights.succeeded) + u64::from(weights.failed) + u64::from(weights.rolled_back) == 0 {
        errors.push("deployments.status_weights: weights cannot all be zero".to_string());
    }
    if i64::from(deployments.history_days) > MAX_HISTORY_DAYS {
        errors.push(format!(
            "deployments.history_days must be at most {}, got {}",
            MAX_HISTORY_DAYS, deployments.history_days
        ));
    }
}

fn validate_incidents(incidents: &IncidentsConfig, errors: &mut Vec<String>) {
    if incidents.embedding_dims == 0 {
        errors.push("incidents.embedding_dims must be at least 1".to_string());
    }
    if incidents.lookback_days < 1 {
        errors.push("incidents.lookback_days must be at least 1".to_string());
    } else if incidents.lookback_days > MAX_HISTORY_DAYS {
        errors.push(format!(
            "incidents.lookback_days must be at most {}, got {}",
            MAX_HISTORY_DAYS, incidents.lookback_days
        ));
    }
    if !is_non_negative(incidents.default_order_value_usd) {
        errors.push("incidents.default_order_value_usd must be non-negative".to_string());
    }
    validate_range("incidents.excess_cpu_pct", &incidents.excess_cpu_pct, errors);
    validate_range("incidents.duration_minutes", &incidents.duration_minutes, errors);
}

fn validate_sink(sink: &SinkConfig, errors: &mut Vec<String>) {
    match sink {
        SinkConfig::Duckdb { path } => {
            if path.as_os_str().is_empty() {
                errors.push("sink: duckdb path cannot be empty".to_string());
            }
        }
        SinkConfig::Elasticsearch {
            endpoint,
            cloud_id,
            api_key,
            chunk_size,
            ..
        } => {
            match (cloud_id, endpoint) {
                (Some(cloud_id), _) => {
                    if endpoint_from_cloud_id(cloud_id).is_none() {
                        errors.push("sink: elasticsearch cloud_id could not be decoded".to_string());
                    }
                }
                (None, Some(endpoint)) => {
                    if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                        errors.push(format!(
                            "sink: elasticsearch endpoint must be an http(s) URL, got '{}'",
                            endpoint
                        ));
                    }
                }
                (None, None) => {
                    errors.push("sink: elasticsearch needs either endpoint or cloud_id".to_string());
                }
            }
            if api_key.is_empty() {
                errors.push("sink: elasticsearch api_key cannot be empty".to_string());
            }
            if *chunk_size == 0 {
                errors.push("sink: elasticsearch chunk_size must be at least 1".to_string());
            }
        }
    }
}

fn validate_horizon(context: &str, start: i64, end: i64, step: i64, errors: &mut Vec<String>) {
    validate_offset(&format!("{}.start_offset_minutes", context), start, errors);
    validate_offset(&format!("{}.end_offset_minutes", context), end, errors);
    if step <= 0 {
        errors.push(format!("{}: step_minutes must be positive", context));
    }
    if start >= end {
        errors.push(format!(
            "{}: start_offset_minutes ({}) must be before end_offset_minutes ({})",
            context, start, end
        ));
    }
}

fn validate_profile(context: &str, profile: &ResourceProfile, errors: &mut Vec<String>) {
    validate_range(&format!("{}.cpu_pct", context), &profile.cpu_pct, errors);
    validate_range(&format!("{}.memory_pct", context), &profile.memory_pct, errors);
    validate_range(
        &format!("{}.requests_per_min", context),
        &profile.requests_per_min,
        errors,
    );
}

/// Keeps every derived timestamp well inside chrono's representable range.
fn validate_offset(context: &str, minutes: i64, errors: &mut Vec<String>) {
    if minutes.unsigned_abs() > MAX_OFFSET_MINUTES.unsigned_abs() {
        errors.push(format!(
            "{}: {} is out of range (at most {} minutes either way)",
            context, minutes, MAX_OFFSET_MINUTES
        ));
    }
}

fn is_non_negative(value: f64) -> bool {
    value >= 0.0
}

fn validate_range(context: &str, range: &SampleRange, errors: &mut Vec<String>) {
    if !range.is_valid() {
        errors.push(format!(
            "{}: invalid range [{}, {}] (min must not exceed max)",
            context,
            range.min(),
            range.max()
        ));
    }
}

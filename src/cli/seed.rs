use crate::config::generate::generate_starter_config;
use crate::config::{load_config, load_config_str, Config, ConfigError};
use crate::generator::{Batch, BatchGenerator, Timeline};
use crate::storage::{open_sink, BulkSummary, StorageError};
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Command-line overrides for one seeding run.
#[derive(Debug, Clone, Default)]
pub struct SeedOptions {
    pub seed: Option<u64>,
    /// Scenario anchor. When set, `now` is derived from it and `base_offset_minutes`.
    pub base_time: Option<DateTime<Utc>>,
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct SeedReport {
    pub seed: u64,
    pub timeline: Timeline,
    pub generated: usize,
    /// `None` on dry runs.
    pub summary: Option<BulkSummary>,
}

pub async fn seed(
    config_path: Option<&Path>,
    options: SeedOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load(config_path)?;
    let report = run_seed(&config, &options, Utc::now()).await?;

    match report.summary {
        Some(summary) => println!(
            "Seeded {} records ({} failed) with seed {}",
            summary.written, summary.failed, report.seed
        ),
        None => println!(
            "Dry run: generated {} records with seed {}",
            report.generated, report.seed
        ),
    }
    Ok(())
}

fn load(config_path: Option<&Path>) -> Result<Config, ConfigError> {
    match config_path {
        Some(path) => {
            info!(config_path = %path.display(), "Loading configuration");
            load_config(path)
        }
        None => {
            info!("No config file found, using built-in starter config");
            load_config_str(&generate_starter_config())
        }
    }
}

/// Pick the seed and time anchors, then build the whole batch.
pub fn build_batch(config: &Config, options: &SeedOptions, now: DateTime<Utc>) -> (u64, Timeline, Batch) {
    let seed = options
        .seed
        .or(config.generator.seed)
        .unwrap_or_else(rand::random::<u64>);

    let base_offset = config.generator.base_offset_minutes;
    let timeline = match options.base_time {
        Some(base_time) => Timeline::new(base_time - Duration::minutes(base_offset), base_offset),
        None => Timeline::new(now, base_offset),
    };

    info!(seed, base_time = %timeline.base_time, "Generating batch");

    let mut rng = StdRng::seed_from_u64(seed);
    let batch = BatchGenerator::new(config).generate(&timeline, &mut rng);
    (seed, timeline, batch)
}

/// Generate one batch and hand it to the configured sink in a single bulk write.
pub async fn run_seed(
    config: &Config,
    options: &SeedOptions,
    now: DateTime<Utc>,
) -> Result<SeedReport, SeedError> {
    let (seed, timeline, batch) = build_batch(config, options, now);
    let counts = batch.counts();
    info!(
        metrics = counts.metrics,
        logs = counts.logs,
        deployments = counts.deployments,
        incidents = counts.incidents,
        "Batch generated"
    );

    if options.dry_run {
        info!("Dry run, skipping sink");
        return Ok(SeedReport {
            seed,
            timeline,
            generated: counts.total(),
            summary: None,
        });
    }

    let sink = open_sink(&config.sink, config.incidents.embedding_dims)?;
    sink.init_schema().await?;

    let records = batch.into_records();
    let summary = sink.write_batch(&records).await?;
    if summary.failed > 0 {
        warn!(failed = summary.failed, "Some records were rejected by the sink");
    }
    info!(written = summary.written, "Batch written");

    Ok(SeedReport {
        seed,
        timeline,
        generated: records.len(),
        summary: Some(summary),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn starter() -> Config {
        load_config_str(&generate_starter_config()).unwrap()
    }

    #[test]
    fn test_cli_seed_overrides_config_seed() {
        let mut config = starter();
        config.generator.seed = Some(1);
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

        let options = SeedOptions {
            seed: Some(99),
            ..Default::default()
        };
        let (seed, _, _) = build_batch(&config, &options, now);
        assert_eq!(seed, 99);

        let (seed, _, _) = build_batch(&config, &SeedOptions::default(), now);
        assert_eq!(seed, 1);
    }

    #[test]
    fn test_base_time_override_sets_anchor() {
        let config = starter();
        let base_time = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        let options = SeedOptions {
            seed: Some(7),
            base_time: Some(base_time),
            dry_run: true,
        };

        let (_, timeline, _) = build_batch(&config, &options, Utc::now());
        assert_eq!(timeline.base_time, base_time);
        assert_eq!(timeline.now, base_time + Duration::minutes(60));
    }

    #[tokio::test]
    async fn test_dry_run_skips_sink() {
        let config = starter();
        let options = SeedOptions {
            seed: Some(3),
            dry_run: true,
            ..Default::default()
        };

        let report = run_seed(&config, &options, Utc::now()).await.unwrap();
        assert!(report.summary.is_none());
        assert!(report.generated > 0);
    }

    #[tokio::test]
    async fn test_run_seed_writes_to_duckdb_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = starter();
        config.sink = crate::config::SinkConfig::Duckdb {
            path: dir.path().join("nested").join("seed.duckdb"),
        };
        let options = SeedOptions {
            seed: Some(11),
            ..Default::default()
        };

        let report = run_seed(&config, &options, Utc::now()).await.unwrap();
        let summary = report.summary.unwrap();
        assert_eq!(summary.written, report.generated);
        assert_eq!(summary.failed, 0);
    }
}

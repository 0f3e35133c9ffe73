use super::traits::{BulkSummary, Sink, StorageError};
use crate::records::{Collection, Record};
use async_trait::async_trait;
use duckdb::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// PID of the process holding the database lock, parsed from DuckDB's
/// "Conflicting lock is held in ... (PID 12345)" message.
fn lock_holder_pid(error_msg: &str) -> Option<u32> {
    let start = error_msg.find("(PID ")? + 5;
    let end = error_msg[start..].find(')')?;
    error_msg[start..start + end].trim().parse().ok()
}

/// DuckDB sink: one table per collection.
pub struct DuckDbSink {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbSink {
    /// Open (or create) a database file. Another process holding the file
    /// (a dashboard, a second seeder run) is reported as `Locked`.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();

        match Connection::open(path) {
            Ok(conn) => Ok(Self::from_connection(conn)),
            Err(err) => {
                let error_msg = err.to_string();
                if !error_msg.contains("Could not set lock") {
                    return Err(err.into());
                }
                let holder = lock_holder_pid(&error_msg);
                tracing::error!(path = %path.display(), ?holder, "Database file is locked");
                Err(StorageError::Locked {
                    path: path.to_path_buf(),
                    holder,
                })
            }
        }
    }

    /// Create an in-memory DuckDB sink (for testing)
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Number of rows stored in a collection's table.
    pub async fn count(&self, collection: Collection) -> Result<u64, StorageError> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;
            let sql = format!("SELECT COUNT(*) FROM {}", collection.name());
            let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
            Ok::<u64, StorageError>(count.max(0) as u64)
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }

    /// Metric and log rows whose deployment id has no deployment row for the
    /// same service and region.
    pub async fn unmatched_deployment_refs(&self) -> Result<u64, StorageError> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM (
                    SELECT service, region, deployment_id FROM metrics
                    UNION ALL
                    SELECT service, region, deployment_id FROM logs
                 ) refs
                 WHERE NOT EXISTS (
                    SELECT 1 FROM deployments d
                    WHERE d.service = refs.service
                      AND d.region = refs.region
                      AND d.deployment_id = refs.deployment_id
                 )",
                [],
                |row| row.get(0),
            )?;
            Ok::<u64, StorageError>(count.max(0) as u64)
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, StorageError> {
    conn.lock()
        .map_err(|_| StorageError::Database("connection mutex poisoned".to_string()))
}

#[async_trait]
impl Sink for DuckDbSink {
    async fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;

            conn.execute(
                "CREATE TABLE IF NOT EXISTS metrics (
                    timestamp TIMESTAMPTZ NOT NULL,
                    service VARCHAR NOT NULL,
                    region VARCHAR NOT NULL,
                    cloud_provider VARCHAR NOT NULL,
                    cpu_pct DOUBLE NOT NULL,
                    memory_pct DOUBLE NOT NULL,
                    requests_per_min DOUBLE NOT NULL,
                    estimated_co2_grams DOUBLE NOT NULL,
                    emissions_kg_co2e DOUBLE NOT NULL,
                    deployment_id VARCHAR NOT NULL
                )",
                [],
            )?;

            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_metrics_service_region ON metrics(service, region)",
                [],
            )?;

            conn.execute(
                "CREATE TABLE IF NOT EXISTS logs (
                    timestamp TIMESTAMPTZ NOT NULL,
                    service VARCHAR NOT NULL,
                    region VARCHAR NOT NULL,
                    level VARCHAR NOT NULL,
                    message VARCHAR NOT NULL,
                    error_type VARCHAR,
                    deployment_id VARCHAR NOT NULL,
                    retry BOOLEAN NOT NULL,
                    latency_ms DOUBLE NOT NULL
                )",
                [],
            )?;

            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_logs_service_region ON logs(service, region)",
                [],
            )?;

            conn.execute(
                "CREATE TABLE IF NOT EXISTS deployments (
                    timestamp TIMESTAMPTZ NOT NULL,
                    service VARCHAR NOT NULL,
                    region VARCHAR NOT NULL,
                    deployment_id VARCHAR NOT NULL,
                    version VARCHAR NOT NULL,
                    status VARCHAR NOT NULL
                )",
                [],
            )?;

            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_deployments_id ON deployments(deployment_id)",
                [],
            )?;

            // tags and embedding hold serialized JSON arrays
            conn.execute(
                "CREATE TABLE IF NOT EXISTS incidents (
                    timestamp TIMESTAMPTZ NOT NULL,
                    title VARCHAR NOT NULL,
                    summary VARCHAR NOT NULL,
                    service VARCHAR NOT NULL,
                    region VARCHAR NOT NULL,
                    tags VARCHAR NOT NULL,
                    severity VARCHAR NOT NULL,
                    status VARCHAR NOT NULL,
                    duration_minutes DOUBLE NOT NULL,
                    orders_affected UBIGINT NOT NULL,
                    revenue_lost_usd DOUBLE NOT NULL,
                    wasted_co2_grams DOUBLE NOT NULL,
                    wasted_emissions_kg_co2e DOUBLE NOT NULL,
                    embedding VARCHAR NOT NULL
                )",
                [],
            )?;

            Ok::<(), StorageError>(())
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }

    async fn write_batch(&self, records: &[Record]) -> Result<BulkSummary, StorageError> {
        if records.is_empty() {
            return Ok(BulkSummary::default());
        }

        let conn = self.conn.clone();
        let records = records.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut conn = lock(&conn)?;
            let tx = conn.transaction()?;

            {
                let mut metric_stmt = tx.prepare(
                    "INSERT INTO metrics (timestamp, service, region, cloud_provider, cpu_pct, memory_pct,
                                          requests_per_min, estimated_co2_grams, emissions_kg_co2e, deployment_id)
                     VALUES (to_timestamp(? / 1000000.0), ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )?;
                let mut log_stmt = tx.prepare(
                    "INSERT INTO logs (timestamp, service, region, level, message, error_type,
                                       deployment_id, retry, latency_ms)
                     VALUES (to_timestamp(? / 1000000.0), ?, ?, ?, ?, ?, ?, ?, ?)",
                )?;
                let mut deployment_stmt = tx.prepare(
                    "INSERT INTO deployments (timestamp, service, region, deployment_id, version, status)
                     VALUES (to_timestamp(? / 1000000.0), ?, ?, ?, ?, ?)",
                )?;
                let mut incident_stmt = tx.prepare(
                    "INSERT INTO incidents (timestamp, title, summary, service, region, tags, severity, status,
                                            duration_minutes, orders_affected, revenue_lost_usd,
                                            wasted_co2_grams, wasted_emissions_kg_co2e, embedding)
                     VALUES (to_timestamp(? / 1000000.0), ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )?;

                for record in &records {
                    match record {
                        Record::Metric(m) => {
                            metric_stmt.execute(duckdb::params![
                                m.timestamp.timestamp_micros(),
                                m.service,
                                m.region,
                                m.cloud_provider,
                                m.cpu_pct,
                                m.memory_pct,
                                m.requests_per_min,
                                m.estimated_co2_grams,
                                m.emissions_kg_co2e,
                                m.deployment_id,
                            ])?;
                        }
                        Record::Log(l) => {
                            log_stmt.execute(duckdb::params![
                                l.timestamp.timestamp_micros(),
                                l.service,
                                l.region,
                                l.level.as_str(),
                                l.message,
                                l.error_type,
                                l.deployment_id,
                                l.retry,
                                l.latency_ms,
                            ])?;
                        }
                        Record::Deployment(d) => {
                            deployment_stmt.execute(duckdb::params![
                                d.timestamp.timestamp_micros(),
                                d.service,
                                d.region,
                                d.deployment_id,
                                d.version,
                                d.status.as_str(),
                            ])?;
                        }
                        Record::Incident(i) => {
                            let tags_json = serde_json::to_string(&i.tags)?;
                            let embedding_json = serde_json::to_string(&i.embedding)?;
                            incident_stmt.execute(duckdb::params![
                                i.timestamp.timestamp_micros(),
                                i.title,
                                i.summary,
                                i.service,
                                i.region,
                                tags_json,
                                i.severity.as_str(),
                                i.status.as_str(),
                                i.duration_minutes,
                                i.orders_affected,
                                i.revenue_lost_usd,
                                i.wasted_co2_grams,
                                i.wasted_emissions_kg_co2e,
                                embedding_json,
                            ])?;
                        }
                    }
                }
            }

            tx.commit()?;

            Ok::<BulkSummary, StorageError>(BulkSummary {
                written: records.len(),
                failed: 0,
            })
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{
        Deployment, DeploymentStatus, Incident, IncidentStatus, LogEvent, LogLevel, MetricSample,
        Severity,
    };
    use chrono::Utc;

    async fn setup_sink() -> DuckDbSink {
        let sink = DuckDbSink::in_memory().unwrap();
        sink.init_schema().await.unwrap();
        sink
    }

    fn metric(deployment_id: &str) -> Record {
        Record::Metric(MetricSample {
            timestamp: Utc::now(),
            service: "checkout".to_string(),
            region: "us-central1".to_string(),
            cloud_provider: "gcp".to_string(),
            cpu_pct: 88.1,
            memory_pct: 75.0,
            requests_per_min: 512.3,
            estimated_co2_grams: 1.46,
            emissions_kg_co2e: 0.00146,
            deployment_id: deployment_id.to_string(),
        })
    }

    fn deployment(deployment_id: &str) -> Record {
        Record::Deployment(Deployment {
            timestamp: Utc::now(),
            service: "checkout".to_string(),
            region: "us-central1".to_string(),
            deployment_id: deployment_id.to_string(),
            version: "v2.3.0".to_string(),
            status: DeploymentStatus::Succeeded,
        })
    }

    #[tokio::test]
    async fn test_schema_initialization_is_idempotent() {
        let sink = DuckDbSink::in_memory().unwrap();
        assert!(sink.init_schema().await.is_ok());
        assert!(sink.init_schema().await.is_ok());
    }

    #[tokio::test]
    async fn test_write_routes_records_to_tables() {
        let sink = setup_sink().await;
        let log = Record::Log(LogEvent {
            timestamp: Utc::now(),
            service: "checkout".to_string(),
            region: "us-central1".to_string(),
            level: LogLevel::Error,
            message: "Checkout request failed, retrying".to_string(),
            error_type: Some("UpstreamTimeout".to_string()),
            deployment_id: "deploy-checkout-bad".to_string(),
            retry: true,
            latency_ms: 1200.0,
        });

        let summary = sink
            .write_batch(&[metric("deploy-checkout-bad"), log, deployment("deploy-checkout-bad")])
            .await
            .unwrap();

        assert_eq!(summary, BulkSummary { written: 3, failed: 0 });
        assert_eq!(sink.count(Collection::Metrics).await.unwrap(), 1);
        assert_eq!(sink.count(Collection::Logs).await.unwrap(), 1);
        assert_eq!(sink.count(Collection::Deployments).await.unwrap(), 1);
        assert_eq!(sink.count(Collection::Incidents).await.unwrap(), 0);
        assert_eq!(sink.unmatched_deployment_refs().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unmatched_deployment_refs_detected() {
        let sink = setup_sink().await;
        sink.write_batch(&[metric("deploy-unknown"), deployment("deploy-checkout-bad")])
            .await
            .unwrap();

        assert_eq!(sink.unmatched_deployment_refs().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_write_is_noop() {
        let sink = setup_sink().await;
        let summary = sink.write_batch(&[]).await.unwrap();
        assert_eq!(summary.written, 0);
        assert_eq!(sink.count(Collection::Metrics).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_incident_tags_and_embedding_stored_as_json_text() {
        let sink = setup_sink().await;
        let incident = Record::Incident(Incident {
            timestamp: Utc::now(),
            title: "Checkout latency spike".to_string(),
            summary: "Bad deploy doubled CPU".to_string(),
            service: "checkout".to_string(),
            region: "us-central1".to_string(),
            tags: vec!["latency".to_string(), "checkout".to_string()],
            severity: Severity::High,
            status: IncidentStatus::Resolved,
            duration_minutes: 45.0,
            orders_affected: 12,
            revenue_lost_usd: 1020.0,
            wasted_co2_grams: 3.2,
            wasted_emissions_kg_co2e: 0.0032,
            embedding: vec![0.5, -0.25],
        });

        sink.write_batch(&[incident]).await.unwrap();

        let (tags, embedding): (String, String) = {
            let conn = lock(&sink.conn).unwrap();
            conn.query_row("SELECT tags, embedding FROM incidents", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap()
        };
        let tags: Vec<String> = serde_json::from_str(&tags).unwrap();
        let embedding: Vec<f32> = serde_json::from_str(&embedding).unwrap();
        assert_eq!(tags, vec!["latency", "checkout"]);
        assert_eq!(embedding, vec![0.5, -0.25]);
    }

    #[test]
    fn test_lock_holder_pid() {
        let msg = "IO Error: Could not set lock on file \"x.duckdb\": Conflicting lock is held in /usr/bin/spiketrace (PID 4242) by user me";
        assert_eq!(lock_holder_pid(msg), Some(4242));
        assert_eq!(lock_holder_pid("no pid here"), None);
    }
}

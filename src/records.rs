use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Target collection of a record in the persistence sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Metrics,
    Logs,
    Deployments,
    Incidents,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Metrics,
        Collection::Logs,
        Collection::Deployments,
        Collection::Incidents,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Metrics => "metrics",
            Collection::Logs => "logs",
            Collection::Deployments => "deployments",
            Collection::Incidents => "incidents",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    #[serde(rename = "@timestamp")]
    pub timestamp: DateTime<Utc>,
    pub service: String,
    pub region: String,
    #[serde(rename = "cloud.provider")]
    pub cloud_provider: String,
    pub cpu_pct: f64,
    pub memory_pct: f64,
    pub requests_per_min: f64,
    pub estimated_co2_grams: f64,
    pub emissions_kg_co2e: f64,
    pub deployment_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    #[serde(rename = "@timestamp")]
    pub timestamp: DateTime<Utc>,
    pub service: String,
    pub region: String,
    pub level: LogLevel,
    pub message: String,
    pub error_type: Option<String>,
    pub deployment_id: String,
    pub retry: bool,
    pub latency_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Succeeded,
    Failed,
    RolledBack,
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::Succeeded => "succeeded",
            DeploymentStatus::Failed => "failed",
            DeploymentStatus::RolledBack => "rolled_back",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    #[serde(rename = "@timestamp")]
    pub timestamp: DateTime<Utc>,
    pub service: String,
    pub region: String,
    pub deployment_id: String,
    pub version: String,
    pub status: DeploymentStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
    Open,
    Mitigated,
    Resolved,
}

impl IncidentStatus {
    pub const ALL: [IncidentStatus; 3] = [
        IncidentStatus::Open,
        IncidentStatus::Mitigated,
        IncidentStatus::Resolved,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Open => "open",
            IncidentStatus::Mitigated => "mitigated",
            IncidentStatus::Resolved => "resolved",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    #[serde(rename = "@timestamp")]
    pub timestamp: DateTime<Utc>,
    pub title: String,
    pub summary: String,
    pub service: String,
    pub region: String,
    /// Distinct labels, in authoring order.
    pub tags: Vec<String>,
    pub severity: Severity,
    pub status: IncidentStatus,
    pub duration_minutes: f64,
    pub orders_affected: u64,
    pub revenue_lost_usd: f64,
    pub wasted_co2_grams: f64,
    pub wasted_emissions_kg_co2e: f64,
    /// Placeholder vector for similarity search; carries no meaning.
    pub embedding: Vec<f32>,
}

/// One generated document together with the collection it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Record {
    Metric(MetricSample),
    Log(LogEvent),
    Deployment(Deployment),
    Incident(Incident),
}

impl Record {
    pub fn collection(&self) -> Collection {
        match self {
            Record::Metric(_) => Collection::Metrics,
            Record::Log(_) => Collection::Logs,
            Record::Deployment(_) => Collection::Deployments,
            Record::Incident(_) => Collection::Incidents,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Record::Metric(m) => m.timestamp,
            Record::Log(l) => l.timestamp,
            Record::Deployment(d) => d.timestamp,
            Record::Incident(i) => i.timestamp,
        }
    }
}

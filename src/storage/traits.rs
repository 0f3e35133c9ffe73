use super::duckdb::DuckDbSink;
use super::elasticsearch::{endpoint_from_cloud_id, ElasticsearchSink};
use crate::config::SinkConfig;
use crate::records::Record;
use async_trait::async_trait;

/// Bulk destination for a generated batch.
///
/// Writes are at-least-once; a sink never deduplicates.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Create the four collections if they don't exist yet.
    async fn init_schema(&self) -> Result<(), StorageError>;

    /// Write every record to its collection.
    async fn write_batch(&self, records: &[Record]) -> Result<BulkSummary, StorageError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkSummary {
    pub written: usize,
    /// Records the sink accepted the request for but rejected individually.
    pub failed: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("database error: {0}")]
    Database(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database {} is locked by another process{}", .path.display(), pid_suffix(.holder))]
    Locked {
        path: std::path::PathBuf,
        holder: Option<u32>,
    },

    #[error("invalid sink config: {0}")]
    Config(String),

    #[error("request rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

fn pid_suffix(holder: &Option<u32>) -> String {
    holder.map(|pid| format!(" (PID {})", pid)).unwrap_or_default()
}

/// Build the sink described by the config. `embedding_dims` sizes the incident vector field.
pub fn open_sink(config: &SinkConfig, embedding_dims: usize) -> Result<Box<dyn Sink>, StorageError> {
    match config {
        SinkConfig::Duckdb { path } => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            Ok(Box::new(DuckDbSink::new(path)?))
        }
        SinkConfig::Elasticsearch {
            endpoint,
            cloud_id,
            api_key,
            index_prefix,
            chunk_size,
        } => {
            let endpoint = match (cloud_id, endpoint) {
                (Some(cloud_id), _) => endpoint_from_cloud_id(cloud_id).ok_or_else(|| {
                    StorageError::Config("elasticsearch cloud_id could not be decoded".to_string())
                })?,
                (None, Some(endpoint)) => endpoint.clone(),
                (None, None) => {
                    return Err(StorageError::Config(
                        "elasticsearch needs either endpoint or cloud_id".to_string(),
                    ))
                }
            };
            Ok(Box::new(ElasticsearchSink::new(
                &endpoint,
                api_key,
                index_prefix,
                *chunk_size,
                embedding_dims,
            )?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locked_error_names_holder() {
        let err = StorageError::Locked {
            path: "/tmp/seed.duckdb".into(),
            holder: Some(4242),
        };
        assert_eq!(
            err.to_string(),
            "database /tmp/seed.duckdb is locked by another process (PID 4242)"
        );
    }

    #[test]
    fn test_elasticsearch_sink_needs_an_address() {
        let config = SinkConfig::Elasticsearch {
            endpoint: None,
            cloud_id: None,
            api_key: "abc".to_string(),
            index_prefix: "spiketrace".to_string(),
            chunk_size: 500,
        };
        assert!(matches!(open_sink(&config, 384), Err(StorageError::Config(_))));
    }
}

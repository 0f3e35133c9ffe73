use super::traits::{BulkSummary, Sink, StorageError};
use crate::records::{Collection, Record};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Elasticsearch sink using the `_bulk` API. Index names are `{prefix}-{collection}`.
#[derive(Debug)]
pub struct ElasticsearchSink {
    client: reqwest::Client,
    endpoint: String,
    index_prefix: String,
    chunk_size: usize,
    embedding_dims: usize,
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    errors: bool,
    #[serde(default)]
    items: Vec<HashMap<String, BulkItem>>,
}

#[derive(Debug, Deserialize)]
struct BulkItem {
    #[serde(default)]
    error: Option<Value>,
}

impl ElasticsearchSink {
    pub fn new(
        endpoint: &str,
        api_key: &str,
        index_prefix: &str,
        chunk_size: usize,
        embedding_dims: usize,
    ) -> Result<Self, StorageError> {
        let mut auth = HeaderValue::from_str(&format!("ApiKey {}", api_key))
            .map_err(|e| StorageError::Database(format!("invalid api key header: {}", e)))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            index_prefix: index_prefix.to_string(),
            chunk_size: chunk_size.max(1),
            embedding_dims,
        })
    }

    pub fn index_name(&self, collection: Collection) -> String {
        index_name(&self.index_prefix, collection)
    }

    async fn create_index_if_missing(&self, collection: Collection) -> Result<(), StorageError> {
        let index = self.index_name(collection);
        let url = format!("{}/{}", self.endpoint, index);

        let exists = self.client.head(&url).send().await?;
        if exists.status().is_success() {
            debug!(index = %index, "Index already exists");
            return Ok(());
        }

        let body = json!({ "mappings": index_mappings(collection, self.embedding_dims) });
        let response = self.client.put(&url).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(StorageError::Rejected {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        info!(index = %index, "Created index");
        Ok(())
    }
}

/// Elastic Cloud deployment id (`name:base64(host$es_uuid$kibana_uuid)`) to its
/// HTTPS endpoint, `https://{es_uuid}.{host}`.
pub fn endpoint_from_cloud_id(cloud_id: &str) -> Option<String> {
    let encoded = cloud_id.split_once(':').map_or(cloud_id, |(_, rest)| rest);
    let decoded = String::from_utf8(decode_base64(encoded)?).ok()?;

    let mut parts = decoded.split('$');
    let host = parts.next().filter(|h| !h.is_empty())?;
    let es_uuid = parts.next().filter(|u| !u.is_empty())?;
    Some(format!("https://{}.{}", es_uuid, host))
}

fn decode_base64(input: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len() * 3 / 4);
    let mut acc: u32 = 0;
    let mut bits = 0;

    for c in input.trim().trim_end_matches('=').bytes() {
        let value = match c {
            b'A'..=b'Z' => c - b'A',
            b'a'..=b'z' => c - b'a' + 26,
            b'0'..=b'9' => c - b'0' + 52,
            b'+' | b'-' => 62,
            b'/' | b'_' => 63,
            _ => return None,
        };
        acc = (acc << 6) | u32::from(value);
        bits += 6;
        if bits >= 8 {
            bits -= 8;
            out.push((acc >> bits) as u8);
            acc &= (1 << bits) - 1;
        }
    }
    Some(out)
}

pub fn index_name(prefix: &str, collection: Collection) -> String {
    format!("{}-{}", prefix, collection.name())
}

/// Explicit field mappings per collection.
pub fn index_mappings(collection: Collection, embedding_dims: usize) -> Value {
    let properties = match collection {
        Collection::Metrics => json!({
            "@timestamp": { "type": "date" },
            "service": { "type": "keyword" },
            "region": { "type": "keyword" },
            "cloud.provider": { "type": "keyword" },
            "cpu_pct": { "type": "float" },
            "memory_pct": { "type": "float" },
            "requests_per_min": { "type": "float" },
            "estimated_co2_grams": { "type": "float" },
            "emissions_kg_co2e": { "type": "float" },
            "deployment_id": { "type": "keyword" },
        }),
        Collection::Logs => json!({
            "@timestamp": { "type": "date" },
            "service": { "type": "keyword" },
            "region": { "type": "keyword" },
            "level": { "type": "keyword" },
            "message": { "type": "text" },
            "error_type": { "type": "keyword" },
            "deployment_id": { "type": "keyword" },
            "retry": { "type": "boolean" },
            "latency_ms": { "type": "float" },
        }),
        Collection::Deployments => json!({
            "@timestamp": { "type": "date" },
            "service": { "type": "keyword" },
            "region": { "type": "keyword" },
            "deployment_id": { "type": "keyword" },
            "version": { "type": "keyword" },
            "status": { "type": "keyword" },
        }),
        Collection::Incidents => json!({
            "@timestamp": { "type": "date" },
            "title": { "type": "text" },
            "summary": { "type": "text" },
            "service": { "type": "keyword" },
            "region": { "type": "keyword" },
            "tags": { "type": "keyword" },
            "severity": { "type": "keyword" },
            "status": { "type": "keyword" },
            "duration_minutes": { "type": "float" },
            "wasted_co2_grams": { "type": "float" },
            "wasted_emissions_kg_co2e": { "type": "float" },
            "orders_affected": { "type": "integer" },
            "revenue_lost_usd": { "type": "float" },
            "embedding": {
                "type": "dense_vector",
                "dims": embedding_dims,
                "index": true,
                "similarity": "cosine",
            },
        }),
    };

    json!({ "properties": properties })
}

/// NDJSON body for one `_bulk` request: an index action line followed by the document.
pub fn render_bulk_body(prefix: &str, records: &[Record]) -> Result<String, serde_json::Error> {
    let mut body = String::new();
    for record in records {
        let action = json!({ "index": { "_index": index_name(prefix, record.collection()) } });
        body.push_str(&serde_json::to_string(&action)?);
        body.push('\n');
        body.push_str(&serde_json::to_string(record)?);
        body.push('\n');
    }
    Ok(body)
}

#[async_trait]
impl Sink for ElasticsearchSink {
    async fn init_schema(&self) -> Result<(), StorageError> {
        for collection in Collection::ALL {
            self.create_index_if_missing(collection).await?;
        }
        Ok(())
    }

    async fn write_batch(&self, records: &[Record]) -> Result<BulkSummary, StorageError> {
        let url = format!("{}/_bulk", self.endpoint);
        let mut summary = BulkSummary::default();

        for (i, chunk) in records.chunks(self.chunk_size).enumerate() {
            let body = render_bulk_body(&self.index_prefix, chunk)?;
            let response = self
                .client
                .post(&url)
                .header(CONTENT_TYPE, "application/x-ndjson")
                .body(body)
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(StorageError::Rejected {
                    status: response.status().as_u16(),
                    body: response.text().await.unwrap_or_default(),
                });
            }

            let bulk: BulkResponse = response.json().await?;
            let failed = if bulk.errors { count_item_errors(&bulk) } else { 0 };
            if failed > 0 {
                warn!(chunk = i, failed, "Bulk request had rejected items");
            }

            summary.written += chunk.len() - failed;
            summary.failed += failed;
            debug!(chunk = i, documents = chunk.len(), "Bulk chunk indexed");
        }

        Ok(summary)
    }
}

fn count_item_errors(response: &BulkResponse) -> usize {
    response
        .items
        .iter()
        .filter(|item| item.values().any(|result| result.error.is_some()))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Deployment, DeploymentStatus};
    use chrono::{TimeZone, Utc};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    fn deployment() -> Record {
        Record::Deployment(Deployment {
            timestamp: Utc.with_ymd_and_hms(2025, 5, 1, 8, 30, 0).unwrap(),
            service: "inventory".to_string(),
            region: "europe-west1".to_string(),
            deployment_id: "deploy-inventory-bad".to_string(),
            version: "v1.4.0".to_string(),
            status: DeploymentStatus::Succeeded,
        })
    }

    #[test]
    fn test_render_bulk_body_pairs_action_and_document() {
        let body = render_bulk_body("spiketrace", &[deployment(), deployment()]).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(body.ends_with('\n'));

        let action: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(action["index"]["_index"], "spiketrace-deployments");

        let doc: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(doc["deployment_id"], "deploy-inventory-bad");
        assert_eq!(doc["@timestamp"], "2025-05-01T08:30:00Z");
        assert_eq!(doc["status"], "succeeded");
    }

    #[test]
    fn test_incident_mapping_uses_embedding_dims() {
        let mapping = index_mappings(Collection::Incidents, 384);
        assert_eq!(mapping["properties"]["embedding"]["type"], "dense_vector");
        assert_eq!(mapping["properties"]["embedding"]["dims"], 384);
    }

    #[test]
    fn test_count_item_errors() {
        let response: BulkResponse = serde_json::from_str(
            r#"{
                "errors": true,
                "items": [
                    {"index": {"status": 201}},
                    {"index": {"status": 400, "error": {"type": "mapper_parsing_exception"}}},
                    {"index": {"status": 201}}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(count_item_errors(&response), 1);
    }

    #[test]
    fn test_endpoint_from_cloud_id() {
        assert_eq!(
            endpoint_from_cloud_id(
                "my-deployment:dXMtY2VudHJhbDEuZ2NwLmNsb3VkLmVzLmlvJGFiYzEyMyRkZWY0NTY="
            )
            .as_deref(),
            Some("https://abc123.us-central1.gcp.cloud.es.io")
        );
        assert_eq!(
            endpoint_from_cloud_id("local:bG9jYWxob3N0OjkyNDMkZXMxJGtiMQ==").as_deref(),
            Some("https://es1.localhost:9243")
        );
        assert_eq!(endpoint_from_cloud_id("broken:***"), None);
        assert_eq!(endpoint_from_cloud_id("empty:"), None);
    }

    /// Serves one canned `(status, body)` per connection, in order, and returns
    /// the raw requests it saw.
    async fn serve(responses: Vec<(u16, &'static str)>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().await.unwrap();
                requests.push(read_request(&mut stream).await);
                let reply = format!(
                    "HTTP/1.1 {} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                stream.write_all(reply.as_bytes()).await.unwrap();
                stream.shutdown().await.unwrap();
            }
            requests
        });

        (format!("http://{}", addr), handle)
    }

    async fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let Some(head_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..head_end]).to_lowercase();
            let content_length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= head_end + 4 + content_length {
                break;
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    #[tokio::test]
    async fn test_write_batch_chunks_and_counts_item_errors() {
        let (endpoint, server) = serve(vec![
            (
                200,
                r#"{"errors":false,"items":[{"index":{"status":201}},{"index":{"status":201}}]}"#,
            ),
            (
                200,
                r#"{"errors":true,"items":[{"index":{"status":400,"error":{"type":"mapper_parsing_exception"}}}]}"#,
            ),
        ])
        .await;

        let sink = ElasticsearchSink::new(&endpoint, "abc", "spiketrace", 2, 384).unwrap();
        let summary = sink
            .write_batch(&[deployment(), deployment(), deployment()])
            .await
            .unwrap();

        assert_eq!(summary, BulkSummary { written: 2, failed: 1 });

        let requests = server.await.unwrap();
        assert_eq!(requests.len(), 2);
        for request in &requests {
            let lower = request.to_lowercase();
            assert!(request.starts_with("POST /_bulk "));
            assert!(lower.contains("authorization: apikey abc"));
            assert!(lower.contains("content-type: application/x-ndjson"));
        }
        assert_eq!(requests[0].matches("spiketrace-deployments").count(), 2);
        assert_eq!(requests[1].matches("spiketrace-deployments").count(), 1);
    }

    #[tokio::test]
    async fn test_write_batch_non_success_is_rejected() {
        let (endpoint, server) = serve(vec![(429, r#"{"error":"too many requests"}"#)]).await;

        let sink = ElasticsearchSink::new(&endpoint, "abc", "spiketrace", 500, 384).unwrap();
        let err = sink.write_batch(&[deployment()]).await.unwrap_err();

        match err {
            StorageError::Rejected { status, body } => {
                assert_eq!(status, 429);
                assert!(body.contains("too many requests"));
            }
            other => panic!("unexpected error {:?}", other),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_init_schema_creates_only_missing_indices() {
        let (endpoint, server) = serve(vec![
            (200, ""),
            (404, ""),
            (200, r#"{"acknowledged":true}"#),
            (404, ""),
            (200, r#"{"acknowledged":true}"#),
            (404, ""),
            (200, r#"{"acknowledged":true}"#),
        ])
        .await;

        let sink = ElasticsearchSink::new(&endpoint, "abc", "demo", 500, 8).unwrap();
        sink.init_schema().await.unwrap();

        let requests = server.await.unwrap();
        let lines: Vec<&str> = requests
            .iter()
            .map(|r| r.lines().next().unwrap_or_default())
            .collect();
        assert_eq!(
            lines,
            vec![
                "HEAD /demo-metrics HTTP/1.1",
                "HEAD /demo-logs HTTP/1.1",
                "PUT /demo-logs HTTP/1.1",
                "HEAD /demo-deployments HTTP/1.1",
                "PUT /demo-deployments HTTP/1.1",
                "HEAD /demo-incidents HTTP/1.1",
                "PUT /demo-incidents HTTP/1.1",
            ]
        );
        assert!(requests[6].contains("dense_vector"));
        assert!(requests[6].contains(r#""dims":8"#));
    }

    #[test]
    fn test_index_name_and_trailing_slash() {
        let sink = ElasticsearchSink::new("https://es.example.com/", "abc", "demo", 100, 384).unwrap();
        assert_eq!(sink.endpoint, "https://es.example.com");
        assert_eq!(sink.index_name(Collection::Metrics), "demo-metrics");
    }
}

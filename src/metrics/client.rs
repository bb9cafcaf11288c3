use std::time::Duration;

use async_trait::async_trait;

use super::response::{parse_body, Sample};
use crate::config::MonitorConfig;

/// Anything that can turn a query expression into a single sample
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Run one instant query. Never retried here.
    async fn query(&self, expression: &str) -> Result<Sample, QueryError>;
}

/// HTTP client for a Prometheus-compatible instant-query API
#[derive(Debug, Clone)]
pub struct MetricsClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl MetricsClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, QueryError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QueryError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &MonitorConfig) -> Result<Self, QueryError> {
        Self::new(config.backend_url.clone(), config.request_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl MetricsSource for MetricsClient {
    async fn query(&self, expression: &str) -> Result<Sample, QueryError> {
        let url = format!("{}/api/v1/query", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .query(&[("query", expression)])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    QueryError::Network(format!("request timed out: {}", e))
                } else {
                    QueryError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| QueryError::Network(e.to_string()))?;

        // Error statuses usually still carry a JSON `status: "error"` body.
        match parse_body(&body) {
            Err(QueryError::Parse(_)) if !status.is_success() => Err(QueryError::Network(
                format!("backend returned status {}", status),
            )),
            result => {
                if let Ok(sample) = &result {
                    tracing::debug!(query = %expression, value = sample.value, "Sample received");
                }
                result
            }
        }
    }
}

/// Metrics query errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Query returned no series")]
    EmptyResult,
}

impl QueryError {
    /// Whether the backend simply had no data (as opposed to a failure)
    pub fn is_empty_result(&self) -> bool {
        matches!(self, QueryError::EmptyResult)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Query,
        http::StatusCode,
        response::{IntoResponse, Response},
        routing::get,
        Json, Router,
    };
    use std::collections::HashMap;
    use tokio::net::TcpListener;

    fn vector(value: &str) -> Json<serde_json::Value> {
        Json(serde_json::json!({
            "status": "success",
            "data": {
                "resultType": "vector",
                "result": [{"metric": {}, "value": [1700000000, value]}]
            }
        }))
    }

    async fn fake_backend(Query(params): Query<HashMap<String, String>>) -> Response {
        let query = params.get("query").cloned().unwrap_or_default();
        match query.as_str() {
            "sum(up)" => (StatusCode::OK, vector("80")).into_response(),
            "sum(up offset 1d)" => (StatusCode::OK, vector("70")).into_response(),
            "sum(missing)" => (
                StatusCode::OK,
                Json(serde_json::json!({
                    "status": "success",
                    "data": {"resultType": "vector", "result": []}
                })),
            )
                .into_response(),
            "sum(slow)" => {
                tokio::time::sleep(Duration::from_secs(3)).await;
                (StatusCode::OK, vector("1")).into_response()
            }
            "sum(broken)" => {
                (StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>").into_response()
            }
            _ => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "status": "error",
                    "errorType": "bad_data",
                    "error": "parse error"
                })),
            )
                .into_response(),
        }
    }

    async fn spawn_backend() -> String {
        let app = Router::new().route("/api/v1/query", get(fake_backend));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_query_success() {
        let base = spawn_backend().await;
        let client = MetricsClient::new(base, Duration::from_secs(5)).unwrap();

        let sample = client.query("sum(up)").await.unwrap();
        assert_eq!(sample.value, 80.0);
    }

    #[tokio::test]
    async fn test_offset_clause_sent_verbatim() {
        let base = spawn_backend().await;
        let client = MetricsClient::new(base, Duration::from_secs(5)).unwrap();

        let sample = client.query("sum(up offset 1d)").await.unwrap();
        assert_eq!(sample.value, 70.0);
    }

    #[tokio::test]
    async fn test_empty_result() {
        let base = spawn_backend().await;
        let client = MetricsClient::new(base, Duration::from_secs(5)).unwrap();

        let err = client.query("sum(missing)").await.unwrap_err();
        assert!(err.is_empty_result());
    }

    #[tokio::test]
    async fn test_error_status_yields_empty_result() {
        let base = spawn_backend().await;
        let client = MetricsClient::new(base, Duration::from_secs(5)).unwrap();

        let err = client.query("sum(").await.unwrap_err();
        assert_eq!(err, QueryError::EmptyResult);
    }

    #[tokio::test]
    async fn test_timeout_is_network_error() {
        let base = spawn_backend().await;
        let client = MetricsClient::new(base, Duration::from_millis(200)).unwrap();

        let err = tokio::time::timeout(Duration::from_secs(2), client.query("sum(slow)"))
            .await
            .expect("client timeout should fire first")
            .unwrap_err();
        assert!(
            matches!(&err, QueryError::Network(msg) if msg.contains("timed out")),
            "unexpected error: {:?}",
            err
        );
    }

    #[tokio::test]
    async fn test_server_error_with_html_body_is_network_error() {
        let base = spawn_backend().await;
        let client = MetricsClient::new(base, Duration::from_secs(5)).unwrap();

        let err = client.query("sum(broken)").await.unwrap_err();
        assert_eq!(
            err,
            QueryError::Network("backend returned status 500 Internal Server Error".into())
        );
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client =
            MetricsClient::new(format!("http://{}", addr), Duration::from_secs(2)).unwrap();
        let err = client.query("sum(up)").await.unwrap_err();
        assert!(matches!(err, QueryError::Network(_)));
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client =
            MetricsClient::new("http://localhost:9090/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:9090");
    }
}

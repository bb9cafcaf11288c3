//! Instant-query response decoding

use serde::{Deserialize, Serialize};

use super::client::QueryError;

/// A single scalar reading from the backend
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub value: f64,
    /// Evaluation timestamp reported by the backend (unix seconds)
    pub timestamp: f64,
}

impl Sample {
    pub fn new(value: f64, timestamp: f64) -> Self {
        Self { value, timestamp }
    }
}

/// `{status, data: {result: [{value: [ts, "v"]}]}}`
#[derive(Debug, Deserialize)]
pub struct QueryResponse {
    pub status: String,
    #[serde(default)]
    pub data: Option<QueryData>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QueryData {
    #[serde(default)]
    pub result: Vec<SeriesResult>,
}

#[derive(Debug, Deserialize)]
pub struct SeriesResult {
    #[serde(default)]
    pub value: Vec<serde_json::Value>,
}

impl QueryResponse {
    /// Extract the first series' instant value
    pub fn into_sample(self) -> Result<Sample, QueryError> {
        if self.status != "success" {
            return Err(QueryError::EmptyResult);
        }

        let series = self
            .data
            .and_then(|d| d.result.into_iter().next())
            .ok_or(QueryError::EmptyResult)?;

        let raw = series
            .value
            .get(1)
            .and_then(|v| v.as_str())
            .ok_or_else(|| QueryError::Parse("missing string value at value[1]".to_string()))?;

        let value = raw
            .parse::<f64>()
            .map_err(|e| QueryError::Parse(format!("{:?}: {}", raw, e)))?;

        let timestamp = series.value.first().and_then(|t| t.as_f64()).unwrap_or(0.0);

        Ok(Sample::new(value, timestamp))
    }
}

/// Decode a raw response body into a sample
pub fn parse_body(body: &[u8]) -> Result<Sample, QueryError> {
    let response: QueryResponse =
        serde_json::from_slice(body).map_err(|e| QueryError::Parse(e.to_string()))?;
    response.into_sample()
}

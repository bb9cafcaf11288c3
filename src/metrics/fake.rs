//! In-memory metrics source for tests

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::client::{MetricsSource, QueryError};
use super::response::Sample;

/// Answers queries from a fixed table and records every call
#[derive(Default)]
pub struct FakeSource {
    answers: Mutex<HashMap<String, Result<f64, QueryError>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(self, expression: &str, value: f64) -> Self {
        self.set(expression, Ok(value));
        self
    }

    pub fn with_error(self, expression: &str, error: QueryError) -> Self {
        self.set(expression, Err(error));
        self
    }

    pub fn set(&self, expression: &str, answer: Result<f64, QueryError>) {
        self.answers.lock().insert(expression.to_string(), answer);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, expression: &str) -> usize {
        self.calls.lock().iter().filter(|c| *c == expression).count()
    }
}

#[async_trait]
impl MetricsSource for FakeSource {
    async fn query(&self, expression: &str) -> Result<Sample, QueryError> {
        self.calls.lock().push(expression.to_string());
        match self.answers.lock().get(expression) {
            Some(Ok(value)) => Ok(Sample::new(*value, 0.0)),
            Some(Err(e)) => Err(e.clone()),
            None => Err(QueryError::EmptyResult),
        }
    }
}

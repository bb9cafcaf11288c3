//! Service definitions loaded from the services file

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Backend a service is queried against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuerySource {
    /// Prometheus-compatible HTTP query API
    Prometheus,
    /// Any other backend name; kept so the file still loads, skipped by the monitor
    #[serde(other)]
    Unsupported,
}

/// A monitored service as written in the services file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Service name (the key in the services file)
    #[serde(skip_deserializing, default)]
    pub name: String,
    /// Which backend to query
    pub source: QuerySource,
    /// Raw backend expression
    pub query: String,
    /// Aggregate function wrapped around the expression (e.g. `sum`)
    pub aggregate: String,
    /// Breach threshold in percent
    pub threshold: u32,
    /// Historical offsets in days
    #[serde(rename = "offset", default)]
    pub offsets: Vec<u32>,
}

impl ServiceSpec {
    /// Create a Prometheus-backed service
    pub fn new(
        name: impl Into<String>,
        query: impl Into<String>,
        aggregate: impl Into<String>,
        threshold: u32,
    ) -> Self {
        Self {
            name: name.into(),
            source: QuerySource::Prometheus,
            query: query.into(),
            aggregate: aggregate.into(),
            threshold,
            offsets: Vec::new(),
        }
    }

    /// Set the historical offsets (days)
    pub fn with_offsets(mut self, offsets: impl Into<Vec<u32>>) -> Self {
        self.offsets = offsets.into();
        self
    }

    /// Set the query source
    pub fn with_source(mut self, source: QuerySource) -> Self {
        self.source = source;
        self
    }

    /// Whether the monitor evaluates this service
    pub fn is_monitored(&self) -> bool {
        self.source == QuerySource::Prometheus
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("service name is empty".to_string()));
        }
        if self.query.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "service {}: query is empty",
                self.name
            )));
        }
        if self.aggregate.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "service {}: aggregate is empty",
                self.name
            )));
        }
        if self.offsets.iter().any(|&days| days == 0) {
            return Err(ConfigError::Invalid(format!(
                "service {}: offsets must be positive",
                self.name
            )));
        }
        Ok(())
    }
}

/// Immutable, validated set of services keyed by name
#[derive(Debug, Clone, Default)]
pub struct ServiceSet {
    services: BTreeMap<String, ServiceSpec>,
}

impl ServiceSet {
    /// Build a set from specs, validating each one
    pub fn from_specs(specs: impl IntoIterator<Item = ServiceSpec>) -> Result<Self, ConfigError> {
        let mut services = BTreeMap::new();
        for spec in specs {
            spec.validate()?;
            if services.contains_key(&spec.name) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate service name: {}",
                    spec.name
                )));
            }
            services.insert(spec.name.clone(), spec);
        }

        if services.is_empty() {
            return Err(ConfigError::Empty);
        }

        Ok(Self { services })
    }

    /// Parse the JSON services document
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let raw: BTreeMap<String, ServiceSpec> = serde_json::from_str(json)?;
        Self::from_specs(raw.into_iter().map(|(name, mut spec)| {
            spec.name = name;
            spec
        }))
    }

    /// Read and parse a services file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&contents)
    }

    pub fn get(&self, name: &str) -> Option<&ServiceSpec> {
        self.services.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceSpec> {
        self.services.values()
    }

    /// Services the monitor evaluates
    pub fn monitored(&self) -> impl Iterator<Item = &ServiceSpec> {
        self.iter().filter(|s| s.is_monitored())
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid services JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid service definition: {0}")]
    Invalid(String),

    #[error("No services configured")]
    Empty,
}

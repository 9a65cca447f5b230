//! Run configuration.
//!
//! Loaded from a TOML file (every section optional), then overridden by
//! `CITEGRAPH_*` environment variables, then validated before any stage runs.
//!
//! ```toml
//! [scope]
//! subfield_id = "https://openalex.org/subfields/2507"
//! publication_year = 2024
//!
//! [source]
//! path = "openalex.sqlite"
//!
//! [graph]
//! uri = "bolt://localhost:7687"
//! user = "neo4j"
//! password = "..."
//!
//! [loader]
//! batch_size = 1000
//!
//! [loader.stage_timeouts]
//! cited = 1800
//!
//! [partition]
//! support_threshold = 3
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CiteGraphError, CiteGraphResult};

/// Top-level configuration consumed by the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub scope: ScopeConfig,
    pub source: SourceConfig,
    pub graph: GraphConfig,
    pub loader: LoaderConfig,
    pub partition: PartitionConfig,
}

/// The predicate that selects the working set of works.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Works tagged with any topic of this subfield are in scope...
    pub subfield_id: String,
    /// ...when published in this year.
    pub publication_year: i64,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            subfield_id: "https://openalex.org/subfields/2507".to_string(),
            publication_year: 2024,
        }
    }
}

/// Location of the relational source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub path: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("openalex.sqlite"),
        }
    }
}

/// Configuration for connecting to Neo4j.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub database: String,
    pub max_connections: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: String::new(),
            database: "neo4j".to_string(),
            max_connections: 4,
        }
    }
}

impl GraphConfig {
    /// Check that every connection parameter is present.
    pub fn validate(&self) -> CiteGraphResult<()> {
        if self.uri.trim().is_empty() {
            return Err(CiteGraphError::config("graph.uri is required"));
        }
        if self.user.trim().is_empty() {
            return Err(CiteGraphError::config("graph.user is required"));
        }
        if self.password.is_empty() {
            return Err(CiteGraphError::config(
                "graph.password is required (or set CITEGRAPH_NEO4J_PASSWORD)",
            ));
        }
        if self.max_connections == 0 {
            return Err(CiteGraphError::config("graph.max_connections must be at least 1"));
        }
        Ok(())
    }
}

/// Batch loader tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Upsert instructions per committed batch.
    pub batch_size: usize,
    /// Attempts per batch, first try included.
    pub max_attempts: u32,
    /// Backoff before the first retry; doubles on every further retry.
    pub retry_backoff_ms: u64,
    /// Default per-batch transaction timeout.
    pub batch_timeout_secs: u64,
    /// Per-stage overrides of `batch_timeout_secs`, keyed by stage name.
    pub stage_timeouts: BTreeMap<String, u64>,
    /// Fail an edge stage that left dangling references instead of only
    /// counting them.
    pub fail_on_dangling: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        let mut stage_timeouts = BTreeMap::new();
        // The citation join touches a large share of the edge relation.
        stage_timeouts.insert("cited".to_string(), 1800);
        Self {
            batch_size: 1000,
            max_attempts: 3,
            retry_backoff_ms: 500,
            batch_timeout_secs: 300,
            stage_timeouts,
            fail_on_dangling: false,
        }
    }
}

impl LoaderConfig {
    /// Transaction timeout for a stage, falling back to the default.
    pub fn timeout_for(&self, stage: &str) -> Duration {
        let secs = self
            .stage_timeouts
            .get(stage)
            .copied()
            .unwrap_or(self.batch_timeout_secs);
        Duration::from_secs(secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Citation partition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    /// Minimum number of distinct in-scope citing works an external work
    /// needs before its outgoing edges are kept.
    pub support_threshold: usize,
    /// Load outgoing/incoming citations and their external works. When off,
    /// only internal citations are loaded.
    pub include_external: bool,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            support_threshold: 3,
            include_external: true,
        }
    }
}

impl RunConfig {
    /// Load configuration from an optional TOML file and the process environment.
    pub fn load(path: Option<&Path>) -> CiteGraphResult<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> CiteGraphResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `CITEGRAPH_*` overrides using the given variable lookup.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CITEGRAPH_NEO4J_URI") {
            self.graph.uri = v;
        }
        if let Some(v) = lookup("CITEGRAPH_NEO4J_USER") {
            self.graph.user = v;
        }
        if let Some(v) = lookup("CITEGRAPH_NEO4J_PASSWORD") {
            self.graph.password = v;
        }
        if let Some(v) = lookup("CITEGRAPH_NEO4J_DATABASE") {
            self.graph.database = v;
        }
        if let Some(v) = lookup("CITEGRAPH_SOURCE_PATH") {
            self.source.path = PathBuf::from(v);
        }
        if let Some(v) = lookup("CITEGRAPH_SUBFIELD_ID") {
            self.scope.subfield_id = v;
        }
        if let Some(v) = lookup("CITEGRAPH_PUBLICATION_YEAR") {
            match v.parse() {
                Ok(year) => self.scope.publication_year = year,
                Err(_) => warn!(value = %v, "Ignoring non-numeric CITEGRAPH_PUBLICATION_YEAR"),
            }
        }
        if let Some(v) = lookup("CITEGRAPH_BATCH_SIZE") {
            match v.parse() {
                Ok(size) => self.loader.batch_size = size,
                Err(_) => warn!(value = %v, "Ignoring non-numeric CITEGRAPH_BATCH_SIZE"),
            }
        }
        if let Some(v) = lookup("CITEGRAPH_SUPPORT_THRESHOLD") {
            match v.parse() {
                Ok(k) => self.partition.support_threshold = k,
                Err(_) => warn!(value = %v, "Ignoring non-numeric CITEGRAPH_SUPPORT_THRESHOLD"),
            }
        }
    }

    /// Validate everything the pipeline needs regardless of the target.
    ///
    /// Graph connection parameters are checked separately by
    /// [`GraphConfig::validate`] since dry runs never connect.
    pub fn validate(&self) -> CiteGraphResult<()> {
        if self.scope.subfield_id.trim().is_empty() {
            return Err(CiteGraphError::config("scope.subfield_id is required"));
        }
        if self.scope.publication_year <= 0 {
            return Err(CiteGraphError::config("scope.publication_year must be positive"));
        }
        if self.source.path.as_os_str().is_empty() {
            return Err(CiteGraphError::config("source.path is required"));
        }
        if self.loader.batch_size == 0 {
            return Err(CiteGraphError::config("loader.batch_size must be at least 1"));
        }
        if self.loader.max_attempts == 0 {
            return Err(CiteGraphError::config("loader.max_attempts must be at least 1"));
        }
        if self.loader.batch_timeout_secs == 0 {
            return Err(CiteGraphError::config("loader.batch_timeout_secs must be at least 1"));
        }
        if let Some((stage, _)) = self.loader.stage_timeouts.iter().find(|(_, secs)| **secs == 0) {
            return Err(CiteGraphError::config(format!(
                "loader.stage_timeouts.{} must be at least 1",
                stage
            )));
        }
        if self.partition.support_threshold == 0 {
            return Err(CiteGraphError::config("partition.support_threshold must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = RunConfig::default();
        config.validate().unwrap();
        assert_eq!(config.loader.batch_size, 1000);
        assert_eq!(config.partition.support_threshold, 3);
        assert_eq!(config.loader.timeout_for("cited"), Duration::from_secs(1800));
        assert_eq!(config.loader.timeout_for("works"), Duration::from_secs(300));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RunConfig::from_toml_str(
            "[loader]\nbatch_size = 500\n\n[partition]\nsupport_threshold = 5\n",
        )
        .unwrap();
        assert_eq!(config.loader.batch_size, 500);
        assert_eq!(config.loader.max_attempts, 3);
        assert_eq!(config.partition.support_threshold, 5);
        assert!(config.partition.include_external);
        assert_eq!(config.scope.publication_year, 2024);
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        let err = RunConfig::from_toml_str("[loader]\nbatch_size = \"big\"\n").unwrap_err();
        assert!(matches!(err, CiteGraphError::ConfigParse(_)));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("CITEGRAPH_NEO4J_PASSWORD", "secret"),
            ("CITEGRAPH_BATCH_SIZE", "250"),
            ("CITEGRAPH_PUBLICATION_YEAR", "not-a-year"),
        ]
        .into_iter()
        .collect();

        let mut config = RunConfig::default();
        config.apply_env_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.graph.password, "secret");
        assert_eq!(config.loader.batch_size, 250);
        assert_eq!(config.scope.publication_year, 2024);
        config.graph.validate().unwrap();
    }

    #[test]
    fn test_validation_rejects_zero_batch_size() {
        let mut config = RunConfig::default();
        config.loader.batch_size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn test_validation_rejects_zero_stage_timeout() {
        let mut config = RunConfig::default();
        config.loader.stage_timeouts.insert("authored".to_string(), 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_password_is_a_config_error() {
        let err = GraphConfig::default().validate().unwrap_err();
        assert!(matches!(err, CiteGraphError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("citegraph.toml");
        std::fs::write(&path, "[scope]\npublication_year = 2023\n").unwrap();

        let config = RunConfig::load(Some(&path)).unwrap();
        assert_eq!(config.scope.publication_year, 2023);
    }
}

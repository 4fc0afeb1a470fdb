//! Pipeline configuration value objects
//!
//! Every stage receives its configuration explicitly. The whole tree can be loaded
//! from TOML or JSON:
//!
//! ```toml
//! [filter]
//! skip_failures = true
//! country = { blacklist = ["ZZ"] }
//! area = { min = 20.0, max = 120.0 }
//!
//! [dispersion.hysplit]
//! NFIRES_PER_PROCESS = 10
//! NPROCESSES_MAX = 4
//! ```
//!
//! Filter timestamps must be quoted strings in TOML.

use crate::core_types::geo::BoundaryConfig;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub merge: MergeConfig,
    pub filter: FilterConfig,
    pub plume_merge: Option<PlumeGridConfig>,
    pub dispersion: DispersionConfig,
}

impl PipelineConfig {
    /// # Errors
    /// Returns [`ConfigError::Parse`] if the document is not valid
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// # Errors
    /// Returns [`ConfigError::Parse`] if the document is not valid
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

/// Merging of fires sharing an id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Skip fires that cannot be merged instead of failing the run
    pub skip_failures: bool,
}

/// Fire activity filters, applied in document order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Log and skip bad filter configs and per-fire filter failures
    #[serde(default)]
    pub skip_failures: bool,
    /// Filter name → parameters
    #[serde(flatten)]
    pub filters: Map<String, Value>,
}

impl FilterConfig {
    /// Append a filter; later filters run after earlier ones
    pub fn with_filter(mut self, name: &str, params: Value) -> Self {
        self.filters.insert(name.to_string(), params);
        self
    }

    pub fn with_skip_failures(mut self, skip: bool) -> Self {
        self.skip_failures = skip;
        self
    }
}

/// Grid used to bucket fires for plume merging
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlumeGridConfig {
    /// Cell size in degrees
    #[serde(default)]
    pub spacing: Option<f64>,
    #[serde(default)]
    pub boundary: Option<BoundaryConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispersionConfig {
    pub hysplit: HysplitConfig,
    pub workers: WorkerConfig,
}

/// Dispersion model run settings. Non-positive counts mean "unset".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HysplitConfig {
    #[serde(rename = "NPROCESSES")]
    pub num_processes: i64,
    #[serde(rename = "NFIRES_PER_PROCESS")]
    pub num_fires_per_process: i64,
    #[serde(rename = "NPROCESSES_MAX")]
    pub num_processes_max: i64,
    #[serde(rename = "VERTICAL_EMISLEVELS_REDUCTION_FACTOR")]
    pub vertical_emislevels_reduction_factor: u32,
    /// Height (m) at which smoldering emissions are injected
    #[serde(rename = "SMOLDER_HEIGHT")]
    pub smolder_height: f64,
}

impl Default for HysplitConfig {
    fn default() -> Self {
        Self {
            num_processes: 1,
            num_fires_per_process: -1,
            num_processes_max: -1,
            vertical_emislevels_reduction_factor: 1,
            smolder_height: 10.0,
        }
    }
}

/// Tranche worker orchestration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Root under which each tranche gets its own directory
    pub working_dir: PathBuf,
    /// Attempts per tranche for resource failures (at least 1)
    pub max_attempts: u32,
    /// Initial retry delay, doubled on each retry
    pub backoff_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            working_dir: std::env::temp_dir().join("smoke-sim-dispersion"),
            max_attempts: 3,
            backoff_ms: 100,
        }
    }
}

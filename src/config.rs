//! Registry configuration
//!
//! Loaded from a JSON file (every field optional), then overridden from the
//! environment:
//!
//! | Variable                  | Field            |
//! |---------------------------|------------------|
//! | `CHAMPION_TRACKING_ROOT`  | `tracking_root`  |
//! | `CHAMPION_EXPERIMENT`     | `experiment`     |
//! | `CHAMPION_RANKING_METRIC` | `ranking_metric` |
//! | `CHAMPION_TIMEOUT_MS`     | `timeout_ms`     |

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::features::FeatureSchema;
use crate::training::metrics::{is_known_metric, DEFAULT_RANKING_METRIC};
use crate::training::CandidateModel;
use crate::{Error, Result};

/// Settings shared by producer, selector, resolver and server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Root directory of the file-backed run store
    pub tracking_root: PathBuf,
    /// Experiment name
    pub experiment: String,
    /// Metric candidates are ranked by (higher is better)
    pub ranking_metric: String,
    /// Bound on every backend call and artifact load
    pub timeout_ms: u64,
    /// `project` tag value
    pub project: String,
    /// `business_goal` tag value
    pub business_goal: String,
    /// Share of rows held out for evaluation
    pub test_fraction: f64,
    /// Split seed
    pub seed: u64,
    /// Model types trained per production run
    pub models: Vec<CandidateModel>,
    /// Required input fields
    pub schema: FeatureSchema,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            tracking_root: PathBuf::from("mlruns"),
            experiment: "churn-day2".to_string(),
            ranking_metric: DEFAULT_RANKING_METRIC.to_string(),
            timeout_ms: 5_000,
            project: "PSTB_MLOps".to_string(),
            business_goal: "churn_reduction".to_string(),
            test_fraction: 0.2,
            seed: 42,
            models: CandidateModel::defaults(),
            schema: FeatureSchema::churn(),
        }
    }
}

impl RegistryConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be read, `Config` if it is not valid JSON for
    /// this structure.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Apply `CHAMPION_*` environment overrides.
    ///
    /// # Errors
    ///
    /// `Config` if `CHAMPION_TIMEOUT_MS` is not an integer.
    pub fn apply_env_overrides(self) -> Result<Self> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(root) = lookup("CHAMPION_TRACKING_ROOT") {
            self.tracking_root = PathBuf::from(root);
        }
        if let Some(experiment) = lookup("CHAMPION_EXPERIMENT") {
            self.experiment = experiment;
        }
        if let Some(metric) = lookup("CHAMPION_RANKING_METRIC") {
            self.ranking_metric = metric;
        }
        if let Some(raw) = lookup("CHAMPION_TIMEOUT_MS") {
            self.timeout_ms = raw
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("CHAMPION_TIMEOUT_MS '{raw}': {e}")))?;
        }
        Ok(self)
    }

    /// Reject settings the registry cannot run with.
    ///
    /// # Errors
    ///
    /// `Config` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.experiment.trim().is_empty() {
            return Err(Error::Config("experiment name is empty".into()));
        }
        if !is_known_metric(&self.ranking_metric) {
            return Err(Error::Config(format!(
                "unknown ranking metric '{}'",
                self.ranking_metric
            )));
        }
        if self.timeout_ms == 0 {
            return Err(Error::Config("timeout_ms must be positive".into()));
        }
        if self.models.is_empty() {
            return Err(Error::Config("no candidate models configured".into()));
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(Error::Config(format!(
                "test_fraction {} outside (0, 1)",
                self.test_fraction
            )));
        }
        if self.schema.fields().is_empty() {
            return Err(Error::Config("feature schema has no fields".into()));
        }
        Ok(())
    }

    /// Backend call bound.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

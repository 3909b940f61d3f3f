//! Run Record - one trained model attempt within an experiment

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ArtifactRecord, MetricRecord};
use crate::{Error, Result};

/// Status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run is open; metrics and artifacts are still being attached.
    Running,
    /// Run closed after a successful fit.
    Success,
    /// Run closed after the fit (or its evaluation) failed.
    Failed,
}

/// Run Record represents a single trained model attempt.
///
/// A run belongs to exactly one experiment. Metrics and params are
/// write-once per name; tags stay mutable after the run is closed, which is
/// how champion promotion is recorded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    run_id: String,
    experiment_id: String,
    run_name: Option<String>,
    status: RunStatus,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
    #[serde(default)]
    params: BTreeMap<String, String>,
    #[serde(default)]
    metrics: BTreeMap<String, MetricRecord>,
    artifact: Option<ArtifactRecord>,
}

impl RunRecord {
    /// Create a new open run.
    ///
    /// # Arguments
    ///
    /// * `run_id` - Unique identifier for the run
    /// * `experiment_id` - ID of the parent experiment
    #[must_use]
    pub fn new(run_id: impl Into<String>, experiment_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            experiment_id: experiment_id.into(),
            run_name: None,
            status: RunStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
            tags: BTreeMap::new(),
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            artifact: None,
        }
    }

    /// Create a builder for constructing a run record with optional fields.
    #[must_use]
    pub fn builder(
        run_id: impl Into<String>,
        experiment_id: impl Into<String>,
    ) -> RunRecordBuilder {
        RunRecordBuilder::new(run_id, experiment_id)
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the parent experiment ID.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Get the human-readable run name, if set.
    #[must_use]
    pub fn run_name(&self) -> Option<&str> {
        self.run_name.as_deref()
    }

    /// Get the current run status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Get the start timestamp.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Get the closure timestamp, if the run is closed.
    #[must_use]
    pub const fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Whether the run has been closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Get all tags.
    #[must_use]
    pub const fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// Get a tag value.
    #[must_use]
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(String::as_str)
    }

    /// Get all logged params.
    #[must_use]
    pub const fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Get a param value.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Get all logged metrics.
    #[must_use]
    pub const fn metrics(&self) -> &BTreeMap<String, MetricRecord> {
        &self.metrics
    }

    /// Get a metric value.
    #[must_use]
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).map(MetricRecord::value)
    }

    /// Get the model artifact reference, if one was attached.
    #[must_use]
    pub const fn artifact(&self) -> Option<&ArtifactRecord> {
        self.artifact.as_ref()
    }

    /// Set a tag. Last write wins.
    pub fn set_tag(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.tags.insert(name.into(), value.into());
    }

    /// Log a metric.
    ///
    /// # Errors
    ///
    /// - `DuplicateMetric` if `name` was already logged; the stored value is kept
    /// - `InvalidInput` if `value` is NaN or infinite
    pub fn log_metric(&mut self, name: impl Into<String>, value: f64) -> Result<()> {
        let name = name.into();
        if !value.is_finite() {
            return Err(Error::InvalidInput(format!(
                "metric '{name}' for run {} must be finite, got {value}",
                self.run_id
            )));
        }
        if self.metrics.contains_key(&name) {
            return Err(Error::DuplicateMetric {
                run_id: self.run_id.clone(),
                metric: name,
            });
        }
        self.metrics.insert(name.clone(), MetricRecord::new(name, value));
        Ok(())
    }

    /// Log a param. Re-logging the same value is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `name` was already logged with another value.
    pub fn log_param(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let name = name.into();
        let value = value.into();
        match self.params.get(&name) {
            Some(existing) if *existing != value => Err(Error::InvalidInput(format!(
                "param '{name}' for run {} is already '{existing}'",
                self.run_id
            ))),
            Some(_) => Ok(()),
            None => {
                self.params.insert(name, value);
                Ok(())
            }
        }
    }

    /// Attach (or replace) the model artifact reference.
    pub fn attach_artifact(&mut self, artifact: ArtifactRecord) {
        self.artifact = Some(artifact);
    }

    /// Close the run with the given final status.
    ///
    /// Sets the `ended_at` timestamp to now.
    pub fn close(&mut self, status: RunStatus) {
        self.status = status;
        self.ended_at = Some(Utc::now());
    }
}

/// Builder for `RunRecord`.
#[derive(Debug)]
pub struct RunRecordBuilder {
    record: RunRecord,
}

impl RunRecordBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(run_id: impl Into<String>, experiment_id: impl Into<String>) -> Self {
        Self {
            record: RunRecord::new(run_id, experiment_id),
        }
    }

    /// Set the run name.
    #[must_use]
    pub fn run_name(mut self, name: impl Into<String>) -> Self {
        self.record.run_name = Some(name.into());
        self
    }

    /// Add a tag.
    #[must_use]
    pub fn tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.record.set_tag(name, value);
        self
    }

    /// Add a param. A repeated name keeps the first value.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.record.params.entry(name.into()).or_insert_with(|| value.into());
        self
    }

    /// Add a metric. A repeated name keeps the first value.
    #[must_use]
    pub fn metric(mut self, name: impl Into<String>, value: f64) -> Self {
        let name = name.into();
        self.record
            .metrics
            .entry(name.clone())
            .or_insert_with(|| MetricRecord::new(name, value));
        self
    }

    /// Build the `RunRecord`.
    #[must_use]
    pub fn build(self) -> RunRecord {
        self.record
    }
}

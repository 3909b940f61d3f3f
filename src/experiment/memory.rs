//! In-memory run store implementation using `DashMap`.
//!
//! This is the process-local backend used by tests and demos; data is lost on
//! process restart. For persistence, use [`FileRunStore`](super::FileRunStore).

use std::time::Duration;

use dashmap::DashMap;
use tracing::debug;

use super::store::artifact_missing;
use super::{
    ArtifactRecord, ExperimentRecord, RunOrder, RunQuery, RunRecord, RunStatus, RunStore,
    TagPredicate,
};
use crate::{Error, Result};

/// In-memory run store using lock-free concurrent hashmaps.
///
/// Thread-safe; each call is atomic per run. An optional simulated latency
/// delays every call, which is how backend timeouts are exercised.
///
/// # Example
///
/// ```rust
/// use champion_registry::experiment::{MemoryRunStore, RunStore};
///
/// # async fn example() -> champion_registry::Result<()> {
/// let store = MemoryRunStore::new();
/// let experiment = store.get_or_create_experiment("churn-day2").await?;
/// let run = store.create_run(experiment.experiment_id(), Some("LogisticRegression")).await?;
/// store.log_metric(run.run_id(), "f1", 0.8).await?;
/// assert_eq!(store.get_run(run.run_id()).await?.metric("f1"), Some(0.8));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryRunStore {
    experiments: DashMap<String, ExperimentRecord>,
    runs: DashMap<String, RunRecord>,
    artifacts: DashMap<String, Vec<u8>>,
    latency: Option<Duration>,
}

impl MemoryRunStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of experiments.
    #[must_use]
    pub fn experiment_count(&self) -> usize {
        self.experiments.len()
    }

    /// Number of runs across all experiments.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Insert a fully formed run, e.g. one imported from another backend.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the run's experiment is unknown.
    pub fn insert_run(&self, run: RunRecord) -> Result<()> {
        self.require_experiment_id(run.experiment_id())?;
        self.runs.insert(run.run_id().to_string(), run);
        Ok(())
    }

    /// Overwrite stored artifact bytes without updating the hash.
    ///
    /// Simulates on-disk corruption.
    pub fn corrupt_artifact(&self, artifact: &ArtifactRecord, bytes: Vec<u8>) {
        self.artifacts.insert(artifact_key(artifact), bytes);
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn require_experiment_id(&self, experiment_id: &str) -> Result<()> {
        if self
            .experiments
            .iter()
            .any(|entry| entry.value().experiment_id() == experiment_id)
        {
            Ok(())
        } else {
            Err(Error::NotFound(format!("experiment id {experiment_id}")))
        }
    }

    fn update_run<T>(&self, run_id: &str, f: impl FnOnce(&mut RunRecord) -> Result<T>) -> Result<T> {
        let mut entry = self
            .runs
            .get_mut(run_id)
            .ok_or_else(|| Error::RunNotFound(run_id.to_string()))?;
        f(entry.value_mut())
    }
}

fn artifact_key(artifact: &ArtifactRecord) -> String {
    format!("{}/{}", artifact.run_id(), artifact.key())
}

impl RunStore for MemoryRunStore {
    async fn find_experiment(&self, name: &str) -> Result<ExperimentRecord> {
        self.simulate_latency().await;
        self.experiments
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::NotFound(format!("experiment '{name}'")))
    }

    async fn get_or_create_experiment(&self, name: &str) -> Result<ExperimentRecord> {
        self.simulate_latency().await;
        let entry = self
            .experiments
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(experiment = name, "creating experiment");
                ExperimentRecord::with_generated_id(name)
            });
        Ok(entry.value().clone())
    }

    async fn create_run(&self, experiment_id: &str, run_name: Option<&str>) -> Result<RunRecord> {
        self.simulate_latency().await;
        self.require_experiment_id(experiment_id)?;
        let run_id = uuid::Uuid::new_v4().simple().to_string();
        let mut builder = RunRecord::builder(run_id.clone(), experiment_id);
        if let Some(name) = run_name {
            builder = builder.run_name(name);
        }
        let run = builder.build();
        self.runs.insert(run_id, run.clone());
        Ok(run)
    }

    async fn get_run(&self, run_id: &str) -> Result<RunRecord> {
        self.simulate_latency().await;
        self.runs
            .get(run_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::RunNotFound(run_id.to_string()))
    }

    async fn query_runs(
        &self,
        experiment_id: &str,
        predicate: &TagPredicate,
        order: &RunOrder,
    ) -> Result<RunQuery> {
        self.simulate_latency().await;
        let matching: Vec<RunRecord> = self
            .runs
            .iter()
            .filter(|entry| {
                entry.value().experiment_id() == experiment_id && predicate.matches(entry.value())
            })
            .map(|entry| entry.value().clone())
            .collect();
        Ok(RunQuery::sorted(matching, order))
    }

    async fn set_tag(&self, run_id: &str, name: &str, value: &str) -> Result<()> {
        self.simulate_latency().await;
        self.update_run(run_id, |run| {
            run.set_tag(name, value);
            Ok(())
        })
    }

    async fn log_param(&self, run_id: &str, name: &str, value: &str) -> Result<()> {
        self.simulate_latency().await;
        self.update_run(run_id, |run| run.log_param(name, value))
    }

    async fn log_metric(&self, run_id: &str, name: &str, value: f64) -> Result<()> {
        self.simulate_latency().await;
        self.update_run(run_id, |run| run.log_metric(name, value))
    }

    async fn put_artifact(&self, run_id: &str, key: &str, bytes: Vec<u8>) -> Result<ArtifactRecord> {
        self.simulate_latency().await;
        let artifact = ArtifactRecord::for_bytes(run_id, key, &bytes);
        self.update_run(run_id, |run| {
            run.attach_artifact(artifact.clone());
            Ok(())
        })?;
        self.artifacts.insert(artifact_key(&artifact), bytes);
        Ok(artifact)
    }

    async fn read_artifact(&self, artifact: &ArtifactRecord) -> Result<Vec<u8>> {
        self.simulate_latency().await;
        let bytes = self
            .artifacts
            .get(&artifact_key(artifact))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| artifact_missing(artifact, "no stored bytes"))?;
        if artifact.verify(&bytes) {
            Ok(bytes)
        } else {
            Err(artifact_missing(artifact, "content hash mismatch"))
        }
    }

    async fn close_run(&self, run_id: &str, status: RunStatus) -> Result<RunRecord> {
        self.simulate_latency().await;
        self.update_run(run_id, |run| {
            run.close(status);
            Ok(run.clone())
        })
    }
}

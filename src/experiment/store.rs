//! Run Store - query/command interface over the tracking backend
//!
//! The registry never talks to a backend directly; the producer, selector
//! and resolver are generic over [`RunStore`]. Every mutation is persisted
//! before its future resolves, so a query issued afterwards (from this or any
//! other process sharing the backend) observes it.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::{ArtifactRecord, ExperimentRecord, RunOrder, RunQuery, RunRecord, RunStatus, TagPredicate};
use crate::{Error, Result};

/// Tracking backend contract.
pub trait RunStore: Send + Sync {
    /// Look up an experiment by its unique name.
    ///
    /// Fails with `NotFound` if no experiment has that name.
    fn find_experiment(&self, name: &str)
        -> impl Future<Output = Result<ExperimentRecord>> + Send;

    /// Look up an experiment by name, creating it on first reference.
    fn get_or_create_experiment(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<ExperimentRecord>> + Send;

    /// Open a new run in an existing experiment.
    ///
    /// Fails with `NotFound` if the experiment id is unknown.
    fn create_run(
        &self,
        experiment_id: &str,
        run_name: Option<&str>,
    ) -> impl Future<Output = Result<RunRecord>> + Send;

    /// Read a run's current tags, metrics and artifact reference.
    ///
    /// Fails with `RunNotFound` if the run id is unknown.
    fn get_run(&self, run_id: &str) -> impl Future<Output = Result<RunRecord>> + Send;

    /// Runs of an experiment matching every predicate clause, in `order`.
    fn query_runs(
        &self,
        experiment_id: &str,
        predicate: &TagPredicate,
        order: &RunOrder,
    ) -> impl Future<Output = Result<RunQuery>> + Send;

    /// Set a tag on a run. Idempotent; last write wins.
    fn set_tag(
        &self,
        run_id: &str,
        name: &str,
        value: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Log a write-once param (a training input such as the model type).
    ///
    /// Fails with `InvalidInput` if `name` was already logged with another value.
    fn log_param(
        &self,
        run_id: &str,
        name: &str,
        value: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Log a write-once metric.
    ///
    /// Fails with `DuplicateMetric` if `name` was already logged for the run.
    fn log_metric(
        &self,
        run_id: &str,
        name: &str,
        value: f64,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Persist artifact bytes and attach the reference to the run.
    fn put_artifact(
        &self,
        run_id: &str,
        key: &str,
        bytes: Vec<u8>,
    ) -> impl Future<Output = Result<ArtifactRecord>> + Send;

    /// Read artifact bytes back, verifying their content hash.
    ///
    /// Fails with `ArtifactLoadFailed` if the bytes are missing or corrupt.
    fn read_artifact(
        &self,
        artifact: &ArtifactRecord,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Close a run with its final status.
    fn close_run(
        &self,
        run_id: &str,
        status: RunStatus,
    ) -> impl Future<Output = Result<RunRecord>> + Send;
}

/// Bound `fut` by `after`, mapping expiry to [`Error::Timeout`].
///
/// # Errors
///
/// Returns `Timeout` if `fut` does not finish in time, otherwise whatever
/// `fut` returns.
pub async fn with_timeout<T, F>(operation: &str, after: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if let Ok(result) = tokio::time::timeout(after, fut).await {
        result
    } else {
        warn!(operation, ?after, "backend call timed out");
        Err(Error::Timeout {
            operation: operation.to_string(),
            after,
        })
    }
}

pub(crate) fn artifact_missing(artifact: &ArtifactRecord, reason: impl std::fmt::Display) -> Error {
    Error::ArtifactLoadFailed {
        run_id: artifact.run_id().to_string(),
        reason: format!("artifact '{}': {reason}", artifact.key()),
    }
}

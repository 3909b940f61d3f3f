//! Champion Resolver - finds the live champion and loads its model

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use super::tags;
use crate::config::RegistryConfig;
use crate::experiment::{with_timeout, RunOrder, RunRecord, RunStore};
use crate::training::metrics::DEFAULT_RANKING_METRIC;
use crate::training::{ArtifactLoader, Predictor};
use crate::{Error, Result};

/// A champion run together with its loaded predictor.
#[derive(Clone)]
pub struct ResolvedChampion {
    run: RunRecord,
    predictor: Arc<dyn Predictor>,
}

impl ResolvedChampion {
    /// The champion run as read during resolution.
    #[must_use]
    pub const fn run(&self) -> &RunRecord {
        &self.run
    }

    /// Loaded model.
    #[must_use]
    pub fn predictor(&self) -> Arc<dyn Predictor> {
        Arc::clone(&self.predictor)
    }
}

impl fmt::Debug for ResolvedChampion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedChampion")
            .field("run_id", &self.run.run_id())
            .field("model", &self.predictor.model_name())
            .finish()
    }
}

/// Locates the run tagged `model_role = champion` and loads its artifact.
///
/// Resolution is read-only. When more than one champion is found (state
/// left behind by older promotions) the best by the ranking metric is used
/// and a warning is logged; the next promotion cleans up.
pub struct ChampionResolver<S, L> {
    store: Arc<S>,
    loader: Arc<L>,
    experiment: String,
    metric: String,
    timeout: Duration,
}

impl<S, L> Clone for ChampionResolver<S, L> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            loader: Arc::clone(&self.loader),
            experiment: self.experiment.clone(),
            metric: self.metric.clone(),
            timeout: self.timeout,
        }
    }
}

impl<S: RunStore, L: ArtifactLoader> ChampionResolver<S, L> {
    /// Resolve champions of `experiment`.
    #[must_use]
    pub fn new(store: Arc<S>, loader: Arc<L>, experiment: impl Into<String>) -> Self {
        Self {
            store,
            loader,
            experiment: experiment.into(),
            metric: DEFAULT_RANKING_METRIC.to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    /// Resolver for the configured experiment, metric and timeout.
    #[must_use]
    pub fn from_config(store: Arc<S>, loader: Arc<L>, config: &RegistryConfig) -> Self {
        Self::new(store, loader, config.experiment.clone())
            .with_metric(config.ranking_metric.clone())
            .with_timeout(config.timeout())
    }

    /// Metric used to pick among duplicate champions.
    #[must_use]
    pub fn with_metric(mut self, metric: impl Into<String>) -> Self {
        self.metric = metric.into();
        self
    }

    /// Bound every store call and the artifact load.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Experiment name.
    #[must_use]
    pub fn experiment(&self) -> &str {
        &self.experiment
    }

    /// Ranking metric.
    #[must_use]
    pub fn metric(&self) -> &str {
        &self.metric
    }

    /// Find the current champion run without loading it.
    ///
    /// # Errors
    ///
    /// `NotFound` if the experiment does not exist, `NoChampion` if no run
    /// carries the champion role, `Timeout` or storage errors otherwise.
    pub async fn champion_run(&self) -> Result<RunRecord> {
        let experiment = with_timeout(
            "find_experiment",
            self.timeout,
            self.store.find_experiment(&self.experiment),
        )
        .await?;
        let champions = with_timeout(
            "query_runs",
            self.timeout,
            self.store.query_runs(
                experiment.experiment_id(),
                &tags::champions(),
                &RunOrder::descending(self.metric.clone()),
            ),
        )
        .await?;

        if champions.len() > 1 {
            warn!(
                experiment = %self.experiment,
                count = champions.len(),
                "multiple champions tagged, using the best by {}",
                self.metric
            );
        }
        champions
            .into_iter()
            .next()
            .ok_or_else(|| Error::NoChampion(self.experiment.clone()))
    }

    /// Find the champion and load its model.
    ///
    /// # Errors
    ///
    /// Everything [`champion_run`](Self::champion_run) returns, plus
    /// `ArtifactLoadFailed` when the champion has no artifact or the artifact
    /// is missing, corrupt or undeserializable, and `Timeout` if reading or
    /// loading exceeds the bound.
    #[instrument(skip(self), fields(experiment = %self.experiment))]
    pub async fn resolve(&self) -> Result<ResolvedChampion> {
        let run = self.champion_run().await?;
        let artifact = run.artifact().cloned().ok_or_else(|| Error::ArtifactLoadFailed {
            run_id: run.run_id().to_string(),
            reason: "champion run has no model artifact".into(),
        })?;

        let bytes = with_timeout("read_artifact", self.timeout, self.store.read_artifact(&artifact))
            .await
            .map_err(|e| load_failure(run.run_id(), e))?;

        let loader = Arc::clone(&self.loader);
        let load = async move {
            tokio::task::spawn_blocking(move || loader.load(&bytes))
                .await
                .map_err(|e| Error::Internal(format!("artifact loader panicked: {e}")))?
        };
        let predictor = with_timeout("load_artifact", self.timeout, load)
            .await
            .map_err(|e| load_failure(run.run_id(), e))?;

        debug!(run_id = run.run_id(), model = predictor.model_name(), "champion loaded");
        Ok(ResolvedChampion { run, predictor })
    }
}

fn load_failure(run_id: &str, err: Error) -> Error {
    match err {
        Error::Timeout { .. } | Error::ArtifactLoadFailed { .. } => err,
        other => Error::ArtifactLoadFailed {
            run_id: run_id.to_string(),
            reason: other.to_string(),
        },
    }
}

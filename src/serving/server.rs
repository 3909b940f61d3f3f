//! Prediction Server - state-gated access to the champion predictor

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::api::{HealthReport, PredictRequest, PredictResponse};
use super::state::{ChampionInfo, DegradedState, ReadyState, ServingState};
use crate::experiment::RunStore;
use crate::features::FeatureSchema;
use crate::registry::ChampionResolver;
use crate::training::ArtifactLoader;
use crate::{Error, Result};

/// Outcome of a successful reload.
#[derive(Debug, Clone, PartialEq)]
pub struct ReloadOutcome {
    /// Champion now being served
    pub champion: ChampionInfo,
    /// Champion served before the reload, if any
    pub previous_run_id: Option<String>,
}

impl ReloadOutcome {
    /// Whether a different run is served now.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.previous_run_id.as_deref() != Some(self.champion.run_id.as_str())
    }
}

/// Serves the resolved champion.
///
/// Many requests read the state concurrently; each takes a snapshot (`Arc`)
/// so it sees either the old or the new champion, never a mix. Reloads are
/// the only writer and run one at a time.
pub struct PredictionServer<S, L> {
    resolver: ChampionResolver<S, L>,
    schema: FeatureSchema,
    state: RwLock<Arc<ServingState>>,
    reload_lock: Mutex<()>,
}

impl<S: RunStore, L: ArtifactLoader> PredictionServer<S, L> {
    /// Create an uninitialized server. Call [`reload`](Self::reload) or use
    /// [`start`](Self::start).
    #[must_use]
    pub fn new(resolver: ChampionResolver<S, L>, schema: FeatureSchema) -> Self {
        Self {
            resolver,
            schema,
            state: RwLock::new(Arc::new(ServingState::Uninitialized)),
            reload_lock: Mutex::new(()),
        }
    }

    /// Create a server and resolve the champion once.
    ///
    /// Never fails: a resolution error leaves the server degraded.
    pub async fn start(resolver: ChampionResolver<S, L>, schema: FeatureSchema) -> Self {
        let server = Self::new(resolver, schema);
        if let Err(err) = server.reload().await {
            debug!(kind = ?err.kind(), "started without a champion");
        }
        server
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> Arc<ServingState> {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Schema requests are validated against.
    #[must_use]
    pub const fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Readiness report.
    #[must_use]
    pub fn health(&self) -> HealthReport {
        HealthReport::from(self.state().as_ref())
    }

    /// Resolve the champion again and swap it in on success.
    ///
    /// On failure a previously ready champion keeps serving; otherwise the
    /// server records the failure as degraded.
    ///
    /// # Errors
    ///
    /// Whatever [`ChampionResolver::resolve`] returns.
    #[instrument(skip(self), fields(experiment = %self.resolver.experiment()))]
    pub async fn reload(&self) -> Result<ReloadOutcome> {
        let _guard = self.reload_lock.lock().await;
        let previous_run_id = self.state().champion().map(|c| c.run_id.clone());

        match self.resolver.resolve().await {
            Ok(resolved) => {
                let champion = ChampionInfo::from_resolved(&resolved, self.resolver.metric());
                self.install(ServingState::Ready(ReadyState::new(
                    champion.clone(),
                    resolved.predictor(),
                )));
                info!(
                    run_id = %champion.run_id,
                    model = %champion.model_name,
                    metric_value = ?champion.metric_value,
                    "serving champion"
                );
                Ok(ReloadOutcome {
                    champion,
                    previous_run_id,
                })
            }
            Err(err) => {
                if let Some(run_id) = previous_run_id {
                    warn!(error = %err, %run_id, "reload failed, keeping current champion");
                } else {
                    warn!(error = %err, "no champion available, serving degraded");
                    self.install(ServingState::Degraded(DegradedState::from(&err)));
                }
                Err(err)
            }
        }
    }

    /// Score a batch with the current champion.
    ///
    /// # Errors
    ///
    /// - `ServiceUnavailable` unless the server is ready
    /// - `InvalidInput` naming the first record and field failing the schema
    /// - `Internal` if the predictor returns the wrong number of rows
    pub fn predict(&self, request: &PredictRequest) -> Result<PredictResponse> {
        let state = self.state();
        let ready = match state.as_ref() {
            ServingState::Ready(ready) => ready,
            ServingState::Degraded(degraded) => {
                return Err(Error::ServiceUnavailable(degraded.cause.clone()))
            }
            ServingState::Uninitialized => {
                return Err(Error::ServiceUnavailable("champion not resolved yet".into()))
            }
        };

        self.schema.validate_batch(&request.records)?;
        let scores = ready.predictor().predict_batch(&request.records)?;
        if scores.len() != request.records.len() {
            return Err(Error::Internal(format!(
                "predictor returned {} scores for {} records",
                scores.len(),
                request.records.len()
            )));
        }

        let (predictions, probabilities) = scores.iter().map(|s| (s.label, s.probability)).unzip();
        Ok(PredictResponse {
            predictions,
            probabilities,
        })
    }

    fn install(&self, next: ServingState) {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(next);
    }
}

//! Serving lifecycle state

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Error, ErrorKind};
use crate::registry::{tags, ResolvedChampion};
use crate::training::Predictor;

/// Identity of the champion currently being served.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChampionInfo {
    /// Champion run
    pub run_id: String,
    /// Experiment the run belongs to
    pub experiment_id: String,
    /// Model type
    pub model_name: String,
    /// Ranking metric
    pub metric: String,
    /// Champion's value of the ranking metric, if logged
    pub metric_value: Option<f64>,
    /// When the artifact was loaded into this process
    pub loaded_at: DateTime<Utc>,
}

impl ChampionInfo {
    pub(crate) fn from_resolved(resolved: &ResolvedChampion, metric: &str) -> Self {
        let run = resolved.run();
        let predictor = resolved.predictor();
        Self {
            run_id: run.run_id().to_string(),
            experiment_id: run.experiment_id().to_string(),
            model_name: run
                .tag(tags::MODEL_NAME)
                .unwrap_or_else(|| predictor.model_name())
                .to_string(),
            metric: metric.to_string(),
            metric_value: run.metric(metric),
            loaded_at: Utc::now(),
        }
    }
}

/// A loaded champion ready to score requests.
#[derive(Clone)]
pub struct ReadyState {
    champion: ChampionInfo,
    predictor: Arc<dyn Predictor>,
}

impl ReadyState {
    pub(crate) fn new(champion: ChampionInfo, predictor: Arc<dyn Predictor>) -> Self {
        Self { champion, predictor }
    }

    /// Champion identity.
    #[must_use]
    pub const fn champion(&self) -> &ChampionInfo {
        &self.champion
    }

    /// Loaded model.
    #[must_use]
    pub fn predictor(&self) -> &dyn Predictor {
        self.predictor.as_ref()
    }
}

impl fmt::Debug for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadyState")
            .field("champion", &self.champion)
            .finish_non_exhaustive()
    }
}

/// Why no champion is being served.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DegradedState {
    /// Classification of the resolution failure
    pub kind: ErrorKind,
    /// Human-readable cause
    pub cause: String,
    /// When the server entered this state
    pub since: DateTime<Utc>,
}

impl From<&Error> for DegradedState {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind(),
            cause: err.to_string(),
            since: Utc::now(),
        }
    }
}

/// `Uninitialized → Ready | Degraded`; later transitions only through reload.
#[derive(Debug, Clone)]
pub enum ServingState {
    /// No resolution has completed yet
    Uninitialized,
    /// Serving a champion
    Ready(ReadyState),
    /// Resolution failed and nothing is being served
    Degraded(DegradedState),
}

impl ServingState {
    /// Whether requests can be served.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Champion identity when ready.
    #[must_use]
    pub const fn champion(&self) -> Option<&ChampionInfo> {
        match self {
            Self::Ready(ready) => Some(&ready.champion),
            _ => None,
        }
    }

    /// Short state name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Ready(_) => "ready",
            Self::Degraded(_) => "degraded",
        }
    }
}

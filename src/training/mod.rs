//! Training collaborators: datasets, models, metrics
//!
//! The registry only needs the [`Trainer`], [`Predictor`] and
//! [`ArtifactLoader`] contracts. The two built-in model types exist so that a
//! complete train → promote → serve cycle runs without external tooling.

mod centroid;
mod dataset;
mod logistic;
pub mod metrics;
mod model;
mod preprocess;

pub use centroid::{NearestCentroidModel, NearestCentroidTrainer};
pub use dataset::Dataset;
pub use logistic::{LogisticRegressionModel, LogisticRegressionParams, LogisticRegressionTrainer};
pub use metrics::{compute_metrics, MetricSet};
pub use model::{
    ArtifactLoader, ClassScore, FittedModel, JsonModelLoader, ModelArtifact, Predictor, Trainer,
};
pub use preprocess::Preprocessor;

use serde::{Deserialize, Serialize};

use crate::features::FeatureSchema;

/// A configured candidate model type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CandidateModel {
    /// Logistic regression
    LogisticRegression(LogisticRegressionParams),
    /// Nearest class centroid
    NearestCentroid,
}

impl CandidateModel {
    /// Build the trainer for this model type.
    #[must_use]
    pub fn trainer(&self, schema: &FeatureSchema) -> Box<dyn Trainer> {
        match self {
            Self::LogisticRegression(params) => {
                Box::new(LogisticRegressionTrainer::new(schema.clone(), *params))
            }
            Self::NearestCentroid => Box::new(NearestCentroidTrainer::new(schema.clone())),
        }
    }

    /// Default candidate list.
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::LogisticRegression(LogisticRegressionParams::default()),
            Self::NearestCentroid,
        ]
    }
}

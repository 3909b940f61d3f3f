//! Predictor, trainer and artifact-loader contracts

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::centroid::NearestCentroidModel;
use super::logistic::LogisticRegressionModel;
use super::Dataset;
use crate::features::FeatureRecord;
use crate::Result;

/// Predicted label and positive-class probability of one record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassScore {
    /// Predicted class (0 or 1)
    pub label: u8,
    /// Probability of class 1
    pub probability: f64,
}

impl ClassScore {
    /// Score from a positive-class probability, thresholded at 0.5.
    #[must_use]
    pub fn from_probability(probability: f64) -> Self {
        Self {
            label: u8::from(probability >= 0.5),
            probability,
        }
    }
}

/// A read-only model able to score batches.
pub trait Predictor: Send + Sync + fmt::Debug {
    /// Model type name (e.g. `LogisticRegression`).
    fn model_name(&self) -> &str;

    /// Score `records`, returning one score per record in input order.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if a record lacks a fitted field.
    fn predict_batch(&self, records: &[FeatureRecord]) -> Result<Vec<ClassScore>>;
}

/// A freshly fitted model that can be persisted as an artifact.
pub trait FittedModel: Predictor {
    /// Serialize into artifact bytes readable by [`JsonModelLoader`].
    ///
    /// # Errors
    ///
    /// Returns `Serialization` on encoder failure.
    fn to_artifact(&self) -> Result<Vec<u8>>;
}

/// Fits one model type.
pub trait Trainer: Send + Sync {
    /// Model type name, used as run name and `model_name` tag.
    fn model_name(&self) -> &str;

    /// Hyperparameters to record on the run, as name/value pairs.
    fn params(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Fit on `train`.
    ///
    /// # Errors
    ///
    /// Any error aborts this model type's run.
    fn fit(&self, train: &Dataset) -> Result<Box<dyn FittedModel>>;
}

/// Turns artifact bytes into a predictor.
pub trait ArtifactLoader: Send + Sync + 'static {
    /// Deserialize a predictor.
    ///
    /// # Errors
    ///
    /// Any error means the artifact is unusable.
    fn load(&self, bytes: &[u8]) -> Result<Arc<dyn Predictor>>;
}

/// On-disk artifact format of the built-in models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ModelArtifact {
    /// See [`LogisticRegressionModel`]
    LogisticRegression(LogisticRegressionModel),
    /// See [`NearestCentroidModel`]
    NearestCentroid(NearestCentroidModel),
}

impl ModelArtifact {
    /// Encode as JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` on encoder failure.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    fn into_predictor(self) -> Result<Arc<dyn Predictor>> {
        Ok(match self {
            Self::LogisticRegression(m) => {
                m.validate()?;
                Arc::new(m)
            }
            Self::NearestCentroid(m) => {
                m.validate()?;
                Arc::new(m)
            }
        })
    }
}

/// Loads [`ModelArtifact`] JSON, rejecting models whose parameters do not
/// fit their own preprocessor.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonModelLoader;

impl ArtifactLoader for JsonModelLoader {
    fn load(&self, bytes: &[u8]) -> Result<Arc<dyn Predictor>> {
        let artifact: ModelArtifact = serde_json::from_slice(bytes)?;
        artifact.into_predictor()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold() {
        assert_eq!(ClassScore::from_probability(0.5).label, 1);
        assert_eq!(ClassScore::from_probability(0.49).label, 0);
    }

    #[test]
    fn test_loader_rejects_garbage() {
        assert!(JsonModelLoader.load(b"not json").is_err());
        assert!(JsonModelLoader.load(br#"{"kind":"Unknown"}"#).is_err());
    }
}

//! Nearest-centroid classifier

use serde::{Deserialize, Serialize};

use super::model::{ClassScore, FittedModel, ModelArtifact, Predictor, Trainer};
use super::preprocess::Preprocessor;
use super::Dataset;
use crate::features::{FeatureRecord, FeatureSchema};
use crate::{Error, Result};

/// Fitted nearest-centroid model.
///
/// The positive-class probability is `sigmoid(d0 - d1)` where `dk` is the
/// squared distance to the centroid of class `k`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestCentroidModel {
    preprocessor: Preprocessor,
    negative: Vec<f64>,
    positive: Vec<f64>,
}

impl NearestCentroidModel {
    /// Check that both centroids match the preprocessor's output width.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` describing the inconsistency.
    pub fn validate(&self) -> Result<()> {
        self.preprocessor.validate()?;
        let width = self.preprocessor.width();
        for (class, centroid) in [("negative", &self.negative), ("positive", &self.positive)] {
            if centroid.len() != width {
                return Err(Error::InvalidInput(format!(
                    "{class} centroid has {} coordinates for {width} features",
                    centroid.len()
                )));
            }
            if centroid.iter().any(|c| !c.is_finite()) {
                return Err(Error::InvalidInput(format!("{class} centroid is not finite")));
            }
        }
        Ok(())
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

impl Predictor for NearestCentroidModel {
    fn model_name(&self) -> &str {
        "NearestCentroid"
    }

    fn predict_batch(&self, records: &[FeatureRecord]) -> Result<Vec<ClassScore>> {
        Ok(self
            .preprocessor
            .transform_batch(records)?
            .iter()
            .map(|x| {
                let margin = squared_distance(x, &self.negative) - squared_distance(x, &self.positive);
                ClassScore::from_probability(1.0 / (1.0 + (-margin).exp()))
            })
            .collect())
    }
}

impl FittedModel for NearestCentroidModel {
    fn to_artifact(&self) -> Result<Vec<u8>> {
        ModelArtifact::NearestCentroid(self.clone()).to_bytes()
    }
}

/// Trains [`NearestCentroidModel`].
#[derive(Debug, Clone)]
pub struct NearestCentroidTrainer {
    schema: FeatureSchema,
}

impl NearestCentroidTrainer {
    /// Create a trainer.
    #[must_use]
    pub const fn new(schema: FeatureSchema) -> Self {
        Self { schema }
    }
}

impl Trainer for NearestCentroidTrainer {
    fn model_name(&self) -> &str {
        "NearestCentroid"
    }

    #[allow(clippy::cast_precision_loss)]
    fn fit(&self, train: &Dataset) -> Result<Box<dyn FittedModel>> {
        let preprocessor = Preprocessor::fit(&self.schema, train.records())?;
        let xs = preprocessor.transform_batch(train.records())?;

        let mut sums = [vec![0.0; preprocessor.width()], vec![0.0; preprocessor.width()]];
        let mut counts = [0usize; 2];
        for (x, &y) in xs.iter().zip(train.labels()) {
            let class = usize::from(y);
            counts[class] += 1;
            for (s, v) in sums[class].iter_mut().zip(x) {
                *s += v;
            }
        }
        if counts.contains(&0) {
            return Err(Error::InvalidInput(
                "nearest centroid needs rows of both classes".into(),
            ));
        }
        let [negative, positive] = sums;
        let centroid = |sum: Vec<f64>, count: usize| -> Vec<f64> {
            sum.into_iter().map(|s| s / count as f64).collect()
        };

        Ok(Box::new(NearestCentroidModel {
            preprocessor,
            negative: centroid(negative, counts[0]),
            positive: centroid(positive, counts[1]),
        }))
    }
}

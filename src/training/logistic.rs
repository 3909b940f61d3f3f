//! Logistic regression fitted by full-batch gradient descent

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::model::{ClassScore, FittedModel, ModelArtifact, Predictor, Trainer};
use super::preprocess::Preprocessor;
use super::Dataset;
use crate::features::{FeatureRecord, FeatureSchema};
use crate::{Error, Result};

/// Hyperparameters of [`LogisticRegressionTrainer`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticRegressionParams {
    /// Gradient descent passes over the training set
    pub epochs: usize,
    /// Step size
    pub learning_rate: f64,
    /// L2 penalty on weights (not on the bias)
    pub l2: f64,
}

impl Default for LogisticRegressionParams {
    fn default() -> Self {
        Self {
            epochs: 2000,
            learning_rate: 0.1,
            l2: 1e-4,
        }
    }
}

/// Fitted logistic regression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegressionModel {
    preprocessor: Preprocessor,
    weights: Vec<f64>,
    bias: f64,
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

impl LogisticRegressionModel {
    /// Check that the weights match the preprocessor's output width.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` describing the inconsistency.
    pub fn validate(&self) -> Result<()> {
        self.preprocessor.validate()?;
        if self.weights.len() != self.preprocessor.width() {
            return Err(Error::InvalidInput(format!(
                "logistic regression has {} weights for {} features",
                self.weights.len(),
                self.preprocessor.width()
            )));
        }
        if !self.bias.is_finite() || self.weights.iter().any(|w| !w.is_finite()) {
            return Err(Error::InvalidInput("logistic regression has non-finite weights".into()));
        }
        Ok(())
    }

    fn probability(&self, x: &[f64]) -> f64 {
        sigmoid(dot(&self.weights, x) + self.bias)
    }
}

impl Predictor for LogisticRegressionModel {
    fn model_name(&self) -> &str {
        "LogisticRegression"
    }

    fn predict_batch(&self, records: &[FeatureRecord]) -> Result<Vec<ClassScore>> {
        Ok(self
            .preprocessor
            .transform_batch(records)?
            .iter()
            .map(|x| ClassScore::from_probability(self.probability(x)))
            .collect())
    }
}

impl FittedModel for LogisticRegressionModel {
    fn to_artifact(&self) -> Result<Vec<u8>> {
        ModelArtifact::LogisticRegression(self.clone()).to_bytes()
    }
}

/// Trains [`LogisticRegressionModel`].
#[derive(Debug, Clone)]
pub struct LogisticRegressionTrainer {
    schema: FeatureSchema,
    params: LogisticRegressionParams,
}

impl LogisticRegressionTrainer {
    /// Create a trainer.
    #[must_use]
    pub const fn new(schema: FeatureSchema, params: LogisticRegressionParams) -> Self {
        Self { schema, params }
    }
}

impl Trainer for LogisticRegressionTrainer {
    fn model_name(&self) -> &str {
        "LogisticRegression"
    }

    fn params(&self) -> Vec<(String, String)> {
        vec![
            ("epochs".to_string(), self.params.epochs.to_string()),
            ("learning_rate".to_string(), self.params.learning_rate.to_string()),
            ("l2".to_string(), self.params.l2.to_string()),
        ]
    }

    #[allow(clippy::cast_precision_loss)]
    fn fit(&self, train: &Dataset) -> Result<Box<dyn FittedModel>> {
        let preprocessor = Preprocessor::fit(&self.schema, train.records())?;
        let xs = preprocessor.transform_batch(train.records())?;
        let ys: Vec<f64> = train.labels().iter().map(|&y| f64::from(y)).collect();
        let n = xs.len() as f64;

        let mut weights = vec![0.0; preprocessor.width()];
        let mut bias = 0.0;
        let mut grad = vec![0.0; weights.len()];
        for _ in 0..self.params.epochs {
            grad.iter_mut().for_each(|g| *g = 0.0);
            let mut grad_bias = 0.0;
            for (x, y) in xs.iter().zip(&ys) {
                let err = sigmoid(dot(&weights, x) + bias) - y;
                for (g, xi) in grad.iter_mut().zip(x) {
                    *g += err * xi;
                }
                grad_bias += err;
            }
            for (w, g) in weights.iter_mut().zip(&grad) {
                *w -= self.params.learning_rate * (g / n + self.params.l2 * *w);
            }
            bias -= self.params.learning_rate * grad_bias / n;
        }
        debug!(features = weights.len(), epochs = self.params.epochs, "fitted logistic regression");

        Ok(Box::new(LogisticRegressionModel {
            preprocessor,
            weights,
            bias,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FeatureValue, FieldSpec};
    use crate::training::{ArtifactLoader, JsonModelLoader};

    fn separable() -> (FeatureSchema, Dataset) {
        let schema = FeatureSchema::new(vec![FieldSpec::numeric("x")]);
        let records = (0..20)
            .map(|i| FeatureRecord::from([("x".to_string(), FeatureValue::from(f64::from(i)))]))
            .collect();
        let labels = (0..20).map(|i| u8::from(i >= 10)).collect();
        (schema, Dataset::new(records, labels).unwrap())
    }

    #[test]
    fn test_learns_separable_data() {
        let (schema, data) = separable();
        let model = LogisticRegressionTrainer::new(schema, LogisticRegressionParams::default())
            .fit(&data)
            .unwrap();
        let scores = model.predict_batch(data.records()).unwrap();
        let labels: Vec<u8> = scores.iter().map(|s| s.label).collect();
        assert_eq!(labels, data.labels());
        assert!(scores[0].probability < scores[19].probability);
    }

    #[test]
    fn test_weight_count_must_match_width() {
        let (schema, data) = separable();
        let model = LogisticRegressionTrainer::new(schema, LogisticRegressionParams::default())
            .fit(&data)
            .unwrap();
        let mut artifact: serde_json::Value = serde_json::from_slice(&model.to_artifact().unwrap()).unwrap();
        artifact["weights"] = serde_json::json!([0.5, 0.5]);

        let loaded = JsonModelLoader.load(&serde_json::to_vec(&artifact).unwrap());
        assert!(matches!(loaded, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_artifact_reloads_identically() {
        let (schema, data) = separable();
        let model = LogisticRegressionTrainer::new(schema, LogisticRegressionParams::default())
            .fit(&data)
            .unwrap();
        let loaded = JsonModelLoader.load(&model.to_artifact().unwrap()).unwrap();
        assert_eq!(loaded.model_name(), "LogisticRegression");
        let before = model.predict_batch(data.records()).unwrap();
        let after = loaded.predict_batch(data.records()).unwrap();
        for (a, b) in before.iter().zip(&after) {
            assert_eq!(a.label, b.label);
            assert!((a.probability - b.probability).abs() < 1e-9);
        }
    }
}

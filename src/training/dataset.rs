//! Labelled tabular data and the train/test split

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::warn;

use crate::features::{FeatureRecord, FeatureSchema};
use crate::{Error, Result};

/// Feature records with binary labels (1 = positive class).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    records: Vec<FeatureRecord>,
    labels: Vec<u8>,
}

impl Dataset {
    /// Create a dataset.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if lengths differ or a label is not 0 or 1.
    pub fn new(records: Vec<FeatureRecord>, labels: Vec<u8>) -> Result<Self> {
        if records.len() != labels.len() {
            return Err(Error::InvalidInput(format!(
                "{} records but {} labels",
                records.len(),
                labels.len()
            )));
        }
        if let Some(pos) = labels.iter().position(|&y| y > 1) {
            return Err(Error::InvalidInput(format!(
                "label {} at row {pos} is not binary",
                labels[pos]
            )));
        }
        Ok(Self { records, labels })
    }

    /// Feature records.
    #[must_use]
    pub fn records(&self) -> &[FeatureRecord] {
        &self.records
    }

    /// Labels, aligned with [`Dataset::records`].
    #[must_use]
    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of positive rows.
    #[must_use]
    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|&&y| y == 1).count()
    }

    /// Check the dataset is trainable under `schema`.
    ///
    /// Absent values are logged and left for the preprocessor to impute.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if a present value has the wrong kind, a field
    /// is absent from every record, or either class is absent.
    pub fn validate(&self, schema: &FeatureSchema) -> Result<()> {
        let absent = schema.validate_training_batch(&self.records)?;
        if absent > 0 {
            warn!(absent, rows = self.len(), "missing values will be imputed");
        }
        let positives = self.positives();
        if positives == 0 || positives == self.len() {
            return Err(Error::InvalidInput(format!(
                "dataset needs both classes ({positives} positive of {})",
                self.len()
            )));
        }
        Ok(())
    }

    /// Stratified split into `(train, test)`.
    ///
    /// Each class contributes `round(n_class * test_fraction)` rows to the
    /// test set (at least one, at most `n_class - 1`). The same seed always
    /// yields the same split; row order within each part follows the input.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `test_fraction` is outside (0, 1) or a class
    /// has fewer than two rows.
    pub fn stratified_split(&self, test_fraction: f64, seed: u64) -> Result<(Self, Self)> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(Error::InvalidInput(format!(
                "test fraction {test_fraction} must be in (0, 1)"
            )));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let mut in_test = vec![false; self.len()];

        for class in 0..=1u8 {
            let mut rows: Vec<usize> = (0..self.len()).filter(|&i| self.labels[i] == class).collect();
            if rows.len() < 2 {
                return Err(Error::InvalidInput(format!(
                    "class {class} has {} rows; a split needs at least 2",
                    rows.len()
                )));
            }
            rows.shuffle(&mut rng);
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
            let n_test = ((rows.len() as f64) * test_fraction).round() as usize;
            let n_test = n_test.clamp(1, rows.len() - 1);
            for &i in &rows[..n_test] {
                in_test[i] = true;
            }
        }

        let (mut train, mut test) = (Self::default(), Self::default());
        for (i, is_test) in in_test.into_iter().enumerate() {
            let part = if is_test { &mut test } else { &mut train };
            part.records.push(self.records[i].clone());
            part.labels.push(self.labels[i]);
        }
        Ok((train, test))
    }
}

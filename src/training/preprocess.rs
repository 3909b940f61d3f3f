//! Feature preprocessing: imputation, standard scaling and one-hot encoding

use std::collections::BTreeMap;

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::features::{FeatureRecord, FeatureSchema};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct NumericColumn {
    name: String,
    fill: f64,
    mean: f64,
    scale: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CategoricalColumn {
    name: String,
    fill: String,
    offset: usize,
    categories: FxHashMap<String, usize>,
}

/// Maps feature records to dense vectors.
///
/// Absent fields are imputed first: numeric fields with the training median,
/// categorical fields with the most frequent training category (ties go to
/// the lexicographically smallest). Numeric fields are then standardized
/// with the mean and standard deviation of the imputed training column (a
/// zero deviation scales by 1). Categorical fields are one-hot encoded;
/// categories unseen during fit encode as all zeros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    numeric: Vec<NumericColumn>,
    categorical: Vec<CategoricalColumn>,
    width: usize,
}

impl Preprocessor {
    /// Learn scaling statistics and vocabularies from `records`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `records` is empty, holds a value of the
    /// wrong kind, or lacks a field in every row.
    #[allow(clippy::cast_precision_loss)]
    pub fn fit(schema: &FeatureSchema, records: &[FeatureRecord]) -> Result<Self> {
        if records.is_empty() {
            return Err(Error::InvalidInput("cannot fit preprocessing on zero rows".into()));
        }
        schema.validate_training_batch(records)?;
        let n = records.len() as f64;

        let numeric: Vec<NumericColumn> = schema
            .numeric_fields()
            .map(|name| {
                let present: Vec<f64> = records
                    .iter()
                    .filter_map(|r| r.get(name).and_then(|v| v.as_number()))
                    .collect();
                let fill = median(present);
                let values: Vec<f64> = records
                    .iter()
                    .map(|r| r.get(name).and_then(|v| v.as_number()).unwrap_or(fill))
                    .collect();
                let mean = values.iter().sum::<f64>() / n;
                let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                let std = var.sqrt();
                NumericColumn {
                    name: name.to_string(),
                    fill,
                    mean,
                    scale: if std > f64::EPSILON { std } else { 1.0 },
                }
            })
            .collect();

        let mut offset = numeric.len();
        let categorical: Vec<CategoricalColumn> = schema
            .categorical_fields()
            .map(|name| {
                let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
                for value in records.iter().filter_map(|r| r.get(name).and_then(|v| v.as_text())) {
                    *counts.entry(value).or_default() += 1;
                }
                // max_by_key keeps the last maximum; iterate in reverse so ties go to the smallest
                let fill = counts
                    .iter()
                    .rev()
                    .max_by_key(|&(_, count)| *count)
                    .map(|(&category, _)| category.to_string())
                    .unwrap_or_default();
                let categories: FxHashMap<String, usize> = counts
                    .keys()
                    .enumerate()
                    .map(|(i, c)| ((*c).to_string(), i))
                    .collect();
                let column = CategoricalColumn {
                    name: name.to_string(),
                    fill,
                    offset,
                    categories,
                };
                offset += column.categories.len();
                column
            })
            .collect();

        Ok(Self {
            numeric,
            categorical,
            width: offset,
        })
    }

    /// Length of transformed vectors.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Check that every encoded column fits inside [`width`](Self::width).
    ///
    /// Fitted preprocessors always pass; deserialized ones may not.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` describing the first inconsistency.
    pub fn validate(&self) -> Result<()> {
        if self.numeric.len() > self.width {
            return Err(shape_error(format!(
                "{} numeric columns exceed width {}",
                self.numeric.len(),
                self.width
            )));
        }
        for col in &self.numeric {
            if !col.fill.is_finite() || !col.mean.is_finite() || !col.scale.is_finite() || col.scale.abs() < f64::EPSILON {
                return Err(shape_error(format!("numeric column '{}' has unusable scaling", col.name)));
            }
        }
        for col in &self.categorical {
            let end = col.offset.checked_add(col.categories.len());
            if col.offset < self.numeric.len() || end.map_or(true, |end| end > self.width) {
                return Err(shape_error(format!(
                    "categorical column '{}' does not fit width {}",
                    col.name, self.width
                )));
            }
            if col.categories.values().any(|&idx| idx >= col.categories.len()) {
                return Err(shape_error(format!(
                    "categorical column '{}' has an out-of-range category index",
                    col.name
                )));
            }
        }
        Ok(())
    }

    /// Transform one record, imputing absent fields.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if a fitted field has the wrong kind, or if the
    /// preprocessor fails [`validate`](Self::validate).
    pub fn transform(&self, record: &FeatureRecord) -> Result<Vec<f64>> {
        let mut out = vec![0.0; self.width];
        for (i, col) in self.numeric.iter().enumerate() {
            let value = match record.get(&col.name) {
                None => col.fill,
                Some(v) => v.as_number().ok_or_else(|| field_error(&col.name, "a number"))?,
            };
            let slot = out
                .get_mut(i)
                .ok_or_else(|| shape_error(format!("column '{}' is outside width", col.name)))?;
            *slot = (value - col.mean) / col.scale;
        }
        for col in &self.categorical {
            let value = match record.get(&col.name) {
                None => col.fill.as_str(),
                Some(v) => v.as_text().ok_or_else(|| field_error(&col.name, "a string"))?,
            };
            if let Some(&idx) = col.categories.get(value) {
                let slot = out
                    .get_mut(col.offset + idx)
                    .ok_or_else(|| shape_error(format!("column '{}' is outside width", col.name)))?;
                *slot = 1.0;
            }
        }
        Ok(out)
    }

    /// Transform a batch in parallel, preserving input order.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered.
    pub fn transform_batch(&self, records: &[FeatureRecord]) -> Result<Vec<Vec<f64>>> {
        records.par_iter().map(|r| self.transform(r)).collect()
    }
}

/// Median of `values`; the mean of the two middle values for even lengths.
fn median(mut values: Vec<f64>) -> f64 {
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    match values.len() {
        0 => 0.0,
        len if len % 2 == 0 => (values[mid - 1] + values[mid]) / 2.0,
        _ => values[mid],
    }
}

fn field_error(name: &str, expected: &str) -> Error {
    Error::InvalidInput(format!("field '{name}' must be {expected}"))
}

fn shape_error(detail: String) -> Error {
    Error::InvalidInput(format!("inconsistent preprocessor: {detail}"))
}

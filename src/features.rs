//! Feature records and the schema that gates them
//!
//! Requests carry open-ended named-field maps. Before any record reaches a
//! predictor it is checked against a [`FeatureSchema`]: every required field
//! must be present with the right kind, so a missing column surfaces as a
//! typed `InvalidInput` instead of an error deep inside the model. Training
//! rows are checked more leniently: absent values are imputed at fit time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A single feature value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    /// Numeric feature (integers are widened to `f64`)
    Number(f64),
    /// Categorical feature
    Text(String),
}

impl FeatureValue {
    /// Numeric value, if this is a number.
    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }

    /// Text value, if this is a category.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Text(s) => Some(s),
        }
    }
}

impl From<f64> for FeatureValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for FeatureValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<&str> for FeatureValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FeatureValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// One input row: field name to value.
pub type FeatureRecord = BTreeMap<String, FeatureValue>;

/// Kind of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Finite number
    Numeric,
    /// Free-form category
    Categorical,
}

/// A required field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name as it appears in requests
    pub name: String,
    /// Expected kind
    pub kind: FieldKind,
}

impl FieldSpec {
    /// Required numeric field.
    #[must_use]
    pub fn numeric(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Numeric,
        }
    }

    /// Required categorical field.
    #[must_use]
    pub fn categorical(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Categorical,
        }
    }
}

/// Required input fields of a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    fields: Vec<FieldSpec>,
}

impl FeatureSchema {
    /// Create a schema from its fields.
    #[must_use]
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// Customer churn schema.
    #[must_use]
    pub fn churn() -> Self {
        Self::new(vec![
            FieldSpec::numeric("Age"),
            FieldSpec::numeric("Total_Purchase"),
            FieldSpec::numeric("Account_Manager"),
            FieldSpec::numeric("Years"),
            FieldSpec::numeric("Num_Sites"),
            FieldSpec::categorical("Location"),
            FieldSpec::categorical("Company"),
        ])
    }

    /// All fields, in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Names of numeric fields, in declaration order.
    pub fn numeric_fields(&self) -> impl Iterator<Item = &str> {
        self.fields_of(FieldKind::Numeric)
    }

    /// Names of categorical fields, in declaration order.
    pub fn categorical_fields(&self) -> impl Iterator<Item = &str> {
        self.fields_of(FieldKind::Categorical)
    }

    fn fields_of(&self, kind: FieldKind) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(move |f| f.kind == kind)
            .map(|f| f.name.as_str())
    }

    /// Check one record. Extra fields are ignored.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` naming the record index and the first offending field.
    pub fn validate_record(&self, index: usize, record: &FeatureRecord) -> Result<()> {
        self.check_record(index, record, false)
    }

    fn check_record(&self, index: usize, record: &FeatureRecord, allow_missing: bool) -> Result<()> {
        for field in &self.fields {
            let problem = match (record.get(&field.name), field.kind) {
                (None, _) if allow_missing => continue,
                (None, _) => "missing",
                (Some(FeatureValue::Number(n)), FieldKind::Numeric) if !n.is_finite() => {
                    "not a finite number"
                }
                (Some(FeatureValue::Number(_)), FieldKind::Numeric)
                | (Some(FeatureValue::Text(_)), FieldKind::Categorical) => continue,
                (Some(FeatureValue::Text(_)), FieldKind::Numeric) => "expected a number",
                (Some(FeatureValue::Number(_)), FieldKind::Categorical) => "expected a string",
            };
            return Err(Error::InvalidInput(format!(
                "record {index}: field '{}' {problem}",
                field.name
            )));
        }
        Ok(())
    }

    /// Check every record of a batch.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for the first invalid record.
    pub fn validate_batch(&self, records: &[FeatureRecord]) -> Result<()> {
        records
            .iter()
            .enumerate()
            .try_for_each(|(i, r)| self.validate_record(i, r))
    }

    /// Check training rows, where absent fields are imputed rather than rejected.
    ///
    /// Returns the number of absent values.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a present value of the wrong kind, or for a
    /// field absent from every record (nothing to impute from).
    pub fn validate_training_batch(&self, records: &[FeatureRecord]) -> Result<usize> {
        records
            .iter()
            .enumerate()
            .try_for_each(|(i, r)| self.check_record(i, r, true))?;

        let mut absent = 0;
        for field in &self.fields {
            let missing = records.iter().filter(|r| !r.contains_key(&field.name)).count();
            if !records.is_empty() && missing == records.len() {
                return Err(Error::InvalidInput(format!(
                    "field '{}' is missing from every record",
                    field.name
                )));
            }
            absent += missing;
        }
        Ok(absent)
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::churn()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer() -> FeatureRecord {
        FeatureRecord::from([
            ("Age".to_string(), 42.0.into()),
            ("Total_Purchase".to_string(), 11066.8.into()),
            ("Account_Manager".to_string(), 0.into()),
            ("Years".to_string(), 7.22.into()),
            ("Num_Sites".to_string(), 8.into()),
            ("Location".to_string(), "Lake Jason".into()),
            ("Company".to_string(), "Harvey LLC".into()),
        ])
    }

    #[test]
    fn test_valid_record() {
        assert!(FeatureSchema::churn().validate_record(0, &customer()).is_ok());
    }

    #[test]
    fn test_missing_field_names_index_and_field() {
        let mut record = customer();
        record.remove("Years");
        let err = FeatureSchema::churn()
            .validate_batch(&[customer(), record])
            .unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(msg.contains("record 1"));
        assert!(msg.contains("Years"));
    }

    #[test]
    fn test_wrong_kind() {
        let mut record = customer();
        record.insert("Age".to_string(), "forty".into());
        assert!(FeatureSchema::churn().validate_record(0, &record).is_err());

        let mut record = customer();
        record.insert("Company".to_string(), 3.into());
        assert!(FeatureSchema::churn().validate_record(0, &record).is_err());
    }

    #[test]
    fn test_non_finite_number_rejected() {
        let mut record = customer();
        record.insert("Age".to_string(), f64::INFINITY.into());
        assert!(FeatureSchema::churn().validate_record(0, &record).is_err());
    }

    #[test]
    fn test_training_batch_counts_absent_values() {
        let mut partial = customer();
        partial.remove("Years");
        partial.remove("Company");
        let schema = FeatureSchema::churn();

        assert_eq!(schema.validate_training_batch(&[customer(), partial.clone()]).unwrap(), 2);
        assert!(schema.validate_batch(&[partial]).is_err());
    }

    #[test]
    fn test_training_batch_rejects_wrong_kind_and_empty_columns() {
        let mut wrong = customer();
        wrong.insert("Age".to_string(), "forty".into());
        assert!(FeatureSchema::churn().validate_training_batch(&[wrong]).is_err());

        let mut no_age = customer();
        no_age.remove("Age");
        let err = FeatureSchema::churn()
            .validate_training_batch(&[no_age.clone(), no_age])
            .unwrap_err();
        assert!(err.to_string().contains("Age"));
    }

    #[test]
    fn test_extra_fields_ignored() {
        let mut record = customer();
        record.insert("Names".to_string(), "Cameron Williams".into());
        assert!(FeatureSchema::churn().validate_record(0, &record).is_ok());
    }

    #[test]
    fn test_integers_deserialize_as_numbers() {
        let record: FeatureRecord =
            serde_json::from_str(r#"{"Account_Manager": 1, "Location": "x"}"#).unwrap();
        assert_eq!(record["Account_Manager"], FeatureValue::Number(1.0));
        assert_eq!(record["Location"].as_text(), Some("x"));
    }

    #[test]
    fn test_field_partitions() {
        let schema = FeatureSchema::churn();
        assert_eq!(schema.numeric_fields().count(), 5);
        assert_eq!(
            schema.categorical_fields().collect::<Vec<_>>(),
            vec!["Location", "Company"]
        );
    }
}

//! Shared fixtures for integration tests

#![allow(dead_code)]

use champion_registry::features::{FeatureRecord, FeatureValue};
use champion_registry::training::Dataset;

const LOCATIONS: [&str; 3] = ["Paris", "Lyon", "Nice"];
const COMPANIES: [&str; 4] = ["Acme", "Globex", "Initech", "Umbrella"];

/// One churn-schema record. Customers with many sites and few years tend to churn.
pub fn churn_record(i: usize) -> FeatureRecord {
    let sites = (i % 12) as f64 + 3.0;
    let years = ((i * 7) % 10) as f64 * 0.8 + 1.0;
    FeatureRecord::from([
        ("Age".to_string(), FeatureValue::from(30.0 + (i % 25) as f64)),
        ("Total_Purchase".to_string(), FeatureValue::from(8_000.0 + (i * 37 % 500) as f64)),
        ("Account_Manager".to_string(), FeatureValue::from((i % 2) as f64)),
        ("Years".to_string(), FeatureValue::from(years)),
        ("Num_Sites".to_string(), FeatureValue::from(sites)),
        ("Location".to_string(), FeatureValue::from(LOCATIONS[i % LOCATIONS.len()])),
        ("Company".to_string(), FeatureValue::from(COMPANIES[i % COMPANIES.len()])),
    ])
}

fn churn_label(record: &FeatureRecord) -> u8 {
    let sites = record["Num_Sites"].as_number().unwrap_or_default();
    let years = record["Years"].as_number().unwrap_or_default();
    u8::from(sites - years > 5.0)
}

/// Deterministic, learnable churn dataset with both classes present.
pub fn churn_dataset(rows: usize) -> Dataset {
    let records: Vec<FeatureRecord> = (0..rows).map(churn_record).collect();
    let labels = records.iter().map(churn_label).collect();
    Dataset::new(records, labels).unwrap()
}

/// Unique scratch directory under the system temp dir.
pub fn scratch_dir(prefix: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("{prefix}-{}", uuid::Uuid::new_v4().simple()))
}

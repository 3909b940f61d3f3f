//! Tests for error types

use std::time::Duration;

use champion_registry::serving::ErrorResponse;
use champion_registry::{Error, ErrorKind};

#[test]
fn test_duplicate_metric_error() {
    let error = Error::DuplicateMetric {
        run_id: "r1".to_string(),
        metric: "f1".to_string(),
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("Duplicate metric 'f1'"));
    assert!(error_str.contains("write-once"));
    assert_eq!(error.kind(), ErrorKind::DuplicateMetric);
    assert!(!error.is_retryable());
}

#[test]
fn test_no_candidates_error() {
    let error = Error::NoCandidates {
        experiment: "churn-day2".to_string(),
        metric: "f1".to_string(),
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("churn-day2"));
    assert!(error_str.contains("Train candidates"));
    assert!(error.is_retryable());
}

#[test]
fn test_no_champion_error() {
    let error = Error::NoChampion("churn-day2".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("No champion"));
    assert!(error_str.contains("Promote a candidate"));
}

#[test]
fn test_timeout_error() {
    let error = Error::Timeout {
        operation: "query_runs".to_string(),
        after: Duration::from_millis(250),
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("query_runs"));
    assert!(error_str.contains("250ms"));
    assert!(error.is_retryable());
}

#[test]
fn test_artifact_load_failed_error() {
    let error = Error::ArtifactLoadFailed {
        run_id: "r2".to_string(),
        reason: "content hash mismatch".to_string(),
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("Artifact load failed for run r2"));
    assert!(error_str.contains("content hash mismatch"));
    assert_eq!(error.kind(), ErrorKind::ArtifactLoadFailed);
}

#[test]
fn test_training_failed_lists_every_model() {
    let error = Error::TrainingFailed {
        failures: vec![
            "LogisticRegression: diverged".to_string(),
            "NearestCentroid: single class".to_string(),
        ],
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("LogisticRegression: diverged"));
    assert!(error_str.contains("NearestCentroid: single class"));
}

#[test]
fn test_storage_error() {
    let error = Error::StorageError("file not found".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("Storage error"));
    assert!(error_str.contains("file not found"));
    assert_eq!(error.kind(), ErrorKind::Storage);
}

#[test]
fn test_invalid_input_error() {
    let error = Error::InvalidInput("record 3: field 'Age' missing".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("Invalid input"));
    assert!(error_str.contains("record 3"));
    assert!(!error.is_retryable());
}

#[test]
fn test_io_error_conversion() {
    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let error: Error = io_error.into();
    let error_str = format!("{error}");
    assert!(error_str.contains("IO error"));
    assert_eq!(error.kind(), ErrorKind::Storage);
}

#[test]
fn test_serialization_error_conversion() {
    let json_error = serde_json::from_str::<u32>("not json").unwrap_err();
    let error: Error = json_error.into();
    assert!(format!("{error}").contains("Serialization error"));
}

#[test]
fn test_unavailable_is_distinguishable_from_bad_request() {
    let unavailable = ErrorResponse::from(&Error::ServiceUnavailable("degraded".to_string()));
    let bad_request = ErrorResponse::from(&Error::InvalidInput("bad".to_string()));
    assert_ne!(unavailable.kind, bad_request.kind);
    assert!(unavailable.retryable);
    assert!(!bad_request.retryable);
}

#[test]
fn test_error_kind_serializes_snake_case() {
    let json = serde_json::to_string(&ErrorKind::ArtifactLoadFailed).unwrap();
    assert_eq!(json, "\"artifact_load_failed\"");
}

#[test]
fn test_error_debug() {
    let error = Error::RunNotFound("r9".to_string());
    let debug_str = format!("{error:?}");
    assert!(debug_str.contains("RunNotFound"));
}

#[test]
fn test_result_type_alias() {
    #[allow(clippy::unnecessary_wraps)]
    fn returns_result() -> champion_registry::Result<i32> {
        Ok(42)
    }

    let result = returns_result();
    assert!(result.is_ok());
    assert_eq!(result.unwrap(), 42);
}

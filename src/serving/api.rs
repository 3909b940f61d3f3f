//! Request and response types of the serving boundary

use serde::{Deserialize, Serialize};

use super::state::ServingState;
use crate::error::{Error, ErrorKind};
use crate::features::FeatureRecord;

/// A batch of feature records to score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    /// Records in caller order
    pub records: Vec<FeatureRecord>,
}

impl PredictRequest {
    /// Wrap `records`.
    #[must_use]
    pub const fn new(records: Vec<FeatureRecord>) -> Self {
        Self { records }
    }
}

/// Labels and positive-class probabilities, one per request record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    /// Predicted labels
    pub predictions: Vec<u8>,
    /// Probability of label 1
    pub probabilities: Vec<f64>,
}

impl PredictResponse {
    /// Number of scored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    /// True for an empty batch.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }
}

/// Readiness as reported by the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Serving a champion
    Ready,
    /// Not serving; see the cause
    Degraded,
}

/// Health endpoint payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// Readiness
    pub status: HealthStatus,
    /// Champion run when ready
    #[serde(skip_serializing_if = "Option::is_none")]
    pub champion_run_id: Option<String>,
    /// Champion model type when ready
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    /// Failure cause when degraded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl From<&ServingState> for HealthReport {
    fn from(state: &ServingState) -> Self {
        match state {
            ServingState::Ready(ready) => Self {
                status: HealthStatus::Ready,
                champion_run_id: Some(ready.champion().run_id.clone()),
                model_name: Some(ready.champion().model_name.clone()),
                cause: None,
            },
            ServingState::Degraded(degraded) => Self {
                status: HealthStatus::Degraded,
                champion_run_id: None,
                model_name: None,
                cause: Some(degraded.cause.clone()),
            },
            ServingState::Uninitialized => Self {
                status: HealthStatus::Degraded,
                champion_run_id: None,
                model_name: None,
                cause: Some("champion not resolved yet".into()),
            },
        }
    }
}

/// Typed failure returned to clients.
///
/// `kind` lets a client tell "model not ready" (`service_unavailable`) apart
/// from "bad request" (`invalid_input`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    /// Failure class
    pub kind: ErrorKind,
    /// Human-readable message
    pub message: String,
    /// Whether retrying later may succeed
    pub retryable: bool,
}

impl From<&Error> for ErrorResponse {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_shape() {
        let err = Error::ServiceUnavailable("no champion".into());
        let json = serde_json::to_value(ErrorResponse::from(&err)).unwrap();
        assert_eq!(json["kind"], "service_unavailable");
        assert_eq!(json["retryable"], true);
    }

    #[test]
    fn test_request_accepts_mixed_values() {
        let request: PredictRequest =
            serde_json::from_str(r#"{"records":[{"Age":42,"Location":"Paris"}]}"#).unwrap();
        assert_eq!(request.records.len(), 1);
        assert_eq!(request.records[0]["Age"].as_number(), Some(42.0));
        assert_eq!(request.records[0]["Location"].as_text(), Some("Paris"));
    }

    #[test]
    fn test_uninitialized_health_is_degraded() {
        let report = HealthReport::from(&ServingState::Uninitialized);
        assert_eq!(report.status, HealthStatus::Degraded);
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("champion_run_id").is_none());
    }
}

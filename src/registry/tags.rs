//! Well-known tag names and values

use crate::experiment::TagPredicate;

/// Project the run belongs to.
pub const PROJECT: &str = "project";
/// Pipeline stage that produced the run.
pub const STAGE: &str = "stage";
/// Business objective of the experiment.
pub const BUSINESS_GOAL: &str = "business_goal";
/// `"true"` once a run is a complete, rankable candidate.
pub const CANDIDATE: &str = "candidate";
/// Model type of the run.
pub const MODEL_NAME: &str = "model_name";
/// Role of the run in the champion lifecycle.
pub const MODEL_ROLE: &str = "model_role";
/// RFC 3339 time of the most recent promotion.
pub const PROMOTED_AT: &str = "promoted_at";

/// Value of [`CANDIDATE`] on candidates.
pub const TRUE: &str = "true";
/// Value of [`CANDIDATE`] on abandoned runs.
pub const FALSE: &str = "false";
/// Value of [`STAGE`] written by the producer.
pub const STAGE_TRAINING: &str = "training";
/// Value of [`MODEL_ROLE`] on the live champion.
pub const ROLE_CHAMPION: &str = "champion";
/// Value of [`MODEL_ROLE`] on a demoted champion.
pub const ROLE_RETIRED: &str = "retired";

/// Artifact key of the serialized model.
pub const MODEL_ARTIFACT_KEY: &str = "model";

/// `candidate = true`
#[must_use]
pub fn candidates() -> TagPredicate {
    TagPredicate::new().tag_eq(CANDIDATE, TRUE)
}

/// `model_role = champion`
#[must_use]
pub fn champions() -> TagPredicate {
    TagPredicate::new().tag_eq(MODEL_ROLE, ROLE_CHAMPION)
}

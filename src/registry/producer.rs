//! Candidate Producer - trains each model type and registers candidate runs
//!
//! One run per model type, with its training inputs (model type, split
//! fraction, seed, hyperparameters) logged as params. The `candidate` tag is written last, after the
//! metrics and the artifact, so a run whose fit fails part-way is closed as
//! `Failed` and never becomes rankable. A run abandoned after the tag was
//! written (its final close failed) is re-tagged `candidate = false`.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, instrument, warn};

use super::tags;
use crate::config::RegistryConfig;
use crate::experiment::{with_timeout, RunStatus, RunStore};
use crate::features::FeatureSchema;
use crate::training::{compute_metrics, Dataset, MetricSet, Trainer};
use crate::{Error, Result};

/// Provenance tags written on every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    /// Value of the `project` tag
    pub project: String,
    /// Value of the `business_goal` tag
    pub business_goal: String,
}

impl Default for Provenance {
    fn default() -> Self {
        Self {
            project: "PSTB_MLOps".to_string(),
            business_goal: "churn_reduction".to_string(),
        }
    }
}

/// A registered candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateSummary {
    /// Candidate run
    pub run_id: String,
    /// Model type
    pub model_name: String,
    /// Logged metrics
    pub metrics: MetricSet,
}

/// A model type whose run was abandoned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateFailure {
    /// Abandoned run, if one was opened
    pub run_id: Option<String>,
    /// Model type
    pub model_name: String,
    /// Cause
    pub error: String,
}

/// Outcome of one producer pass with at least one candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductionReport {
    /// Experiment the runs were registered in
    pub experiment_id: String,
    /// Successful candidates, in configuration order
    pub candidates: Vec<CandidateSummary>,
    /// Abandoned model types, in configuration order
    pub failures: Vec<CandidateFailure>,
}

/// Trains configured model types and registers them as candidate runs.
pub struct CandidateProducer<S> {
    store: Arc<S>,
    schema: FeatureSchema,
    trainers: Vec<Arc<dyn Trainer>>,
    provenance: Provenance,
    test_fraction: f64,
    seed: u64,
    timeout: Duration,
}

impl<S: RunStore> CandidateProducer<S> {
    /// Create a producer with no trainers, a 0.2 test split and seed 42.
    #[must_use]
    pub fn new(store: Arc<S>, schema: FeatureSchema) -> Self {
        Self {
            store,
            schema,
            trainers: Vec::new(),
            provenance: Provenance::default(),
            test_fraction: 0.2,
            seed: 42,
            timeout: Duration::from_secs(5),
        }
    }

    /// Create a producer with the model list, provenance, split and timeout of `config`.
    #[must_use]
    pub fn from_config(store: Arc<S>, config: &RegistryConfig) -> Self {
        let mut producer = Self::new(store, config.schema.clone())
            .with_provenance(Provenance {
                project: config.project.clone(),
                business_goal: config.business_goal.clone(),
            })
            .with_split(config.test_fraction, config.seed)
            .with_timeout(config.timeout());
        for model in &config.models {
            producer = producer.with_trainer(Arc::from(model.trainer(&config.schema)));
        }
        producer
    }

    /// Add a model type.
    #[must_use]
    pub fn with_trainer(mut self, trainer: Arc<dyn Trainer>) -> Self {
        self.trainers.push(trainer);
        self
    }

    /// Set the provenance tags.
    #[must_use]
    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    /// Set the held-out fraction and split seed.
    #[must_use]
    pub const fn with_split(mut self, test_fraction: f64, seed: u64) -> Self {
        self.test_fraction = test_fraction;
        self.seed = seed;
        self
    }

    /// Bound every store call.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Train every model type on `data` and register candidates in `experiment`.
    ///
    /// The experiment is created on first reference.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if `data` violates the schema or cannot be split
    /// - `TrainingFailed` if no model type produced a candidate
    /// - `Timeout` / storage errors from the experiment lookup
    #[instrument(skip(self, data), fields(rows = data.len()))]
    pub async fn produce(&self, experiment: &str, data: &Dataset) -> Result<ProductionReport> {
        data.validate(&self.schema)?;
        let (train, test) = data.stratified_split(self.test_fraction, self.seed)?;
        let train = Arc::new(train);

        let record = with_timeout(
            "get_or_create_experiment",
            self.timeout,
            self.store.get_or_create_experiment(experiment),
        )
        .await?;
        let experiment_id = record.experiment_id().to_string();

        let mut candidates = Vec::new();
        let mut failures = Vec::new();
        for trainer in &self.trainers {
            info!(model = trainer.model_name(), "training candidate");
            match self.produce_one(&experiment_id, trainer, &train, &test).await {
                Ok(summary) => {
                    info!(
                        model = %summary.model_name,
                        run_id = %summary.run_id,
                        f1 = summary.metrics.f1,
                        "registered candidate"
                    );
                    candidates.push(summary);
                }
                Err(failure) => {
                    warn!(
                        model = %failure.model_name,
                        run_id = ?failure.run_id,
                        error = %failure.error,
                        "abandoned candidate"
                    );
                    failures.push(failure);
                }
            }
        }

        if candidates.is_empty() {
            return Err(Error::TrainingFailed {
                failures: failures
                    .iter()
                    .map(|f| format!("{}: {}", f.model_name, f.error))
                    .collect(),
            });
        }
        Ok(ProductionReport {
            experiment_id,
            candidates,
            failures,
        })
    }

    async fn produce_one(
        &self,
        experiment_id: &str,
        trainer: &Arc<dyn Trainer>,
        train: &Arc<Dataset>,
        test: &Dataset,
    ) -> std::result::Result<CandidateSummary, CandidateFailure> {
        let model_name = trainer.model_name().to_string();
        let run = with_timeout(
            "create_run",
            self.timeout,
            self.store.create_run(experiment_id, Some(&model_name)),
        )
        .await
        .map_err(|e| CandidateFailure {
            run_id: None,
            model_name: model_name.clone(),
            error: e.to_string(),
        })?;
        let run_id = run.run_id().to_string();

        match self.register(&run_id, trainer, train, test).await {
            Ok(metrics) => Ok(CandidateSummary {
                run_id,
                model_name,
                metrics,
            }),
            Err(e) => {
                if let Err(tag_err) = self
                    .bounded_set_tag(&run_id, tags::CANDIDATE, tags::FALSE)
                    .await
                {
                    warn!(run_id = %run_id, error = %tag_err, "could not clear candidate tag");
                }
                if let Err(close_err) = with_timeout(
                    "close_run",
                    self.timeout,
                    self.store.close_run(&run_id, RunStatus::Failed),
                )
                .await
                {
                    warn!(run_id = %run_id, error = %close_err, "could not close abandoned run");
                }
                Err(CandidateFailure {
                    run_id: Some(run_id),
                    model_name,
                    error: e.to_string(),
                })
            }
        }
    }

    async fn register(
        &self,
        run_id: &str,
        trainer: &Arc<dyn Trainer>,
        train: &Arc<Dataset>,
        test: &Dataset,
    ) -> Result<MetricSet> {
        for (name, value) in [
            (tags::PROJECT, self.provenance.project.as_str()),
            (tags::STAGE, tags::STAGE_TRAINING),
            (tags::BUSINESS_GOAL, self.provenance.business_goal.as_str()),
            (tags::MODEL_NAME, trainer.model_name()),
        ] {
            self.bounded_set_tag(run_id, name, value).await?;
        }

        let mut params = vec![
            ("model_type".to_string(), trainer.model_name().to_string()),
            ("test_size".to_string(), self.test_fraction.to_string()),
            ("seed".to_string(), self.seed.to_string()),
        ];
        params.extend(trainer.params());
        for (name, value) in &params {
            with_timeout("log_param", self.timeout, self.store.log_param(run_id, name, value))
                .await?;
        }

        let fit_trainer = Arc::clone(trainer);
        let fit_data = Arc::clone(train);
        let model = tokio::task::spawn_blocking(move || fit_trainer.fit(&fit_data))
            .await
            .map_err(|e| Error::Internal(format!("training task failed: {e}")))??;

        let scores = model.predict_batch(test.records())?;
        let y_pred: Vec<u8> = scores.iter().map(|s| s.label).collect();
        let y_proba: Vec<f64> = scores.iter().map(|s| s.probability).collect();
        let metrics = compute_metrics(test.labels(), &y_pred, &y_proba)?;

        for (name, value) in metrics.entries() {
            with_timeout("log_metric", self.timeout, self.store.log_metric(run_id, name, value))
                .await?;
        }

        let bytes = model.to_artifact()?;
        with_timeout(
            "put_artifact",
            self.timeout,
            self.store.put_artifact(run_id, tags::MODEL_ARTIFACT_KEY, bytes),
        )
        .await?;

        self.bounded_set_tag(run_id, tags::CANDIDATE, tags::TRUE).await?;
        with_timeout(
            "close_run",
            self.timeout,
            self.store.close_run(run_id, RunStatus::Success),
        )
        .await?;
        Ok(metrics)
    }

    async fn bounded_set_tag(&self, run_id: &str, name: &str, value: &str) -> Result<()> {
        with_timeout("set_tag", self.timeout, self.store.set_tag(run_id, name, value)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::{
        ArtifactRecord, ExperimentRecord, MemoryRunStore, RunOrder, RunQuery, RunRecord,
        TagPredicate,
    };
    use crate::registry::ChampionSelector;
    use crate::features::{FeatureRecord, FeatureValue, FieldSpec};
    use crate::training::{FittedModel, NearestCentroidTrainer};

    #[derive(Debug)]
    struct FailingTrainer;

    impl Trainer for FailingTrainer {
        fn model_name(&self) -> &str {
            "Broken"
        }

        fn fit(&self, _train: &Dataset) -> Result<Box<dyn FittedModel>> {
            Err(Error::InvalidInput("solver diverged".into()))
        }
    }

    /// Memory store whose `close_run(Success)` always fails.
    struct CloseRefusingStore(MemoryRunStore);

    impl RunStore for CloseRefusingStore {
        async fn find_experiment(&self, name: &str) -> Result<ExperimentRecord> {
            self.0.find_experiment(name).await
        }

        async fn get_or_create_experiment(&self, name: &str) -> Result<ExperimentRecord> {
            self.0.get_or_create_experiment(name).await
        }

        async fn create_run(&self, experiment_id: &str, run_name: Option<&str>) -> Result<RunRecord> {
            self.0.create_run(experiment_id, run_name).await
        }

        async fn get_run(&self, run_id: &str) -> Result<RunRecord> {
            self.0.get_run(run_id).await
        }

        async fn query_runs(
            &self,
            experiment_id: &str,
            predicate: &TagPredicate,
            order: &RunOrder,
        ) -> Result<RunQuery> {
            self.0.query_runs(experiment_id, predicate, order).await
        }

        async fn set_tag(&self, run_id: &str, name: &str, value: &str) -> Result<()> {
            self.0.set_tag(run_id, name, value).await
        }

        async fn log_param(&self, run_id: &str, name: &str, value: &str) -> Result<()> {
            self.0.log_param(run_id, name, value).await
        }

        async fn log_metric(&self, run_id: &str, name: &str, value: f64) -> Result<()> {
            self.0.log_metric(run_id, name, value).await
        }

        async fn put_artifact(&self, run_id: &str, key: &str, bytes: Vec<u8>) -> Result<ArtifactRecord> {
            self.0.put_artifact(run_id, key, bytes).await
        }

        async fn read_artifact(&self, artifact: &ArtifactRecord) -> Result<Vec<u8>> {
            self.0.read_artifact(artifact).await
        }

        async fn close_run(&self, run_id: &str, status: RunStatus) -> Result<RunRecord> {
            if status == RunStatus::Success {
                return Err(Error::StorageError("disk full".into()));
            }
            self.0.close_run(run_id, status).await
        }
    }

    fn schema() -> FeatureSchema {
        FeatureSchema::new(vec![FieldSpec::numeric("x")])
    }

    fn data() -> Dataset {
        let records = (0..40)
            .map(|i| FeatureRecord::from([("x".to_string(), FeatureValue::from(f64::from(i)))]))
            .collect();
        let labels = (0..40).map(|i| u8::from(i >= 20)).collect();
        Dataset::new(records, labels).unwrap()
    }

    #[tokio::test]
    async fn test_registers_tagged_candidate() {
        let store = Arc::new(MemoryRunStore::new());
        let producer = CandidateProducer::new(Arc::clone(&store), schema())
            .with_trainer(Arc::new(NearestCentroidTrainer::new(schema())));

        let report = producer.produce("churn-day2", &data()).await.unwrap();
        assert_eq!(report.candidates.len(), 1);
        assert!(report.failures.is_empty());

        let run = store.get_run(&report.candidates[0].run_id).await.unwrap();
        assert_eq!(run.tag(tags::CANDIDATE), Some("true"));
        assert_eq!(run.tag(tags::STAGE), Some("training"));
        assert_eq!(run.tag(tags::PROJECT), Some("PSTB_MLOps"));
        assert_eq!(run.tag(tags::MODEL_NAME), Some("NearestCentroid"));
        assert_eq!(run.run_name(), Some("NearestCentroid"));
        assert_eq!(run.metrics().len(), 5);
        assert_eq!(run.param("model_type"), Some("NearestCentroid"));
        assert_eq!(run.param("test_size"), Some("0.2"));
        assert_eq!(run.param("seed"), Some("42"));
        assert!(run.artifact().is_some());
        assert_eq!(run.status(), RunStatus::Success);
    }

    #[tokio::test]
    async fn test_failed_model_is_not_a_candidate() {
        let store = Arc::new(MemoryRunStore::new());
        let producer = CandidateProducer::new(Arc::clone(&store), schema())
            .with_trainer(Arc::new(FailingTrainer))
            .with_trainer(Arc::new(NearestCentroidTrainer::new(schema())));

        let report = producer.produce("churn-day2", &data()).await.unwrap();
        assert_eq!(report.candidates.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].error.contains("solver diverged"));

        let failed_id = report.failures[0].run_id.clone().unwrap();
        let failed = store.get_run(&failed_id).await.unwrap();
        assert_eq!(failed.status(), RunStatus::Failed);
        assert_eq!(failed.tag(tags::CANDIDATE), Some(tags::FALSE));

        let candidates = store
            .query_runs(&report.experiment_id, &tags::candidates(), &RunOrder::descending("f1"))
            .await
            .unwrap();
        assert_eq!(candidates.len(), 1);
    }

    #[tokio::test]
    async fn test_all_failed_is_reported() {
        let store = Arc::new(MemoryRunStore::new());
        let producer = CandidateProducer::new(Arc::clone(&store), schema())
            .with_trainer(Arc::new(FailingTrainer));

        let err = producer.produce("churn-day2", &data()).await.unwrap_err();
        match err {
            Error::TrainingFailed { failures } => {
                assert_eq!(failures.len(), 1);
                assert!(failures[0].starts_with("Broken"));
            }
            other => panic!("expected TrainingFailed, got {other:?}"),
        }

        let experiment = store.find_experiment("churn-day2").await.unwrap();
        let all = store
            .query_runs(experiment.experiment_id(), &TagPredicate::new(), &RunOrder::descending("f1"))
            .await
            .unwrap();
        assert!(all.iter().all(|r| r.tag(tags::CANDIDATE) != Some(tags::TRUE)));
    }

    #[tokio::test]
    async fn test_failed_close_leaves_no_rankable_run() {
        let store = Arc::new(CloseRefusingStore(MemoryRunStore::new()));
        let producer = CandidateProducer::new(Arc::clone(&store), schema())
            .with_trainer(Arc::new(NearestCentroidTrainer::new(schema())));

        let err = producer.produce("churn-day2", &data()).await.unwrap_err();
        assert!(matches!(err, Error::TrainingFailed { .. }));

        let experiment = store.find_experiment("churn-day2").await.unwrap();
        let runs = store
            .query_runs(experiment.experiment_id(), &TagPredicate::new(), &RunOrder::descending("f1"))
            .await
            .unwrap();
        assert_eq!(runs.len(), 1);
        let run = runs.iter().next().unwrap();
        assert_eq!(run.status(), RunStatus::Failed);
        assert_eq!(run.tag(tags::CANDIDATE), Some(tags::FALSE));

        let err = ChampionSelector::new(store).select("churn-day2").await.unwrap_err();
        assert!(matches!(err, Error::NoCandidates { .. }));
    }

    #[tokio::test]
    async fn test_invalid_dataset_rejected_before_any_run() {
        let store = Arc::new(MemoryRunStore::new());
        let producer = CandidateProducer::new(Arc::clone(&store), FeatureSchema::churn())
            .with_trainer(Arc::new(NearestCentroidTrainer::new(FeatureSchema::churn())));

        let err = producer.produce("churn-day2", &data()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(store.run_count(), 0);
    }
}

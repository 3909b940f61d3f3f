//! Champion Selector - ranks candidates and promotes the winner
//!
//! Promotion is clear-then-set: every other run tagged `model_role =
//! champion` in the experiment is retired before the winner is tagged. An
//! interruption between the two steps leaves zero champions (serving
//! degrades) rather than two.
//!
//! Promotions against the same experiment are serialized through a
//! per-experiment lock shared by all clones of a selector. The backend does
//! not arbitrate concurrent promotions, so at most one process may promote
//! into a given experiment at a time.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, instrument};

use super::tags;
use crate::config::RegistryConfig;
use crate::experiment::{with_timeout, ExperimentRecord, RunOrder, RunRecord, RunStatus, RunStore};
use crate::training::metrics::DEFAULT_RANKING_METRIC;
use crate::{Error, Result};

/// Result of a successful promotion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Promotion {
    /// Experiment promoted into
    pub experiment_id: String,
    /// New champion
    pub run_id: String,
    /// Ranking metric
    pub metric: String,
    /// Champion's value of the ranking metric
    pub value: f64,
    /// Former champions re-tagged `model_role = retired`
    pub retired: Vec<String>,
    /// The winner already was the sole champion; nothing was written
    pub unchanged: bool,
}

/// Ranks candidate runs and promotes the best one.
///
/// Clones share the promotion locks.
pub struct ChampionSelector<S> {
    store: Arc<S>,
    metric: String,
    timeout: Duration,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl<S> Clone for ChampionSelector<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            metric: self.metric.clone(),
            timeout: self.timeout,
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<S: RunStore> ChampionSelector<S> {
    /// Create a selector ranking by `f1` with a 5 s backend bound.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            metric: DEFAULT_RANKING_METRIC.to_string(),
            timeout: Duration::from_secs(5),
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Create a selector with the ranking metric and timeout of `config`.
    #[must_use]
    pub fn from_config(store: Arc<S>, config: &RegistryConfig) -> Self {
        Self::new(store)
            .with_metric(config.ranking_metric.clone())
            .with_timeout(config.timeout())
    }

    /// Rank by `metric` (descending).
    #[must_use]
    pub fn with_metric(mut self, metric: impl Into<String>) -> Self {
        self.metric = metric.into();
        self
    }

    /// Bound every store call.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Ranking metric.
    #[must_use]
    pub fn metric(&self) -> &str {
        &self.metric
    }

    /// Eligible candidates, best first, without writing anything.
    ///
    /// Candidates lacking the ranking metric, or closed as `Failed`, are not
    /// eligible. Equal values rank by ascending run id.
    ///
    /// # Errors
    ///
    /// `NotFound` if the experiment does not exist; `Timeout` or storage
    /// errors from the backend.
    pub async fn rank(&self, experiment: &str) -> Result<Vec<RunRecord>> {
        let record = self.find_experiment(experiment).await?;
        self.eligible(&record).await
    }

    /// Promote the top-ranked candidate of `experiment` to champion.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the experiment does not exist
    /// - `NoCandidates` if no eligible candidate exists; no tag is written
    /// - `Timeout` or storage errors; the promotion may be partially applied
    ///   (prior champions retired, winner not yet tagged) and is safe to retry
    #[instrument(skip(self), fields(metric = %self.metric))]
    pub async fn select(&self, experiment: &str) -> Result<Promotion> {
        let lock = Arc::clone(self.locks.entry(experiment.to_string()).or_default().value());
        let _guard = lock.lock().await;

        let record = self.find_experiment(experiment).await?;
        let ranked = self.eligible(&record).await?;
        let winner = ranked.first().ok_or_else(|| Error::NoCandidates {
            experiment: experiment.to_string(),
            metric: self.metric.clone(),
        })?;
        let value = winner.metric(&self.metric).unwrap_or_default();

        let champions = with_timeout(
            "query_runs",
            self.timeout,
            self.store.query_runs(
                record.experiment_id(),
                &tags::champions(),
                &RunOrder::descending(self.metric.clone()),
            ),
        )
        .await?;

        let unchanged = champions.len() == 1
            && champions.first().map(RunRecord::run_id) == Some(winner.run_id());
        if unchanged {
            info!(run_id = winner.run_id(), value, "champion unchanged");
        }

        let mut retired = Vec::new();
        for stale in champions.iter().filter(|c| c.run_id() != winner.run_id()) {
            with_timeout(
                "set_tag",
                self.timeout,
                self.store
                    .set_tag(stale.run_id(), tags::MODEL_ROLE, tags::ROLE_RETIRED),
            )
            .await?;
            info!(run_id = stale.run_id(), "retired previous champion");
            retired.push(stale.run_id().to_string());
        }

        if !unchanged {
            let promoted_at = Utc::now().to_rfc3339();
            for (name, value) in [
                (tags::MODEL_ROLE, tags::ROLE_CHAMPION),
                (tags::PROMOTED_AT, promoted_at.as_str()),
            ] {
                with_timeout(
                    "set_tag",
                    self.timeout,
                    self.store.set_tag(winner.run_id(), name, value),
                )
                .await?;
            }
            info!(
                run_id = winner.run_id(),
                model = winner.tag(tags::MODEL_NAME).unwrap_or("unknown"),
                value,
                "promoted champion"
            );
        }

        Ok(Promotion {
            experiment_id: record.experiment_id().to_string(),
            run_id: winner.run_id().to_string(),
            metric: self.metric.clone(),
            value,
            retired,
            unchanged,
        })
    }

    async fn find_experiment(&self, experiment: &str) -> Result<ExperimentRecord> {
        with_timeout(
            "find_experiment",
            self.timeout,
            self.store.find_experiment(experiment),
        )
        .await
    }

    async fn eligible(&self, record: &ExperimentRecord) -> Result<Vec<RunRecord>> {
        let ranked = with_timeout(
            "query_runs",
            self.timeout,
            self.store.query_runs(
                record.experiment_id(),
                &tags::candidates(),
                &RunOrder::descending(self.metric.clone()),
            ),
        )
        .await?;
        Ok(ranked
            .into_iter()
            .filter(|run| {
                run.status() != RunStatus::Failed && run.metric(&self.metric).is_some()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::{MemoryRunStore, TagPredicate};

    async fn seed(store: &MemoryRunStore, runs: &[(&str, Option<f64>, bool)]) -> String {
        let experiment = store.get_or_create_experiment("churn-day2").await.unwrap();
        for (id, f1, candidate) in runs {
            let mut builder = RunRecord::builder(*id, experiment.experiment_id());
            if let Some(v) = f1 {
                builder = builder.metric("f1", *v);
            }
            if *candidate {
                builder = builder.tag(tags::CANDIDATE, tags::TRUE);
            }
            store.insert_run(builder.build()).unwrap();
        }
        experiment.experiment_id().to_string()
    }

    async fn champion_ids(store: &MemoryRunStore, experiment_id: &str) -> Vec<String> {
        store
            .query_runs(experiment_id, &tags::champions(), &RunOrder::descending("f1"))
            .await
            .unwrap()
            .iter()
            .map(|r| r.run_id().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_promotes_best_candidate() {
        let store = Arc::new(MemoryRunStore::new());
        let exp = seed(&store, &[("r1", Some(0.80), true), ("r2", Some(0.91), true)]).await;

        let promotion = ChampionSelector::new(Arc::clone(&store))
            .select("churn-day2")
            .await
            .unwrap();
        assert_eq!(promotion.run_id, "r2");
        assert!((promotion.value - 0.91).abs() < f64::EPSILON);
        assert_eq!(champion_ids(&store, &exp).await, vec!["r2"]);
        assert!(store.get_run("r2").await.unwrap().tag(tags::PROMOTED_AT).is_some());
    }

    #[tokio::test]
    async fn test_non_candidates_are_ignored() {
        let store = Arc::new(MemoryRunStore::new());
        seed(&store, &[("r1", Some(0.80), true), ("r2", Some(0.99), false)]).await;

        let promotion = ChampionSelector::new(store).select("churn-day2").await.unwrap();
        assert_eq!(promotion.run_id, "r1");
    }

    #[tokio::test]
    async fn test_tie_breaks_on_smallest_run_id() {
        let store = Arc::new(MemoryRunStore::new());
        seed(&store, &[("rb", Some(0.9), true), ("ra", Some(0.9), true)]).await;

        let promotion = ChampionSelector::new(store).select("churn-day2").await.unwrap();
        assert_eq!(promotion.run_id, "ra");
    }

    #[tokio::test]
    async fn test_no_candidates_writes_nothing() {
        let store = Arc::new(MemoryRunStore::new());
        let exp = seed(&store, &[("r1", Some(0.8), false), ("r2", None, true)]).await;

        let err = ChampionSelector::new(Arc::clone(&store))
            .select("churn-day2")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoCandidates { .. }));

        let all = store
            .query_runs(&exp, &TagPredicate::new(), &RunOrder::descending("f1"))
            .await
            .unwrap();
        assert!(all.iter().all(|r| r.tag(tags::MODEL_ROLE).is_none()));
    }

    #[tokio::test]
    async fn test_failed_runs_are_not_eligible() {
        let store = Arc::new(MemoryRunStore::new());
        let exp = seed(&store, &[("r1", Some(0.80), true)]).await;
        let mut failed = RunRecord::builder("r0", exp.as_str())
            .metric("f1", 0.99)
            .tag(tags::CANDIDATE, tags::TRUE)
            .build();
        failed.close(RunStatus::Failed);
        store.insert_run(failed).unwrap();

        let promotion = ChampionSelector::new(Arc::clone(&store))
            .select("churn-day2")
            .await
            .unwrap();
        assert_eq!(promotion.run_id, "r1");
        assert_eq!(champion_ids(&store, &exp).await, vec!["r1"]);
    }

    #[tokio::test]
    async fn test_unknown_experiment() {
        let store = Arc::new(MemoryRunStore::new());
        let err = ChampionSelector::new(store).select("missing").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_repromotion_retires_previous_champion() {
        let store = Arc::new(MemoryRunStore::new());
        let exp = seed(&store, &[("r1", Some(0.80), true)]).await;
        let selector = ChampionSelector::new(Arc::clone(&store));
        selector.select("churn-day2").await.unwrap();

        store
            .insert_run(
                RunRecord::builder("r3", exp.as_str())
                    .metric("f1", 0.95)
                    .tag(tags::CANDIDATE, tags::TRUE)
                    .build(),
            )
            .unwrap();
        let promotion = selector.select("churn-day2").await.unwrap();

        assert_eq!(promotion.run_id, "r3");
        assert_eq!(promotion.retired, vec!["r1"]);
        assert_eq!(champion_ids(&store, &exp).await, vec!["r3"]);
        assert_eq!(
            store.get_run("r1").await.unwrap().tag(tags::MODEL_ROLE),
            Some(tags::ROLE_RETIRED)
        );
    }

    #[tokio::test]
    async fn test_idempotent_under_stable_input() {
        let store = Arc::new(MemoryRunStore::new());
        let exp = seed(&store, &[("r1", Some(0.80), true), ("r2", Some(0.91), true)]).await;
        let selector = ChampionSelector::new(Arc::clone(&store));

        let first = selector.select("churn-day2").await.unwrap();
        let promoted_at = store.get_run("r2").await.unwrap().tag(tags::PROMOTED_AT).map(str::to_string);
        let second = selector.select("churn-day2").await.unwrap();

        assert_eq!(first.run_id, second.run_id);
        assert!(!first.unchanged);
        assert!(second.unchanged);
        assert_eq!(
            store.get_run("r2").await.unwrap().tag(tags::PROMOTED_AT).map(str::to_string),
            promoted_at
        );
        assert_eq!(champion_ids(&store, &exp).await, vec!["r2"]);
    }

    #[tokio::test]
    async fn test_cleans_legacy_multi_champion_state() {
        let store = Arc::new(MemoryRunStore::new());
        let exp = seed(&store, &[("r1", Some(0.7), true), ("r2", Some(0.8), true), ("r3", Some(0.9), true)]).await;
        store.set_tag("r1", tags::MODEL_ROLE, tags::ROLE_CHAMPION).await.unwrap();
        store.set_tag("r2", tags::MODEL_ROLE, tags::ROLE_CHAMPION).await.unwrap();

        let promotion = ChampionSelector::new(Arc::clone(&store))
            .select("churn-day2")
            .await
            .unwrap();
        assert_eq!(promotion.run_id, "r3");
        assert_eq!(promotion.retired.len(), 2);
        assert_eq!(champion_ids(&store, &exp).await, vec!["r3"]);
    }

    #[tokio::test]
    async fn test_concurrent_selections_leave_one_champion() {
        let store = Arc::new(MemoryRunStore::new());
        let exp = seed(&store, &[("r1", Some(0.80), true), ("r2", Some(0.91), true)]).await;
        let selector = ChampionSelector::new(Arc::clone(&store));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let selector = selector.clone();
                tokio::spawn(async move { selector.select("churn-day2").await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().run_id, "r2");
        }
        assert_eq!(champion_ids(&store, &exp).await, vec!["r2"]);
    }

    #[tokio::test]
    async fn test_rank_orders_by_configured_metric() {
        let store = Arc::new(MemoryRunStore::new());
        let experiment = store.get_or_create_experiment("churn-day2").await.unwrap();
        for (id, auc) in [("a", 0.7), ("b", 0.9), ("c", 0.8)] {
            store
                .insert_run(
                    RunRecord::builder(id, experiment.experiment_id())
                        .metric("roc_auc", auc)
                        .tag(tags::CANDIDATE, tags::TRUE)
                        .build(),
                )
                .unwrap();
        }

        let board = ChampionSelector::new(store)
            .with_metric("roc_auc")
            .rank("churn-day2")
            .await
            .unwrap();
        let ids: Vec<_> = board.iter().map(RunRecord::run_id).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[tokio::test]
    async fn test_timeout_surfaces_as_typed_error() {
        let store = Arc::new(MemoryRunStore::new().with_latency(Duration::from_millis(200)));
        let err = ChampionSelector::new(store)
            .with_timeout(Duration::from_millis(10))
            .select("churn-day2")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
    }
}

//! Run Store Adapter: experiment tracking schema and backends
//!
//! ## Schema Overview
//!
//! ```text
//! ExperimentRecord (1) ──< RunRecord (N)
//!                              │
//!                              ├── tags     (name -> value, mutable)
//!                              ├──< MetricRecord (N) [write-once per key]
//!                              └── ArtifactRecord    [CAS, sha256]
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use champion_registry::experiment::{MemoryRunStore, RunOrder, RunStore, TagPredicate};
//!
//! # async fn example() -> champion_registry::Result<()> {
//! let store = MemoryRunStore::new();
//! let experiment = store.get_or_create_experiment("churn-day2").await?;
//!
//! let run = store.create_run(experiment.experiment_id(), Some("RandomForest")).await?;
//! store.log_metric(run.run_id(), "f1", 0.91).await?;
//! store.set_tag(run.run_id(), "candidate", "true").await?;
//!
//! let ranked = store
//!     .query_runs(
//!         experiment.experiment_id(),
//!         &TagPredicate::new().tag_eq("candidate", "true"),
//!         &RunOrder::descending("f1"),
//!     )
//!     .await?;
//! assert_eq!(ranked.first().map(|r| r.run_id()), Some(run.run_id()));
//! # Ok(())
//! # }
//! ```

mod artifact_record;
mod experiment_record;
mod file;
mod memory;
mod metric_record;
mod predicate;
mod query;
mod run_record;
mod store;

pub use artifact_record::ArtifactRecord;
pub use experiment_record::ExperimentRecord;
pub use file::FileRunStore;
pub use memory::MemoryRunStore;
pub use metric_record::MetricRecord;
pub use predicate::TagPredicate;
pub use query::{RunOrder, RunQuery, SortOrder};
pub use run_record::{RunRecord, RunRecordBuilder, RunStatus};
pub use store::{with_timeout, RunStore};

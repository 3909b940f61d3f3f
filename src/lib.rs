//! # champion-registry: Experiment Runs, Champion Promotion, Fail-Safe Serving
//!
//! **Version**: 0.1.0
//!
//! Tracks trained model attempts as runs of an experiment, promotes the best
//! candidate to *champion* through tags, and serves the champion behind an
//! explicit readiness state.
//!
//! ```text
//! CandidateProducer → RunStore → ChampionSelector → RunStore (tags)
//!                                                      ↓
//!                               PredictionServer ← ChampionResolver
//! ```
//!
//! ## Design Principles
//!
//! - **Tags are the contract**: `candidate = true` marks a rankable run,
//!   `model_role = champion` marks the single served run per experiment
//! - **Clear-then-set promotion**: prior champions are retired before the
//!   winner is tagged, under a per-experiment lock
//! - **Fail-safe serving**: a missing or broken champion degrades the server
//!   instead of failing startup
//! - **Bounded waits**: every backend call and artifact load has a timeout
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use champion_registry::experiment::MemoryRunStore;
//! use champion_registry::features::FeatureSchema;
//! use champion_registry::registry::{ChampionResolver, ChampionSelector};
//! use champion_registry::serving::{HealthStatus, PredictionServer};
//! use champion_registry::training::JsonModelLoader;
//!
//! # async fn example() -> champion_registry::Result<()> {
//! let store = Arc::new(MemoryRunStore::new());
//! // ... CandidateProducer::produce registers candidates ...
//! ChampionSelector::new(Arc::clone(&store)).select("churn-day2").await?;
//!
//! let resolver = ChampionResolver::new(store, Arc::new(JsonModelLoader), "churn-day2");
//! let server = PredictionServer::start(resolver, FeatureSchema::churn()).await;
//! assert_eq!(server.health().status, HealthStatus::Ready);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod error;
pub mod experiment;
pub mod features;
pub mod registry;
pub mod serving;
pub mod telemetry;
pub mod training;

pub use config::RegistryConfig;
pub use error::{Error, ErrorKind, Result};

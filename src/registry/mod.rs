//! Champion lifecycle: produce candidates, select a champion, resolve it
//!
//! ```text
//! CandidateProducer ──writes──> RunStore <──reads/tags── ChampionSelector
//!                                  │
//!                                  └──reads──> ChampionResolver ──> PredictionServer
//! ```
//!
//! The three roles share nothing but the [`RunStore`](crate::experiment::RunStore)
//! and the tag vocabulary in [`tags`]. A run becomes rankable once tagged
//! `candidate = true`; exactly one run per experiment carries
//! `model_role = champion` after every completed promotion.

mod producer;
mod resolver;
mod selector;
pub mod tags;

pub use producer::{CandidateFailure, CandidateProducer, CandidateSummary, ProductionReport, Provenance};
pub use resolver::{ChampionResolver, ResolvedChampion};
pub use selector::{ChampionSelector, Promotion};

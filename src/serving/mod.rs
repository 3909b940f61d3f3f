//! Prediction serving
//!
//! [`PredictionServer`] owns an explicit [`ServingState`]:
//!
//! ```text
//! Uninitialized ──resolve ok──> Ready ──reload ok──> Ready (new champion)
//!       │                         └───reload err──> Ready (unchanged)
//!       └──────resolve err──> Degraded ──reload ok──> Ready
//! ```
//!
//! Requests are rejected with `ServiceUnavailable` unless the state is
//! `Ready`.

mod api;
mod server;
mod state;

pub use api::{ErrorResponse, HealthReport, HealthStatus, PredictRequest, PredictResponse};
pub use server::{PredictionServer, ReloadOutcome};
pub use state::{ChampionInfo, DegradedState, ReadyState, ServingState};

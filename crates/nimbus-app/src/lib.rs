//! Weather state orchestration for Nimbus.
//!
//! [`WeatherOrchestrator`] is the single writer of [`ApplicationState`]. The
//! presentation layer sends intents (one method per user action) and renders
//! whatever the state stream emits.

mod favorites;
pub mod orchestrator;
mod search;
pub mod state;

pub use orchestrator::{
    Dependencies, OrchestratorSettings, WeatherOrchestrator, LOCATION_UNAVAILABLE,
};
pub use state::{ApplicationState, ViewStatus};

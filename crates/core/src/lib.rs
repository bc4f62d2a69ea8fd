//! Core logic of the travel planner: the analysis record, the analyzer and
//! its clarification step, the itinerary builder, and the orchestrator
//! driving them.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod analysis;
mod analyzer;
mod clarify;
mod error;
mod itinerary;
mod model_client;
mod orchestrator;
mod prompts;
mod structured;

pub use analysis::{ClarificationRequest, Itinerary, TravelAnalysis};
pub use analyzer::{Analyzer, ClarificationMode};
pub use clarify::{Field, parse_duration, resolve_with_defaults};
pub use error::{Error, ErrorKind};
pub use itinerary::{BuildOutcome, ItineraryBuilder};
pub use orchestrator::{
    ClarificationSource, DEFAULT_MAX_ROUND_TRIPS, Orchestrator,
    OrchestratorBuilder, Stage, UseDefaults,
};

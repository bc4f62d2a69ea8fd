use travel_planner_model::ModelProvider;

use super::{ClarificationSource, Orchestrator, Stage, UseDefaults};
use crate::analyzer::{Analyzer, ClarificationMode};
use crate::itinerary::ItineraryBuilder;
use crate::model_client::ModelClient;

/// How many clarification round trips a run may take by default.
pub const DEFAULT_MAX_ROUND_TRIPS: usize = 5;

/// [`Orchestrator`] builder.
pub struct OrchestratorBuilder {
    client: ModelClient,
    mode: ClarificationMode,
    source: Box<dyn ClarificationSource>,
    max_round_trips: usize,
    enhance: bool,
    on_stage: Option<super::StageCallback>,
}

impl OrchestratorBuilder {
    /// Creates a new builder with the specified model provider, shared by
    /// the analyzer and the itinerary builder.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            client: ModelClient::new(provider),
            mode: ClarificationMode::default(),
            source: Box::new(UseDefaults),
            max_round_trips: DEFAULT_MAX_ROUND_TRIPS,
            enhance: false,
            on_stage: None,
        }
    }

    /// Sets how the analyzer fills fields nobody answered for.
    #[inline]
    pub fn with_clarification_mode(mut self, mode: ClarificationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets where answers to clarification requests come from.
    #[inline]
    pub fn with_clarification_source(
        mut self,
        source: impl ClarificationSource + 'static,
    ) -> Self {
        self.source = Box::new(source);
        self
    }

    /// Sets the number of clarification round trips allowed per run.
    ///
    /// With `0`, any missing field fails the run.
    #[inline]
    pub fn with_max_round_trips(mut self, max_round_trips: usize) -> Self {
        self.max_round_trips = max_round_trips;
        self
    }

    /// Enables a second model pass adding practical details to every
    /// itinerary.
    #[inline]
    pub fn with_enhancement(mut self, enhance: bool) -> Self {
        self.enhance = enhance;
        self
    }

    /// Attaches a callback to be invoked whenever a run reaches a new
    /// stage.
    #[inline]
    pub fn on_stage(
        mut self,
        on_stage: impl Fn(Stage<'_>) + Send + Sync + 'static,
    ) -> Self {
        self.on_stage = Some(Box::new(on_stage));
        self
    }

    /// Builds the orchestrator.
    pub fn build(self) -> Orchestrator {
        let Self {
            client,
            mode,
            source,
            max_round_trips,
            enhance,
            on_stage,
        } = self;

        debug!("planning with model {}", client.model_id());
        Orchestrator {
            analyzer: Analyzer::new(client.clone(), mode),
            builder: ItineraryBuilder::new(client),
            source,
            max_round_trips,
            enhance,
            on_stage,
        }
    }
}

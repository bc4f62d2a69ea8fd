mod builder;

use async_trait::async_trait;

use crate::analysis::{ClarificationRequest, Itinerary, TravelAnalysis};
use crate::analyzer::Analyzer;
use crate::error::Error;
use crate::itinerary::{BuildOutcome, ItineraryBuilder};
pub use builder::{DEFAULT_MAX_ROUND_TRIPS, OrchestratorBuilder};

/// Supplies answers to clarification requests, usually by asking the user.
#[async_trait]
pub trait ClarificationSource: Send + Sync {
    /// Returns an answer for the missing fields, or `None` to let the
    /// analyzer fill them on its own.
    async fn clarify(&self, request: &ClarificationRequest) -> Option<String>;
}

/// A clarification source that never answers, so every missing field is
/// filled by the analyzer.
#[derive(Clone, Copy, Debug, Default)]
pub struct UseDefaults;

#[async_trait]
impl ClarificationSource for UseDefaults {
    async fn clarify(&self, _request: &ClarificationRequest) -> Option<String> {
        None
    }
}

/// A step the orchestrator has reached, reported to the stage callback.
#[derive(Clone, Copy, Debug)]
pub enum Stage<'a> {
    /// A run started with this request.
    Start(&'a str),
    /// The request was analyzed, or a clarification was applied.
    Analyzed(&'a TravelAnalysis),
    /// Clarification round trip number `round_trip`, counting from 1.
    Clarifying {
        /// Number of this round trip.
        round_trip: usize,
        /// What the builder asked for.
        request: &'a ClarificationRequest,
    },
    /// The itinerary is ready.
    Done(&'a Itinerary),
}

type StageCallback = Box<dyn Fn(Stage<'_>) + Send + Sync>;

/// Drives a request from analysis to itinerary, going through as many
/// clarification round trips as needed, up to a ceiling.
pub struct Orchestrator {
    analyzer: Analyzer,
    builder: ItineraryBuilder,
    source: Box<dyn ClarificationSource>,
    max_round_trips: usize,
    enhance: bool,
    on_stage: Option<StageCallback>,
}

impl Orchestrator {
    /// Plans a trip for a free-text request.
    ///
    /// Fails with [`crate::ErrorKind::CoordinationExhausted`] if fields are
    /// still missing after the last allowed round trip. Errors from the
    /// analyzer or the builder end the run as they are.
    pub async fn run(&self, request: &str) -> Result<Itinerary, Error> {
        self.emit(Stage::Start(request));
        let mut record = self.analyzer.analyze(request).await?;

        let mut round_trips = 0;
        loop {
            self.emit(Stage::Analyzed(&record));
            let clarification = match self.builder.build(&record).await? {
                BuildOutcome::Itinerary(itinerary) => {
                    let itinerary = self.finish(itinerary).await;
                    self.emit(Stage::Done(&itinerary));
                    return Ok(itinerary);
                }
                BuildOutcome::Clarification(clarification) => clarification,
            };

            if round_trips >= self.max_round_trips {
                warn!(
                    "giving up after {round_trips} round trips, missing: {:?}",
                    clarification.missing_items
                );
                return Err(Error::coordination_exhausted(
                    clarification.missing_items,
                ));
            }
            round_trips += 1;
            self.emit(Stage::Clarifying {
                round_trip: round_trips,
                request: &clarification,
            });

            let answer = self.source.clarify(&clarification).await;
            record = self
                .analyzer
                .resolve_clarification(record, answer.as_deref())
                .await?;
        }
    }

    async fn finish(&self, itinerary: Itinerary) -> Itinerary {
        if !self.enhance {
            return itinerary;
        }
        match self.builder.enhance(&itinerary).await {
            Ok(enhanced) => enhanced,
            Err(err) => {
                warn!("keeping the plain itinerary, enhancement failed: {err}");
                itinerary
            }
        }
    }

    #[inline]
    fn emit(&self, stage: Stage<'_>) {
        debug!("stage: {stage:?}");
        if let Some(on_stage) = &self.on_stage {
            on_stage(stage);
        }
    }
}

use travel_planner_model::{ModelProvider, ModelRequest};

use crate::analysis::{ClarificationRequest, Itinerary, TravelAnalysis};
use crate::error::Error;
use crate::model_client::ModelClient;
use crate::prompts;

const CLARIFICATION_REASON: &str =
    "Need complete information to create a detailed itinerary";

/// What the builder produced from a record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The record was complete and an itinerary was drafted.
    Itinerary(Itinerary),
    /// The record still has missing fields.
    Clarification(ClarificationRequest),
}

/// Drafts itineraries from complete analyses.
#[derive(Clone)]
pub struct ItineraryBuilder {
    client: ModelClient,
}

impl ItineraryBuilder {
    /// Creates a builder backed by the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self::new(ModelClient::new(provider))
    }

    #[inline]
    pub(crate) fn new(client: ModelClient) -> Self {
        Self { client }
    }

    /// Drafts an itinerary, or asks for the fields that are still missing.
    ///
    /// The model is only called once nothing is missing. Its text is
    /// returned as is.
    pub async fn build(
        &self,
        record: &TravelAnalysis,
    ) -> Result<BuildOutcome, Error> {
        if !record.is_complete() {
            debug!("can't draft yet, missing: {:?}", record.missing_info);
            return Ok(BuildOutcome::Clarification(ClarificationRequest {
                missing_items: record.missing_info.clone(),
                reason: CLARIFICATION_REASON.to_owned(),
            }));
        }

        let preferences = if record.preferences.is_empty() {
            "none".to_owned()
        } else {
            record
                .preferences
                .iter()
                .map(|(name, value)| format!("{name}: {value}"))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let input = prompts::render(
            prompts::DRAFT_ITINERARY,
            &[
                ("destination", &record.destination),
                ("duration", record.duration.as_deref().unwrap_or("flexible")),
                ("purpose", &record.purpose),
                ("preferences", &preferences),
            ],
        );
        let req = ModelRequest::with_instructions(prompts::ADVISOR, input)
            .with_temperature(0.3);

        let text = self.client.complete(req).await?;
        debug!("drafted an itinerary, {} bytes", text.len());
        Ok(BuildOutcome::Itinerary(text.into()))
    }

    /// Asks the model to enrich an itinerary with practical details.
    pub async fn enhance(
        &self,
        itinerary: &Itinerary,
    ) -> Result<Itinerary, Error> {
        let input = prompts::render(
            prompts::ENHANCE_ITINERARY,
            &[("itinerary", itinerary.as_str())],
        );
        let req = ModelRequest::with_instructions(prompts::ADVISOR, input)
            .with_temperature(0.3);
        let text = self.client.complete(req).await?;
        Ok(text.into())
    }
}

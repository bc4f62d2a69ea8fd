use travel_planner_model::{ModelProvider, ModelRequest};

use crate::analysis::TravelAnalysis;
use crate::clarify::{self, DefaultValues};
use crate::error::{Error, ErrorKind};
use crate::model_client::ModelClient;
use crate::prompts;
use crate::structured::{parse_reply, response_format};

/// How missing fields are filled when the user gives no answer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ClarificationMode {
    /// Use the fixed defaults table, never calling the model.
    #[default]
    Defaults,
    /// Ask the model for sensible values, falling back to the fixed
    /// defaults if its reply can't be parsed.
    Model,
}

/// Extracts structured details from travel requests and fills the gaps
/// afterwards.
#[derive(Clone)]
pub struct Analyzer {
    client: ModelClient,
    mode: ClarificationMode,
}

impl Analyzer {
    /// Creates an analyzer backed by the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self::new(ModelClient::new(provider), ClarificationMode::default())
    }

    #[inline]
    pub(crate) fn new(client: ModelClient, mode: ClarificationMode) -> Self {
        Self { client, mode }
    }

    /// Sets how missing fields are filled.
    #[inline]
    pub fn with_clarification_mode(mut self, mode: ClarificationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Asks the model to pull destination, duration and purpose out of a
    /// free-text request.
    ///
    /// The returned record is normalized, see [`TravelAnalysis::normalize`].
    pub async fn analyze(
        &self,
        request: &str,
    ) -> Result<TravelAnalysis, Error> {
        let req = ModelRequest::with_instructions(
            prompts::ANALYZE_REQUEST,
            request,
        )
        .with_response_format(response_format::<TravelAnalysis>(
            "travel_analysis",
        ))
        .with_temperature(0.1);

        let reply = self.client.complete(req).await?;
        let analysis = parse_reply::<TravelAnalysis>(&reply)?.normalize();
        debug!(
            "analyzed the request, missing: {:?}",
            analysis.missing_info
        );
        Ok(analysis)
    }

    /// Fills every field listed in `record.missing_info`.
    ///
    /// Without `user_input`, the values come from the fixed defaults or,
    /// in [`ClarificationMode::Model`], from the model. Field names that
    /// match no known field stay missing. A record with nothing missing is
    /// returned unchanged, without calling the model.
    pub async fn resolve_clarification(
        &self,
        record: TravelAnalysis,
        user_input: Option<&str>,
    ) -> Result<TravelAnalysis, Error> {
        if record.is_complete() {
            return Ok(record);
        }

        let answered = user_input.is_some_and(|s| !s.trim().is_empty());
        if answered || self.mode == ClarificationMode::Defaults {
            return Ok(clarify::resolve_with_defaults(record, user_input));
        }

        let values = match self.suggest_defaults(&record).await {
            Ok(values) => values,
            Err(err) if err.kind() == ErrorKind::MalformedResponse => {
                warn!("ignoring the suggested defaults: {err}");
                DefaultValues::default()
            }
            Err(err) => return Err(err),
        };
        Ok(clarify::resolve_with(record, None, |field| {
            values.value_for(field)
        }))
    }

    async fn suggest_defaults(
        &self,
        record: &TravelAnalysis,
    ) -> Result<DefaultValues, Error> {
        let analysis = serde_json::to_string(record).map_err(|err| {
            Error::malformed_response().with_reason(err.to_string())
        })?;
        let instructions = prompts::render(
            prompts::PROVIDE_DEFAULTS,
            &[
                ("missing", &record.missing_info.join(", ")),
                ("analysis", &analysis),
            ],
        );
        let req = ModelRequest::with_instructions(
            instructions,
            "Suggest values for the missing details.",
        )
        .with_response_format(response_format::<DefaultValues>(
            "default_values",
        ))
        .with_temperature(0.1);

        let reply = self.client.complete(req).await?;
        parse_reply(&reply)
    }
}

#[cfg(test)]
mod tests {
    use travel_planner_model::ModelMessage;
    use travel_planner_test_model::TestModelProvider;

    use super::*;

    const JAPAN: &str = r#"{
        "destination": "Japan",
        "duration": null,
        "purpose": "Cherry Blossom Viewing",
        "missing_info": ["duration"]
    }"#;

    #[tokio::test]
    async fn test_analyze() {
        let mut provider = TestModelProvider::default();
        provider.push_text(JAPAN);

        let analyzer = Analyzer::with_model_provider(provider.clone());
        let analysis = analyzer
            .analyze("Plan a trip to Japan for cherry blossoms")
            .await
            .unwrap();
        assert_eq!(analysis.destination, "Japan");
        assert_eq!(analysis.missing_info, ["duration"]);

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        let req = &requests[0];
        assert_eq!(req.temperature, Some(0.1));
        assert_eq!(
            req.response_format.as_ref().map(|f| f.name.as_str()),
            Some("travel_analysis")
        );
        assert_eq!(
            req.messages[1],
            ModelMessage::User(
                "Plan a trip to Japan for cherry blossoms".to_owned()
            )
        );
    }

    #[tokio::test]
    async fn test_analyze_malformed() {
        let mut provider = TestModelProvider::default();
        provider.push_text("You should definitely visit Kyoto!");

        let analyzer = Analyzer::with_model_provider(provider);
        let err = analyzer.analyze("Japan please").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    }

    #[tokio::test]
    async fn test_resolve_with_defaults() {
        let provider = TestModelProvider::default();
        let analyzer = Analyzer::with_model_provider(provider.clone());
        let record = serde_json::from_str(JAPAN).unwrap();

        let resolved =
            analyzer.resolve_clarification(record, None).await.unwrap();
        assert_eq!(resolved.duration.as_deref(), Some("7 days"));
        assert!(resolved.is_complete());
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let provider = TestModelProvider::default();
        let analyzer = Analyzer::with_model_provider(provider.clone())
            .with_clarification_mode(ClarificationMode::Model);
        let record = TravelAnalysis {
            destination: "Paris".to_owned(),
            duration: Some("5 days".to_owned()),
            purpose: "General Travel".to_owned(),
            ..Default::default()
        };

        let once = analyzer
            .resolve_clarification(record.clone(), None)
            .await
            .unwrap();
        let twice = analyzer
            .resolve_clarification(once.clone(), None)
            .await
            .unwrap();
        assert_eq!(once, record);
        assert_eq!(twice, record);
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_with_model() {
        let mut provider = TestModelProvider::default();
        provider.push_text(r#"{"duration": "10 days"}"#);

        let analyzer = Analyzer::with_model_provider(provider.clone())
            .with_clarification_mode(ClarificationMode::Model);
        let record = serde_json::from_str(JAPAN).unwrap();
        let resolved =
            analyzer.resolve_clarification(record, None).await.unwrap();
        assert_eq!(resolved.duration.as_deref(), Some("10 days"));
        assert_eq!(provider.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_with_model_falls_back() {
        let mut provider = TestModelProvider::default();
        provider.push_text("Ten days sounds lovely.");

        let analyzer = Analyzer::with_model_provider(provider)
            .with_clarification_mode(ClarificationMode::Model);
        let record = serde_json::from_str(JAPAN).unwrap();
        let resolved =
            analyzer.resolve_clarification(record, None).await.unwrap();
        assert_eq!(resolved.duration.as_deref(), Some("7 days"));
    }

    #[tokio::test]
    async fn test_user_answer_skips_model() {
        let provider = TestModelProvider::default();
        let analyzer = Analyzer::with_model_provider(provider.clone())
            .with_clarification_mode(ClarificationMode::Model);
        let record = serde_json::from_str(JAPAN).unwrap();
        let resolved = analyzer
            .resolve_clarification(record, Some("two weeks"))
            .await
            .unwrap();
        assert_eq!(resolved.duration.as_deref(), Some("14 days"));
        assert!(provider.requests().is_empty());
    }
}

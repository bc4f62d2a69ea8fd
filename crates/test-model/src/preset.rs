use serde::{Deserialize, Serialize};
use travel_planner_model::{ErrorKind, ModelFinishReason};

/// The events in a preset response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetEvent {
    #[serde(rename = "message_delta")]
    MessageDelta(String),
}

/// A scripted reply for one model call.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Events in this response.
    pub events: Vec<PresetEvent>,
    /// Reported when the events are exhausted.
    #[serde(default = "default_finish_reason")]
    pub finish_reason: ModelFinishReason,
    /// If set, the request will fail in the first `failures` attempts.
    /// `Some(0)` means the request will fail infinitely.
    #[serde(default)]
    pub failures: Option<u64>,
}

fn default_finish_reason() -> ModelFinishReason {
    ModelFinishReason::Stop
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified events.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        Self {
            events: events.into(),
            finish_reason: ModelFinishReason::Stop,
            failures: None,
        }
    }

    /// Creates a `PresetResponse` that streams `text` in a few deltas.
    pub fn with_text(text: &str) -> Self {
        let mut events = Vec::new();
        let mut rest = text;
        while !rest.is_empty() {
            // Split on char boundaries only.
            let mut at = rest.len().min(16);
            while !rest.is_char_boundary(at) {
                at += 1;
            }
            let (head, tail) = rest.split_at(at);
            events.push(PresetEvent::MessageDelta(head.to_owned()));
            rest = tail;
        }
        Self::with_events(events)
    }

    /// Sets failure times before a successful response. `0` means the
    /// response will always be a failure.
    #[inline]
    pub fn with_failures(mut self, failures: u64) -> Self {
        self.failures = Some(failures);
        self
    }

    /// Overrides the finish reason.
    #[inline]
    pub fn with_finish_reason(mut self, reason: ModelFinishReason) -> Self {
        self.finish_reason = reason;
        self
    }
}

/// The kind reported for injected failures.
pub(crate) const FAILURE_KIND: ErrorKind = ErrorKind::RateLimitExceeded;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_deserialize() {
        let response = PresetResponse::with_events([
            PresetEvent::MessageDelta("Day 1: ".to_string()),
            PresetEvent::MessageDelta("arrive in Kyoto.".to_string()),
        ])
        .with_failures(2);

        let serialized = serde_json::to_string(&response).unwrap();
        let deserialized: PresetResponse =
            serde_json::from_str(&serialized).unwrap();

        assert_eq!(response, deserialized);
    }

    #[test]
    fn test_deserialize_defaults() {
        let deserialized: PresetResponse = serde_json::from_str(
            r#"{"events":[{"type":"message_delta","data":"hi"}]}"#,
        )
        .unwrap();
        assert_eq!(deserialized.finish_reason, ModelFinishReason::Stop);
        assert_eq!(deserialized.failures, None);
    }

    #[test]
    fn test_with_text() {
        let text = "Kyoto → Osaka → Nara, then back to Tokyo by train.";
        let response = PresetResponse::with_text(text);
        assert!(response.events.len() > 1);
        let joined: String = response
            .events
            .iter()
            .map(|PresetEvent::MessageDelta(delta)| delta.as_str())
            .collect();
        assert_eq!(joined, text);
    }
}

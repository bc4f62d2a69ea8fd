//! Structured replies: schemas sent to the model and parsing of its JSON.

use schemars::{JsonSchema, schema_for};
use serde::de::DeserializeOwned;
use travel_planner_model::ResponseFormat;

use crate::error::Error;

/// Builds a response format asking for a JSON object shaped like `T`.
pub(crate) fn response_format<T: JsonSchema>(name: &str) -> ResponseFormat {
    let mut schema = schema_for!(T).to_value();
    // Providers reject the meta-schema keyword.
    if let Some(object) = schema.as_object_mut() {
        object.remove("$schema");
    }
    ResponseFormat {
        name: name.to_owned(),
        schema,
    }
}

/// Parses a model reply as `T`, tolerating a surrounding Markdown fence.
pub(crate) fn parse_reply<T: DeserializeOwned>(
    reply: &str,
) -> Result<T, Error> {
    serde_json::from_str(strip_code_fence(reply)).map_err(|err| {
        Error::malformed_response()
            .with_reason(format!("{err}, the reply was: {reply:?}"))
    })
}

fn strip_code_fence(reply: &str) -> &str {
    let reply = reply.trim();
    let Some(body) = reply.strip_prefix("```") else {
        return reply;
    };
    // Skip the info string, e.g. "json".
    let body = body.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;
    use crate::ErrorKind;
    use crate::analysis::TravelAnalysis;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        city: String,
    }

    #[test]
    fn test_plain_json() {
        let sample: Sample = parse_reply(r#" {"city": "Lisbon"} "#).unwrap();
        assert_eq!(sample.city, "Lisbon");
    }

    #[test]
    fn test_fenced_json() {
        let reply = "```json\n{\"city\": \"Porto\"}\n```";
        let sample: Sample = parse_reply(reply).unwrap();
        assert_eq!(sample.city, "Porto");

        let reply = "```\n{\"city\": \"Faro\"}\n```\n";
        let sample: Sample = parse_reply(reply).unwrap();
        assert_eq!(sample.city, "Faro");
    }

    #[test]
    fn test_malformed() {
        let err = parse_reply::<Sample>("Sure! Here is your plan.").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
        assert!(err.reason().contains("Here is your plan"));
    }

    #[test]
    fn test_response_format() {
        let format = response_format::<TravelAnalysis>("travel_analysis");
        assert_eq!(format.name, "travel_analysis");
        assert!(format.schema.get("$schema").is_none());
        let properties = format.schema["properties"].as_object().unwrap();
        assert!(properties.contains_key("destination"));
        assert!(properties.contains_key("missing_info"));
        assert!(!properties.contains_key("preferences"));
    }
}

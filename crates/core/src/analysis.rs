//! Records handed between the planning roles.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

/// Structured details extracted from a free-text travel request.
///
/// `missing_info` behaves as an ordered set of lower-cased field names. The
/// record is only complete, and an itinerary may only be drafted from it,
/// once that set is empty.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema,
)]
pub struct TravelAnalysis {
    /// Where the traveller wants to go.
    #[serde(default, deserialize_with = "null_as_default")]
    #[schemars(with = "String", description = "The destination for the trip")]
    pub destination: String,
    /// How long the trip lasts, `None` when the request didn't say.
    #[serde(default)]
    #[schemars(
        description = "Duration of the trip (e.g. '5 days', '2 weeks'), \
                       null if not mentioned"
    )]
    pub duration: Option<String>,
    /// The main purpose of the trip.
    #[serde(default, deserialize_with = "null_as_default")]
    #[schemars(with = "String", description = "The main purpose of the trip")]
    pub purpose: String,
    /// Names of the fields that still need a value.
    #[serde(default, deserialize_with = "null_as_default")]
    #[schemars(
        with = "Vec<String>",
        description = "Names of missing critical information needed for \
                       planning, e.g. 'duration'"
    )]
    pub missing_info: Vec<String>,
    /// Extra details filled in during clarification, such as the budget.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    #[schemars(skip)]
    pub preferences: BTreeMap<String, String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl TravelAnalysis {
    /// Returns `true` if no field is missing.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.missing_info.is_empty()
    }

    /// Returns `true` if `name` is listed as missing.
    #[inline]
    pub fn is_missing(&self, name: &str) -> bool {
        let name = canonical_name(name);
        self.missing_info.iter().any(|n| *n == name)
    }

    /// Adds `name` to the missing fields unless it's already there.
    pub fn insert_missing(&mut self, name: &str) {
        let name = canonical_name(name);
        if !name.is_empty() && !self.missing_info.contains(&name) {
            self.missing_info.push(name);
        }
    }

    /// Removes `name` from the missing fields.
    pub fn remove_missing(&mut self, name: &str) {
        let name = canonical_name(name);
        self.missing_info.retain(|n| *n != name);
    }

    /// Cleans up a record as produced by the model.
    ///
    /// Text fields are trimmed and a blank duration becomes `None`. The
    /// missing names are canonicalized and deduplicated, keeping the first
    /// occurrence. A blank destination or an absent duration is always
    /// listed as missing, whatever the model said.
    pub fn normalize(self) -> Self {
        let Self {
            destination,
            duration,
            purpose,
            missing_info,
            preferences,
        } = self;

        let mut normalized = Self {
            destination: destination.trim().to_owned(),
            duration: duration
                .map(|d| d.trim().to_owned())
                .filter(|d| !d.is_empty()),
            purpose: purpose.trim().to_owned(),
            missing_info: Vec::with_capacity(missing_info.len()),
            preferences,
        };
        for name in &missing_info {
            normalized.insert_missing(name);
        }
        if normalized.destination.is_empty() {
            normalized.insert_missing("destination");
        }
        if normalized.duration.is_none() {
            normalized.insert_missing("duration");
        }
        normalized
    }
}

fn canonical_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A request from the itinerary builder for the fields it can't do without.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClarificationRequest {
    /// Names of the missing fields.
    pub missing_items: Vec<String>,
    /// Why the information is needed.
    pub reason: String,
}

/// A drafted itinerary, kept exactly as the model wrote it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Itinerary(String);

impl Itinerary {
    /// Returns the itinerary text.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the itinerary, returning its text.
    #[inline]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for Itinerary {
    #[inline]
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl Display for Itinerary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_deserialize_complete() {
        let analysis: TravelAnalysis = serde_json::from_value(json!({
            "destination": "Paris",
            "duration": "5 days",
            "purpose": "General Travel",
            "missing_info": []
        }))
        .unwrap();
        assert_eq!(analysis.destination, "Paris");
        assert_eq!(analysis.duration.as_deref(), Some("5 days"));
        assert!(analysis.is_complete());
        assert!(analysis.preferences.is_empty());
    }

    #[test]
    fn test_deserialize_nulls() {
        let analysis: TravelAnalysis = serde_json::from_value(json!({
            "destination": null,
            "duration": null,
            "purpose": "Business",
            "missing_info": null
        }))
        .unwrap();
        assert_eq!(analysis.destination, "");
        assert_eq!(analysis.duration, None);
        assert!(analysis.missing_info.is_empty());
    }

    #[test]
    fn test_normalize() {
        let analysis = TravelAnalysis {
            destination: " Japan ".to_owned(),
            duration: Some("  ".to_owned()),
            purpose: "Cherry Blossom Viewing".to_owned(),
            missing_info: vec![
                "Budget".to_owned(),
                " budget".to_owned(),
                String::new(),
            ],
            preferences: BTreeMap::new(),
        }
        .normalize();
        assert_eq!(analysis.destination, "Japan");
        assert_eq!(analysis.duration, None);
        assert_eq!(analysis.missing_info, ["budget", "duration"]);
    }

    #[test]
    fn test_normalize_blank_destination() {
        let analysis = TravelAnalysis {
            duration: Some("3 days".to_owned()),
            ..Default::default()
        }
        .normalize();
        assert_eq!(analysis.missing_info, ["destination"]);
    }

    #[test]
    fn test_missing_set() {
        let mut analysis = TravelAnalysis::default();
        analysis.insert_missing("Duration");
        analysis.insert_missing("duration");
        assert!(analysis.is_missing("DURATION"));
        assert_eq!(analysis.missing_info.len(), 1);
        analysis.remove_missing(" duration ");
        assert!(analysis.is_complete());
    }

    #[test]
    fn test_serialize_skips_empty_preferences() {
        let value = serde_json::to_value(TravelAnalysis::default()).unwrap();
        assert!(value.get("preferences").is_none());
    }
}

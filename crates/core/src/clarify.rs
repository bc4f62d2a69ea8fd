//! Filling in the fields an analysis left open.

use schemars::JsonSchema;
use serde::Deserialize;

use crate::analysis::TravelAnalysis;

/// A field the clarification step knows how to fill.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    /// Where the traveller goes.
    Destination,
    /// How long the trip lasts.
    Duration,
    /// Why the traveller goes.
    Purpose,
    /// How much the traveller wants to spend.
    Budget,
    /// Where the traveller sleeps.
    Accommodation,
    /// How the traveller gets around.
    Transportation,
}

// Whole names, compared after normalization.
const ALIASES: &[(Field, &[&str])] = &[
    (
        Field::Duration,
        &[
            "duration",
            "length",
            "how long",
            "dates",
            "travel dates",
            "trip length",
            "length of stay",
            "number of days",
            "days",
            "nights",
        ],
    ),
    (
        Field::Destination,
        &[
            "destination",
            "destination city",
            "destination country",
            "where",
            "where to go",
            "place to visit",
            "country",
            "city",
        ],
    ),
    (
        Field::Purpose,
        &[
            "purpose",
            "purpose of visit",
            "purpose of trip",
            "reason",
            "goal",
            "interests",
            "occasion",
        ],
    ),
    (
        Field::Budget,
        &["budget", "budget range", "cost", "price range", "spending"],
    ),
    (
        Field::Accommodation,
        &[
            "accommodation",
            "accommodations",
            "accommodation type",
            "lodging",
            "hotel",
            "where to stay",
            "place to stay",
        ],
    ),
    (
        Field::Transportation,
        &[
            "transportation",
            "transport",
            "local transportation",
            "getting around",
            "travel mode",
        ],
    ),
];

// Words that name a single field wherever they appear in a name.
const FIELD_WORDS: &[(Field, &[&str])] = &[
    (Field::Duration, &["duration"]),
    (Field::Destination, &["destination"]),
    (Field::Purpose, &["purpose"]),
    (Field::Budget, &["budget"]),
    (Field::Accommodation, &["accommodation", "hotel", "lodging"]),
    (Field::Transportation, &["transport"]),
];

const NAME_PREFIXES: &[&str] = &["trip ", "travel ", "preferred ", "desired "];

impl Field {
    /// Recognizes a field from a name the model used for it.
    ///
    /// `"trip_duration"`, `"Travel dates"` and `"how long"` all name
    /// [`Field::Duration`]. Generic words are only understood as a whole
    /// name, so `"departure city"` matches no field while `"city"` is a
    /// destination. Returns `None` for names that match no field, such as
    /// `"visa status"`.
    pub fn parse(name: &str) -> Option<Field> {
        let name = name.to_lowercase().replace(['_', '-'], " ");
        let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
        let stripped = NAME_PREFIXES
            .iter()
            .find_map(|prefix| name.strip_prefix(prefix))
            .unwrap_or(&name);

        let by_alias = ALIASES.iter().find(|(_, aliases)| {
            aliases.contains(&name.as_str()) || aliases.contains(&stripped)
        });
        let by_word = || {
            FIELD_WORDS.iter().find(|(_, words)| {
                words.iter().any(|word| name.contains(word))
            })
        };
        by_alias.or_else(by_word).map(|(field, _)| *field)
    }

    /// Returns the canonical name of the field.
    pub fn key(self) -> &'static str {
        match self {
            Field::Destination => "destination",
            Field::Duration => "duration",
            Field::Purpose => "purpose",
            Field::Budget => "budget",
            Field::Accommodation => "accommodation",
            Field::Transportation => "transportation",
        }
    }

    /// Returns the value used when nobody supplies one.
    pub fn default_value(self) -> &'static str {
        match self {
            Field::Destination => "India",
            Field::Duration => "7 days",
            Field::Purpose => "General Travel",
            Field::Budget => "moderate",
            Field::Accommodation => "hotel",
            Field::Transportation => "public transport",
        }
    }

    fn has_value(self, record: &TravelAnalysis) -> bool {
        match self {
            Field::Destination => !record.destination.trim().is_empty(),
            Field::Duration => record.duration.is_some(),
            Field::Purpose => !record.purpose.trim().is_empty(),
            Field::Budget | Field::Accommodation | Field::Transportation => {
                record.preferences.contains_key(self.key())
            }
        }
    }

    fn apply(self, record: &mut TravelAnalysis, value: String) {
        match self {
            Field::Destination => record.destination = value,
            Field::Duration => record.duration = Some(value),
            Field::Purpose => record.purpose = value,
            Field::Budget | Field::Accommodation | Field::Transportation => {
                record.preferences.insert(self.key().to_owned(), value);
            }
        }
    }
}

/// Values suggested by the model for missing fields.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema)]
pub(crate) struct DefaultValues {
    #[serde(default)]
    destination: Option<String>,
    #[serde(default)]
    duration: Option<String>,
    #[serde(default)]
    purpose: Option<String>,
    #[serde(default)]
    budget: Option<String>,
    #[serde(default)]
    accommodation: Option<String>,
    #[serde(default)]
    transportation: Option<String>,
}

impl DefaultValues {
    /// Returns the suggestion for `field`, or the fixed default when the
    /// model left it out.
    pub(crate) fn value_for(&self, field: Field) -> String {
        let suggested = match field {
            Field::Destination => &self.destination,
            Field::Duration => &self.duration,
            Field::Purpose => &self.purpose,
            Field::Budget => &self.budget,
            Field::Accommodation => &self.accommodation,
            Field::Transportation => &self.transportation,
        };
        suggested
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(field.default_value())
            .to_owned()
    }
}

/// Fills the missing fields of `record` from `user_input` and the fixed
/// defaults.
///
/// A record with nothing missing is returned as is.
pub fn resolve_with_defaults(
    record: TravelAnalysis,
    user_input: Option<&str>,
) -> TravelAnalysis {
    resolve_with(record, user_input, |field| field.default_value().to_owned())
}

/// Like [`resolve_with_defaults`], but asks `fallback` for every field the
/// user input doesn't cover.
pub(crate) fn resolve_with(
    mut record: TravelAnalysis,
    user_input: Option<&str>,
    mut fallback: impl FnMut(Field) -> String,
) -> TravelAnalysis {
    if record.is_complete() {
        return record;
    }

    let input = user_input.map(str::trim).filter(|s| !s.is_empty());
    let mut duration = input.and_then(parse_duration);
    let mut free_text = input.filter(|_| duration.is_none());

    let names = std::mem::take(&mut record.missing_info);
    let fields: Vec<_> = names.iter().filter_map(|n| Field::parse(n)).collect();
    let text_field = [Field::Destination, Field::Purpose]
        .into_iter()
        .find(|f| fields.contains(f));

    let mut filled = Vec::with_capacity(fields.len());
    for name in names {
        let Some(field) = Field::parse(&name) else {
            warn!("no value is known for `{name}`, it stays missing");
            record.missing_info.push(name);
            continue;
        };
        if filled.contains(&field) {
            continue;
        }
        if field.has_value(&record) {
            debug!("`{name}` is already known as {}", field.key());
            filled.push(field);
            continue;
        }

        let answer = match field {
            Field::Duration => duration.take(),
            _ if Some(field) == text_field => {
                free_text.take().map(str::to_owned)
            }
            _ => None,
        };
        let value = answer.unwrap_or_else(|| fallback(field));
        debug!("filled `{name}` with {value:?}");
        field.apply(&mut record, value);
        filled.push(field);
    }
    record
}

/// Reads a trip length out of a free-form answer.
///
/// Understands "5 days", "5days", "3 nights", "2 weeks", "a week", "two
/// weeks", "a weekend" and a bare "10". A count may be a word or two away
/// from its unit, as in "3 relaxing days". Returns `None` if no length is
/// found.
pub fn parse_duration(input: &str) -> Option<String> {
    let input = input.to_lowercase();

    let mut count = None;
    let mut words_since_count = 0;
    let mut bare_number = None;
    for token in tokens(&input) {
        if token.starts_with(|c: char| c.is_ascii_digit()) {
            // Only digits, so a failed parse means it overflowed.
            let n = token.parse().unwrap_or(u32::MAX);
            count = Some(n);
            bare_number = Some(n);
            words_since_count = 0;
            continue;
        }
        if let Some(n) = parse_count(token) {
            count = Some(n);
            words_since_count = 0;
            continue;
        }
        let unit = match token {
            "day" | "days" | "night" | "nights" => 1,
            "week" | "weeks" => 7,
            "fortnight" | "fortnights" => 14,
            "month" | "months" => 30,
            "weekend" | "weekends" => 2,
            "of" | "full" | "whole" => continue,
            _ => {
                words_since_count += 1;
                if words_since_count > 2 {
                    count = None;
                }
                continue;
            }
        };
        return Some(format_days(count.unwrap_or(1).saturating_mul(unit)));
    }
    bare_number.map(format_days)
}

/// Splits `input` into runs of digits and runs of letters.
fn tokens(input: &str) -> impl Iterator<Item = &str> {
    let mut rest = input;
    std::iter::from_fn(move || {
        rest = rest.trim_start_matches(|c: char| !c.is_alphanumeric());
        let first = rest.chars().next()?;
        let is_digit = first.is_ascii_digit();
        let end = rest
            .find(|c: char| {
                !c.is_alphanumeric() || c.is_ascii_digit() != is_digit
            })
            .unwrap_or(rest.len());
        let (token, tail) = rest.split_at(end);
        rest = tail;
        Some(token)
    })
}

fn parse_count(word: &str) -> Option<u32> {
    let n = match word {
        "a" | "an" | "one" => 1,
        "two" | "couple" => 2,
        "three" | "few" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        "fourteen" => 14,
        "twenty" => 20,
        "thirty" => 30,
        _ => return None,
    };
    Some(n)
}

fn format_days(days: u32) -> String {
    if days == 1 {
        "1 day".to_owned()
    } else {
        format!("{days} days")
    }
}

use std::env;
use std::fmt::{self, Debug, Display};
use std::str::FromStr;

use travel_planner_core::{
    ClarificationMode, DEFAULT_MAX_ROUND_TRIPS, OrchestratorBuilder,
};
use travel_planner_openai_model::{
    OpenAIConfig, OpenAIConfigBuilder, OpenAIProvider,
};

/// How the planner deals with missing details.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ClarificationPolicy {
    /// Ask the user, falling back to the fixed defaults on an empty answer.
    #[default]
    Ask,
    /// Always use the fixed defaults.
    Defaults,
    /// Let the model suggest values.
    Model,
}

impl ClarificationPolicy {
    /// Returns the mode the analyzer runs in under this policy.
    #[inline]
    pub fn mode(self) -> ClarificationMode {
        match self {
            ClarificationPolicy::Ask | ClarificationPolicy::Defaults => {
                ClarificationMode::Defaults
            }
            ClarificationPolicy::Model => ClarificationMode::Model,
        }
    }
}

impl FromStr for ClarificationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ask" => Ok(ClarificationPolicy::Ask),
            "defaults" => Ok(ClarificationPolicy::Defaults),
            "model" => Ok(ClarificationPolicy::Model),
            other => Err(format!(
                "unknown policy `{other}`, expected `ask`, `defaults` or \
                 `model`"
            )),
        }
    }
}

/// An invalid or missing environment variable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigError {
    var: &'static str,
    reason: String,
}

impl ConfigError {
    #[inline]
    fn new<S: Into<String>>(var: &'static str, reason: S) -> Self {
        Self {
            var,
            reason: reason.into(),
        }
    }

    /// Returns the name of the offending variable.
    #[inline]
    pub fn var(&self) -> &str {
        self.var
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.var, self.reason)
    }
}

impl std::error::Error for ConfigError {}

/// Settings of the travel planner, usually read from the environment.
///
/// | variable | default |
/// |----------|---------|
/// | `OPENAI_API_KEY` | required |
/// | `OPENAI_BASE_URL` | `https://api.openai.com/v1` |
/// | `OPENAI_MODEL` | `gpt-4o-mini` |
/// | `TRAVEL_PLANNER_CLARIFICATION` | `ask` |
/// | `TRAVEL_PLANNER_MAX_ROUND_TRIPS` | `5` |
/// | `TRAVEL_PLANNER_ENHANCE` | `false` |
#[derive(Clone)]
pub struct Config {
    api_key: String,
    base_url: Option<String>,
    model: Option<String>,
    clarification: ClarificationPolicy,
    max_round_trips: usize,
    enhance: bool,
}

impl Config {
    /// Reads the configuration from the process environment.
    #[inline]
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, which returns the value
    /// of a variable. Blank values count as unset.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let api_key = get("OPENAI_API_KEY")
            .ok_or_else(|| ConfigError::new("OPENAI_API_KEY", "not set"))?;

        let clarification = match get("TRAVEL_PLANNER_CLARIFICATION") {
            Some(value) => {
                value.parse::<ClarificationPolicy>().map_err(|reason| {
                    ConfigError::new("TRAVEL_PLANNER_CLARIFICATION", reason)
                })?
            }
            None => ClarificationPolicy::default(),
        };

        let max_round_trips = match get("TRAVEL_PLANNER_MAX_ROUND_TRIPS") {
            Some(value) => match value.parse::<usize>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    return Err(ConfigError::new(
                        "TRAVEL_PLANNER_MAX_ROUND_TRIPS",
                        format!("expected a positive number, got `{value}`"),
                    ));
                }
            },
            None => DEFAULT_MAX_ROUND_TRIPS,
        };

        let enhance = match get("TRAVEL_PLANNER_ENHANCE") {
            Some(value) => parse_flag(&value).ok_or_else(|| {
                ConfigError::new(
                    "TRAVEL_PLANNER_ENHANCE",
                    format!("expected `true` or `false`, got `{value}`"),
                )
            })?,
            None => false,
        };

        Ok(Self {
            api_key,
            base_url: get("OPENAI_BASE_URL"),
            model: get("OPENAI_MODEL"),
            clarification,
            max_round_trips,
            enhance,
        })
    }

    /// Returns how missing details are dealt with.
    #[inline]
    pub fn clarification(&self) -> ClarificationPolicy {
        self.clarification
    }

    /// Returns the number of clarification round trips allowed per request.
    #[inline]
    pub fn max_round_trips(&self) -> usize {
        self.max_round_trips
    }

    /// Returns `true` if itineraries get a second, more detailed pass.
    #[inline]
    pub fn enhance(&self) -> bool {
        self.enhance
    }

    /// Returns the configuration of the model provider.
    pub fn provider_config(&self) -> OpenAIConfig {
        let mut builder = OpenAIConfigBuilder::with_api_key(&self.api_key);
        if let Some(base_url) = &self.base_url {
            builder = builder.with_base_url(base_url);
        }
        if let Some(model) = &self.model {
            builder = builder.with_model(model);
        }
        builder.build()
    }

    /// Returns an orchestrator builder set up with this configuration.
    ///
    /// The clarification source is left as is, hosts that ask the user
    /// should attach their own.
    pub fn orchestrator_builder(&self) -> OrchestratorBuilder {
        let provider = OpenAIProvider::new(self.provider_config());
        OrchestratorBuilder::with_model_provider(provider)
            .with_clarification_mode(self.clarification.mode())
            .with_max_round_trips(self.max_round_trips)
            .with_enhancement(self.enhance)
    }
}

impl Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("clarification", &self.clarification)
            .field("max_round_trips", &self.max_round_trips)
            .field("enhance", &self.enhance)
            .finish()
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

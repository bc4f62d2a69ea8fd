use std::borrow::Cow;
use std::fmt::{self, Display};

use travel_planner_model::{
    ErrorKind as ProviderErrorKind, ModelProviderError,
};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The model's reply could not be parsed as the expected structure.
    MalformedResponse,
    /// The round-trip ceiling was reached while fields were still missing.
    CoordinationExhausted,
    /// The hosted model could not be reached or refused the request.
    ExternalCallFailure,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::MalformedResponse => write!(f, "Malformed response"),
            ErrorKind::CoordinationExhausted => {
                write!(f, "Coordination exhausted")
            }
            ErrorKind::ExternalCallFailure => {
                write!(f, "External call failure")
            }
        }
    }
}

/// Describes a planning error.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Error {
    kind: ErrorKind,
    reason: Option<String>,
    provider_kind: Option<ProviderErrorKind>,
    missing_fields: Vec<String>,
}

impl Error {
    #[inline]
    fn with_kind(kind: ErrorKind) -> Self {
        Self {
            kind,
            reason: None,
            provider_kind: None,
            missing_fields: vec![],
        }
    }

    /// Creates a new error with the `MalformedResponse` kind.
    #[inline]
    pub fn malformed_response() -> Self {
        Self::with_kind(ErrorKind::MalformedResponse)
    }

    /// Creates a new error with the `CoordinationExhausted` kind, naming
    /// the fields that were still missing.
    pub fn coordination_exhausted(missing_fields: Vec<String>) -> Self {
        let reason = format!(
            "still missing {} after the last round trip",
            missing_fields.join(", ")
        );
        Self {
            missing_fields,
            ..Self::with_kind(ErrorKind::CoordinationExhausted)
        }
        .with_reason(reason)
    }

    /// Creates a new error with the `ExternalCallFailure` kind.
    #[inline]
    pub fn external_call_failure(provider_kind: ProviderErrorKind) -> Self {
        Self {
            provider_kind: Some(provider_kind),
            ..Self::with_kind(ErrorKind::ExternalCallFailure)
        }
    }

    /// Attaches a reason to the error.
    #[inline]
    pub fn with_reason<S: Into<String>>(self, reason: S) -> Self {
        Self {
            reason: Some(reason.into()),
            ..self
        }
    }

    /// Returns the kind of the error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the provider's own error kind for external call failures.
    #[inline]
    pub fn provider_kind(&self) -> Option<ProviderErrorKind> {
        self.provider_kind
    }

    /// Returns the fields that could not be resolved, only set for
    /// `CoordinationExhausted`.
    #[inline]
    pub fn missing_fields(&self) -> &[String] {
        &self.missing_fields
    }

    /// Returns the reason for the error.
    #[inline]
    pub fn reason(&self) -> Cow<'_, str> {
        match self.reason.as_deref() {
            Some(reason) => Cow::Borrowed(reason),
            None => Cow::Owned(format!("{}", self.kind)),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.reason, self.provider_kind) {
            (Some(reason), Some(provider_kind)) => {
                write!(f, "{} ({provider_kind}): {reason}", self.kind)
            }
            (Some(reason), None) => write!(f, "{}: {reason}", self.kind),
            (None, _) => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for Error {}

impl From<Box<dyn ModelProviderError>> for Error {
    fn from(err: Box<dyn ModelProviderError>) -> Self {
        Error::external_call_failure(err.kind()).with_reason(err.to_string())
    }
}

//! A model provider for OpenAI-compatible chat completion APIs.

#[macro_use]
extern crate tracing;

mod config;
mod io;
mod proto;
mod response;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use backoff::ExponentialBackoff;
use mime::Mime;
use reqwest::{Client, Response, StatusCode, header};
use travel_planner_model::{
    ErrorKind, ModelProvider, ModelProviderError, ModelRequest,
};

pub use config::{OpenAIConfig, OpenAIConfigBuilder};
use io::{Chunks, Sse};
use proto::ErrorBody;
use response::OpenAIResponse;

/// Error type for [`OpenAIProvider`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// OpenAI-compatible model provider.
///
/// Replies are always streamed. Requests rejected with HTTP 429 are retried
/// with an exponential backoff until the configured retry timeout elapses,
/// every other failure is returned right away.
#[derive(Clone, Debug)]
pub struct OpenAIProvider {
    client: Client,
    config: Arc<OpenAIConfig>,
}

impl OpenAIProvider {
    /// Creates a new `OpenAIProvider` with the given configuration.
    #[inline]
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }
}

impl ModelProvider for OpenAIProvider {
    type Error = Error;
    type Response = OpenAIResponse;

    #[inline]
    fn model_id(&self) -> &str {
        &self.config.model
    }

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let openai_req = proto::create_request(req, &self.config);
        let client = self.client.clone();
        let config = Arc::clone(&self.config);

        async move {
            let policy = ExponentialBackoff {
                max_elapsed_time: Some(config.retry_timeout),
                ..Default::default()
            };
            let resp = backoff::future::retry(policy, || {
                let resp_fut = client
                    .post(config.chat_completions_url())
                    .header(
                        header::AUTHORIZATION,
                        format!("Bearer {}", config.api_key),
                    )
                    .header(header::ACCEPT, "text/event-stream")
                    .json(&openai_req)
                    .send();
                async move {
                    let resp = resp_fut.await.map_err(|err| {
                        backoff::Error::permanent(Error::new(
                            format!("{err}"),
                            ErrorKind::Other,
                        ))
                    })?;
                    check_status(resp).await.map_err(|err| {
                        if err.kind == ErrorKind::RateLimitExceeded {
                            warn!("rate limited, will retry: {err}");
                            backoff::Error::transient(err)
                        } else {
                            backoff::Error::permanent(err)
                        }
                    })
                }
            })
            .await
            .inspect_err(|err| error!("request failed: {err}"))?;

            let content_type = resp
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok());
            let is_event_stream = content_type
                .and_then(|v| v.parse().ok())
                .map(|m: Mime| m.subtype().as_str() == "event-stream")
                .unwrap_or(false);
            if !is_event_stream {
                return Err(Error::new(
                    format!("Unexpected content type: {content_type:?}"),
                    ErrorKind::Other,
                ));
            }

            // Here we got a successful response.
            let chunks = Chunks::from_response(resp);
            let sse = Sse::new(chunks);
            Ok(OpenAIResponse::from_sse(sse))
        }
    }
}

/// Turns a non-success response into an [`Error`], keeping the message the
/// server sent when there is one.
async fn check_status(resp: Response) -> Result<Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&body)
        .map(|body| body.error.message)
        .unwrap_or(body);
    Err(Error::new(
        format!("{status}: {detail}"),
        error_kind_for_status(status),
    ))
}

fn error_kind_for_status(status: StatusCode) -> ErrorKind {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ErrorKind::Unauthorized
        }
        StatusCode::TOO_MANY_REQUESTS => ErrorKind::RateLimitExceeded,
        _ => ErrorKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_for_status() {
        assert_eq!(
            error_kind_for_status(StatusCode::UNAUTHORIZED),
            ErrorKind::Unauthorized
        );
        assert_eq!(
            error_kind_for_status(StatusCode::TOO_MANY_REQUESTS),
            ErrorKind::RateLimitExceeded
        );
        assert_eq!(
            error_kind_for_status(StatusCode::BAD_GATEWAY),
            ErrorKind::Other
        );
    }

    #[test]
    fn test_model_id() {
        let provider = OpenAIProvider::new(
            OpenAIConfigBuilder::with_api_key("xxx")
                .with_model("gpt-4.1-mini")
                .build(),
        );
        assert_eq!(provider.model_id(), "gpt-4.1-mini");
    }
}

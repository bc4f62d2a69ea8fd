//! A local fake model for testing purpose.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use tokio::time::{Sleep, sleep};
use travel_planner_model::{
    ErrorKind, ModelFinishReason, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent,
};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestModelResponse {
    events: Vec<PresetEvent>,
    finish_reason: ModelFinishReason,
    event_idx: usize,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();
        let delay = this.delay;
        let sleep = this.sleep.get_or_insert_with(|| Box::pin(sleep(delay)));
        ready!(sleep.as_mut().poll(cx));
        this.sleep = None;

        let idx = this.event_idx;
        this.event_idx += 1;
        if let Some(PresetEvent::MessageDelta(delta)) = this.events.get(idx) {
            return Poll::Ready(Ok(Some(ModelResponseEvent::MessageDelta(
                delta.clone(),
            ))));
        }
        if idx == this.events.len() {
            return Poll::Ready(Ok(Some(ModelResponseEvent::Completed(
                this.finish_reason,
            ))));
        }
        // In case this method is called after completion.
        Poll::Ready(Ok(None))
    }
}

#[derive(Default)]
struct Script {
    responses: VecDeque<PresetResponse>,
    failed_attempts: u64,
    requests: Vec<ModelRequest>,
}

/// A local fake model for testing purpose.
///
/// Before sending requests, you need to push the replies the model should
/// give, in call order. Every request consumes the next reply regardless of
/// its content. If the script runs out, an error will be returned.
///
/// Clones share the same script, so a test can keep a clone around to
/// inspect the requests that were made.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    script: Arc<Mutex<Script>>,
    delay: Option<Duration>,
}

impl TestModelProvider {
    #[inline]
    pub fn push_response(&mut self, preset: PresetResponse) {
        self.lock().responses.push_back(preset);
    }

    /// Shorthand for pushing a plain text reply.
    #[inline]
    pub fn push_text(&mut self, text: &str) {
        self.push_response(PresetResponse::with_text(text));
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns every request received so far, failed attempts included.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.lock().requests.clone()
    }

    /// Returns how many scripted replies have not been consumed.
    pub fn remaining(&self) -> usize {
        self.lock().responses.len()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        // A panicking test may poison the lock, the script is still usable.
        self.script.lock().unwrap_or_else(|err| err.into_inner())
    }

    fn next_response(
        &self,
        req: &ModelRequest,
    ) -> Result<PresetResponse, Error> {
        let mut script = self.lock();
        script.requests.push(req.clone());

        let Some(front) = script.responses.front() else {
            return Err(Error {
                message: "no enough steps",
                kind: ErrorKind::Other,
            });
        };
        match front.failures {
            Some(0) => {
                return Err(Error {
                    message: "injected failure",
                    kind: FAILURE_KIND,
                });
            }
            Some(failures) if script.failed_attempts < failures => {
                script.failed_attempts += 1;
                return Err(Error {
                    message: "injected failure",
                    kind: FAILURE_KIND,
                });
            }
            _ => {}
        }

        script.failed_attempts = 0;
        script.responses.pop_front().ok_or(Error {
            message: "no enough steps",
            kind: ErrorKind::Other,
        })
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn model_id(&self) -> &str {
        "test-model"
    }

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let result = self.next_response(req).map(|preset| TestModelResponse {
            events: preset.events,
            finish_reason: preset.finish_reason,
            event_idx: 0,
            delay: self.delay.unwrap_or(Duration::from_millis(1)),
            sleep: None,
        });
        ready(result)
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use travel_planner_model::ModelRequest;

    use super::*;

    async fn collect_response(
        resp: TestModelResponse,
    ) -> (String, Option<ModelFinishReason>) {
        let mut resp = pin!(resp);
        let mut msg = String::new();
        let mut finish_reason = None;
        while let Some(event) = poll_fn(|cx| resp.as_mut().poll_next_event(cx))
            .await
            .unwrap()
        {
            match event {
                ModelResponseEvent::Completed(reason) => {
                    finish_reason = Some(reason)
                }
                ModelResponseEvent::MessageDelta(delta) => {
                    msg.push_str(&delta);
                }
            }
        }
        (msg, finish_reason)
    }

    #[tokio::test]
    async fn test_send_request() {
        let mut provider = TestModelProvider::default();
        provider.push_response(PresetResponse::with_events([
            PresetEvent::MessageDelta("Hello, ".to_owned()),
            PresetEvent::MessageDelta("world!".to_owned()),
        ]));
        provider.push_response(
            PresetResponse::with_text("Day 1: Shinjuku")
                .with_finish_reason(ModelFinishReason::Length),
        );

        let req = ModelRequest::with_instructions("Be brief.", "Hi");
        let resp = provider.send_request(&req).await.unwrap();
        let (msg, reason) = collect_response(resp).await;
        assert_eq!(msg, "Hello, world!");
        assert_eq!(reason, Some(ModelFinishReason::Stop));

        let resp = provider.send_request(&req).await.unwrap();
        let (msg, reason) = collect_response(resp).await;
        assert_eq!(msg, "Day 1: Shinjuku");
        assert_eq!(reason, Some(ModelFinishReason::Length));

        assert_eq!(provider.requests().len(), 2);
        assert_eq!(provider.remaining(), 0);
        let err = provider.send_request(&req).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Other);
    }

    #[tokio::test]
    async fn test_failures() {
        let mut provider = TestModelProvider::default();
        provider
            .push_response(PresetResponse::with_text("ok").with_failures(2));

        let req = ModelRequest::with_instructions("sys", "hi");
        for _ in 0..2 {
            let err = provider.send_request(&req).await.err().unwrap();
            assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
        }
        let resp = provider.send_request(&req).await.unwrap();
        assert_eq!(collect_response(resp).await.0, "ok");
        assert_eq!(provider.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_infinite_failures() {
        let mut provider = TestModelProvider::default();
        provider.push_response(
            PresetResponse::with_text("never").with_failures(0),
        );

        let req = ModelRequest::with_instructions("sys", "hi");
        for _ in 0..5 {
            assert!(provider.send_request(&req).await.is_err());
        }
        assert_eq!(provider.remaining(), 1);
    }

    #[tokio::test]
    async fn test_clones_share_script() {
        let mut provider = TestModelProvider::default();
        let observer = provider.clone();
        provider.push_text("shared");

        let req = ModelRequest::with_instructions("sys", "hi");
        provider.send_request(&req).await.unwrap();
        assert_eq!(observer.requests(), vec![req]);
        assert_eq!(observer.remaining(), 0);
    }
}

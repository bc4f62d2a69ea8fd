use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;

use travel_planner_model::{
    ErrorKind as ProviderErrorKind, ModelFinishReason, ModelProvider,
    ModelProviderError, ModelRequest, ModelResponse, ModelResponseEvent,
};
use tracing::Instrument;

use crate::error::Error;

type SendRequestResult =
    Result<ModelClientResponse, Box<dyn ModelProviderError>>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
type HandlerFn =
    Arc<dyn Fn(ModelRequest) -> BoxedSendRequestFuture + Send + Sync>;

/// A wrapper around a model provider that provides a type-erased interface
/// for the roles, so that they can share one provider without carrying its
/// type around.
#[derive(Clone)]
pub struct ModelClient {
    model_id: Arc<str>,
    handler_fn: HandlerFn,
}

impl ModelClient {
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        let model_id = Arc::from(provider.model_id());
        let handler_fn: HandlerFn = Arc::new(move |req| {
            let fut = provider.send_request(&req);
            Box::pin(
                async move {
                    trace!("got a request: {:?}", req);
                    let resp_or_err = fut.await;
                    handle_response::<P>(resp_or_err).await
                }
                .instrument(trace_span!("model client req")),
            )
        });
        Self {
            model_id,
            handler_fn,
        }
    }

    #[inline]
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Sends a request and returns the fully received response.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. The response stops streaming further
    /// events when this operation is cancelled.
    #[inline]
    pub async fn send_request(
        &self,
        req: ModelRequest,
    ) -> Result<ModelClientResponse, Box<dyn ModelProviderError>> {
        (self.handler_fn)(req).await
    }

    /// Sends a request and returns the reply text, mapping every provider
    /// failure to [`crate::ErrorKind::ExternalCallFailure`].
    pub async fn complete(&self, req: ModelRequest) -> Result<String, Error> {
        let resp = self.send_request(req).await?;
        match resp.finish_reason {
            Some(ModelFinishReason::ContentFilter) => {
                Err(Error::external_call_failure(ProviderErrorKind::Moderated)
                    .with_reason("the reply was withheld by a content filter"))
            }
            Some(ModelFinishReason::Length) => {
                warn!("the reply was cut off by the token limit");
                Ok(resp.text)
            }
            Some(ModelFinishReason::Stop) => Ok(resp.text),
            None => Err(Error::external_call_failure(ProviderErrorKind::Other)
                .with_reason("the reply ended without a finish reason")),
        }
    }
}

/// A completely received response from the model client.
#[derive(Clone, Debug)]
pub struct ModelClientResponse {
    pub text: String,
    /// The reason the model finished generating.
    pub finish_reason: Option<ModelFinishReason>,
}

async fn handle_response<P: ModelProvider + 'static>(
    resp_or_err: Result<P::Response, P::Error>,
) -> SendRequestResult {
    let resp = match resp_or_err {
        Ok(resp) => resp,
        Err(err) => {
            error!("got an error: {err:?}");
            return Err(Box::new(err));
        }
    };

    let mut text = String::new();
    let mut finish_reason = None;

    trace!("start receiving events");

    let mut pinned_resp = pin!(resp);
    loop {
        let event_or_err =
            poll_fn(|cx| pinned_resp.as_mut().poll_next_event(cx)).await;
        let event = match event_or_err {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(err) => {
                error!("got an error: {err:?}");
                return Err(Box::new(err));
            }
        };
        trace!("got an event: {event:?}");

        match event {
            ModelResponseEvent::MessageDelta(delta) => text.push_str(&delta),
            ModelResponseEvent::Completed(reason) => {
                finish_reason = Some(reason);
            }
        }
    }

    trace!("finished a request, {} bytes received", text.len());

    Ok(ModelClientResponse {
        text,
        finish_reason,
    })
}

#[cfg(test)]
mod tests {
    use travel_planner_test_model::{
        PresetEvent, PresetResponse, TestModelProvider,
    };

    use super::*;
    use crate::ErrorKind;

    fn request() -> ModelRequest {
        ModelRequest::with_instructions("Be brief.", "Hi")
    }

    #[tokio::test]
    async fn test_send_request() {
        let mut model_provider = TestModelProvider::default();
        for _ in 0..3 {
            model_provider.push_response(PresetResponse::with_events([
                PresetEvent::MessageDelta("How ".to_owned()),
                PresetEvent::MessageDelta("are ".to_owned()),
                PresetEvent::MessageDelta("you?".to_owned()),
            ]));
        }

        let model_client = ModelClient::new(model_provider);
        assert_eq!(model_client.model_id(), "test-model");

        for _ in 0..3 {
            let resp = model_client.send_request(request()).await.unwrap();
            assert_eq!(resp.text, "How are you?");
            assert_eq!(resp.finish_reason, Some(ModelFinishReason::Stop));
        }
    }

    #[tokio::test]
    async fn test_error_handling() {
        let model_provider = TestModelProvider::default();
        let model_client = ModelClient::new(model_provider);
        let resp_or_err = model_client.send_request(request()).await;
        assert!(resp_or_err.is_err());

        let err = model_client.complete(request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalCallFailure);
        assert_eq!(err.provider_kind(), Some(ProviderErrorKind::Other));
    }

    #[tokio::test]
    async fn test_content_filter() {
        let mut model_provider = TestModelProvider::default();
        model_provider.push_response(
            PresetResponse::with_text("")
                .with_finish_reason(ModelFinishReason::ContentFilter),
        );
        let model_client = ModelClient::new(model_provider);
        let err = model_client.complete(request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalCallFailure);
        assert_eq!(err.provider_kind(), Some(ProviderErrorKind::Moderated));
    }

    /// Streams one delta, then ends without completing.
    struct CutOffProvider;

    struct CutOffResponse {
        sent: bool,
    }

    impl ModelResponse for CutOffResponse {
        type Error = travel_planner_test_model::Error;

        fn poll_next_event(
            self: Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<Result<Option<ModelResponseEvent>, Self::Error>>
        {
            let this = self.get_mut();
            if this.sent {
                return std::task::Poll::Ready(Ok(None));
            }
            this.sent = true;
            std::task::Poll::Ready(Ok(Some(ModelResponseEvent::MessageDelta(
                "Day 1: Lou".to_owned(),
            ))))
        }
    }

    impl ModelProvider for CutOffProvider {
        type Error = travel_planner_test_model::Error;
        type Response = CutOffResponse;

        fn model_id(&self) -> &str {
            "cut-off"
        }

        fn send_request(
            &self,
            _req: &ModelRequest,
        ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
        {
            std::future::ready(Ok(CutOffResponse { sent: false }))
        }
    }

    #[tokio::test]
    async fn test_reply_without_finish_reason() {
        let model_client = ModelClient::new(CutOffProvider);
        let resp = model_client.send_request(request()).await.unwrap();
        assert_eq!(resp.text, "Day 1: Lou");
        assert_eq!(resp.finish_reason, None);

        let err = model_client.complete(request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalCallFailure);
        assert_eq!(err.provider_kind(), Some(ProviderErrorKind::Other));
    }

    #[tokio::test]
    async fn test_truncated_reply_is_kept() {
        let mut model_provider = TestModelProvider::default();
        model_provider.push_response(
            PresetResponse::with_text("Day 1: Louvre")
                .with_finish_reason(ModelFinishReason::Length),
        );
        let model_client = ModelClient::new(model_provider);
        let text = model_client.complete(request()).await.unwrap();
        assert_eq!(text, "Day 1: Louvre");
    }
}

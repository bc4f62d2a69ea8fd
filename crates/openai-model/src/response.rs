use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures_util::future::BoxFuture;
use pin_project_lite::pin_project;
use travel_planner_model::{
    ErrorKind, ModelFinishReason, ModelResponse, ModelResponseEvent,
};

use crate::Error;
use crate::io::Sse;
use crate::proto::ChatCompletionChunk;

struct PartialState {
    sse: Sse,
    id: Option<String>,
    received_len: usize,
    // A finish reason may arrive in the same chunk as the last delta. It is
    // held here so that the delta is always emitted first.
    pending_finish_reason: Option<ModelFinishReason>,
    // Set once a finish reason or the `[DONE]` marker has been seen. A body
    // ending before that was cut off.
    finished: bool,
}

type NextEvent = Result<(Option<ModelResponseEvent>, PartialState), Error>;

pin_project! {
    pub struct OpenAIResponse {
        next_event_fut: Option<BoxFuture<'static, NextEvent>>,
    }
}

impl OpenAIResponse {
    #[inline]
    pub fn from_sse(sse: Sse) -> Self {
        let partial_state = PartialState {
            sse,
            id: None,
            received_len: 0,
            pending_finish_reason: None,
            finished: false,
        };
        Self {
            next_event_fut: Some(Box::pin(next_event(partial_state))),
        }
    }
}

impl ModelResponse for OpenAIResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };
        let (event, partial_state) =
            match ready!(next_event_fut.as_mut().poll(cx)) {
                Ok((Some(event), partial_state)) => (event, partial_state),
                Ok((None, partial_state)) => {
                    debug!(
                        "stream finished after {} bytes of content",
                        partial_state.received_len
                    );
                    *this.next_event_fut = None;
                    return Poll::Ready(Ok(None));
                }
                Err(err) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Err(err));
                }
            };

        // The stream may still have more data to pull, create a new future for
        // the next event.
        *this.next_event_fut = Some(Box::pin(next_event(partial_state)));

        Poll::Ready(Ok(Some(event)))
    }
}

async fn next_event(mut partial_state: PartialState) -> NextEvent {
    if let Some(reason) = partial_state.pending_finish_reason.take() {
        return Ok((Some(ModelResponseEvent::Completed(reason)), partial_state));
    }

    let sse = &mut partial_state.sse;
    loop {
        let sse_event = match sse.next_event().await {
            Ok(Some(event)) => event,
            Ok(None) if partial_state.finished => break,
            Ok(None) => {
                warn!(
                    "stream ended early, {} bytes of content received",
                    partial_state.received_len
                );
                return Err(Error::new(
                    "the stream ended before the reply was complete",
                    ErrorKind::Other,
                ));
            }
            Err(err) => {
                return Err(Error::new(format!("{err:?}"), ErrorKind::Other));
            }
        };
        trace!("got sse event: {sse_event}");
        if sse_event == "[DONE]" {
            partial_state.finished = true;
            break;
        }

        let mut chunk = serde_json::from_str::<ChatCompletionChunk>(&sse_event)
            .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))?;
        if partial_state.id.get_or_insert_with(|| chunk.id.clone()) != &chunk.id
        {
            return Err(Error::new("chunk id mismatch", ErrorKind::Other));
        };
        if let Some(usage) = chunk.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "token usage"
            );
        }

        // The usage chunk has no choices.
        let Some(choice) = chunk.choices.pop() else {
            continue;
        };

        if let Some(refusal) = choice.delta.refusal {
            return Err(Error::new(refusal, ErrorKind::Moderated));
        }
        if let Some(finish_reason) = choice.finish_reason {
            partial_state.finished = true;
            partial_state.pending_finish_reason =
                Some(match finish_reason.as_str() {
                    "length" => ModelFinishReason::Length,
                    "content_filter" => ModelFinishReason::ContentFilter,
                    _ => ModelFinishReason::Stop,
                });
        }
        match choice.delta.content {
            Some(content) if !content.is_empty() => {
                partial_state.received_len += content.len();
                return Ok((
                    Some(ModelResponseEvent::MessageDelta(content)),
                    partial_state,
                ));
            }
            _ => {}
        }
        if let Some(reason) = partial_state.pending_finish_reason.take() {
            return Ok((
                Some(ModelResponseEvent::Completed(reason)),
                partial_state,
            ));
        }
    }

    Ok((None, partial_state))
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use bytes::Bytes;

    use super::*;
    use crate::io::Chunks;

    async fn collect(
        fixture: &'static [u8],
    ) -> (Vec<ModelResponseEvent>, Result<(), Error>) {
        let chunks = Chunks::from_vec_deque(
            vec![Bytes::from_static(fixture)].into(),
        );
        let mut resp = pin!(OpenAIResponse::from_sse(Sse::new(chunks)));
        let mut events = vec![];
        loop {
            match poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await {
                Ok(Some(event)) => events.push(event),
                Ok(None) => return (events, Ok(())),
                Err(err) => return (events, Err(err)),
            }
        }
    }

    #[tokio::test]
    async fn test_simple_events() {
        let (events, result) =
            collect(include_bytes!("../fixtures/test_response.txt")).await;
        result.unwrap();

        let text: String = events
            .iter()
            .filter_map(|event| match event {
                ModelResponseEvent::MessageDelta(delta) => Some(delta.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(text, r#"{"destination": "Paris", "duration": "5 days"}"#);
        assert_eq!(
            events.last(),
            Some(&ModelResponseEvent::Completed(ModelFinishReason::Stop))
        );
    }

    #[tokio::test]
    async fn test_delta_before_finish_reason() {
        let (events, result) =
            collect(include_bytes!("../fixtures/truncated_response.txt")).await;
        result.unwrap();
        assert_eq!(
            events,
            vec![
                ModelResponseEvent::MessageDelta("Day 1: Louvre".to_owned()),
                ModelResponseEvent::Completed(ModelFinishReason::Length),
            ]
        );
    }

    #[tokio::test]
    async fn test_chunk_id_mismatch() {
        let (_, result) = collect(
            b"data: {\"id\":\"a\",\"choices\":[{\"delta\":{\"content\":\"x\"},\"finish_reason\":null}]}\n\n\
              data: {\"id\":\"b\",\"choices\":[{\"delta\":{\"content\":\"y\"},\"finish_reason\":null}]}\n\n",
        )
        .await;
        assert_eq!(result.unwrap_err().message(), "chunk id mismatch");
    }

    #[tokio::test]
    async fn test_cut_off_stream() {
        let (events, result) = collect(
            b"data: {\"id\":\"a\",\"choices\":[{\"delta\":{\"content\":\"Day 1: Lou\"},\"finish_reason\":null}]}\n\n",
        )
        .await;
        assert_eq!(
            events,
            vec![ModelResponseEvent::MessageDelta("Day 1: Lou".to_owned())]
        );
        let err = result.unwrap_err();
        assert_eq!(
            travel_planner_model::ModelProviderError::kind(&err),
            ErrorKind::Other
        );
    }

    #[tokio::test]
    async fn test_finish_reason_without_done() {
        let (events, result) = collect(
            b"data: {\"id\":\"a\",\"choices\":[{\"delta\":{\"content\":\"Hi\"},\"finish_reason\":\"stop\"}]}\n\n",
        )
        .await;
        result.unwrap();
        assert_eq!(
            events.last(),
            Some(&ModelResponseEvent::Completed(ModelFinishReason::Stop))
        );
    }

    #[tokio::test]
    async fn test_refusal() {
        let (_, result) = collect(
            b"data: {\"id\":\"a\",\"choices\":[{\"delta\":{\"refusal\":\"I can't help with that.\"},\"finish_reason\":null}]}\n\n",
        )
        .await;
        let err = result.unwrap_err();
        assert_eq!(
            travel_planner_model::ModelProviderError::kind(&err),
            ErrorKind::Moderated
        );
    }
}

use std::pin::Pin;
use std::task::{Context, Poll, ready};

use pdf_chat_model::{
    ErrorKind, ModelFinishReason, ModelResponse, ModelResponseEvent,
};

use crate::Error;
use crate::io::EventStream;
use crate::proto::{self, ChatCompletionChunk};

struct StreamState {
    events: EventStream,
    // A chunk may carry the last delta and the finish reason together. The
    // delta is emitted first and the reason is parked here.
    pending_finish_reason: Option<ModelFinishReason>,
    completed: bool,
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<ModelResponseEvent>, StreamState), Error>;

/// A streamed chat completion.
pub struct OpenAIResponse {
    next_event_fut: Option<PinnedFuture<NextEvent>>,
}

impl OpenAIResponse {
    #[inline]
    pub(crate) fn from_events(events: EventStream) -> Self {
        let state = StreamState {
            events,
            pending_finish_reason: None,
            completed: false,
        };
        Self {
            next_event_fut: Some(Box::pin(next_event(state))),
        }
    }
}

impl ModelResponse for OpenAIResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();
        let Some(next_event_fut) = this.next_event_fut.as_mut() else {
            return Poll::Ready(Ok(None));
        };
        match ready!(next_event_fut.as_mut().poll(cx)) {
            Ok((Some(event), state)) => {
                this.next_event_fut = Some(Box::pin(next_event(state)));
                Poll::Ready(Ok(Some(event)))
            }
            Ok((None, _)) => {
                this.next_event_fut = None;
                Poll::Ready(Ok(None))
            }
            Err(err) => {
                this.next_event_fut = None;
                Poll::Ready(Err(err))
            }
        }
    }
}

async fn next_event(mut state: StreamState) -> NextEvent {
    if let Some(reason) = state.pending_finish_reason.take() {
        state.completed = true;
        return Ok((Some(ModelResponseEvent::Completed(reason)), state));
    }
    if state.completed {
        return Ok((None, state));
    }

    loop {
        let data = match state.events.next_event().await {
            Ok(Some(data)) => data,
            Ok(None) => break,
            Err(err) => {
                return Err(Error::new(
                    format!("malformed event stream: {err:?}"),
                    ErrorKind::Other,
                ));
            }
        };
        trace!("got sse event: {data}");
        if data == "[DONE]" {
            break;
        }

        let chunk = serde_json::from_str::<ChatCompletionChunk>(&data)
            .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))?;
        // Usage reports come as chunks without choices.
        let Some(choice) = chunk.choices.into_iter().next() else {
            continue;
        };

        let finish_reason = choice
            .finish_reason
            .as_deref()
            .map(proto::parse_finish_reason);
        let delta = choice.delta.content.filter(|content| !content.is_empty());
        match (delta, finish_reason) {
            (Some(delta), finish_reason) => {
                state.pending_finish_reason = finish_reason;
                return Ok((Some(ModelResponseEvent::MessageDelta(delta)), state));
            }
            (None, Some(reason)) => {
                state.completed = true;
                return Ok((Some(ModelResponseEvent::Completed(reason)), state));
            }
            (None, None) => {}
        }
    }

    // The server closed the stream without a finish reason.
    if !state.completed {
        state.completed = true;
        return Ok((
            Some(ModelResponseEvent::Completed(ModelFinishReason::Stop)),
            state,
        ));
    }
    Ok((None, state))
}

//! A local fake model for testing purpose.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use pdf_chat_model::{
    ErrorKind, ModelFinishReason, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Error {
    #[inline]
    pub fn message(&self) -> &str {
        self.message
    }
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
    events: VecDeque<PresetEvent>,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
    completed: bool,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();
        if this.completed {
            // In case this method is called after completion.
            return Poll::Ready(Ok(None));
        }

        let delay = this.delay;
        let timer = this.sleep.get_or_insert_with(|| Box::pin(sleep(delay)));
        ready!(timer.as_mut().poll(cx));
        this.sleep = None;

        let event = match this.events.pop_front() {
            Some(PresetEvent::MessageDelta(delta)) => {
                ModelResponseEvent::MessageDelta(delta)
            }
            Some(PresetEvent::Finish(reason)) => {
                this.completed = true;
                ModelResponseEvent::Completed(reason)
            }
            None => {
                this.completed = true;
                ModelResponseEvent::Completed(ModelFinishReason::Stop)
            }
        };
        Poll::Ready(Ok(Some(event)))
    }
}

#[derive(Default)]
struct Script {
    responses: VecDeque<PresetResponse>,
    requests: Vec<ModelRequest>,
    prepared_prompts: Vec<String>,
    unavailable: bool,
    max_context: Option<usize>,
}

/// A local fake model for testing purpose.
///
/// Before sending requests, you need to queue the responses the model should
/// give. Every request consumes the response at the front of the queue, and
/// an error is returned when the queue runs dry. Clones share the same
/// script, so a test can keep a clone around to inspect the requests that
/// were received.
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
    pub fn add_response(&mut self, preset: PresetResponse) {
        self.script().responses.push_back(preset);
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Makes the model behave as if it was missing from the host.
    #[inline]
    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.script().unavailable = unavailable;
    }

    /// Rejects system prompts longer than `max_chars` characters.
    #[inline]
    pub fn set_max_context(&mut self, max_chars: usize) {
        self.script().max_context = Some(max_chars);
    }

    /// Returns all requests received so far, oldest first.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.script().requests.clone()
    }

    /// Returns all system prompts passed to `prepare` so far.
    pub fn prepared_prompts(&self) -> Vec<String> {
        self.script().prepared_prompts.clone()
    }

    pub fn remaining_responses(&self) -> usize {
        self.script().responses.len()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_response(&self, req: &ModelRequest) -> Result<PresetResponse, Error> {
        let mut script = self.script();
        script.requests.push(req.clone());
        if script.unavailable {
            return Err(Error {
                message: "model is not available",
                kind: ErrorKind::Unavailable,
            });
        }

        let Some(front) = script.responses.front_mut() else {
            return Err(Error {
                message: "no enough responses",
                kind: ErrorKind::Other,
            });
        };
        let failures = front.failures;
        match failures {
            Some(0) => Err(Error {
                message: "scripted failure",
                kind: ErrorKind::Other,
            }),
            Some(n) => {
                front.failures = if n == 1 { None } else { Some(n - 1) };
                Err(Error {
                    message: "scripted failure",
                    kind: ErrorKind::Other,
                })
            }
            None => Ok(script
                .responses
                .pop_front()
                .unwrap_or_else(|| PresetResponse::with_events([]))),
        }
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn prepare(
        &self,
        system_prompt: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static {
        let mut script = self.script();
        script.prepared_prompts.push(system_prompt.to_owned());
        let result = if script.unavailable {
            Err(Error {
                message: "model is not available",
                kind: ErrorKind::Unavailable,
            })
        } else if script
            .max_context
            .is_some_and(|max| system_prompt.chars().count() > max)
        {
            Err(Error {
                message: "system prompt exceeds the context window",
                kind: ErrorKind::ContextTooLarge,
            })
        } else {
            Ok(())
        };
        ready(result)
    }

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let result = self.next_response(req).map(|preset| TestModelResponse {
            events: preset.events.into(),
            delay: self.delay.unwrap_or(Duration::from_millis(1)),
            sleep: None,
            completed: false,
        });
        ready(result)
    }
}

use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;

use pdf_chat_model::{
    ModelFinishReason, ModelProvider, ModelProviderError, ModelRequest,
    ModelResponse, ModelResponseEvent,
};
use tracing::Instrument;

/// A type-erased error from a model provider.
pub type ModelError = Arc<dyn ModelProviderError>;

type BoxedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type DeltaFn = Box<dyn Fn(&str) + Send + 'static>;
type SendRequestResult = Result<ModelClientResponse, ModelError>;

/// Object-safe mirror of [`ModelProvider`].
trait ProviderObject: Send + Sync {
    fn prepare(&self, system_prompt: &str) -> BoxedFuture<Result<(), ModelError>>;

    fn send_request(
        &self,
        req: ModelRequest,
        on_delta: DeltaFn,
    ) -> BoxedFuture<SendRequestResult>;
}

struct AnyProvider<P>(P);

impl<P: ModelProvider + 'static> ProviderObject for AnyProvider<P> {
    fn prepare(&self, system_prompt: &str) -> BoxedFuture<Result<(), ModelError>> {
        let fut = self.0.prepare(system_prompt);
        Box::pin(async move {
            fut.await.map_err(|err| {
                error!("failed to prepare the model: {err}");
                Arc::new(err) as ModelError
            })
        })
    }

    fn send_request(
        &self,
        req: ModelRequest,
        on_delta: DeltaFn,
    ) -> BoxedFuture<SendRequestResult> {
        let fut = self.0.send_request(&req);
        Box::pin(
            async move {
                trace!("got a request: {:?}", req);
                let resp_or_err = fut.await;
                handle_response::<P>(resp_or_err, on_delta).await
            }
            .instrument(trace_span!("model client req")),
        )
    }
}

/// A wrapper around a model provider that provides a type-erased interface
/// for the other modules.
///
/// Cloning is cheap, all clones share the same provider.
#[derive(Clone)]
pub struct ModelClient {
    provider: Arc<dyn ProviderObject>,
}

impl ModelClient {
    /// Wraps `provider`.
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        Self {
            provider: Arc::new(AnyProvider(provider)),
        }
    }

    /// Asks the provider whether it can serve a session bound to
    /// `system_prompt`.
    #[inline]
    pub async fn prepare(&self, system_prompt: &str) -> Result<(), ModelError> {
        self.provider.prepare(system_prompt).await
    }

    /// Sends a request and returns the fully received response.
    ///
    /// `on_delta` is called with every piece of text as it arrives.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. The response stops streaming further
    /// events when this operation is cancelled.
    #[inline]
    pub async fn send_request(
        &self,
        req: ModelRequest,
        on_delta: impl Fn(&str) + Send + 'static,
    ) -> Result<ModelClientResponse, ModelError> {
        self.provider.send_request(req, Box::new(on_delta)).await
    }
}

/// A completely received response from the model client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelClientResponse {
    /// The concatenated text of all deltas.
    pub text: String,
    /// The reason the model finished generating.
    pub finish_reason: Option<ModelFinishReason>,
}

async fn handle_response<P: ModelProvider + 'static>(
    resp_or_err: Result<P::Response, P::Error>,
    on_delta: DeltaFn,
) -> SendRequestResult {
    let resp = match resp_or_err {
        Ok(resp) => resp,
        Err(err) => {
            error!("got an error: {err:?}");
            return Err(Arc::new(err));
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
                return Err(Arc::new(err));
            }
        };
        trace!("got an event: {event:?}");

        match event {
            ModelResponseEvent::MessageDelta(delta) => {
                on_delta(&delta);
                text.push_str(&delta);
            }
            ModelResponseEvent::Completed(reason) => {
                finish_reason = Some(reason);
            }
        }
    }

    trace!("finished a request");

    if finish_reason == Some(ModelFinishReason::Length) {
        warn!("the answer was cut off by the token limit");
    }

    Ok(ModelClientResponse {
        text,
        finish_reason,
    })
}

use std::error::Error;

use crate::error::ErrorKind;
use crate::request::ModelRequest;
use crate::response::ModelResponse;

/// The error type for a model provider.
pub trait ModelProviderError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;
}

/// A type that represents a model provider, which is an entry for preparing
/// sessions and sampling requests.
///
/// Once the provider is created, it should behave like a stateless object.
/// It can still have internal state, but callers should not rely on it,
/// and the provider should be prepared for being dropped anytime.
pub trait ModelProvider: Send + Sync {
    /// The error type that may be returned by the provider.
    type Error: ModelProviderError;

    /// The response type for this provider.
    type Response: ModelResponse<Error = Self::Error>;

    /// Checks that the model can serve a session bound to `system_prompt`.
    ///
    /// Implementations should return an error of kind
    /// [`ErrorKind::Unavailable`] when the model cannot be reached at all,
    /// and [`ErrorKind::ContextTooLarge`] when the prompt exceeds what the
    /// model accepts.
    fn prepare(
        &self,
        system_prompt: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static;

    /// Sends a request to the model.
    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static;
}

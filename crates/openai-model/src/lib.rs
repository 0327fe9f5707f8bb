//! A model provider for OpenAI-compatible APIs.

#[macro_use]
extern crate tracing;

mod config;
mod io;
mod proto;
mod response;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use mime::Mime;
use pdf_chat_model::{
    ErrorKind, ModelProvider, ModelProviderError, ModelRequest,
};
use reqwest::{Client, Response, StatusCode, header};

pub use config::{OpenAIConfig, OpenAIConfigBuilder};
use io::{Chunks, EventStream};
pub use response::OpenAIResponse;

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

    fn prepare(
        &self,
        system_prompt: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static {
        let prompt_chars = system_prompt.chars().count();
        let max_context_chars = self.config.max_context_chars;
        let model = self.config.model.clone();
        let probe_fut = self
            .client
            .get(self.config.endpoint(&format!("/models/{model}")))
            .bearer_auth(&self.config.api_key)
            .send();

        async move {
            if let Some(max) = max_context_chars {
                if prompt_chars > max {
                    return Err(Error::new(
                        format!(
                            "document needs {prompt_chars} characters of \
                             context, the limit is {max}"
                        ),
                        ErrorKind::ContextTooLarge,
                    ));
                }
            }

            let resp = probe_fut.await.map_err(|err| {
                Error::new(
                    format!("cannot reach the model endpoint: {err}"),
                    ErrorKind::Unavailable,
                )
            })?;
            if !resp.status().is_success() {
                return Err(error_from_response(resp).await);
            }
            let info = resp.json::<proto::ModelInfo>().await.map_err(|err| {
                Error::new(format!("invalid model info: {err}"), ErrorKind::Other)
            })?;
            debug!("model {} is ready", info.id);
            Ok(())
        }
    }

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let openai_req = proto::create_request(req, &self.config);
        let resp_fut = self
            .client
            .post(self.config.endpoint("/chat/completions"))
            .bearer_auth(&self.config.api_key)
            .header(header::ACCEPT, "text/event-stream")
            .json(&openai_req)
            .send();

        async move {
            let resp = match resp_fut.await {
                Ok(resp) => resp,
                Err(err) => {
                    let kind = if err.is_connect() {
                        ErrorKind::Unavailable
                    } else {
                        ErrorKind::Other
                    };
                    return Err(Error::new(format!("{err}"), kind));
                }
            };
            if !resp.status().is_success() {
                return Err(error_from_response(resp).await);
            }

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
            let events = EventStream::new(Chunks::from_response(resp));
            Ok(OpenAIResponse::from_events(events))
        }
    }
}

async fn error_from_response(resp: Response) -> Error {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<proto::ErrorResponse>(&body)
        .ok()
        .map(|resp| resp.error);
    let code = detail.as_ref().and_then(|d| d.code()).unwrap_or_default();

    let kind = match status {
        StatusCode::TOO_MANY_REQUESTS => ErrorKind::RateLimitExceeded,
        StatusCode::PAYLOAD_TOO_LARGE => ErrorKind::ContextTooLarge,
        StatusCode::BAD_REQUEST if code == "context_length_exceeded" => {
            ErrorKind::ContextTooLarge
        }
        StatusCode::BAD_REQUEST if code == "content_filter" => {
            ErrorKind::Moderated
        }
        StatusCode::UNAUTHORIZED
        | StatusCode::FORBIDDEN
        | StatusCode::NOT_FOUND => ErrorKind::Unavailable,
        _ => ErrorKind::Other,
    };
    let message = match detail {
        Some(detail) => format!("{status}: {}", detail.message),
        None => format!("{status}"),
    };
    warn!("model request failed: {message}");
    Error::new(message, kind)
}

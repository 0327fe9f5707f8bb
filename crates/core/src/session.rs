//! A model session bound to the text of one document.

use pdf_chat_model::{ErrorKind, ModelMessage, ModelRequest};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::model_client::{ModelClient, ModelError};

const SYSTEM_PROMPT_PREAMBLE: &str = "You are a PDF AI chatbot. Your responses \
    should only be based on the content provided. Here is the content to use \
    for this chat:\n\n";

/// Errors produced by a [`ConversationSession`].
#[derive(Clone, Debug, Error)]
pub enum SessionError {
    /// The document has no text to bind the session to.
    #[error("the document does not contain any text")]
    EmptyDocument,
    /// The model could not be prepared for the document.
    #[error("failed to initialize the model session: {0}")]
    Initialization(#[source] ModelError),
    /// A message was sent before initialization succeeded.
    #[error("the model session is not ready")]
    NotReady,
    /// The model failed to answer a message.
    #[error("the model failed to answer: {0}")]
    ModelInvocation(#[source] ModelError),
}

impl SessionError {
    /// Returns `true` if the model capability itself is missing, as opposed
    /// to rejecting this particular document.
    pub fn is_capability_unavailable(&self) -> bool {
        matches!(
            self,
            SessionError::Initialization(err)
                if err.kind() == ErrorKind::Unavailable
        )
    }
}

/// Which part of the history goes into each model request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum HistoryMode {
    /// Only the system prompt and the latest question. Every answer
    /// depends on the document and the question alone.
    #[default]
    LatestOnly,
    /// The system prompt, every earlier turn, then the latest question.
    Full,
}

/// The author of a [`HistoryRecord`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person asking.
    User,
    /// The model.
    Assistant,
}

/// One turn half in the session history.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Who wrote the content.
    pub role: Role,
    /// The text.
    pub content: String,
}

impl HistoryRecord {
    fn to_model_message(&self) -> ModelMessage {
        match self.role {
            Role::User => ModelMessage::User(self.content.clone()),
            Role::Assistant => ModelMessage::Assistant(self.content.clone()),
        }
    }
}

#[derive(Clone, Debug)]
enum Readiness {
    Pending,
    Ready,
    Failed(SessionError),
}

/// A language-model session whose answers are restricted to one document.
///
/// Initialization starts as soon as the session is created and runs in the
/// background, so this type must be created inside a tokio runtime. Messages
/// sent to the same session are answered one at a time, in the order the
/// calls were made.
pub struct ConversationSession {
    document_context: String,
    system_prompt: String,
    model_client: ModelClient,
    history_mode: HistoryMode,
    readiness: watch::Receiver<Readiness>,
    init_task: JoinHandle<()>,
    history: Mutex<Vec<HistoryRecord>>,
}

impl ConversationSession {
    /// Creates a session bound to `document_context` and starts
    /// initializing it.
    pub fn new<S: Into<String>>(
        model_client: ModelClient,
        document_context: S,
        history_mode: HistoryMode,
    ) -> Self {
        let document_context = document_context.into();
        let system_prompt = format!("{SYSTEM_PROMPT_PREAMBLE}{document_context}");
        debug!(
            context_len = document_context.len(),
            ?history_mode,
            "creating conversation session"
        );

        let (readiness_tx, readiness) = watch::channel(Readiness::Pending);
        let is_empty = document_context.trim().is_empty();
        let init_client = model_client.clone();
        let init_prompt = system_prompt.clone();
        let init_task = tokio::spawn(
            async move {
                let result = if is_empty {
                    Err(SessionError::EmptyDocument)
                } else {
                    init_client
                        .prepare(&init_prompt)
                        .await
                        .map_err(SessionError::Initialization)
                };
                let readiness = match result {
                    Ok(()) => {
                        info!("session is ready");
                        Readiness::Ready
                    }
                    Err(err) => {
                        error!("failed to initialize session: {err}");
                        Readiness::Failed(err)
                    }
                };
                readiness_tx.send_replace(readiness);
            }
            .instrument(debug_span!("session init")),
        );

        Self {
            document_context,
            system_prompt,
            model_client,
            history_mode,
            readiness,
            init_task,
            history: Mutex::new(Vec::new()),
        }
    }

    /// Waits until initialization has finished.
    ///
    /// Every call after a failed initialization returns the same error.
    pub async fn wait_for_initialization(&self) -> Result<(), SessionError> {
        let mut readiness = self.readiness.clone();
        let readiness = readiness
            .wait_for(|r| !matches!(r, Readiness::Pending))
            .await
            .map_err(|_| SessionError::NotReady)?
            .clone();
        match readiness {
            Readiness::Ready => Ok(()),
            Readiness::Failed(err) => Err(err),
            Readiness::Pending => Err(SessionError::NotReady),
        }
    }

    /// Returns `true` once initialization has succeeded.
    #[inline]
    pub fn is_ready(&self) -> bool {
        matches!(*self.readiness.borrow(), Readiness::Ready)
    }

    /// Sends a question and returns the model's answer.
    pub async fn send_message(
        &self,
        user_text: &str,
    ) -> Result<String, SessionError> {
        self.send_message_with(user_text, |_| {}).await
    }

    /// Like [`send_message`](Self::send_message), but calls `on_delta` with
    /// each piece of the answer as it is generated.
    pub async fn send_message_with(
        &self,
        user_text: &str,
        on_delta: impl Fn(&str) + Send + 'static,
    ) -> Result<String, SessionError> {
        if !self.is_ready() {
            warn!("message sent before the session is ready");
            return Err(SessionError::NotReady);
        }

        // Held for the whole turn so that turns are answered in call order.
        let mut history = self.history.lock().await;
        let request = self.build_request(&history, user_text);
        debug!(
            history_len = history.len(),
            request_len = request.messages.len(),
            "sending message"
        );

        let resp = self
            .model_client
            .send_request(request, on_delta)
            .await
            .map_err(|err| {
                error!("model invocation failed: {err}");
                SessionError::ModelInvocation(err)
            })?;

        history.push(HistoryRecord {
            role: Role::User,
            content: user_text.to_owned(),
        });
        history.push(HistoryRecord {
            role: Role::Assistant,
            content: resp.text.clone(),
        });
        Ok(resp.text)
    }

    fn build_request(
        &self,
        history: &[HistoryRecord],
        user_text: &str,
    ) -> ModelRequest {
        let mut messages = vec![ModelMessage::System(self.system_prompt.clone())];
        if self.history_mode == HistoryMode::Full {
            messages.extend(history.iter().map(HistoryRecord::to_model_message));
        }
        messages.push(ModelMessage::User(user_text.to_owned()));
        ModelRequest { messages }
    }

    /// Returns a copy of the history.
    ///
    /// Waits for a turn in flight to finish first.
    pub async fn history(&self) -> Vec<HistoryRecord> {
        self.history.lock().await.clone()
    }

    /// Returns the document text this session is bound to.
    #[inline]
    pub fn document_context(&self) -> &str {
        &self.document_context
    }

    /// Returns the instructions sent ahead of every request.
    #[inline]
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Returns how much history goes into each request.
    #[inline]
    pub fn history_mode(&self) -> HistoryMode {
        self.history_mode
    }
}

impl Drop for ConversationSession {
    fn drop(&mut self) {
        self.init_task.abort();
    }
}

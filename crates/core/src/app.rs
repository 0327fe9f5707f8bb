mod builder;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use thiserror::Error;

use crate::extract::{ExtractionError, TextExtractor};
use crate::model_client::ModelClient;
use crate::notification::{Notice, NotificationCenter};
use crate::session::{ConversationSession, HistoryMode, SessionError};
use crate::transcript::{ChatTranscriptStore, SubmitOutcome, TranscriptError};
use crate::upload::{PdfUpload, ValidationError};
pub use builder::ChatAppBuilder;

/// Errors that send the application back to the upload stage.
#[derive(Debug, Error)]
pub enum AppError {
    /// The selected file was rejected locally.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The text of the file could not be extracted.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    /// The model session could not be set up.
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl AppError {
    /// Returns `true` if the model capability itself is missing.
    pub fn is_capability_unavailable(&self) -> bool {
        matches!(self, AppError::Session(err) if err.is_capability_unavailable())
    }
}

/// What the application currently shows.
pub enum Stage {
    /// Waiting for a file, with the message of the last failure.
    Upload {
        /// Why the previous attempt failed.
        error: Option<String>,
    },
    /// Extracting text and preparing the model.
    Loading,
    /// Chatting about a document.
    Chat(ChatView),
}

/// A conversation about one document.
pub struct ChatView {
    file_name: String,
    session: ConversationSession,
    transcript: ChatTranscriptStore,
}

impl ChatView {
    /// Returns the name of the uploaded file.
    #[inline]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Returns the model session.
    #[inline]
    pub fn session(&self) -> &ConversationSession {
        &self.session
    }

    /// Returns the displayed messages.
    #[inline]
    pub fn transcript(&self) -> &ChatTranscriptStore {
        &self.transcript
    }

    /// Returns the displayed messages for editing.
    #[inline]
    pub fn transcript_mut(&mut self) -> &mut ChatTranscriptStore {
        &mut self.transcript
    }

    /// Asks a question about the document.
    pub async fn submit(
        &mut self,
        text: &str,
    ) -> Result<SubmitOutcome, TranscriptError> {
        self.transcript.submit(&self.session, text).await
    }

    /// Asks a question and streams the answer to `on_delta`.
    pub async fn submit_with(
        &mut self,
        text: &str,
        on_delta: impl Fn(&str) + Send + 'static,
    ) -> Result<SubmitOutcome, TranscriptError> {
        self.transcript
            .submit_with(&self.session, text, on_delta)
            .await
    }
}

/// The upload, loading and chat flow of the application.
pub struct ChatApp {
    extractor: Arc<dyn TextExtractor>,
    model_client: ModelClient,
    history_mode: HistoryMode,
    notifications: Arc<NotificationCenter>,
    pending_notice: Option<Notice>,
    stage: Stage,
}

impl ChatApp {
    fn from_builder(builder: ChatAppBuilder) -> Self {
        let ChatAppBuilder {
            extractor,
            model_client,
            history_mode,
            notifications,
        } = builder;
        Self {
            extractor,
            model_client,
            history_mode,
            notifications,
            pending_notice: None,
            stage: Stage::Upload { error: None },
        }
    }

    /// Returns the current stage.
    #[inline]
    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    /// Returns the chat view if a document is open.
    pub fn chat_view_mut(&mut self) -> Option<&mut ChatView> {
        match &mut self.stage {
            Stage::Chat(view) => Some(view),
            _ => None,
        }
    }

    /// Takes the notice raised by the last failure, if any.
    #[inline]
    pub fn take_notice(&mut self) -> Option<Notice> {
        self.pending_notice.take()
    }

    /// Opens `upload` and starts a chat about it.
    ///
    /// On failure the application returns to the upload stage showing the
    /// error message, and the upload is discarded. A previously open chat is
    /// closed either way.
    pub async fn open(&mut self, upload: PdfUpload) -> Result<(), AppError> {
        if let Err(err) = upload.validate() {
            info!("rejected {}: {err}", upload.file_name());
            self.stage = Stage::Upload {
                error: Some(err.to_string()),
            };
            return Err(err.into());
        }

        self.stage = Stage::Loading;
        match self.load(upload).await {
            Ok(view) => {
                info!("chat about {} is ready", view.file_name);
                self.stage = Stage::Chat(view);
                Ok(())
            }
            Err(err) => {
                error!("failed to open the document: {err}");
                if err.is_capability_unavailable() {
                    self.pending_notice =
                        self.notifications.capability_unavailable();
                }
                self.stage = Stage::Upload {
                    error: Some(err.to_string()),
                };
                Err(err)
            }
        }
    }

    async fn load(&self, upload: PdfUpload) -> Result<ChatView, AppError> {
        let text = self.extractor.extract_text(&upload).await?;
        if text.trim().is_empty() {
            return Err(ExtractionError::EmptyText.into());
        }
        debug!("extracted {} characters", text.chars().count());

        let session = ConversationSession::new(
            self.model_client.clone(),
            text,
            self.history_mode,
        );
        session.wait_for_initialization().await?;

        Ok(ChatView {
            file_name: upload.file_name().to_owned(),
            session,
            transcript: ChatTranscriptStore::new(),
        })
    }

    /// Closes the open chat and waits for a new file.
    pub fn restart(&mut self) {
        debug!("restarting");
        self.stage = Stage::Upload { error: None };
    }
}

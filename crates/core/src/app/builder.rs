use std::sync::Arc;

use pdf_chat_model::ModelProvider;

use super::ChatApp;
use crate::extract::TextExtractor;
use crate::model_client::ModelClient;
use crate::notification::NotificationCenter;
use crate::session::HistoryMode;

/// [`ChatApp`] builder.
pub struct ChatAppBuilder {
    pub(crate) extractor: Arc<dyn TextExtractor>,
    pub(crate) model_client: ModelClient,
    pub(crate) history_mode: HistoryMode,
    pub(crate) notifications: Arc<NotificationCenter>,
}

impl ChatAppBuilder {
    /// Creates a new builder with the specified model provider and text
    /// extractor.
    #[inline]
    pub fn with_model_provider<P, E>(provider: P, extractor: E) -> Self
    where
        P: ModelProvider + 'static,
        E: TextExtractor + 'static,
    {
        Self {
            extractor: Arc::new(extractor),
            model_client: ModelClient::new(provider),
            history_mode: HistoryMode::default(),
            notifications: Default::default(),
        }
    }

    /// Sets how much history goes into each model request.
    #[inline]
    pub fn history_mode(mut self, history_mode: HistoryMode) -> Self {
        self.history_mode = history_mode;
        self
    }

    /// Shares a notification center with the rest of the process.
    #[inline]
    pub fn notifications(
        mut self,
        notifications: Arc<NotificationCenter>,
    ) -> Self {
        self.notifications = notifications;
        self
    }

    /// Builds the application, starting at the upload stage.
    #[inline]
    pub fn build(self) -> ChatApp {
        ChatApp::from_builder(self)
    }
}

//! The list of messages shown in a chat view.

use std::fmt::{self, Display};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::session::{ConversationSession, SessionError};

/// Id of the message a new transcript starts with.
pub const WELCOME_MESSAGE_ID: &str = "welcome";
/// Content of the message a new transcript starts with.
pub const WELCOME_MESSAGE: &str =
    "Hi! I'm ready to answer questions about your PDF. What would you like to know?";
/// Id of the message left after [`ChatTranscriptStore::clear`].
pub const RESET_MESSAGE_ID: &str = "reset";
/// Content of the message left after [`ChatTranscriptStore::clear`].
pub const RESET_MESSAGE: &str = "Chat history cleared. How can I help you?";
/// The answer shown when the model fails.
pub const APOLOGY_MESSAGE: &str = "I apologize, but I encountered an error \
    processing your request. Please try again.";

const EXPORT_SEPARATOR: &str = "\n---\n\n";
const EXPORT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// The author of a [`ChatMessage`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// The person asking.
    User,
    /// The chatbot.
    Bot,
}

impl MessageKind {
    fn as_str(self) -> &'static str {
        match self {
            MessageKind::User => "user",
            MessageKind::Bot => "bot",
        }
    }
}

impl Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A displayable message. Never changes after it is created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    id: String,
    #[serde(rename = "type")]
    kind: MessageKind,
    content: String,
    timestamp: DateTime<Utc>,
}

impl ChatMessage {
    fn new(
        id: impl Into<String>,
        kind: MessageKind,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            content: content.into(),
            timestamp,
        }
    }

    /// Returns the unique id.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns who wrote the message.
    #[inline]
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Returns the text.
    #[inline]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns when the message was created.
    #[inline]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Errors returned by [`ChatTranscriptStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum TranscriptError {
    /// A turn is already waiting for its answer.
    #[error("still waiting for the previous answer")]
    Busy,
}

/// How a submitted question was handled.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// The question was blank, nothing changed.
    Ignored,
    /// The answer was appended.
    Answered,
    /// The model failed and an apology was appended instead.
    Apologized(SessionError),
}

/// A question that has been shown but not answered yet.
///
/// Returned by [`ChatTranscriptStore::begin_turn`] and consumed by
/// [`ChatTranscriptStore::finish_turn`].
#[derive(Debug)]
#[must_use = "a pending turn keeps the transcript busy until it is finished"]
pub struct PendingTurn {
    question: String,
}

impl PendingTurn {
    /// Returns the trimmed question.
    #[inline]
    pub fn question(&self) -> &str {
        &self.question
    }
}

/// The ordered messages of one chat view.
pub struct ChatTranscriptStore {
    messages: Vec<ChatMessage>,
    responding: bool,
    clock: fn() -> DateTime<Utc>,
}

impl Default for ChatTranscriptStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatTranscriptStore {
    /// Creates a transcript holding only the welcome message.
    #[inline]
    pub fn new() -> Self {
        Self::with_clock(Utc::now)
    }

    /// Creates a transcript that reads timestamps from `clock`.
    pub fn with_clock(clock: fn() -> DateTime<Utc>) -> Self {
        let welcome = ChatMessage::new(
            WELCOME_MESSAGE_ID,
            MessageKind::Bot,
            WELCOME_MESSAGE,
            clock(),
        );
        Self {
            messages: vec![welcome],
            responding: false,
            clock,
        }
    }

    /// Returns the messages, oldest first.
    #[inline]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Returns `true` while a question is waiting for its answer.
    #[inline]
    pub fn is_responding(&self) -> bool {
        self.responding
    }

    /// Sends `text` to `session` and appends both the question and the
    /// answer.
    ///
    /// # Cancel safety
    ///
    /// If the returned future is dropped before the answer arrives, the
    /// question stays unanswered and the transcript accepts new questions.
    pub async fn submit(
        &mut self,
        session: &ConversationSession,
        text: &str,
    ) -> Result<SubmitOutcome, TranscriptError> {
        self.submit_with(session, text, |_| {}).await
    }

    /// Like [`submit`](Self::submit), but calls `on_delta` with each piece
    /// of the answer as it is generated.
    pub async fn submit_with(
        &mut self,
        session: &ConversationSession,
        text: &str,
        on_delta: impl Fn(&str) + Send + 'static,
    ) -> Result<SubmitOutcome, TranscriptError> {
        let Some(turn) = self.begin_turn(text)? else {
            return Ok(SubmitOutcome::Ignored);
        };
        let mut guard = CancelGuard {
            store: self,
            armed: true,
        };
        let result = session.send_message_with(turn.question(), on_delta).await;
        guard.armed = false;
        Ok(guard.store.finish_turn(turn, result))
    }

    /// Appends the question and marks the transcript as responding.
    ///
    /// Returns `None` if `text` is blank.
    pub fn begin_turn(
        &mut self,
        text: &str,
    ) -> Result<Option<PendingTurn>, TranscriptError> {
        if self.responding {
            return Err(TranscriptError::Busy);
        }
        let question = text.trim();
        if question.is_empty() {
            return Ok(None);
        }

        self.push(MessageKind::User, question);
        self.responding = true;
        Ok(Some(PendingTurn {
            question: question.to_owned(),
        }))
    }

    /// Appends the answer to `turn`, or an apology if the model failed.
    pub fn finish_turn(
        &mut self,
        turn: PendingTurn,
        result: Result<String, SessionError>,
    ) -> SubmitOutcome {
        self.responding = false;
        match result {
            Ok(answer) => {
                self.push(MessageKind::Bot, answer);
                SubmitOutcome::Answered
            }
            Err(err) => {
                warn!("failed to answer {:?}: {err}", turn.question);
                self.push(MessageKind::Bot, APOLOGY_MESSAGE);
                SubmitOutcome::Apologized(err)
            }
        }
    }

    /// Replaces every message with the reset message.
    ///
    /// The history of the model session is kept, only the view is reset.
    pub fn clear(&mut self) {
        let reset = ChatMessage::new(
            RESET_MESSAGE_ID,
            MessageKind::Bot,
            RESET_MESSAGE,
            (self.clock)(),
        );
        self.messages = vec![reset];
    }

    /// Renders the transcript as plain text for saving to a file.
    pub fn export_as_text(&self) -> String {
        self.messages
            .iter()
            .map(|msg| {
                format!(
                    "{} ({})\n{}\n",
                    msg.kind.as_str().to_uppercase(),
                    msg.timestamp.format(EXPORT_TIMESTAMP_FORMAT),
                    msg.content
                )
            })
            .collect::<Vec<_>>()
            .join(EXPORT_SEPARATOR)
    }

    /// Renders the transcript as a compact text for sharing.
    pub fn share_text(&self) -> String {
        self.messages
            .iter()
            .map(|msg| format!("{}: {}", msg.kind, msg.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Returns the content of the message with `id`.
    pub fn copy(&self, id: &str) -> Option<&str> {
        self.messages
            .iter()
            .find(|msg| msg.id == id)
            .map(ChatMessage::content)
    }

    fn push(&mut self, kind: MessageKind, content: impl Into<String>) {
        let id = Uuid::new_v4().to_string();
        let msg = ChatMessage::new(id, kind, content, (self.clock)());
        self.messages.push(msg);
    }
}

// Clears the responding flag when a submit is dropped mid-turn.
struct CancelGuard<'a> {
    store: &'a mut ChatTranscriptStore,
    armed: bool,
}

impl Drop for CancelGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!("turn was cancelled before the answer arrived");
            self.store.responding = false;
        }
    }
}

/// Returns the default name of an exported transcript.
pub fn export_file_name(date: NaiveDate) -> String {
    format!("chat-export-{}.txt", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;
    use pdf_chat_test_model::{PresetResponse, TestModelProvider};
    use tokio::time::timeout;

    use super::*;
    use crate::ModelClient;
    use crate::session::HistoryMode;

    fn fixed_clock() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap()
    }

    async fn session_with(provider: TestModelProvider) -> ConversationSession {
        let session = ConversationSession::new(
            ModelClient::new(provider),
            "Policy doc...",
            HistoryMode::default(),
        );
        session.wait_for_initialization().await.unwrap();
        session
    }

    #[test]
    fn test_initial_state() {
        let store = ChatTranscriptStore::new();
        assert_eq!(store.messages().len(), 1);
        let welcome = &store.messages()[0];
        assert_eq!(welcome.id(), "welcome");
        assert_eq!(welcome.kind(), MessageKind::Bot);
        assert_eq!(welcome.content(), WELCOME_MESSAGE);
        assert!(!store.is_responding());
    }

    #[tokio::test]
    async fn test_submit() {
        let mut provider = TestModelProvider::default();
        provider.add_response(PresetResponse::with_text("30 days."));
        let session = session_with(provider).await;

        let mut store = ChatTranscriptStore::new();
        let outcome = store
            .submit(&session, "  What is the refund window?  ")
            .await
            .unwrap();
        assert!(matches!(outcome, SubmitOutcome::Answered));
        assert!(!store.is_responding());

        let messages: Vec<_> = store
            .messages()
            .iter()
            .map(|msg| (msg.kind(), msg.content()))
            .collect();
        assert_eq!(
            messages,
            [
                (MessageKind::Bot, WELCOME_MESSAGE),
                (MessageKind::User, "What is the refund window?"),
                (MessageKind::Bot, "30 days."),
            ]
        );
        assert_ne!(store.messages()[1].id(), store.messages()[2].id());
    }

    #[tokio::test]
    async fn test_blank_submit_is_ignored() {
        let provider = TestModelProvider::default();
        let session = session_with(provider.clone()).await;

        let mut store = ChatTranscriptStore::new();
        let outcome = store.submit(&session, " \n\t").await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Ignored));
        assert_eq!(store.messages().len(), 1);
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn test_submit_failure() {
        let mut provider = TestModelProvider::default();
        provider.add_response(PresetResponse::with_text("never").with_failures(0));
        let session = session_with(provider).await;

        let mut store = ChatTranscriptStore::new();
        let before = store.messages().to_vec();
        let outcome = store.submit(&session, "Hello?").await.unwrap();
        assert!(matches!(
            outcome,
            SubmitOutcome::Apologized(SessionError::ModelInvocation(_))
        ));
        assert!(!store.is_responding());

        let messages = store.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0], before[0]);
        assert_eq!(messages[1].content(), "Hello?");
        assert_eq!(messages[2].kind(), MessageKind::Bot);
        assert_eq!(messages[2].content(), APOLOGY_MESSAGE);
    }

    #[tokio::test]
    async fn test_dropped_submit_releases_transcript() {
        let mut provider = TestModelProvider::default();
        provider.add_response(PresetResponse::with_text("r(A)"));
        provider.add_response(PresetResponse::with_text("r(B)"));
        provider.set_delay(Duration::from_millis(200));
        let session = session_with(provider).await;

        let mut store = ChatTranscriptStore::new();
        let timed_out =
            timeout(Duration::from_millis(10), store.submit(&session, "A")).await;
        assert!(timed_out.is_err());
        assert!(!store.is_responding());
        assert_eq!(store.messages().len(), 2);
        assert_eq!(store.messages()[1].content(), "A");

        let outcome = store.submit(&session, "B").await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Answered));
        let contents: Vec<_> =
            store.messages().iter().map(ChatMessage::content).collect();
        assert_eq!(contents, [WELCOME_MESSAGE, "A", "B", "r(B)"]);
        // The cancelled turn never reached the session history.
        assert_eq!(session.history().await.len(), 2);
    }

    #[test]
    fn test_two_phase_turn() {
        let mut store = ChatTranscriptStore::new();
        let turn = store.begin_turn("A").unwrap().unwrap();
        assert!(store.is_responding());
        // The question is visible before the answer arrives.
        assert_eq!(store.messages().last().unwrap().content(), "A");
        assert_eq!(store.begin_turn("B").unwrap_err(), TranscriptError::Busy);

        let outcome = store.finish_turn(turn, Ok("r(A)".to_owned()));
        assert!(matches!(outcome, SubmitOutcome::Answered));
        assert!(!store.is_responding());
        assert_eq!(store.messages().len(), 3);

        let turn = store.begin_turn("B").unwrap().unwrap();
        store.finish_turn(turn, Err(SessionError::NotReady));
        assert_eq!(store.messages().last().unwrap().content(), APOLOGY_MESSAGE);
    }

    #[test]
    fn test_clear() {
        let mut store = ChatTranscriptStore::new();
        let turn = store.begin_turn("A").unwrap().unwrap();
        store.finish_turn(turn, Ok("r(A)".to_owned()));

        store.clear();
        assert_eq!(store.messages().len(), 1);
        assert_eq!(store.messages()[0].id(), RESET_MESSAGE_ID);
        assert_eq!(store.messages()[0].content(), RESET_MESSAGE);
    }

    #[tokio::test]
    async fn test_clear_keeps_session_history() {
        let mut provider = TestModelProvider::default();
        provider.add_response(PresetResponse::with_text("r(A)"));
        let session = session_with(provider).await;

        let mut store = ChatTranscriptStore::new();
        store.submit(&session, "A").await.unwrap();
        store.clear();
        assert_eq!(store.messages().len(), 1);
        assert_eq!(session.history().await.len(), 2);
    }

    #[test]
    fn test_export_as_text() {
        let mut store = ChatTranscriptStore::with_clock(fixed_clock);
        let turn = store.begin_turn("What is the refund window?").unwrap().unwrap();
        store.finish_turn(turn, Ok("30 days.".to_owned()));

        let text = store.export_as_text();
        assert_eq!(
            text,
            format!(
                "BOT (2024-03-09 14:05:00 UTC)\n{WELCOME_MESSAGE}\n\
                 \n---\n\n\
                 USER (2024-03-09 14:05:00 UTC)\nWhat is the refund window?\n\
                 \n---\n\n\
                 BOT (2024-03-09 14:05:00 UTC)\n30 days.\n"
            )
        );
        assert_eq!(store.export_as_text(), text);
    }

    #[test]
    fn test_share_and_copy() {
        let mut store = ChatTranscriptStore::new();
        let turn = store.begin_turn("A").unwrap().unwrap();
        store.finish_turn(turn, Ok("r(A)".to_owned()));

        assert_eq!(
            store.share_text(),
            format!("bot: {WELCOME_MESSAGE}\n\nuser: A\n\nbot: r(A)")
        );

        let id = store.messages()[2].id().to_owned();
        assert_eq!(store.copy(&id), Some("r(A)"));
        assert_eq!(store.copy("welcome"), Some(WELCOME_MESSAGE));
        assert_eq!(store.copy("missing"), None);
    }

    #[test]
    fn test_serialize_message() {
        let store = ChatTranscriptStore::with_clock(fixed_clock);
        let json = serde_json::to_value(&store.messages()[0]).unwrap();
        assert_eq!(json["id"], "welcome");
        assert_eq!(json["type"], "bot");
        assert_eq!(json["timestamp"], "2024-03-09T14:05:00Z");
    }

    #[test]
    fn test_export_file_name() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(export_file_name(date), "chat-export-2024-03-09.txt");
    }
}

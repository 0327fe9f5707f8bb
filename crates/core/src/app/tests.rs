use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use pdf_chat_model::ModelMessage;
use pdf_chat_test_model::{PresetResponse, TestModelProvider};

use crate::extract::{ExtractionError, TextExtractor};
use crate::notification::NotificationCenter;
use crate::session::HistoryMode;
use crate::transcript::{MessageKind, SubmitOutcome, WELCOME_MESSAGE_ID};
use crate::upload::{MAX_UPLOAD_SIZE, PdfUpload, ValidationError};
use crate::{AppError, ChatAppBuilder, Stage};

/// Answers every upload the same way and counts the calls.
#[derive(Clone)]
struct FakeExtractor {
    answer: Arc<dyn Fn() -> Result<String, ExtractionError> + Send + Sync>,
    calls: Arc<AtomicUsize>,
}

impl FakeExtractor {
    fn with_text(text: &'static str) -> Self {
        Self::with_answer(move || Ok(text.to_owned()))
    }

    fn with_answer(
        answer: impl Fn() -> Result<String, ExtractionError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            answer: Arc::new(answer),
            calls: Default::default(),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextExtractor for FakeExtractor {
    async fn extract_text(
        &self,
        _upload: &PdfUpload,
    ) -> Result<String, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.answer)()
    }
}

fn pdf_of_size(size: usize) -> PdfUpload {
    let mut bytes = b"%PDF-1.7\n".to_vec();
    bytes.resize(size, b' ');
    PdfUpload::new("policy.pdf", bytes)
}

fn upload_error(stage: &Stage) -> Option<&str> {
    match stage {
        Stage::Upload { error } => error.as_deref(),
        _ => panic!("not at the upload stage"),
    }
}

#[tokio::test]
async fn test_validation_before_network() {
    let extractor = FakeExtractor::with_text("Policy doc...");
    let provider = TestModelProvider::default();
    let mut app =
        ChatAppBuilder::with_model_provider(provider.clone(), extractor.clone())
            .build();

    let err = app
        .open(PdfUpload::new("notes.txt", b"hello".to_vec()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(ValidationError::NotPdf)));
    assert_eq!(upload_error(app.stage()), Some("Please upload a PDF file only"));

    let err = app.open(pdf_of_size(MAX_UPLOAD_SIZE + 1)).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(ValidationError::TooLarge)));
    assert_eq!(
        upload_error(app.stage()),
        Some("File size must be less than 2MB")
    );

    assert_eq!(extractor.calls(), 0);
    assert!(provider.prepared_prompts().is_empty());
}

#[tokio::test]
async fn test_extraction_errors() {
    let extractor = FakeExtractor::with_answer(|| Err(ExtractionError::TooLarge));
    let mut app =
        ChatAppBuilder::with_model_provider(TestModelProvider::default(), extractor)
            .build();
    let err = app.open(pdf_of_size(1024)).await.unwrap_err();
    assert!(matches!(err, AppError::Extraction(ExtractionError::TooLarge)));
    assert_eq!(upload_error(app.stage()), Some("Error: File size too large"));

    let extractor = FakeExtractor::with_answer(|| {
        Err(ExtractionError::Status {
            status: 500,
            reason: "Internal Server Error".to_owned(),
        })
    });
    let mut app =
        ChatAppBuilder::with_model_provider(TestModelProvider::default(), extractor)
            .build();
    app.open(pdf_of_size(1024)).await.unwrap_err();
    assert_eq!(upload_error(app.stage()), Some("Error: Internal Server Error"));

    let extractor = FakeExtractor::with_text("   ");
    let mut app =
        ChatAppBuilder::with_model_provider(TestModelProvider::default(), extractor)
            .build();
    let err = app.open(pdf_of_size(1024)).await.unwrap_err();
    assert!(matches!(err, AppError::Extraction(ExtractionError::EmptyText)));
}

#[tokio::test]
async fn test_refund_window() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::with_text("30 days."));
    let extractor = FakeExtractor::with_text("Policy doc...");
    let mut app =
        ChatAppBuilder::with_model_provider(provider.clone(), extractor).build();

    app.open(pdf_of_size(500 * 1024)).await.unwrap();
    let view = app.chat_view_mut().unwrap();
    assert_eq!(view.file_name(), "policy.pdf");
    assert!(view.session().is_ready());
    assert_eq!(view.transcript().messages()[0].id(), WELCOME_MESSAGE_ID);

    let outcome = view.submit("What is the refund window?").await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Answered));

    let messages: Vec<_> = view
        .transcript()
        .messages()
        .iter()
        .map(|msg| (msg.kind(), msg.content().to_owned()))
        .collect();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].0, MessageKind::Bot);
    assert_eq!(
        messages[1],
        (MessageKind::User, "What is the refund window?".to_owned())
    );
    assert_eq!(messages[2], (MessageKind::Bot, "30 days.".to_owned()));

    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    let ModelMessage::System(system_prompt) = &requests[0].messages[0] else {
        panic!("missing system prompt");
    };
    assert!(system_prompt.ends_with("\n\nPolicy doc..."));
}

#[tokio::test]
async fn test_history_mode_is_applied() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::with_text("r(A)"));
    provider.add_response(PresetResponse::with_text("r(B)"));
    let extractor = FakeExtractor::with_text("Policy doc...");
    let mut app =
        ChatAppBuilder::with_model_provider(provider.clone(), extractor)
            .history_mode(HistoryMode::Full)
            .build();

    app.open(pdf_of_size(1024)).await.unwrap();
    let view = app.chat_view_mut().unwrap();
    view.submit("A").await.unwrap();
    view.submit("B").await.unwrap();
    assert_eq!(provider.requests()[1].messages.len(), 4);
}

#[tokio::test]
async fn test_capability_notice_shown_once() {
    let mut provider = TestModelProvider::default();
    provider.set_unavailable(true);
    let notifications = Arc::new(NotificationCenter::new());
    let mut app = ChatAppBuilder::with_model_provider(
        provider,
        FakeExtractor::with_text("Policy doc..."),
    )
    .notifications(Arc::clone(&notifications))
    .build();

    let err = app.open(pdf_of_size(1024)).await.unwrap_err();
    assert!(err.is_capability_unavailable());
    assert!(matches!(app.stage(), Stage::Upload { error: Some(_) }));
    let notice = app.take_notice().unwrap();
    assert!(notice.persistent);
    assert!(app.take_notice().is_none());

    app.open(pdf_of_size(1024)).await.unwrap_err();
    assert!(app.take_notice().is_none());
    assert!(notifications.capability_unavailable().is_none());
}

#[tokio::test]
async fn test_context_too_large_is_not_a_capability_problem() {
    let mut provider = TestModelProvider::default();
    provider.set_max_context(100);
    let mut app = ChatAppBuilder::with_model_provider(
        provider,
        FakeExtractor::with_answer(|| Ok("x".repeat(1000))),
    )
    .build();

    let err = app.open(pdf_of_size(1024)).await.unwrap_err();
    assert!(matches!(err, AppError::Session(_)));
    assert!(!err.is_capability_unavailable());
    assert!(app.take_notice().is_none());
}

#[tokio::test]
async fn test_restart() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::with_text("r(A)"));
    let extractor = FakeExtractor::with_text("Policy doc...");
    let mut app =
        ChatAppBuilder::with_model_provider(provider, extractor.clone()).build();

    app.open(pdf_of_size(1024)).await.unwrap();
    app.chat_view_mut().unwrap().submit("A").await.unwrap();

    app.restart();
    assert_eq!(upload_error(app.stage()), None);
    assert!(app.chat_view_mut().is_none());

    // A new upload starts from a fresh transcript.
    app.open(pdf_of_size(1024)).await.unwrap();
    let view = app.chat_view_mut().unwrap();
    assert_eq!(view.transcript().messages().len(), 1);
    assert!(view.session().history().await.is_empty());
    assert_eq!(extractor.calls(), 2);
}

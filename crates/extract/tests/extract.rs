use std::sync::{Arc, Mutex};

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use pdf_chat_core::extract::{ExtractionError, TextExtractor};
use pdf_chat_core::upload::PdfUpload;
use pdf_chat_extract::{ExtractConfigBuilder, HttpTextExtractor};
use serde_json::json;
use tokio::net::TcpListener;

#[derive(Clone, Debug, PartialEq, Eq)]
struct ReceivedPart {
    field_name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

#[derive(Clone, Default)]
struct ServerState {
    parts: Arc<Mutex<Vec<ReceivedPart>>>,
}

async fn extract_text(
    State(state): State<ServerState>,
    mut multipart: Multipart,
) -> Response {
    let mut file_name = None;
    while let Some(field) = multipart.next_field().await.unwrap() {
        let part = ReceivedPart {
            field_name: field.name().unwrap_or_default().to_owned(),
            file_name: field.file_name().map(str::to_owned),
            content_type: field.content_type().map(str::to_owned),
            bytes: field.bytes().await.unwrap().to_vec(),
        };
        file_name = part.file_name.clone();
        state.parts.lock().unwrap().push(part);
    }

    match file_name.as_deref() {
        Some("huge.pdf") => StatusCode::PAYLOAD_TOO_LARGE.into_response(),
        Some("broken.pdf") => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        Some("garbage.pdf") => "not json".into_response(),
        Some("blank.pdf") => Json(json!({ "text": "  " })).into_response(),
        _ => Json(json!({ "text": "Policy doc..." })).into_response(),
    }
}

async fn spawn_server(state: ServerState) -> String {
    let app = Router::new()
        .route("/api/Pdf/extract-text", post(extract_text))
        .with_state(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/api/Pdf/extract-text")
}

fn extractor(endpoint: &str) -> HttpTextExtractor {
    HttpTextExtractor::new(ExtractConfigBuilder::with_endpoint(endpoint).build())
        .unwrap()
}

fn pdf(file_name: &str) -> PdfUpload {
    PdfUpload::new(file_name, b"%PDF-1.7\nrefund policy".to_vec())
}

#[tokio::test]
async fn test_extract_text() {
    let state = ServerState::default();
    let endpoint = spawn_server(state.clone()).await;

    let text = extractor(&endpoint)
        .extract_text(&pdf("policy.pdf"))
        .await
        .unwrap();
    assert_eq!(text, "Policy doc...");

    let parts = state.parts.lock().unwrap().clone();
    assert_eq!(
        parts,
        [ReceivedPart {
            field_name: "pdfFile".to_owned(),
            file_name: Some("policy.pdf".to_owned()),
            content_type: Some("application/pdf".to_owned()),
            bytes: b"%PDF-1.7\nrefund policy".to_vec(),
        }]
    );
}

#[tokio::test]
async fn test_content_type_of_unknown_files() {
    let state = ServerState::default();
    let endpoint = spawn_server(state.clone()).await;

    let upload = PdfUpload::new("scan", b"\x00\x01".to_vec());
    extractor(&endpoint).extract_text(&upload).await.unwrap();

    let parts = state.parts.lock().unwrap().clone();
    assert_eq!(parts.len(), 1);
    assert_eq!(
        parts[0].content_type.as_deref(),
        Some("application/octet-stream")
    );
    assert_eq!(parts[0].file_name.as_deref(), Some("scan"));
}

#[tokio::test]
async fn test_status_errors() {
    let endpoint = spawn_server(ServerState::default()).await;
    let extractor = extractor(&endpoint);

    let err = extractor.extract_text(&pdf("huge.pdf")).await.unwrap_err();
    assert!(matches!(err, ExtractionError::TooLarge));
    assert_eq!(err.to_string(), "Error: File size too large");

    let err = extractor.extract_text(&pdf("broken.pdf")).await.unwrap_err();
    assert!(matches!(err, ExtractionError::Status { status: 500, .. }));
    assert_eq!(err.to_string(), "Error: Internal Server Error");
}

#[tokio::test]
async fn test_invalid_bodies() {
    let endpoint = spawn_server(ServerState::default()).await;
    let extractor = extractor(&endpoint);

    let err = extractor.extract_text(&pdf("garbage.pdf")).await.unwrap_err();
    assert!(matches!(err, ExtractionError::InvalidResponse(_)));

    let err = extractor.extract_text(&pdf("blank.pdf")).await.unwrap_err();
    assert!(matches!(err, ExtractionError::EmptyText));
}

#[tokio::test]
async fn test_unreachable() {
    // Nothing listens on the discard port.
    let err = extractor("http://127.0.0.1:9/extract")
        .extract_text(&pdf("policy.pdf"))
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractionError::Transport(_)));
}

//! A text extractor backed by a remote PDF-to-text service.

#[macro_use]
extern crate tracing;

mod config;

use async_trait::async_trait;
use pdf_chat_core::extract::{ExtractionError, TextExtractor};
use pdf_chat_core::upload::PdfUpload;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

pub use config::{ExtractConfig, ExtractConfigBuilder};

#[derive(Deserialize)]
struct ExtractResponse {
    text: String,
}

/// Posts PDFs as multipart forms and reads back `{"text": "..."}`.
#[derive(Clone, Debug)]
pub struct HttpTextExtractor {
    client: Client,
    config: ExtractConfig,
}

impl HttpTextExtractor {
    /// Creates a new `HttpTextExtractor` with the given configuration.
    pub fn new(config: ExtractConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn form(&self, upload: &PdfUpload) -> Form {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, content_type_header(upload));
        let part = Part::stream_with_length(
            upload.bytes().clone(),
            upload.len() as u64,
        )
        .file_name(upload.file_name().to_owned())
        .headers(headers);
        Form::new().part(self.config.field_name.clone(), part)
    }
}

// Uploads are either detected as PDFs or left as opaque bytes.
fn content_type_header(upload: &PdfUpload) -> HeaderValue {
    if *upload.content_type() == mime::APPLICATION_PDF {
        HeaderValue::from_static("application/pdf")
    } else {
        HeaderValue::from_static("application/octet-stream")
    }
}

#[async_trait]
impl TextExtractor for HttpTextExtractor {
    async fn extract_text(
        &self,
        upload: &PdfUpload,
    ) -> Result<String, ExtractionError> {
        debug!(
            file_name = upload.file_name(),
            size = upload.len(),
            "extracting text"
        );
        let resp = self
            .client
            .post(&self.config.endpoint)
            .multipart(self.form(upload))
            .send()
            .await
            .map_err(|err| {
                error!("cannot reach the extraction service: {err}");
                ExtractionError::Transport(Box::new(err))
            })?;

        let status = resp.status();
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            return Err(ExtractionError::TooLarge);
        }
        if !status.is_success() {
            warn!("extraction failed with {status}");
            return Err(ExtractionError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_owned(),
            });
        }

        let body = resp
            .json::<ExtractResponse>()
            .await
            .map_err(|err| ExtractionError::InvalidResponse(Box::new(err)))?;
        if body.text.trim().is_empty() {
            return Err(ExtractionError::EmptyText);
        }
        Ok(body.text)
    }
}

//! Turning an uploaded PDF into plain text.

use async_trait::async_trait;
use thiserror::Error;

use crate::upload::PdfUpload;

/// Errors returned by a [`TextExtractor`].
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The service refused the file because of its size.
    #[error("Error: File size too large")]
    TooLarge,
    /// The service answered with another non-success status.
    #[error("Error: {reason}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// The canonical reason phrase of `status`.
        reason: String,
    },
    /// The service could not be reached.
    #[error("Error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// The service answered with an unexpected body.
    #[error("Error: invalid response from the extraction service")]
    InvalidResponse(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// The document contains no extractable text.
    #[error("Error: no text could be extracted from the PDF")]
    EmptyText,
}

/// A service that extracts the text of a PDF.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extracts the text of `upload`.
    async fn extract_text(
        &self,
        upload: &PdfUpload,
    ) -> Result<String, ExtractionError>;
}

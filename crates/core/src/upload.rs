//! PDF files selected by the user.

use std::path::Path;

use bytes::Bytes;
use mime::Mime;
use thiserror::Error;

/// The largest file accepted, in bytes.
pub const MAX_UPLOAD_SIZE: usize = 2 * 1024 * 1024;

const PDF_MAGIC: &[u8] = b"%PDF-";

/// A file rejected before it is sent anywhere.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The file is not a PDF.
    #[error("Please upload a PDF file only")]
    NotPdf,
    /// The file is larger than [`MAX_UPLOAD_SIZE`].
    #[error("File size must be less than 2MB")]
    TooLarge,
}

/// A file selected for upload.
#[derive(Clone, Debug)]
pub struct PdfUpload {
    file_name: String,
    content_type: Mime,
    bytes: Bytes,
}

impl PdfUpload {
    /// Creates an upload from file contents in memory.
    ///
    /// The content type is derived from the file name and the leading bytes.
    pub fn new<S: Into<String>, B: Into<Bytes>>(file_name: S, bytes: B) -> Self {
        let file_name = file_name.into();
        let bytes = bytes.into();
        let has_pdf_extension = Path::new(&file_name)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        let content_type = if has_pdf_extension || bytes.starts_with(PDF_MAGIC) {
            mime::APPLICATION_PDF
        } else {
            mime::APPLICATION_OCTET_STREAM
        };
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    /// Reads an upload from disk.
    pub async fn from_path<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        debug!("read {} bytes from {}", bytes.len(), path.display());
        Ok(Self::new(file_name, bytes))
    }

    /// Checks the type and size constraints.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.content_type != mime::APPLICATION_PDF {
            return Err(ValidationError::NotPdf);
        }
        if self.bytes.len() > MAX_UPLOAD_SIZE {
            return Err(ValidationError::TooLarge);
        }
        Ok(())
    }

    /// Returns the file name, without directories.
    #[inline]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Returns the detected content type.
    #[inline]
    pub fn content_type(&self) -> &Mime {
        &self.content_type
    }

    /// Returns the file contents.
    #[inline]
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Returns the file size in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if the file is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use pdf_chat_core::transcript::{ChatTranscriptStore, export_file_name};

/// Writes the transcript to `path`, or to a dated file in the current
/// directory. Returns where it was written.
pub async fn export_transcript(
    transcript: &ChatTranscriptStore,
    path: Option<&Path>,
) -> io::Result<PathBuf> {
    let path = match path {
        Some(path) => path.to_owned(),
        None => PathBuf::from(export_file_name(Utc::now().date_naive())),
    };
    tokio::fs::write(&path, transcript.export_as_text()).await?;
    info!("exported the chat to {}", path.display());
    Ok(path)
}

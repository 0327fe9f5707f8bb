use std::collections::VecDeque;
use std::mem;

use super::{Chunks, ChunksError};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    ChunksError(ChunksError),
    InvalidPayload,
}

/// Incremental parser for the `text/event-stream` format.
///
/// Only the `data` field carries information for us. Every other field is
/// dropped and comment lines are skipped. Lines may end with LF, CRLF or a
/// lone CR. Bytes are buffered per line before decoding, so a multi-byte
/// character split across chunks is fine.
#[derive(Default)]
struct Decoder {
    line: Vec<u8>,
    data: Option<String>,
    // The last line ended with CR, so a leading LF belongs to it.
    after_cr: bool,
}

impl Decoder {
    fn feed(
        &mut self,
        bytes: &[u8],
        out: &mut VecDeque<String>,
    ) -> Result<(), Error> {
        for &byte in bytes {
            match byte {
                b'\n' if mem::take(&mut self.after_cr) => {}
                b'\r' | b'\n' => {
                    self.after_cr = byte == b'\r';
                    let line = mem::take(&mut self.line);
                    self.process_line(line, out)?;
                }
                _ => {
                    self.after_cr = false;
                    self.line.push(byte);
                }
            }
        }
        Ok(())
    }

    fn process_line(
        &mut self,
        line: Vec<u8>,
        out: &mut VecDeque<String>,
    ) -> Result<(), Error> {
        let line = String::from_utf8(line).map_err(|_| Error::InvalidPayload)?;

        // A blank line dispatches the event.
        if line.is_empty() {
            if let Some(data) = self.data.take() {
                out.push_back(data);
            }
            return Ok(());
        }
        if line.starts_with(':') {
            return Ok(());
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => {
                (field, value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line.as_str(), ""),
        };
        match field {
            "data" => match &mut self.data {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.data = Some(value.to_owned()),
            },
            field => trace!("ignoring sse field {field:?}"),
        }
        Ok(())
    }
}

/// Reads server-sent event payloads from a chunk source.
///
/// An event that is not terminated by a blank line when the body ends is
/// discarded.
pub struct EventStream {
    chunks: Chunks,
    decoder: Decoder,
    ready: VecDeque<String>,
}

impl EventStream {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            chunks,
            decoder: Decoder::default(),
            ready: VecDeque::new(),
        }
    }

    /// Returns the `data` of the next event.
    pub async fn next_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            if let Some(data) = self.ready.pop_front() {
                return Ok(Some(data));
            }
            let Some(bytes) =
                self.chunks.next_chunk().await.map_err(Error::ChunksError)?
            else {
                return Ok(None);
            };
            self.decoder.feed(&bytes, &mut self.ready)?;
        }
    }
}

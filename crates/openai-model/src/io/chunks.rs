#[cfg(test)]
use std::collections::VecDeque;

use bytes::Bytes;
use reqwest::Response;

/// The body stream broke off before it was complete.
#[derive(Debug, PartialEq, Eq)]
pub struct Error(pub String);

/// A source of raw body chunks.
pub enum Chunks {
    Response(Response),
    #[cfg(test)]
    Fixture(VecDeque<Bytes>),
}

impl Chunks {
    #[inline]
    pub fn from_response(response: Response) -> Self {
        Chunks::Response(response)
    }

    #[cfg(test)]
    pub fn from_fixture<I: IntoIterator<Item = &'static [u8]>>(parts: I) -> Self {
        Chunks::Fixture(parts.into_iter().map(Bytes::from_static).collect())
    }

    /// Returns the next chunk, or `None` once the body is exhausted.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        match self {
            Chunks::Response(response) => {
                response.chunk().await.map_err(|err| Error(err.to_string()))
            }
            #[cfg(test)]
            Chunks::Fixture(parts) => Ok(parts.pop_front()),
        }
    }
}

mod http;
mod local;

pub use http::{Credentials, FetchAttempt, HttpOptions, HttpRangeSource};
pub use local::LocalFileSource;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::header::HeaderMap;

use crate::error::{Result, TransportError};
use crate::zip::ByteRange;

/// Stream of raw body chunks returned by [`RangeSource::fetch_stream`].
pub type ChunkStream = BoxStream<'static, Result<Bytes>>;

/// Response to a single range request.
#[derive(Debug, Clone)]
pub struct RangeResponse {
    /// HTTP-style status: 206 for an honored range, 200 for a full body.
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RangeResponse {
    /// A response carrying exactly the requested bytes.
    pub fn partial(body: Bytes) -> Self {
        Self {
            status: 206,
            headers: HeaderMap::new(),
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200 || self.status == 206
    }

    /// Body restricted to `range`.
    ///
    /// A 200 response means the server ignored the `Range` header and sent
    /// the whole resource, so the requested window is cut out of it.
    pub fn into_range_body(self, range: ByteRange) -> Bytes {
        if self.status != 200 {
            return self.body;
        }
        let len = self.body.len() as u64;
        let start = range.start.min(len) as usize;
        let end = range.end.min(len) as usize;
        self.body.slice(start..end)
    }
}

/// Random access to a remote (or local) resource by byte range.
#[async_trait]
pub trait RangeSource: Send + Sync {
    /// Total size of the resource in bytes.
    async fn length(&self) -> Result<u64>;

    /// Fetch `[range.start, range.end)`.
    async fn fetch(&self, range: ByteRange) -> Result<RangeResponse>;

    /// Fetch `[range.start, range.end)` as a sequence of chunks.
    ///
    /// The default implementation issues a single [`fetch`](Self::fetch) and
    /// yields its body as one chunk.
    async fn fetch_stream(&self, range: ByteRange) -> Result<ChunkStream> {
        let response = self.fetch(range).await?;
        let body = response.into_range_body(range);
        Ok(stream::once(async move { Ok(body) }).boxed())
    }
}

#[async_trait]
impl<S: RangeSource + ?Sized> RangeSource for std::sync::Arc<S> {
    async fn length(&self) -> Result<u64> {
        (**self).length().await
    }

    async fn fetch(&self, range: ByteRange) -> Result<RangeResponse> {
        (**self).fetch(range).await
    }

    async fn fetch_stream(&self, range: ByteRange) -> Result<ChunkStream> {
        (**self).fetch_stream(range).await
    }
}

/// Restrict a stream that starts at offset 0 of the resource to `range`.
///
/// Used when a server answers a range request with the full body. The stream
/// ends as soon as `range.end` has been passed.
pub fn clip_stream(chunks: ChunkStream, range: ByteRange) -> ChunkStream {
    chunks
        .scan(0u64, move |position, chunk| {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => return futures::future::ready(Some(Err(e))),
            };
            let chunk_start = *position;
            if chunk_start >= range.end {
                return futures::future::ready(None);
            }
            *position += chunk.len() as u64;

            let from = range.start.saturating_sub(chunk_start).min(chunk.len() as u64) as usize;
            let to = (range.end - chunk_start).min(chunk.len() as u64) as usize;
            futures::future::ready(Some(Ok(chunk.slice(from..to))))
        })
        .filter(|chunk| {
            futures::future::ready(!matches!(chunk, Ok(bytes) if bytes.is_empty()))
        })
        .boxed()
}

/// Check a requested range against the resource length.
pub(crate) fn check_bounds(range: ByteRange, length: u64) -> Result<()> {
    if range.start > range.end || range.end > length {
        return Err(TransportError::RangeOutOfBounds {
            start: range.start,
            end: range.end,
            length,
        }
        .into());
    }
    Ok(())
}

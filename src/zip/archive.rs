use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::OnceCell;
use tracing::debug;

use super::central_dir::{EntryIndex, fetch_central_directory, parse_central_directory};
use super::eocd::{DEFAULT_EOCD_WINDOW, EocdLocator};
use super::inflater::{StreamingInflater, decode_payload, extract_whole};
use super::resolver::{FetchStrategy, estimated_range, header_range, lookup, payload_range};
use super::structures::{ByteRange, CentralDirectoryEntry, EndOfCentralDirectory, LocalFileHeader};
use crate::error::Result;
use crate::io::{ChunkStream, RangeSource};

/// Tuning for an [`Archive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveOptions {
    /// Tail bytes searched for the end of central directory record.
    pub eocd_window: u64,
    /// Keep doubling the tail window when the record is not found.
    pub widen_eocd_search: bool,
    pub fetch_strategy: FetchStrategy,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            eocd_window: DEFAULT_EOCD_WINDOW,
            widen_eocd_search: false,
            fetch_strategy: FetchStrategy::default(),
        }
    }
}

/// One remote ZIP archive.
///
/// The resource length, the EOCD record, the raw central directory and the
/// parsed index are fetched on first use and reused afterwards. Concurrent
/// first calls wait for a single fetch.
pub struct Archive<S: RangeSource> {
    source: S,
    options: ArchiveOptions,
    length: OnceCell<u64>,
    eocd: OnceCell<EndOfCentralDirectory>,
    central_directory: OnceCell<Bytes>,
    index: OnceCell<EntryIndex>,
}

impl<S: RangeSource> Archive<S> {
    pub fn new(source: S) -> Self {
        Self::with_options(source, ArchiveOptions::default())
    }

    pub fn with_options(source: S, options: ArchiveOptions) -> Self {
        Self {
            source,
            options,
            length: OnceCell::new(),
            eocd: OnceCell::new(),
            central_directory: OnceCell::new(),
            index: OnceCell::new(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn options(&self) -> &ArchiveOptions {
        &self.options
    }

    /// Size of the archive in bytes.
    pub async fn resource_length(&self) -> Result<u64> {
        self.length
            .get_or_try_init(|| self.source.length())
            .await
            .copied()
    }

    pub async fn end_of_central_directory(&self) -> Result<&EndOfCentralDirectory> {
        self.eocd
            .get_or_try_init(|| async {
                let length = self.resource_length().await?;
                let locator = EocdLocator {
                    window: self.options.eocd_window,
                    widen: self.options.widen_eocd_search,
                };
                locator.locate(&self.source, length).await
            })
            .await
    }

    /// Raw central directory bytes.
    pub async fn central_directory(&self) -> Result<&Bytes> {
        self.central_directory
            .get_or_try_init(|| async {
                let eocd = self.end_of_central_directory().await?;
                let length = self.resource_length().await?;
                fetch_central_directory(&self.source, eocd, length).await
            })
            .await
    }

    /// Parsed central directory.
    pub async fn entries(&self) -> Result<&EntryIndex> {
        self.index
            .get_or_try_init(|| async {
                let data = self.central_directory().await?;
                parse_central_directory(data)
            })
            .await
    }

    /// Entry names in central directory order.
    pub async fn list_entries(&self) -> Result<Vec<Vec<u8>>> {
        Ok(self.entries().await?.names().map(<[u8]>::to_vec).collect())
    }

    /// Byte range a single-request fetch of `name` would cover.
    pub async fn resolve(&self, name: impl AsRef<[u8]>) -> Result<ByteRange> {
        let entry = lookup(self.entries().await?, name.as_ref())?;
        let length = self.resource_length().await?;
        Ok(estimated_range(entry).clamp_to(length))
    }

    /// Fetch and decode one entry into memory.
    pub async fn fetch_entry(&self, name: impl AsRef<[u8]>) -> Result<Vec<u8>> {
        let entry = lookup(self.entries().await?, name.as_ref())?;
        let length = self.resource_length().await?;
        debug!(name = %entry.name_lossy(), strategy = ?self.options.fetch_strategy, "fetching entry");

        match self.options.fetch_strategy {
            FetchStrategy::SingleRange => {
                let range = estimated_range(entry).clamp_to(length);
                let body = self.source.fetch(range).await?.into_range_body(range);
                extract_whole(&body, Some(entry))
            }
            FetchStrategy::TwoPhase => {
                let header = self.local_header(entry, length).await?;
                let range = payload_range(entry, &header).clamp_to(length);
                let body = self.source.fetch(range).await?.into_range_body(range);
                decode_payload(&header, &body, Some(entry))
            }
        }
    }

    /// Fetch one entry as a stream of decoded chunks.
    ///
    /// Chunks are decoded as they arrive. The stream ends with an error item
    /// if the data turns out to be truncated or corrupt.
    pub async fn fetch_entry_streaming(&self, name: impl AsRef<[u8]>) -> Result<EntryStream> {
        let entry = lookup(self.entries().await?, name.as_ref())?;
        let length = self.resource_length().await?;
        debug!(name = %entry.name_lossy(), strategy = ?self.options.fetch_strategy, "streaming entry");

        let (range, inflater) = match self.options.fetch_strategy {
            FetchStrategy::SingleRange => (
                estimated_range(entry).clamp_to(length),
                StreamingInflater::new(Some(entry.clone())),
            ),
            FetchStrategy::TwoPhase => {
                let header = self.local_header(entry, length).await?;
                (
                    payload_range(entry, &header).clamp_to(length),
                    StreamingInflater::from_header(&header, Some(entry.clone()))?,
                )
            }
        };

        let chunks = if range.is_empty() {
            stream::empty().boxed()
        } else {
            self.source.fetch_stream(range).await?
        };

        Ok(EntryStream::new(chunks, inflater))
    }

    async fn local_header(
        &self,
        entry: &CentralDirectoryEntry,
        length: u64,
    ) -> Result<LocalFileHeader> {
        let range = header_range(entry).clamp_to(length);
        let body = self.source.fetch(range).await?.into_range_body(range);
        LocalFileHeader::from_bytes(&body)
    }
}

/// Decoded chunks of one entry, produced as transport chunks arrive.
///
/// Single pass: once it ends, fetch the entry again to re-read it.
pub struct EntryStream {
    chunks: ChunkStream,
    inflater: Option<StreamingInflater>,
}

impl EntryStream {
    fn new(chunks: ChunkStream, inflater: StreamingInflater) -> Self {
        Self {
            chunks,
            inflater: Some(inflater),
        }
    }

    /// Drain the stream into one buffer.
    pub async fn read_to_end(mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(chunk) = self.next().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out)
    }
}

impl Stream for EntryStream {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            let Some(inflater) = this.inflater.as_mut() else {
                return Poll::Ready(None);
            };

            let item = match this.chunks.poll_next_unpin(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(item) => item,
            };

            match item {
                Some(Ok(chunk)) => match inflater.feed(&chunk) {
                    Ok(out) if out.is_empty() => continue,
                    Ok(out) => return Poll::Ready(Some(Ok(Bytes::from(out)))),
                    Err(e) => {
                        this.inflater = None;
                        return Poll::Ready(Some(Err(e)));
                    }
                },
                Some(Err(e)) => {
                    this.inflater = None;
                    return Poll::Ready(Some(Err(e)));
                }
                None => {
                    let finished = this.inflater.take().map(StreamingInflater::finish);
                    return match finished {
                        Some(Err(e)) => Poll::Ready(Some(Err(e))),
                        _ => Poll::Ready(None),
                    };
                }
            }
        }
    }
}

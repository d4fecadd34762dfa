//! Error taxonomy shared by the transport layer and the ZIP core.

use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every failure surfaced by the library.
///
/// Errors are reported as soon as they happen; nothing is retried here.
/// Retry and redirect policy belongs to the [`RangeSource`](crate::io::RangeSource).
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    ArchiveFormat(#[from] ArchiveFormatError),

    #[error("entry not found in archive: {0}")]
    EntryNotFound(String),

    #[error("decompression failed: {0}")]
    Decompression(String),
}

impl Error {
    pub(crate) fn decompression(msg: impl Into<String>) -> Self {
        Error::Decompression(msg.into())
    }
}

/// Failures of the byte source itself.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected HTTP status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("remote server does not support Range requests")]
    RangeUnsupported,

    #[error("remote server did not return Content-Length")]
    MissingContentLength,

    #[error("too many redirects, last location was {0}")]
    TooManyRedirects(String),

    #[error("redirect without a usable Location header")]
    BadRedirect,

    #[error("max retries exceeded: {0}")]
    RetriesExhausted(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("range {start}..{end} is outside of a resource of {length} bytes")]
    RangeOutOfBounds { start: u64, end: u64, length: u64 },
}

/// The bytes were fetched but do not describe a ZIP archive we can read.
#[derive(Debug, Error)]
pub enum ArchiveFormatError {
    #[error("end of central directory record not found")]
    EocdNotFound,

    #[error("central directory fetch failed with HTTP status {0}")]
    CentralDirectoryFetchFailed(u16),

    #[error("central directory at {offset}..{end} lies outside an archive of {length} bytes")]
    CentralDirectoryOutOfBounds { offset: u64, end: u64, length: u64 },

    #[error("invalid central directory entry at offset {0}")]
    InvalidCentralDirectoryEntry(usize),
}

//! # pinch
//!
//! Fetch a single entry from a remote ZIP archive without downloading the
//! archive.
//!
//! Only three kinds of byte ranges are requested: the tail of the file holding
//! the End of Central Directory record, the central directory itself, and the
//! local header plus payload of the wanted entry. The payload is inflated if
//! it was deflated, either in one go or chunk by chunk as it arrives.
//!
//! ## Features
//!
//! - HTTP/HTTPS sources using Range requests, with redirects, retries and
//!   Basic authentication
//! - Local files through the same interface
//! - STORED and DEFLATE entries
//! - Streaming extraction
//!
//! ## Example
//!
//! ```no_run
//! use pinch::{Archive, HttpOptions, HttpRangeSource};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let source = HttpRangeSource::new("https://example.com/archive.zip", HttpOptions::default())?;
//!     let archive = Archive::new(source);
//!
//!     for name in archive.list_entries().await? {
//!         println!("{}", String::from_utf8_lossy(&name));
//!     }
//!
//!     let data = archive.fetch_entry("data.json").await?;
//!     println!("{} bytes", data.len());
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod io;
pub mod zip;

pub use cli::Cli;
pub use error::{ArchiveFormatError, Error, Result, TransportError};
pub use io::{
    Credentials, FetchAttempt, HttpOptions, HttpRangeSource, LocalFileSource, RangeResponse,
    RangeSource,
};
pub use zip::{Archive, ArchiveOptions, EntryStream, FetchStrategy};

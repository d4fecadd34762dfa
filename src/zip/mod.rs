//! Reading single entries out of a ZIP archive through byte ranges.
//!
//! ## Architecture
//!
//! - [`structures`]: fixed layouts of the EOCD record, central directory
//!   entries and local file headers
//! - [`eocd`]: finds the EOCD record in the tail of the resource
//! - [`central_dir`]: fetches and parses the central directory into an
//!   [`EntryIndex`]
//! - [`resolver`]: turns an entry name into the byte range to fetch
//! - [`inflater`]: decodes stored and deflated payloads, whole or chunk by chunk
//! - [`archive`]: the [`Archive`] handle tying these together with cached state
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! Reading the EOCD from the tail, then the central directory, then one
//! local header and payload means an entry can be extracted with three or
//! four small range requests.
//!
//! ## Limitations
//!
//! - No ZIP64, encryption or multi-disk archives
//! - Only STORED and DEFLATE
//! - CRC-32 is not verified

pub mod archive;
pub mod central_dir;
pub mod eocd;
pub mod inflater;
pub mod resolver;
pub mod structures;

pub use archive::{Archive, ArchiveOptions, EntryStream};
pub use central_dir::EntryIndex;
pub use eocd::EocdLocator;
pub use inflater::StreamingInflater;
pub use resolver::{FetchStrategy, PADDING};
pub use structures::*;

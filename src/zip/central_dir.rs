//! Central directory parsing.

use bytes::Bytes;
use indexmap::IndexMap;
use tracing::debug;

use super::structures::{CentralDirectoryEntry, EndOfCentralDirectory};
use crate::error::{ArchiveFormatError, Result};
use crate::io::RangeSource;

/// Entries of an archive keyed by raw name, in central directory order.
///
/// A name that appears twice keeps the position of its first record and the
/// metadata of its last one.
#[derive(Debug, Clone, Default)]
pub struct EntryIndex {
    entries: IndexMap<Vec<u8>, CentralDirectoryEntry>,
}

impl EntryIndex {
    pub fn get(&self, name: &[u8]) -> Option<&CentralDirectoryEntry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names in central directory order.
    pub fn names(&self) -> impl Iterator<Item = &[u8]> {
        self.entries.keys().map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CentralDirectoryEntry> {
        self.entries.values()
    }

    fn insert(&mut self, entry: CentralDirectoryEntry) {
        self.entries.insert(entry.name.clone(), entry);
    }
}

/// Fetch the central directory described by `eocd` from a resource of
/// `length` bytes.
///
/// # Errors
///
/// [`ArchiveFormatError::CentralDirectoryOutOfBounds`] when the record points
/// past the end of the resource, and
/// [`ArchiveFormatError::CentralDirectoryFetchFailed`] when the source
/// answers with anything but 200 or 206.
pub async fn fetch_central_directory<S: RangeSource + ?Sized>(
    source: &S,
    eocd: &EndOfCentralDirectory,
    length: u64,
) -> Result<Bytes> {
    let range = eocd.central_directory_range();
    if range.end > length {
        return Err(ArchiveFormatError::CentralDirectoryOutOfBounds {
            offset: range.start,
            end: range.end,
            length,
        }
        .into());
    }
    debug!(range = %range.to_header(), entries = eocd.total_entries, "fetching central directory");

    let response = source.fetch(range).await?;
    if !response.is_success() {
        return Err(ArchiveFormatError::CentralDirectoryFetchFailed(response.status).into());
    }
    Ok(response.into_range_body(range))
}

/// Parse every record of a central directory buffer.
///
/// Parsing stops quietly at the end of the buffer or at the first record
/// that does not start with the central directory signature. A record whose
/// variable-length fields run past the end of the buffer is an error.
pub fn parse_central_directory(data: &[u8]) -> Result<EntryIndex> {
    let mut index = EntryIndex::default();
    let mut cursor = 0usize;

    while cursor < data.len() {
        let Some(entry) = CentralDirectoryEntry::from_bytes(&data[cursor..]) else {
            debug!(offset = cursor, "central directory ends early");
            break;
        };

        let record_len = entry.record_len();
        if cursor + record_len > data.len() {
            return Err(ArchiveFormatError::InvalidCentralDirectoryEntry(cursor).into());
        }

        index.insert(entry);
        cursor += record_len;
    }

    debug!(entries = index.len(), "parsed central directory");
    Ok(index)
}

//! Mapping entry names to byte ranges of the archive.

use super::central_dir::EntryIndex;
use super::structures::{ByteRange, CentralDirectoryEntry, LFH_SIZE, LocalFileHeader};
use crate::error::{Error, Result};

/// Slack added to single-range fetches.
///
/// The local header's name and extra fields may be longer than the central
/// directory copies, so the computed end is padded a little.
pub const PADDING: u64 = 16;

/// How the bytes of an entry are fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchStrategy {
    /// Fetch the 30-byte local header first, then exactly the payload.
    #[default]
    TwoPhase,
    /// Fetch header and payload in one request whose end is estimated from
    /// the central directory plus [`PADDING`]. Saves one round trip.
    SingleRange,
}

/// Look up `name` in the index.
pub fn lookup<'a>(index: &'a EntryIndex, name: &[u8]) -> Result<&'a CentralDirectoryEntry> {
    index
        .get(name)
        .ok_or_else(|| Error::EntryNotFound(String::from_utf8_lossy(name).into_owned()))
}

/// Range covering the local header and payload of `name`, estimated from
/// central directory metadata alone. Nothing is fetched.
pub fn resolve(index: &EntryIndex, name: &[u8]) -> Result<ByteRange> {
    Ok(estimated_range(lookup(index, name)?))
}

/// See [`resolve`].
pub fn estimated_range(entry: &CentralDirectoryEntry) -> ByteRange {
    let start = entry.lfh_offset as u64;
    let end = start
        + LFH_SIZE as u64
        + PADDING
        + entry.compressed_size as u64
        + entry.name_len as u64
        + entry.extra_len as u64
        + entry.comment_len as u64;
    ByteRange::new(start, end)
}

/// Range of the local header's fixed part.
pub fn header_range(entry: &CentralDirectoryEntry) -> ByteRange {
    let start = entry.lfh_offset as u64;
    ByteRange::new(start, start + LFH_SIZE as u64)
}

/// Exact payload range once the local header has been read.
pub fn payload_range(entry: &CentralDirectoryEntry, header: &LocalFileHeader) -> ByteRange {
    let start = entry.lfh_offset as u64 + header.payload_offset();
    ByteRange::new(start, start + header.payload_len(Some(entry)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::structures::CompressionMethod;

    fn entry(offset: u32, compressed: u32) -> CentralDirectoryEntry {
        CentralDirectoryEntry {
            name: b"data.json".to_vec(),
            flags: 0,
            compression_method: CompressionMethod::Deflate,
            last_mod_time: 0,
            last_mod_date: 0,
            crc32: 0,
            compressed_size: compressed,
            uncompressed_size: compressed * 3,
            name_len: 9,
            extra_len: 24,
            comment_len: 5,
            lfh_offset: offset,
        }
    }

    #[test]
    fn estimated_range_includes_padding_and_variable_fields() {
        let range = estimated_range(&entry(1000, 500));
        assert_eq!(range.start, 1000);
        assert_eq!(range.end, 1000 + 30 + 16 + 500 + 9 + 24 + 5);
    }

    #[test]
    fn exact_payload_range_from_local_header() {
        let entry = entry(1000, 500);
        let header = LocalFileHeader {
            flags: 0,
            compression_method: CompressionMethod::Deflate,
            crc32: 0,
            compressed_size: 500,
            uncompressed_size: 1500,
            name_len: 9,
            extra_len: 28,
        };
        assert_eq!(header_range(&entry), ByteRange::new(1000, 1030));
        assert_eq!(payload_range(&entry, &header), ByteRange::new(1067, 1567));
    }

    #[test]
    fn missing_name_is_reported() {
        let index = EntryIndex::default();
        let err = resolve(&index, b"nope.txt").unwrap_err();
        assert!(matches!(err, Error::EntryNotFound(name) if name == "nope.txt"));
    }
}

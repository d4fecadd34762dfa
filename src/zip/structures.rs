use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;
use std::ops::Range;

use crate::error::{Error, Result};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }
}

/// Half-open byte range `[start, end)` inside the remote resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clamp the end of the range to the resource length.
    pub fn clamp_to(self, length: u64) -> Self {
        Self {
            start: self.start.min(length),
            end: self.end.min(length),
        }
    }

    /// Value for an HTTP `Range` header. HTTP ranges are inclusive.
    pub fn to_header(&self) -> String {
        format!("bytes={}-{}", self.start, self.end.saturating_sub(1))
    }
}

impl From<Range<u64>> for ByteRange {
    fn from(range: Range<u64>) -> Self {
        Self::new(range.start, range.end)
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    /// Parse the fixed part of the record. `data` must start at the signature.
    ///
    /// Returns `None` when the slice is too short or the signature is wrong.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return None;
        }

        let mut cursor = Cursor::new(&data[4..Self::SIZE]);

        Some(Self {
            disk_number: cursor.read_u16::<LittleEndian>().ok()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>().ok()?,
            disk_entries: cursor.read_u16::<LittleEndian>().ok()?,
            total_entries: cursor.read_u16::<LittleEndian>().ok()?,
            cd_size: cursor.read_u32::<LittleEndian>().ok()?,
            cd_offset: cursor.read_u32::<LittleEndian>().ok()?,
            comment_len: cursor.read_u16::<LittleEndian>().ok()?,
        })
    }

    /// Byte range of the central directory inside the archive.
    pub fn central_directory_range(&self) -> ByteRange {
        let start = self.cd_offset as u64;
        ByteRange::new(start, start + self.cd_size as u64)
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// General purpose flag: sizes and CRC follow the payload in a data descriptor.
pub const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;

/// One record of the central directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralDirectoryEntry {
    /// Raw name bytes; not guaranteed to be UTF-8.
    pub name: Vec<u8>,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub name_len: u16,
    pub extra_len: u16,
    pub comment_len: u16,
    pub lfh_offset: u32,
}

impl CentralDirectoryEntry {
    /// Parse one record starting at `data[0]`.
    ///
    /// Returns `None` if the fixed header is missing or carries a foreign
    /// signature, which callers treat as the end of the directory. The name is
    /// cut short when `data` ends early; compare [`record_len`](Self::record_len)
    /// against the buffer to detect that.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < CDFH_MIN_SIZE || &data[0..4] != CDFH_SIGNATURE {
            return None;
        }

        let mut cursor = Cursor::new(&data[4..CDFH_MIN_SIZE]);

        let _version_made_by = cursor.read_u16::<LittleEndian>().ok()?;
        let _version_needed = cursor.read_u16::<LittleEndian>().ok()?;
        let flags = cursor.read_u16::<LittleEndian>().ok()?;
        let compression_method = cursor.read_u16::<LittleEndian>().ok()?;
        let last_mod_time = cursor.read_u16::<LittleEndian>().ok()?;
        let last_mod_date = cursor.read_u16::<LittleEndian>().ok()?;
        let crc32 = cursor.read_u32::<LittleEndian>().ok()?;
        let compressed_size = cursor.read_u32::<LittleEndian>().ok()?;
        let uncompressed_size = cursor.read_u32::<LittleEndian>().ok()?;
        let name_len = cursor.read_u16::<LittleEndian>().ok()?;
        let extra_len = cursor.read_u16::<LittleEndian>().ok()?;
        let comment_len = cursor.read_u16::<LittleEndian>().ok()?;
        let _disk_number_start = cursor.read_u16::<LittleEndian>().ok()?;
        let _internal_attrs = cursor.read_u16::<LittleEndian>().ok()?;
        let _external_attrs = cursor.read_u32::<LittleEndian>().ok()?;
        let lfh_offset = cursor.read_u32::<LittleEndian>().ok()?;

        let name_end = (CDFH_MIN_SIZE + name_len as usize).min(data.len());

        Some(Self {
            name: data[CDFH_MIN_SIZE..name_end].to_vec(),
            flags,
            compression_method: CompressionMethod::from_u16(compression_method),
            last_mod_time,
            last_mod_date,
            crc32,
            compressed_size,
            uncompressed_size,
            name_len,
            extra_len,
            comment_len,
            lfh_offset,
        })
    }

    /// Total size of this record, i.e. the distance to the next one.
    pub fn record_len(&self) -> usize {
        CDFH_MIN_SIZE + self.name_len as usize + self.extra_len as usize + self.comment_len as usize
    }

    /// Name decoded for display, replacing invalid UTF-8.
    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    pub fn is_directory(&self) -> bool {
        self.name.ends_with(b"/")
    }

    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = ((self.last_mod_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_mod_time & 0x1F) * 2) as u8;
        let minute = ((self.last_mod_time >> 5) & 0x3F) as u8;
        let hour = ((self.last_mod_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }
}

/// Local File Header preceding each payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileHeader {
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub name_len: u16,
    pub extra_len: u16,
}

impl LocalFileHeader {
    /// Parse the fixed 30-byte header at `data[0]`.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < LFH_SIZE {
            return Err(Error::decompression(format!(
                "truncated local file header ({} of {} bytes)",
                data.len(),
                LFH_SIZE
            )));
        }
        if &data[0..4] != LFH_SIGNATURE {
            return Err(Error::decompression("invalid local file header signature"));
        }

        let mut cursor = Cursor::new(&data[4..LFH_SIZE]);
        let io = |e: std::io::Error| Error::decompression(e.to_string());

        let _version_needed = cursor.read_u16::<LittleEndian>().map_err(io)?;
        let flags = cursor.read_u16::<LittleEndian>().map_err(io)?;
        let compression_method = cursor.read_u16::<LittleEndian>().map_err(io)?;
        let _mod_time = cursor.read_u16::<LittleEndian>().map_err(io)?;
        let _mod_date = cursor.read_u16::<LittleEndian>().map_err(io)?;
        let crc32 = cursor.read_u32::<LittleEndian>().map_err(io)?;
        let compressed_size = cursor.read_u32::<LittleEndian>().map_err(io)?;
        let uncompressed_size = cursor.read_u32::<LittleEndian>().map_err(io)?;
        let name_len = cursor.read_u16::<LittleEndian>().map_err(io)?;
        let extra_len = cursor.read_u16::<LittleEndian>().map_err(io)?;

        Ok(Self {
            flags,
            compression_method: CompressionMethod::from_u16(compression_method),
            crc32,
            compressed_size,
            uncompressed_size,
            name_len,
            extra_len,
        })
    }

    /// Offset of the payload relative to the start of this header.
    pub fn payload_offset(&self) -> u64 {
        LFH_SIZE as u64 + self.name_len as u64 + self.extra_len as u64
    }

    pub fn is_compressed(&self) -> bool {
        self.compression_method != CompressionMethod::Stored
    }

    /// Number of payload bytes following the header.
    ///
    /// Entries written with a data descriptor carry zero sizes here; for those
    /// the central directory copy is used instead.
    pub fn payload_len(&self, fallback: Option<&CentralDirectoryEntry>) -> u64 {
        let (compressed, uncompressed) = match fallback {
            Some(entry)
                if self.flags & FLAG_DATA_DESCRIPTOR != 0
                    && self.compressed_size == 0
                    && self.uncompressed_size == 0 =>
            {
                (entry.compressed_size, entry.uncompressed_size)
            }
            _ => (self.compressed_size, self.uncompressed_size),
        };

        if self.is_compressed() {
            compressed as u64
        } else {
            uncompressed as u64
        }
    }
}

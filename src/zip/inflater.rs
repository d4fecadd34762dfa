//! Payload decoding: stored bytes pass through, deflated bytes are inflated
//! as raw DEFLATE (no zlib or gzip envelope).
//!
//! Two modes share one decoder wrapper:
//!
//! - [`extract_whole`] / [`decode_payload`] work on a complete buffer.
//! - [`StreamingInflater`] is fed transport chunks one at a time and emits
//!   whatever output each chunk produces.

use flate2::{Decompress, FlushDecompress, Status};

use super::structures::{
    CentralDirectoryEntry, CompressionMethod, FLAG_DATA_DESCRIPTOR, LFH_SIZE, LocalFileHeader,
};
use crate::error::{Error, Result};

/// Output space reserved per decoder call.
const OUTPUT_CHUNK: usize = 32 * 1024;

/// Incremental raw-deflate decoder.
struct RawInflate {
    inner: Decompress,
    finished: bool,
}

impl RawInflate {
    fn new() -> Self {
        Self {
            // false: raw deflate, no zlib header
            inner: Decompress::new(false),
            finished: false,
        }
    }

    /// Decode as much of `input` as possible. Input past the end of the
    /// deflate stream is ignored.
    fn push(&mut self, mut input: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();

        while !self.finished {
            out.reserve(OUTPUT_CHUNK);
            let in_before = self.inner.total_in();
            let out_before = self.inner.total_out();

            let status = self
                .inner
                .decompress_vec(input, &mut out, FlushDecompress::None)
                .map_err(|e| Error::decompression(format!("corrupt deflate stream: {e}")))?;

            let consumed = (self.inner.total_in() - in_before) as usize;
            let produced = self.inner.total_out() - out_before;
            input = &input[consumed..];

            match status {
                Status::StreamEnd => self.finished = true,
                Status::Ok | Status::BufError => {
                    let out_full = out.len() == out.capacity();
                    if (input.is_empty() && !out_full) || (consumed == 0 && produced == 0) {
                        break;
                    }
                }
            }
        }

        Ok(out)
    }
}

/// Decoder for the method named in a local header.
fn decoder_for(header: &LocalFileHeader) -> Result<Option<RawInflate>> {
    match header.compression_method {
        CompressionMethod::Stored => Ok(None),
        CompressionMethod::Deflate => Ok(Some(RawInflate::new())),
        CompressionMethod::Unknown(method) => Err(Error::decompression(format!(
            "unsupported compression method {method}"
        ))),
    }
}

/// True when the payload length is unknown up front and the deflate stream
/// itself has to tell where it ends.
fn length_from_stream(header: &LocalFileHeader, payload_len: u64) -> bool {
    header.is_compressed() && payload_len == 0 && header.flags & FLAG_DATA_DESCRIPTOR != 0
}

/// Decode a complete buffer that starts with the local file header.
pub fn extract_whole(buf: &[u8], fallback: Option<&CentralDirectoryEntry>) -> Result<Vec<u8>> {
    let header = LocalFileHeader::from_bytes(buf)?;
    let start = header.payload_offset() as usize;
    let payload = buf.get(start..).ok_or_else(|| {
        Error::decompression(format!(
            "buffer of {} bytes ends inside the local header ({} bytes)",
            buf.len(),
            start
        ))
    })?;
    decode_payload(&header, payload, fallback)
}

/// Decode `payload`, which starts right after the local header's name and
/// extra fields.
pub fn decode_payload(
    header: &LocalFileHeader,
    payload: &[u8],
    fallback: Option<&CentralDirectoryEntry>,
) -> Result<Vec<u8>> {
    let len = header.payload_len(fallback);
    let decoder = decoder_for(header)?;

    let Some(mut decoder) = decoder else {
        let len = len as usize;
        if payload.len() < len {
            return Err(Error::decompression(format!(
                "stored payload truncated: {} of {} bytes",
                payload.len(),
                len
            )));
        }
        return Ok(payload[..len].to_vec());
    };

    let data = if length_from_stream(header, len) {
        payload
    } else {
        &payload[..(len as usize).min(payload.len())]
    };
    if len == 0 && !length_from_stream(header, len) {
        return Ok(Vec::new());
    }

    let out = decoder.push(data)?;
    if !decoder.finished {
        return Err(Error::decompression("truncated deflate stream"));
    }
    Ok(out)
}

/// Bounds of the payload once the local header is known.
struct Payload {
    /// Offset of the first payload byte relative to the first fed byte.
    start: u64,
    len: u64,
    remaining: u64,
    unbounded: bool,
    decoder: Option<RawInflate>,
}

/// Chunk-by-chunk decoder for one entry.
///
/// Feed it the bytes of the fetched range in order with
/// [`feed`](Self::feed), then call [`finish`](Self::finish) once the
/// transport is done. Not reusable: every extraction needs a new inflater.
pub struct StreamingInflater {
    fallback: Option<CentralDirectoryEntry>,
    /// Leading bytes held back until the fixed header is complete.
    pending: Vec<u8>,
    payload: Option<Payload>,
    position: u64,
}

impl StreamingInflater {
    /// Inflater for a stream that starts with the local file header.
    ///
    /// `fallback` supplies sizes for entries written with a data descriptor.
    pub fn new(fallback: Option<CentralDirectoryEntry>) -> Self {
        Self {
            fallback,
            pending: Vec::new(),
            payload: None,
            position: 0,
        }
    }

    /// Inflater for a stream that starts at the first payload byte, the
    /// header having been read separately.
    pub fn from_header(
        header: &LocalFileHeader,
        fallback: Option<CentralDirectoryEntry>,
    ) -> Result<Self> {
        let mut inflater = Self::new(fallback);
        inflater.payload = Some(inflater.payload_for(header, 0)?);
        Ok(inflater)
    }

    fn payload_for(&self, header: &LocalFileHeader, start: u64) -> Result<Payload> {
        let len = header.payload_len(self.fallback.as_ref());
        let unbounded = length_from_stream(header, len);
        Ok(Payload {
            start,
            len,
            remaining: if unbounded { u64::MAX } else { len },
            unbounded,
            decoder: decoder_for(header)?,
        })
    }

    /// Consume the next chunk and return the output it produced, which may
    /// be empty.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<u8>> {
        if self.payload.is_some() {
            return self.consume(chunk);
        }

        self.pending.extend_from_slice(chunk);
        if self.pending.len() < LFH_SIZE {
            return Ok(Vec::new());
        }

        let header = LocalFileHeader::from_bytes(&self.pending)?;
        self.payload = Some(self.payload_for(&header, header.payload_offset())?);

        let buffered = std::mem::take(&mut self.pending);
        self.consume(&buffered)
    }

    fn consume(&mut self, chunk: &[u8]) -> Result<Vec<u8>> {
        let Some(payload) = self.payload.as_mut() else {
            return Ok(Vec::new());
        };

        let chunk_start = self.position;
        let chunk_len = chunk.len() as u64;
        self.position += chunk_len;

        let from = payload.start.saturating_sub(chunk_start).min(chunk_len);
        let take = (chunk_len - from).min(payload.remaining);
        payload.remaining -= take;

        let data = &chunk[from as usize..(from + take) as usize];
        if data.is_empty() {
            return Ok(Vec::new());
        }

        match payload.decoder.as_mut() {
            Some(decoder) => decoder.push(data),
            None => Ok(data.to_vec()),
        }
    }

    /// Signal the end of input. Fails if the header or payload was cut short.
    pub fn finish(self) -> Result<()> {
        let Some(payload) = self.payload else {
            return Err(Error::decompression(format!(
                "truncated local file header ({} of {} bytes)",
                self.pending.len(),
                LFH_SIZE
            )));
        };

        match payload.decoder {
            Some(decoder) if decoder.finished => Ok(()),
            Some(_) if payload.len == 0 && !payload.unbounded => Ok(()),
            Some(_) => Err(Error::decompression("truncated deflate stream")),
            None if payload.remaining == 0 => Ok(()),
            None => Err(Error::decompression(format!(
                "stored payload truncated: {} of {} bytes",
                payload.len - payload.remaining,
                payload.len
            ))),
        }
    }
}

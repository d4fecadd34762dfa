#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::Write;
use std::sync::Mutex;

use pinch::zip::ByteRange;
use pinch::{RangeResponse, RangeSource, Result};

pub const DATA_JSON: &str = "{\"gem\":\"pinch\",\"authors\":[\"Peter Hellberg\",\"Edward Patel\"],\"github_url\":\"https://github.com/peterhellberg/pinch\"}\n";

/// One member of a fixture archive.
pub struct Member {
    pub name: Vec<u8>,
    pub data: Vec<u8>,
    pub deflate: bool,
    pub extra: Vec<u8>,
    pub comment: Vec<u8>,
}

impl Member {
    pub fn stored(name: &str, data: &[u8]) -> Self {
        Self {
            name: name.as_bytes().to_vec(),
            data: data.to_vec(),
            deflate: false,
            extra: Vec::new(),
            comment: Vec::new(),
        }
    }

    pub fn deflated(name: &str, data: &[u8]) -> Self {
        Self {
            deflate: true,
            ..Self::stored(name, data)
        }
    }

    pub fn with_comment(mut self, comment: &[u8]) -> Self {
        self.comment = comment.to_vec();
        self
    }

    pub fn with_extra(mut self, extra: &[u8]) -> Self {
        self.extra = extra.to_vec();
        self
    }
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Assemble a ZIP archive. CRC fields are left zero; the reader never
/// checks them.
pub fn build_zip(members: &[Member], archive_comment: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut central = Vec::new();

    for member in members {
        let payload = if member.deflate {
            deflate(&member.data)
        } else {
            member.data.clone()
        };
        let method: u16 = if member.deflate { 8 } else { 0 };
        let offset = out.len() as u32;

        // local file header
        out.extend_from_slice(b"PK\x03\x04");
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&method.to_le_bytes());
        out.extend_from_slice(&0x6000u16.to_le_bytes());
        out.extend_from_slice(&0x4289u16.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&(member.data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(member.name.len() as u16).to_le_bytes());
        out.extend_from_slice(&(member.extra.len() as u16).to_le_bytes());
        out.extend_from_slice(&member.name);
        out.extend_from_slice(&member.extra);
        out.extend_from_slice(&payload);

        // central directory record
        central.extend_from_slice(b"PK\x01\x02");
        central.extend_from_slice(&20u16.to_le_bytes());
        central.extend_from_slice(&20u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&method.to_le_bytes());
        central.extend_from_slice(&0x6000u16.to_le_bytes());
        central.extend_from_slice(&0x4289u16.to_le_bytes());
        central.extend_from_slice(&0u32.to_le_bytes());
        central.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        central.extend_from_slice(&(member.data.len() as u32).to_le_bytes());
        central.extend_from_slice(&(member.name.len() as u16).to_le_bytes());
        central.extend_from_slice(&(member.extra.len() as u16).to_le_bytes());
        central.extend_from_slice(&(member.comment.len() as u16).to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u32.to_le_bytes());
        central.extend_from_slice(&offset.to_le_bytes());
        central.extend_from_slice(&member.name);
        central.extend_from_slice(&member.extra);
        central.extend_from_slice(&member.comment);
    }

    let cd_offset = out.len() as u32;
    let cd_size = central.len() as u32;
    out.extend_from_slice(&central);

    out.extend_from_slice(b"PK\x05\x06");
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&(members.len() as u16).to_le_bytes());
    out.extend_from_slice(&(members.len() as u16).to_le_bytes());
    out.extend_from_slice(&cd_size.to_le_bytes());
    out.extend_from_slice(&cd_offset.to_le_bytes());
    out.extend_from_slice(&(archive_comment.len() as u16).to_le_bytes());
    out.extend_from_slice(archive_comment);
    out
}

/// Text of exactly `len` bytes containing `needle` somewhere in the middle.
pub fn readme_text(len: usize, needle: &str) -> Vec<u8> {
    let mut text = String::new();
    let mut line = 0;
    while text.len() < len {
        if line == 120 {
            text.push_str(needle);
            text.push('\n');
        }
        text.push_str(&format!(
            "{line:05} Squeak is a modern open-source Smalltalk; read the release notes.\n"
        ));
        line += 1;
    }
    text.truncate(len);
    text.into_bytes()
}

/// The three-member archive used by most tests.
pub fn test_zip() -> Vec<u8> {
    build_zip(
        &[
            Member::stored("data.json", DATA_JSON.as_bytes()).with_comment(b"gem metadata"),
            Member::deflated("README.txt", &readme_text(26431, "Morphic graphics architecture")),
            Member::stored("images/", b""),
        ],
        b"",
    )
}

/// In-memory [`RangeSource`] that records every request.
pub struct MemorySource {
    data: Bytes,
    /// Answer range requests with the full body and status 200.
    pub ignore_ranges: bool,
    /// Split streamed bodies into chunks of this size.
    pub chunk_size: usize,
    requests: Mutex<Vec<ByteRange>>,
}

impl MemorySource {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: Bytes::from(data),
            ignore_ranges: false,
            chunk_size: 7,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ByteRange> {
        self.requests.lock().unwrap().clone()
    }

    pub fn clear_requests(&self) {
        self.requests.lock().unwrap().clear();
    }
}

#[async_trait]
impl RangeSource for MemorySource {
    async fn length(&self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    async fn fetch(&self, range: ByteRange) -> Result<RangeResponse> {
        self.requests.lock().unwrap().push(range);
        if self.ignore_ranges {
            return Ok(RangeResponse {
                status: 200,
                headers: Default::default(),
                body: self.data.clone(),
            });
        }
        Ok(RangeResponse::partial(
            self.data.slice(range.start as usize..range.end as usize),
        ))
    }

    async fn fetch_stream(&self, range: ByteRange) -> Result<pinch::io::ChunkStream> {
        use futures::StreamExt;

        let body = self.fetch(range).await?.into_range_body(range);
        let chunks: Vec<Result<Bytes>> = (0..body.len())
            .step_by(self.chunk_size)
            .map(|at| Ok(body.slice(at..(at + self.chunk_size).min(body.len()))))
            .collect();
        Ok(futures::stream::iter(chunks).boxed())
    }
}

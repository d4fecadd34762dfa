//! Locating the End of Central Directory record.
//!
//! Only the tail of the resource is fetched. The record sits at the very end
//! unless the archive carries a comment, which can push it back by up to
//! 65535 bytes; the default window assumes the comment is short.

use tracing::debug;

use super::structures::{ByteRange, EndOfCentralDirectory};
use crate::error::{ArchiveFormatError, Result};
use crate::io::RangeSource;

/// Bytes read from the end of the resource on the first try.
pub const DEFAULT_EOCD_WINDOW: u64 = 4096;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
const MAX_COMMENT_SIZE: u64 = 65535;

/// Finds the EOCD record in the tail of a [`RangeSource`].
#[derive(Debug, Clone, Copy)]
pub struct EocdLocator {
    /// Size of the tail window searched first.
    pub window: u64,
    /// Double the window (up to the largest possible comment) when the
    /// signature is not in the first one.
    pub widen: bool,
}

impl Default for EocdLocator {
    fn default() -> Self {
        Self {
            window: DEFAULT_EOCD_WINDOW,
            widen: false,
        }
    }
}

impl EocdLocator {
    /// Find and parse the End of Central Directory record.
    ///
    /// # Errors
    ///
    /// [`ArchiveFormatError::EocdNotFound`] if no signature lies in the
    /// searched window(s), plus any transport failure.
    pub async fn locate<S: RangeSource + ?Sized>(
        &self,
        source: &S,
        length: u64,
    ) -> Result<EndOfCentralDirectory> {
        let limit = if self.widen {
            length.min(MAX_COMMENT_SIZE + EndOfCentralDirectory::SIZE as u64)
        } else {
            length
        };
        let mut window = self.window.max(EndOfCentralDirectory::SIZE as u64).min(length);

        loop {
            let range = ByteRange::new(length - window, length);
            debug!(range = %range.to_header(), "searching for end of central directory");

            let response = source.fetch(range).await?;
            let tail = response.into_range_body(range);

            if let Some(eocd) = find_eocd(&tail) {
                return Ok(eocd);
            }

            if !self.widen || window >= limit {
                return Err(ArchiveFormatError::EocdNotFound.into());
            }
            window = (window * 2).min(limit);
        }
    }
}

/// Search backwards for the last EOCD signature in `tail` and parse the
/// record that starts there.
pub fn find_eocd(tail: &[u8]) -> Option<EndOfCentralDirectory> {
    let sig = EndOfCentralDirectory::SIGNATURE;
    if tail.len() < EndOfCentralDirectory::SIZE {
        return None;
    }

    (0..=tail.len() - EndOfCentralDirectory::SIZE)
        .rev()
        .find(|&i| &tail[i..i + sig.len()] == sig)
        .and_then(|i| EndOfCentralDirectory::from_bytes(&tail[i..]))
}

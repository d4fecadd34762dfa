use async_trait::async_trait;
use bytes::Bytes;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

use super::{RangeResponse, RangeSource, check_bounds};
use crate::error::{Result, TransportError};
use crate::zip::ByteRange;

/// Local file source with random access support
pub struct LocalFileSource {
    path: PathBuf,
    size: u64,
}

impl LocalFileSource {
    pub async fn open(path: &Path) -> Result<Self> {
        let size = tokio::fs::metadata(path)
            .await
            .map_err(TransportError::from)?
            .len();
        Ok(Self {
            path: path.to_path_buf(),
            size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RangeSource for LocalFileSource {
    async fn length(&self) -> Result<u64> {
        Ok(self.size)
    }

    async fn fetch(&self, range: ByteRange) -> Result<RangeResponse> {
        check_bounds(range, self.size)?;
        debug!(path = %self.path.display(), range = %range.to_header(), "reading");

        // A fresh handle per read keeps concurrent fetches from sharing a cursor.
        let mut file = File::open(&self.path).await.map_err(TransportError::from)?;
        file.seek(SeekFrom::Start(range.start))
            .await
            .map_err(TransportError::from)?;

        let mut buf = vec![0u8; range.len() as usize];
        file.read_exact(&mut buf)
            .await
            .map_err(TransportError::from)?;

        Ok(RangeResponse::partial(Bytes::from(buf)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn reads_exact_ranges() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();

        let source = LocalFileSource::open(file.path()).await.unwrap();
        assert_eq!(source.length().await.unwrap(), 10);

        let response = source.fetch(ByteRange::new(2, 6)).await.unwrap();
        assert_eq!(response.status, 206);
        assert_eq!(response.body, "2345");

        assert!(source.fetch(ByteRange::new(8, 12)).await.is_err());
    }

    #[tokio::test]
    async fn missing_file_is_a_transport_error() {
        let err = LocalFileSource::open(Path::new("/definitely/not/here.zip"))
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            crate::Error::Transport(TransportError::Io(_))
        ));
    }
}

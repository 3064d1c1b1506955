use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use packmule_record::ByteSource;

/// Errors from checksum computation.
///
/// Checksum failures are not retried: they are typically deterministic
/// (the file was removed or truncated since selection), so the caller
/// routes them straight to a failed record.
#[derive(Debug, thiserror::Error)]
pub enum ChecksumError {
    #[error("cannot open byte source: {0}")]
    Unreadable(std::io::Error),

    #[error("read failed mid-stream: {0}")]
    Io(std::io::Error),

    #[error("byte source is empty")]
    Empty,
}

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Computes the SHA-256 digest of a byte source, reading incrementally.
///
/// Never mutates the record that owns the source; the scheduler applies
/// the result via `set_checksum` or `mark_failed`.
pub async fn compute_checksum(source: &ByteSource) -> Result<String, ChecksumError> {
    match source {
        ByteSource::Memory(data) => {
            if data.is_empty() {
                return Err(ChecksumError::Empty);
            }
            Ok(checksum_bytes(data))
        }
        ByteSource::Path(path) => {
            let mut file = tokio::fs::File::open(path)
                .await
                .map_err(ChecksumError::Unreadable)?;
            let mut hasher = Sha256::new();
            let mut buf = [0u8; 8192];
            let mut total: u64 = 0;
            loop {
                let n = file.read(&mut buf).await.map_err(ChecksumError::Io)?;
                if n == 0 {
                    break;
                }
                hasher.update(&buf[..n]);
                total += n as u64;
            }
            if total == 0 {
                return Err(ChecksumError::Empty);
            }
            Ok(hex::encode(hasher.finalize()))
        }
    }
}

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use packmule_record::ByteSource;

/// Callback receiving upload progress as a percentage (0–100).
///
/// Invoked zero or more times with non-decreasing values before the
/// transport resolves. Resets to zero when a retry restarts transmission.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// One upload's payload and metadata, borrowed from its record.
#[derive(Debug, Clone, Copy)]
pub struct UploadRequest<'a> {
    /// Destination-relative name of the payload.
    pub name: &'a str,
    /// The payload bytes.
    pub source: &'a ByteSource,
    /// Payload length in bytes.
    pub byte_size: u64,
    /// Media type of the payload.
    pub media_type: &'a str,
    /// Hex SHA-256 of the payload, computed before transmission.
    pub checksum: &'a str,
    /// Small free-form metadata map sent alongside the payload.
    pub metadata: &'a HashMap<String, String>,
}

/// Errors produced by an upload transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("request timed out")]
    Timeout,

    #[error("rejected by destination: {0}")]
    Rejected(String),

    #[error("invalid destination path: {0}")]
    InvalidPath(String),

    #[error("checksum mismatch after transfer")]
    ChecksumMismatch,
}

impl TransportError {
    /// Whether a retry can plausibly succeed.
    ///
    /// I/O, connection, and timeout failures are transient. A rejection is
    /// the destination refusing the payload itself, an invalid path never
    /// becomes valid, and a checksum mismatch means the source no longer
    /// matches the digest computed for it.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::Io(_) | TransportError::Connection(_) | TransportError::Timeout
        )
    }
}

/// Abstract destination for upload payloads.
///
/// Implementations report incremental progress through the supplied
/// callback and leave all record bookkeeping to the caller. Using a trait
/// keeps scheduling decoupled from any concrete destination and testable
/// with mocks.
pub trait UploadTransport: Send + Sync {
    /// Sends one payload plus metadata and waits for the outcome.
    fn send<'a>(
        &'a self,
        req: UploadRequest<'a>,
        progress: ProgressFn,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>>;
}

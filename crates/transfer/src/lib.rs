//! Checksum computation, upload transports, and retry policy.
//!
//! The scheduler drives records through [`compute_checksum`] and an
//! [`UploadTransport`]; both are independent of any concrete destination.
//! [`DirStore`] is the in-tree transport: it streams payloads into a local
//! destination directory and verifies the declared checksum on arrival.

mod checksum;
mod dir_store;
mod retry;
mod transport;

pub use checksum::{ChecksumError, checksum_bytes, compute_checksum};
pub use dir_store::DirStore;
pub use retry::{MAX_UPLOAD_ATTEMPTS, RetryPolicy, send_with_retry};
pub use transport::{ProgressFn, TransportError, UploadRequest, UploadTransport};

/// Default streaming chunk size: 64 KiB.
///
/// Small enough that progress callbacks fire often for medium files,
/// large enough to keep per-chunk overhead negligible.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

//! File records and their upload lifecycle.
//!
//! A [`FileRecord`] is the unit of work in a batch: one file moving through
//! checksum computation and transmission to a terminal state. Records use
//! interior mutability so the scheduler, transports, and progress consumers
//! can share them as `Arc<FileRecord>`.

mod record;
mod source;
mod status;

pub use record::{FileRecord, RecordError, RecordProgress};
pub use source::ByteSource;
pub use status::UploadStatus;

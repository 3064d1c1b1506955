use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::source::ByteSource;
use crate::status::UploadStatus;

/// Error returned when a transition's precondition does not hold.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("invalid transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: UploadStatus,
        to: UploadStatus,
    },

    #[error("checksum value must not be empty")]
    EmptyChecksum,

    #[error("upload requires a computed checksum")]
    ChecksumMissing,
}

/// One file moving through the checksum + upload pipeline (thread-safe).
///
/// Identity, size, media type, and byte source are fixed at construction;
/// status fields are mutated only through guarded transitions. Exactly one
/// component drives a record at any instant, handed off by state: the
/// scheduler applies checksum results and transport outcomes, nothing else
/// writes.
#[derive(Debug)]
pub struct FileRecord {
    id: String,
    name: String,
    byte_size: u64,
    media_type: String,
    source: ByteSource,
    inner: RwLock<Inner>,
}

#[derive(Debug)]
struct Inner {
    status: UploadStatus,
    checksum: Option<String>,
    error_detail: Option<String>,
    progress_percent: u8,
    attempts: u32,
}

impl FileRecord {
    /// Creates a new record in the `Queued` state.
    pub fn new(
        name: impl Into<String>,
        byte_size: u64,
        media_type: impl Into<String>,
        source: ByteSource,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            byte_size,
            media_type: media_type.into(),
            source,
            inner: RwLock::new(Inner {
                status: UploadStatus::Queued,
                checksum: None,
                error_detail: None,
                progress_percent: 0,
                attempts: 0,
            }),
        }
    }

    /// Creates an in-memory record; the size is taken from the payload.
    pub fn from_bytes(
        name: impl Into<String>,
        media_type: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        let byte_size = data.len() as u64;
        Self::new(name, byte_size, media_type, ByteSource::Memory(data))
    }

    /// Opaque stable identifier, assigned at construction.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Destination-relative name of the file.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Payload length in bytes.
    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    /// Media type of the payload.
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// The record's byte source.
    pub fn source(&self) -> &ByteSource {
        &self.source
    }

    /// Current lifecycle status.
    pub fn status(&self) -> UploadStatus {
        self.inner.read().unwrap().status
    }

    /// The computed checksum, if any.
    pub fn checksum(&self) -> Option<String> {
        self.inner.read().unwrap().checksum.clone()
    }

    /// Failure detail, present only once `Failed`.
    pub fn error_detail(&self) -> Option<String> {
        self.inner.read().unwrap().error_detail.clone()
    }

    /// Transmission progress in percent (0–100).
    pub fn progress(&self) -> u8 {
        self.inner.read().unwrap().progress_percent
    }

    /// Number of transmission attempts started so far.
    pub fn attempts(&self) -> u32 {
        self.inner.read().unwrap().attempts
    }

    /// `Queued → ComputingChecksum`.
    pub fn mark_checksum_in_progress(&self) -> Result<(), RecordError> {
        let mut s = self.inner.write().unwrap();
        if s.status != UploadStatus::Queued {
            return Err(RecordError::InvalidTransition {
                from: s.status,
                to: UploadStatus::ComputingChecksum,
            });
        }
        s.status = UploadStatus::ComputingChecksum;
        Ok(())
    }

    /// `ComputingChecksum → ReadyToUpload`. Rejects empty checksum values.
    pub fn set_checksum(&self, value: &str) -> Result<(), RecordError> {
        if value.is_empty() {
            return Err(RecordError::EmptyChecksum);
        }
        let mut s = self.inner.write().unwrap();
        if s.status != UploadStatus::ComputingChecksum {
            return Err(RecordError::InvalidTransition {
                from: s.status,
                to: UploadStatus::ReadyToUpload,
            });
        }
        s.checksum = Some(value.to_string());
        s.status = UploadStatus::ReadyToUpload;
        Ok(())
    }

    /// `ReadyToUpload → Uploading`. The upload is checksum-gated: a record
    /// is never transmitted before its checksum is known.
    pub fn mark_upload_in_progress(&self) -> Result<(), RecordError> {
        let mut s = self.inner.write().unwrap();
        if s.status != UploadStatus::ReadyToUpload {
            return Err(RecordError::InvalidTransition {
                from: s.status,
                to: UploadStatus::Uploading,
            });
        }
        if s.checksum.is_none() {
            return Err(RecordError::ChecksumMissing);
        }
        s.status = UploadStatus::Uploading;
        Ok(())
    }

    /// Records transmission progress, clamped to 0–100.
    ///
    /// A side effect only while `Uploading`; ignored in any other state.
    pub fn set_progress(&self, percent: u8) {
        let mut s = self.inner.write().unwrap();
        if s.status == UploadStatus::Uploading {
            s.progress_percent = percent.min(100);
        }
    }

    /// Begins a new transmission attempt: bumps the counter and resets
    /// progress so a retry starts reporting from zero again.
    pub fn begin_attempt(&self) {
        let mut s = self.inner.write().unwrap();
        if s.status == UploadStatus::Uploading {
            s.attempts += 1;
            s.progress_percent = 0;
        }
    }

    /// `Uploading → Complete`. Forces progress to 100.
    pub fn mark_complete(&self) -> Result<(), RecordError> {
        let mut s = self.inner.write().unwrap();
        if s.status != UploadStatus::Uploading {
            return Err(RecordError::InvalidTransition {
                from: s.status,
                to: UploadStatus::Complete,
            });
        }
        s.status = UploadStatus::Complete;
        s.progress_percent = 100;
        Ok(())
    }

    /// Any non-terminal state → `Failed`, recording `detail`.
    ///
    /// Terminal afterwards: repeated calls are no-ops so duplicate failure
    /// signals from the checksum and transport layers are tolerated, and
    /// the first detail wins.
    pub fn mark_failed(&self, detail: &str) {
        let mut s = self.inner.write().unwrap();
        if s.status.is_terminal() {
            return;
        }
        s.status = UploadStatus::Failed;
        s.error_detail = Some(detail.to_string());
    }

    /// Returns a serializable snapshot of the record's current state.
    pub fn snapshot(&self) -> RecordProgress {
        let s = self.inner.read().unwrap();
        RecordProgress {
            id: self.id.clone(),
            name: self.name.clone(),
            status: s.status,
            progress_percent: s.progress_percent,
            checksum: s.checksum.clone(),
            error: s.error_detail.clone(),
            attempts: s.attempts,
        }
    }
}

/// Snapshot of a record's state, for progress consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordProgress {
    pub id: String,
    pub name: String,
    pub status: UploadStatus,
    pub progress_percent: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub attempts: u32,
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> FileRecord {
        FileRecord::from_bytes("data/obs.csv", "text/csv", b"a,b\n1,2\n".to_vec())
    }

    fn record_ready_to_upload() -> FileRecord {
        let record = sample_record();
        record.mark_checksum_in_progress().unwrap();
        record.set_checksum("abc123").unwrap();
        record
    }

    #[test]
    fn new_record_is_queued() {
        let record = sample_record();
        assert_eq!(record.status(), UploadStatus::Queued);
        assert_eq!(record.byte_size(), 8);
        assert_eq!(record.progress(), 0);
        assert_eq!(record.attempts(), 0);
        assert!(record.checksum().is_none());
        assert!(record.error_detail().is_none());
    }

    #[test]
    fn ids_are_unique() {
        let a = sample_record();
        let b = sample_record();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn happy_path_transitions() {
        let record = sample_record();
        record.mark_checksum_in_progress().unwrap();
        assert_eq!(record.status(), UploadStatus::ComputingChecksum);

        record.set_checksum("abc123").unwrap();
        assert_eq!(record.status(), UploadStatus::ReadyToUpload);
        assert_eq!(record.checksum().as_deref(), Some("abc123"));

        record.mark_upload_in_progress().unwrap();
        assert_eq!(record.status(), UploadStatus::Uploading);

        record.mark_complete().unwrap();
        assert_eq!(record.status(), UploadStatus::Complete);
        assert_eq!(record.progress(), 100);
    }

    #[test]
    fn cannot_skip_checksum_stage() {
        let record = sample_record();
        let err = record.mark_upload_in_progress().unwrap_err();
        assert!(matches!(err, RecordError::InvalidTransition { .. }));
        assert_eq!(record.status(), UploadStatus::Queued);
    }

    #[test]
    fn set_checksum_rejects_empty_value() {
        let record = sample_record();
        record.mark_checksum_in_progress().unwrap();
        assert!(matches!(
            record.set_checksum(""),
            Err(RecordError::EmptyChecksum)
        ));
        assert_eq!(record.status(), UploadStatus::ComputingChecksum);
    }

    #[test]
    fn checksum_only_from_computing_state() {
        let record = sample_record();
        assert!(matches!(
            record.set_checksum("abc123"),
            Err(RecordError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn progress_clamped_to_100() {
        let record = record_ready_to_upload();
        record.mark_upload_in_progress().unwrap();
        record.set_progress(250);
        assert_eq!(record.progress(), 100);
    }

    #[test]
    fn progress_ignored_unless_uploading() {
        let record = sample_record();
        record.set_progress(50);
        assert_eq!(record.progress(), 0);
    }

    #[test]
    fn complete_requires_uploading() {
        let record = record_ready_to_upload();
        assert!(matches!(
            record.mark_complete(),
            Err(RecordError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn begin_attempt_counts_and_resets_progress() {
        let record = record_ready_to_upload();
        record.mark_upload_in_progress().unwrap();

        record.begin_attempt();
        record.set_progress(70);
        assert_eq!(record.progress(), 70);

        record.begin_attempt();
        assert_eq!(record.attempts(), 2);
        assert_eq!(record.progress(), 0);
    }

    #[test]
    fn failure_is_terminal_and_first_detail_wins() {
        let record = sample_record();
        record.mark_failed("disk on fire");
        assert_eq!(record.status(), UploadStatus::Failed);
        assert_eq!(record.error_detail().as_deref(), Some("disk on fire"));

        // Duplicate failure signal: no-op, detail preserved.
        record.mark_failed("something else");
        assert_eq!(record.error_detail().as_deref(), Some("disk on fire"));

        // No transitions out of Failed.
        assert!(record.mark_checksum_in_progress().is_err());
    }

    #[test]
    fn mark_failed_after_complete_is_noop() {
        let record = record_ready_to_upload();
        record.mark_upload_in_progress().unwrap();
        record.mark_complete().unwrap();

        record.mark_failed("late signal");
        assert_eq!(record.status(), UploadStatus::Complete);
        assert!(record.error_detail().is_none());
    }

    #[test]
    fn snapshot_uses_camel_case_names() {
        let record = record_ready_to_upload();
        let json = serde_json::to_string(&record.snapshot()).unwrap();
        assert!(json.contains("progressPercent"));
        assert!(json.contains("ready_to_upload"));
        // Zero attempts and absent error are omitted.
        assert!(!json.contains("attempts"));
        assert!(!json.contains("error"));
    }

    #[test]
    fn snapshot_roundtrip() {
        let record = sample_record();
        record.mark_failed("no luck");
        let snapshot = record.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let parsed: RecordProgress = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot, parsed);
    }

    #[test]
    fn concurrent_access() {
        use std::sync::Arc;
        use std::thread;

        let record = Arc::new(record_ready_to_upload());
        record.mark_upload_in_progress().unwrap();

        let mut handles = vec![];

        for i in 0..10 {
            let r = Arc::clone(&record);
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    r.set_progress(((i * 100 + j) % 101) as u8);
                }
            }));
        }

        for _ in 0..10 {
            let r = Arc::clone(&record);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    let _ = r.status();
                    let _ = r.progress();
                    let _ = r.snapshot();
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(record.status(), UploadStatus::Uploading);
        assert!(record.progress() <= 100);
    }
}

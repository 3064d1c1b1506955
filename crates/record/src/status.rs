use serde::{Deserialize, Serialize};

/// Lifecycle state of a single file in an upload batch.
///
/// States only ever move forward:
/// `Queued → ComputingChecksum → ReadyToUpload → Uploading → Complete`,
/// with `Failed` reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadStatus {
    #[serde(rename = "queued")]
    Queued,
    #[serde(rename = "computing_checksum")]
    ComputingChecksum,
    #[serde(rename = "ready_to_upload")]
    ReadyToUpload,
    #[serde(rename = "uploading")]
    Uploading,
    #[serde(rename = "complete")]
    Complete,
    #[serde(rename = "failed")]
    Failed,
}

impl UploadStatus {
    /// Returns `true` for `Complete` and `Failed` — no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, UploadStatus::Complete | UploadStatus::Failed)
    }
}

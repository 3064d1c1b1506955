//! Batch progress events and per-record outcomes.

use packmule_record::UploadStatus;

/// Event emitted while a batch runs.
///
/// Consumed from the receiver returned by
/// [`UploadScheduler::take_events`](crate::UploadScheduler::take_events).
/// Events for different records interleave freely; events for one record
/// follow its lifecycle order.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    /// A record entered a new lifecycle state.
    StatusChanged {
        record_id: String,
        status: UploadStatus,
    },
    /// Transmission progress for a record (0–100).
    Progress { record_id: String, percent: u8 },
    /// A record reached `Complete`.
    Completed { record_id: String },
    /// A record reached `Failed`.
    Failed { record_id: String, error: String },
}

/// Terminal outcome of a single record.
#[derive(Debug, Clone)]
pub struct RecordOutcome {
    pub record_id: String,
    pub name: String,
    pub status: UploadStatus,
    pub error: Option<String>,
    pub attempts: u32,
}

/// Result of one batch run, in input order.
///
/// A batch always finishes: per-record status, not an error, communicates
/// failure.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub outcomes: Vec<RecordOutcome>,
    pub completed: usize,
    pub failed: usize,
}

impl BatchReport {
    /// `true` when every record reached `Complete`.
    pub fn all_complete(&self) -> bool {
        self.failed == 0 && self.completed == self.outcomes.len()
    }
}

//! Bounded-concurrency, checksum-gated batch upload scheduling.
//!
//! One [`UploadScheduler`] drives one batch: every record moves from
//! `Queued` through checksum computation and transmission to `Complete` or
//! `Failed`, with at most a fixed number in flight at any moment. A failed
//! record never halts its batch; callers read per-record outcomes from the
//! returned [`BatchReport`] and live updates from the event stream.

mod events;
mod scheduler;

pub use events::{BatchEvent, BatchReport, RecordOutcome};
pub use scheduler::{
    CANCELLED_DETAIL, DEFAULT_CONCURRENT_UPLOADS, EMPTY_FILE_DETAIL, SchedulerConfig,
    UploadScheduler,
};

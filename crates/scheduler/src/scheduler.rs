//! Sliding-window batch scheduler.
//!
//! Drives every record of a batch through checksum and upload with at most
//! a fixed number in flight, backfilling each freed slot from the pending
//! queue in enqueue order. Slots are not wave-synchronized: the next record
//! starts the moment any previous one reaches a terminal state, so one
//! large file never stalls the rest of the window.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use packmule_record::{FileRecord, UploadStatus};
use packmule_transfer::{
    ProgressFn, RetryPolicy, UploadRequest, UploadTransport, compute_checksum, send_with_retry,
};

use crate::events::{BatchEvent, BatchReport, RecordOutcome};

/// Default number of records in flight at once.
pub const DEFAULT_CONCURRENT_UPLOADS: usize = 10;

/// Error detail for records rejected before the pipeline starts.
pub const EMPTY_FILE_DETAIL: &str = "file is empty";

/// Error detail for records abandoned by cancellation.
pub const CANCELLED_DETAIL: &str = "cancelled";

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Concurrency window. `0` means the whole batch at once.
    pub concurrent_uploads: usize,
    /// Retry policy applied to transient transport failures.
    pub retry: RetryPolicy,
    /// Extra metadata attached to every upload in the batch.
    pub metadata: HashMap<String, String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrent_uploads: DEFAULT_CONCURRENT_UPLOADS,
            retry: RetryPolicy::default(),
            metadata: HashMap::new(),
        }
    }
}

/// Drives one batch of records to terminal status.
///
/// Created per batch and discarded once [`run`](Self::run) returns; it
/// holds no state across batches. The transport and retry policy are
/// injected at construction rather than reached from ambient state.
pub struct UploadScheduler {
    transport: Arc<dyn UploadTransport>,
    config: SchedulerConfig,
    events_tx: mpsc::Sender<BatchEvent>,
    events_rx: Option<mpsc::Receiver<BatchEvent>>,
    cancel: CancellationToken,
}

impl UploadScheduler {
    /// Creates a scheduler over the given transport.
    pub fn new(transport: Arc<dyn UploadTransport>, config: SchedulerConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        Self {
            transport,
            config,
            events_tx,
            events_rx: Some(events_rx),
            cancel: CancellationToken::new(),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<BatchEvent>> {
        self.events_rx.take()
    }

    /// Returns a cancellation token for this batch.
    ///
    /// Cancellation is observed between pipeline stages: in-flight
    /// transport calls run to their own outcome, everything not yet
    /// started fails with [`CANCELLED_DETAIL`].
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs every record to a terminal state and reports per-record
    /// outcomes in input order.
    ///
    /// Starts are FIFO over the input order; completion order is
    /// unspecified. A failed record never aborts the batch.
    pub async fn run(&self, records: Vec<Arc<FileRecord>>) -> BatchReport {
        if records.is_empty() {
            return BatchReport::default();
        }

        let window = match self.config.concurrent_uploads {
            0 => records.len(),
            n => n,
        };
        info!(records = records.len(), window, "batch started");

        let slots = Arc::new(Semaphore::new(window));
        let mut tasks = JoinSet::new();

        for record in &records {
            // Zero-byte precondition: reject without taking a slot.
            if record.byte_size() == 0 {
                record.mark_failed(EMPTY_FILE_DETAIL);
                self.emit(BatchEvent::Failed {
                    record_id: record.id().to_string(),
                    error: EMPTY_FILE_DETAIL.to_string(),
                });
                debug!(record = record.name(), "rejected empty file");
                continue;
            }

            // Wait for a free slot. Each worker releases its permit when
            // its record turns terminal, which is what lets the next
            // pending record start immediately.
            let permit = tokio::select! {
                _ = self.cancel.cancelled() => {
                    record.mark_failed(CANCELLED_DETAIL);
                    self.emit(BatchEvent::Failed {
                        record_id: record.id().to_string(),
                        error: CANCELLED_DETAIL.to_string(),
                    });
                    continue;
                }
                permit = Arc::clone(&slots).acquire_owned() => {
                    permit.expect("slot semaphore closed")
                }
            };

            let worker = Worker {
                transport: Arc::clone(&self.transport),
                retry: self.config.retry.clone(),
                metadata: self.config.metadata.clone(),
                events_tx: self.events_tx.clone(),
                cancel: self.cancel.clone(),
            };
            let record = Arc::clone(record);
            tasks.spawn(async move {
                let _permit = permit;
                worker.process(&record).await;
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "upload task aborted");
            }
        }

        let mut completed = 0;
        let mut failed = 0;
        let outcomes = records
            .iter()
            .map(|r| {
                let status = r.status();
                match status {
                    UploadStatus::Complete => completed += 1,
                    UploadStatus::Failed => failed += 1,
                    _ => {}
                }
                RecordOutcome {
                    record_id: r.id().to_string(),
                    name: r.name().to_string(),
                    status,
                    error: r.error_detail(),
                    attempts: r.attempts(),
                }
            })
            .collect();

        info!(completed, failed, "batch finished");
        BatchReport {
            outcomes,
            completed,
            failed,
        }
    }

    fn emit(&self, event: BatchEvent) {
        // A slow or absent consumer must not stall the batch.
        let _ = self.events_tx.try_send(event);
    }
}

/// Context shared by the per-record worker tasks of one batch.
struct Worker {
    transport: Arc<dyn UploadTransport>,
    retry: RetryPolicy,
    metadata: HashMap<String, String>,
    events_tx: mpsc::Sender<BatchEvent>,
    cancel: CancellationToken,
}

impl Worker {
    /// Drives one record: checksum, then checksum-gated upload with retry.
    async fn process(&self, record: &Arc<FileRecord>) {
        if self.cancel.is_cancelled() {
            self.fail(record, CANCELLED_DETAIL);
            return;
        }

        // Checksum stage.
        if let Err(e) = record.mark_checksum_in_progress() {
            self.fail(record, &e.to_string());
            return;
        }
        self.status_changed(record, UploadStatus::ComputingChecksum);

        let checksum = match compute_checksum(record.source()).await {
            Ok(value) => value,
            Err(e) => {
                warn!(record = record.name(), error = %e, "checksum failed");
                self.fail(record, &e.to_string());
                return;
            }
        };
        if let Err(e) = record.set_checksum(&checksum) {
            self.fail(record, &e.to_string());
            return;
        }
        self.status_changed(record, UploadStatus::ReadyToUpload);
        debug!(record = record.name(), checksum = %checksum, "checksum computed");

        if self.cancel.is_cancelled() {
            self.fail(record, CANCELLED_DETAIL);
            return;
        }

        // Upload stage. The checksum is reused across retries; progress
        // restarts from zero at each attempt.
        if let Err(e) = record.mark_upload_in_progress() {
            self.fail(record, &e.to_string());
            return;
        }
        self.status_changed(record, UploadStatus::Uploading);

        let mut metadata = self.metadata.clone();
        metadata.insert("checksum".to_string(), checksum.clone());
        metadata.insert("mediaType".to_string(), record.media_type().to_string());
        metadata.insert("byteSize".to_string(), record.byte_size().to_string());

        let req = UploadRequest {
            name: record.name(),
            source: record.source(),
            byte_size: record.byte_size(),
            media_type: record.media_type(),
            checksum: &checksum,
            metadata: &metadata,
        };

        let progress: ProgressFn = {
            let record = Arc::clone(record);
            let events_tx = self.events_tx.clone();
            Arc::new(move |percent| {
                record.set_progress(percent);
                let _ = events_tx.try_send(BatchEvent::Progress {
                    record_id: record.id().to_string(),
                    percent,
                });
            })
        };

        let attempt_record = Arc::clone(record);
        let result = send_with_retry(
            self.transport.as_ref(),
            req,
            &self.retry,
            progress,
            move |_attempt| attempt_record.begin_attempt(),
        )
        .await;

        match result {
            Ok(()) => {
                if let Err(e) = record.mark_complete() {
                    self.fail(record, &e.to_string());
                    return;
                }
                self.status_changed(record, UploadStatus::Complete);
                let _ = self.events_tx.try_send(BatchEvent::Completed {
                    record_id: record.id().to_string(),
                });
                info!(record = record.name(), "upload complete");
            }
            Err(e) => {
                warn!(
                    record = record.name(),
                    attempts = record.attempts(),
                    error = %e,
                    "upload failed"
                );
                self.fail(record, &e.to_string());
            }
        }
    }

    fn status_changed(&self, record: &FileRecord, status: UploadStatus) {
        let _ = self.events_tx.try_send(BatchEvent::StatusChanged {
            record_id: record.id().to_string(),
            status,
        });
    }

    fn fail(&self, record: &FileRecord, detail: &str) {
        record.mark_failed(detail);
        let _ = self.events_tx.try_send(BatchEvent::Failed {
            record_id: record.id().to_string(),
            error: detail.to_string(),
        });
    }
}

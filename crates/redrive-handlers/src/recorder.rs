//! Idempotent aggregation of worker failures into the keyed store.

use std::sync::Arc;

use serde::Serialize;

use redrive_core::{
    ErrorRecord, FailureNotice, InsertOutcome, KeyedStore, ObjectEvent, PipelineError,
};

/// Outcome of persisting a single failure notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// First failure for this key; a new row was inserted.
    Created,
    /// A row already existed; its counter was bumped atomically.
    Incremented { error_count: u64 },
}

/// Per-batch recorder counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecorderSummary {
    pub notices_seen: usize,
    pub created: usize,
    pub incremented: usize,
    /// Malformed notices: missing error attribute, undecodable body, or a
    /// body without exactly one record. Never persisted, never retried.
    pub rejected: usize,
    pub store_errors: usize,
}

pub struct Recorder {
    store: Arc<dyn KeyedStore>,
}

impl Recorder {
    pub fn new(store: Arc<dyn KeyedStore>) -> Self {
        Self { store }
    }

    /// Record one failure notification.
    ///
    /// The upsert is safe under concurrent duplicate deliveries: the
    /// conditional insert admits exactly one creator per key and every loser
    /// lands on the atomic counter add. A true transport duplicate and a
    /// genuine repeated failure are indistinguishable here; both increment.
    pub async fn record_failure(
        &self,
        notice: &FailureNotice,
    ) -> Result<RecordOutcome, PipelineError> {
        let error_message = notice.error_message.clone().ok_or_else(|| {
            PipelineError::Decode("notification has no error-message attribute".into())
        })?;

        let event = ObjectEvent::from_slice(&notice.body)?;
        if event.records.len() != 1 {
            return Err(PipelineError::Shape(format!(
                "failure payload must contain exactly 1 record, got {}",
                event.records.len()
            )));
        }

        let key = event.records[0].path();
        let record = ErrorRecord::first_failure(
            key.clone(),
            notice.occurred_at,
            error_message,
            notice.body.clone(),
        );

        match self.store.insert_if_absent(&record).await? {
            InsertOutcome::Inserted => {
                tracing::info!(key = %key, "inserted new error record");
                Ok(RecordOutcome::Created)
            }
            InsertOutcome::KeyExists => {
                let error_count = self.store.add_error_count(&key, 1).await?;
                tracing::info!(key = %key, error_count, "incremented existing error record");
                Ok(RecordOutcome::Incremented { error_count })
            }
        }
    }

    /// Loose batch policy: rejections and store failures are logged and
    /// counted, never batch-fatal. One malformed notification cannot block
    /// the rest of the batch.
    pub async fn record_batch(&self, notices: &[FailureNotice]) -> RecorderSummary {
        let mut summary = RecorderSummary::default();

        for notice in notices {
            summary.notices_seen += 1;
            match self.record_failure(notice).await {
                Ok(RecordOutcome::Created) => summary.created += 1,
                Ok(RecordOutcome::Incremented { .. }) => summary.incremented += 1,
                Err(err) if err.is_rejection() => {
                    tracing::warn!(error = %err, "rejected failure notification");
                    summary.rejected += 1;
                }
                Err(err) => {
                    tracing::error!(error = %err, "failed to persist failure notification");
                    summary.store_errors += 1;
                }
            }
        }

        summary
    }
}

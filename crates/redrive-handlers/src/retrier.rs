//! Drives at most one retry per failed record off the store's change stream.

use std::sync::Arc;

use serde::Serialize;

use redrive_core::{Invoker, KeyedStore, LockOutcome, ObjectEvent, PipelineError, RecordImage};

/// Outcome of handling one change-stream image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// Lock acquired and the worker re-invoked.
    Retried,
    /// Another handler already holds (or held) the lock for this key. Not an
    /// error; the expected result for all but one of the duplicate triggers.
    LockDenied,
    /// Error count exceeds the retry threshold; nothing was attempted.
    Skipped { error_count: u64 },
}

/// Per-batch retrier counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RetrierSummary {
    pub changes_seen: usize,
    pub retried: usize,
    pub lock_denied: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct Retrier {
    store: Arc<dyn KeyedStore>,
    invoker: Arc<dyn Invoker>,
    max_retry: u64,
}

impl Retrier {
    pub fn new(store: Arc<dyn KeyedStore>, invoker: Arc<dyn Invoker>, max_retry: u64) -> Self {
        Self {
            store,
            invoker,
            max_retry,
        }
    }

    /// Handle one post-write image from the change stream.
    ///
    /// The threshold gate runs on every change event for the key, so once
    /// the count passes `max_retry` all further increments are skipped too.
    /// The stored payload is decoded before the lock attempt so a corrupt
    /// payload never consumes the record's single retry. If the invocation
    /// fails after the lock was acquired, the lock is not rolled back: the
    /// retry for this key is forfeited, favoring at-most-once retry over
    /// guaranteed delivery of the retry itself.
    pub async fn handle_change(&self, image: &RecordImage) -> Result<RetryOutcome, PipelineError> {
        let key = image
            .key
            .as_deref()
            .ok_or_else(|| PipelineError::Shape("change image has no key".into()))?;
        let error_count = image.error_count.ok_or_else(|| {
            PipelineError::Shape(format!("change image for '{key}' has no error count"))
        })?;

        if error_count > self.max_retry {
            tracing::info!(
                key = %key,
                error_count,
                max_retry = self.max_retry,
                "skipping retry, over threshold"
            );
            return Ok(RetryOutcome::Skipped { error_count });
        }

        let payload = image.payload.as_deref().ok_or_else(|| {
            PipelineError::Shape(format!("change image for '{key}' has no payload"))
        })?;
        let event = ObjectEvent::from_slice(payload)?;
        if event.records.len() != 1 {
            return Err(PipelineError::Shape(format!(
                "stored payload for '{key}' has {} records, expected exactly 1",
                event.records.len()
            )));
        }

        match self.store.acquire_retry_lock(key).await? {
            LockOutcome::AlreadyRetried => {
                tracing::debug!(key = %key, "retry lock denied");
                Ok(RetryOutcome::LockDenied)
            }
            LockOutcome::Acquired => {
                tracing::info!(key = %key, error_count, "retry lock acquired, re-invoking worker");
                self.invoker.invoke(&event.records[0]).await?;
                Ok(RetryOutcome::Retried)
            }
        }
    }

    /// Loose batch policy, matching the recorder: per-item failures are
    /// logged and counted, the batch itself succeeds.
    pub async fn handle_batch(&self, images: &[RecordImage]) -> RetrierSummary {
        let mut summary = RetrierSummary::default();

        for image in images {
            summary.changes_seen += 1;
            match self.handle_change(image).await {
                Ok(RetryOutcome::Retried) => summary.retried += 1,
                Ok(RetryOutcome::LockDenied) => summary.lock_denied += 1,
                Ok(RetryOutcome::Skipped { .. }) => summary.skipped += 1,
                Err(err) => {
                    tracing::error!(key = ?image.key, error = %err, "failed to handle change record");
                    summary.failed += 1;
                }
            }
        }

        summary
    }
}

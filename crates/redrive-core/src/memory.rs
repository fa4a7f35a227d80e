//! In-memory port implementations for tests and local runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{InvokeError, StoreError};
use crate::event::{ObjectEvent, ObjectRecord};
use crate::ports::{InsertOutcome, Invoker, KeyedStore, LockOutcome};
use crate::record::{ErrorRecord, RecordImage};

/// Keyed store over a single mutex-guarded map.
///
/// One lock for the whole table makes every primitive trivially linearizable
/// per key, which is all the handlers are allowed to rely on.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<String, ErrorRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one row, if present.
    pub async fn get(&self, key: &str) -> Option<ErrorRecord> {
        self.rows.lock().await.get(key).cloned()
    }

    /// Post-write image for a row, as the change stream would deliver it.
    pub async fn image(&self, key: &str) -> Option<RecordImage> {
        self.rows.lock().await.get(key).map(RecordImage::from)
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }
}

#[async_trait]
impl KeyedStore for MemoryStore {
    async fn insert_if_absent(&self, record: &ErrorRecord) -> Result<InsertOutcome, StoreError> {
        let mut rows = self.rows.lock().await;
        if rows.contains_key(&record.key) {
            return Ok(InsertOutcome::KeyExists);
        }
        rows.insert(record.key.clone(), record.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn add_error_count(&self, key: &str, delta: u64) -> Result<u64, StoreError> {
        let mut rows = self.rows.lock().await;
        // Rows are never deleted, so a missing row here is a harness bug.
        let row = rows
            .get_mut(key)
            .ok_or_else(|| StoreError(format!("no row for key '{key}'")))?;
        row.error_count += delta;
        Ok(row.error_count)
    }

    async fn acquire_retry_lock(&self, key: &str) -> Result<LockOutcome, StoreError> {
        let mut rows = self.rows.lock().await;
        let row = rows
            .get_mut(key)
            .ok_or_else(|| StoreError(format!("no row for key '{key}'")))?;
        if row.retried {
            return Ok(LockOutcome::AlreadyRetried);
        }
        row.retried = true;
        Ok(LockOutcome::Acquired)
    }
}

/// Invoker that records every delivered envelope. Failure injection covers
/// the handlers' invoke-error paths.
#[derive(Default)]
pub struct RecordingInvoker {
    calls: Mutex<Vec<ObjectEvent>>,
    fail: AtomicBool,
}

impl RecordingInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent invocation fail without being recorded.
    pub fn fail_invocations(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub async fn calls(&self) -> Vec<ObjectEvent> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

#[async_trait]
impl Invoker for RecordingInvoker {
    async fn invoke(&self, record: &ObjectRecord) -> Result<(), InvokeError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(InvokeError("injected invocation failure".into()));
        }
        let envelope = ObjectEvent::single(record.clone());
        self.calls.lock().await.push(envelope);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(key: &str) -> ErrorRecord {
        ErrorRecord::first_failure(key.into(), Utc::now(), "boom".into(), b"{}".to_vec())
    }

    #[tokio::test]
    async fn conditional_insert_admits_one_row_per_key() {
        let store = MemoryStore::new();
        let rec = record("bucket/obj1");

        assert_eq!(
            store.insert_if_absent(&rec).await.unwrap(),
            InsertOutcome::Inserted
        );
        assert_eq!(
            store.insert_if_absent(&rec).await.unwrap(),
            InsertOutcome::KeyExists
        );
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn add_error_count_returns_new_count() {
        let store = MemoryStore::new();
        store.insert_if_absent(&record("bucket/obj1")).await.unwrap();

        assert_eq!(store.add_error_count("bucket/obj1", 1).await.unwrap(), 2);
        assert_eq!(store.add_error_count("bucket/obj1", 1).await.unwrap(), 3);
        assert!(store.add_error_count("bucket/missing", 1).await.is_err());
    }

    #[tokio::test]
    async fn retry_lock_is_exclusive_and_permanent() {
        let store = MemoryStore::new();
        store.insert_if_absent(&record("bucket/obj1")).await.unwrap();

        assert_eq!(
            store.acquire_retry_lock("bucket/obj1").await.unwrap(),
            LockOutcome::Acquired
        );
        assert_eq!(
            store.acquire_retry_lock("bucket/obj1").await.unwrap(),
            LockOutcome::AlreadyRetried
        );
        assert!(store.get("bucket/obj1").await.unwrap().retried);
    }

    #[tokio::test]
    async fn recording_invoker_wraps_single_records() {
        let invoker = RecordingInvoker::new();
        let rec = ObjectRecord::new("bucket", "obj1");

        invoker.invoke(&rec).await.unwrap();
        let calls = invoker.calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].records, vec![rec.clone()]);

        invoker.fail_invocations(true);
        assert!(invoker.invoke(&rec).await.is_err());
        assert_eq!(invoker.call_count().await, 1);
    }
}

//! Ports the handlers depend on.
//!
//! The keyed store is the only cross-invocation coordination point, so every
//! primitive here must be linearizable per key. No cross-key atomicity is
//! assumed anywhere.

use async_trait::async_trait;

use crate::error::{InvokeError, StoreError};
use crate::event::ObjectRecord;
use crate::record::ErrorRecord;

/// Result of a conditional insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// Condition failed: a row already exists for the key.
    KeyExists,
}

/// Result of the retry-lock conditional update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    Acquired,
    /// Condition failed: `retried` was already true.
    AlreadyRetried,
}

/// Durable table addressed by a unique string key.
#[async_trait]
pub trait KeyedStore: Send + Sync {
    /// Insert `record` only if no row exists for `record.key`.
    async fn insert_if_absent(&self, record: &ErrorRecord) -> Result<InsertOutcome, StoreError>;

    /// Atomically add `delta` to the row's error count and return the new
    /// count. Must be an atomic add primitive, not read-modify-write:
    /// concurrent duplicate reports may race on the same key.
    async fn add_error_count(&self, key: &str, delta: u64) -> Result<u64, StoreError>;

    /// Flip `retried` false→true, guarded by "current `retried` is false".
    async fn acquire_retry_lock(&self, key: &str) -> Result<LockOutcome, StoreError>;
}

/// Fire-and-forget asynchronous invocation of the protected worker.
#[async_trait]
pub trait Invoker: Send + Sync {
    /// Deliver `record` wrapped in a one-element envelope. No result is
    /// awaited and no retry is performed here.
    async fn invoke(&self, record: &ObjectRecord) -> Result<(), InvokeError>;
}

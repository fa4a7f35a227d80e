//! Domain model and ports for the redrive dead-letter pipeline.
//!
//! The pipeline has exactly one shared mutable resource: a durable keyed
//! store with per-key linearizable conditional writes. Everything the
//! handlers in `redrive-handlers` coordinate on goes through the
//! [`KeyedStore`] port; the protected worker is reached through the
//! [`Invoker`] port. Both are injected, never ambient.

pub mod error;
pub mod event;
pub mod memory;
pub mod ports;
pub mod record;

pub use error::{InvokeError, PipelineError, StoreError};
pub use event::{ObjectEvent, ObjectRecord};
pub use memory::{MemoryStore, RecordingInvoker};
pub use ports::{InsertOutcome, Invoker, KeyedStore, LockOutcome};
pub use record::{ErrorRecord, FailureNotice, RecordImage};

//! The three cooperating handlers of the redrive pipeline.
//!
//! Together they implement at-least-once delivery with at-most-once
//! effective retry: the [`Dispatcher`] filters and forwards inbound object
//! notifications, the [`Recorder`] idempotently aggregates worker failures
//! into the keyed store, and the [`Retrier`] drives a single retry per
//! failed record off the store's change stream.
//!
//! Handlers take their collaborators by injection and keep no state of
//! their own; instances may run concurrently across processes in any
//! parallel degree, coordinating only through the store.

pub mod dispatcher;
pub mod recorder;
pub mod retrier;

pub use dispatcher::{DispatchSummary, Dispatcher};
pub use recorder::{RecordOutcome, Recorder, RecorderSummary};
pub use retrier::{Retrier, RetrierSummary, RetryOutcome};

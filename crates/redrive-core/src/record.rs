//! Failure notifications and the persistent dead-letter row.

use chrono::{DateTime, Utc};

/// A failure notification, consumed once by the recorder.
#[derive(Debug, Clone)]
pub struct FailureNotice {
    /// Error annotation extracted by the transport adapter. `None` when the
    /// notification carried no recognizable error attribute; such notices
    /// are rejected rather than persisted.
    pub error_message: Option<String>,
    /// Raw original-event envelope, persisted verbatim for redelivery.
    pub body: Vec<u8>,
    pub occurred_at: DateTime<Utc>,
}

/// Durable dead-letter row, exactly one per distinct failing object path.
///
/// Created once by the recorder's conditional insert; afterwards only
/// `error_count` (atomic add, recorder) and `retried` (conditional flip,
/// retrier) ever change. `error_message` keeps the first observed message.
/// Rows are never deleted by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub key: String,
    /// Timestamp of the first failure.
    pub occurred_at: DateTime<Utc>,
    pub error_message: String,
    /// Original envelope bytes, sufficient to rebuild one deliverable unit.
    pub payload: Vec<u8>,
    pub error_count: u64,
    pub retried: bool,
}

impl ErrorRecord {
    /// Row for the first observed failure of a key.
    pub fn first_failure(
        key: String,
        occurred_at: DateTime<Utc>,
        error_message: String,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            key,
            occurred_at,
            error_message,
            payload,
            error_count: 1,
            retried: false,
        }
    }
}

/// Post-write image delivered on the store's change stream.
///
/// Every field is optional until the retrier validates it: change streams
/// deliver whatever the row happened to contain, and a malformed row must
/// fail explicitly rather than be coerced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordImage {
    pub key: Option<String>,
    pub error_count: Option<u64>,
    pub payload: Option<Vec<u8>>,
    pub retried: Option<bool>,
}

impl From<&ErrorRecord> for RecordImage {
    fn from(record: &ErrorRecord) -> Self {
        Self {
            key: Some(record.key.clone()),
            error_count: Some(record.error_count),
            payload: Some(record.payload.clone()),
            retried: Some(record.retried),
        }
    }
}

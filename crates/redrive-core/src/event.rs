//! Object-notification envelope and identity derivation.
//!
//! The envelope mirrors the subset of the storage-notification JSON the
//! pipeline forwards:
//! `{"Records":[{"s3":{"bucket":{"name":…},"object":{"key":…}}}]}`.
//! Unknown fields are ignored so real notifications with extra metadata
//! decode cleanly; missing required fields are a decode error.

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// A batch of object notifications. This is the opaque payload persisted on
/// failure and redelivered on retry, byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEvent {
    #[serde(rename = "Records")]
    pub records: Vec<ObjectRecord>,
}

impl ObjectEvent {
    /// One-element envelope. Every worker invocation carries exactly one
    /// record so failures stay retryable at item granularity.
    pub fn single(record: ObjectRecord) -> Self {
        Self {
            records: vec![record],
        }
    }

    pub fn from_slice(data: &[u8]) -> Result<Self, PipelineError> {
        serde_json::from_slice(data).map_err(|err| PipelineError::Decode(err.to_string()))
    }
}

/// One object notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub s3: ObjectEntity,
}

impl ObjectRecord {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            s3: ObjectEntity {
                bucket: BucketRef {
                    name: bucket.into(),
                },
                object: ObjectRef { key: key.into() },
            },
        }
    }

    /// Identity path, `bucket/key`. Doubles as the idempotency key for the
    /// error table.
    pub fn path(&self) -> String {
        format!("{}/{}", self.s3.bucket.name, self.s3.object.key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntity {
    pub bucket: BucketRef,
    pub object: ObjectRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketRef {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub key: String,
}

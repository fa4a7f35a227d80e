//! Inbound transport event decoding.
//!
//! Kinesis and SNS batches use the typed models from `aws_lambda_events`.
//! DynamoDB stream images are decoded with explicit structs below: the
//! stream's attribute values are externally tagged JSON (`{"S": …}`,
//! `{"N": …}`, base64 `{"B": …}`), which a serde enum models directly.
//! Attribute decoding happens per record, after the batch envelope has been
//! accepted, so one malformed image is counted and skipped instead of
//! failing the whole batch at the runtime boundary.

use std::collections::HashMap;

use aws_lambda_events::kinesis::KinesisEvent;
use aws_lambda_events::sns::SnsEvent;
use base64::Engine;
use serde::Deserialize;

use redrive_core::{FailureNotice, PipelineError, RecordImage};

use crate::store::{ATTR_ERROR_COUNT, ATTR_KEY, ATTR_PAYLOAD, ATTR_RETRIED};

const ERROR_MESSAGE_ATTRIBUTE: &str = "ErrorMessage";

/// Raw envelopes carried by a Kinesis batch, one per stream record. The
/// event model has already base64-decoded the data.
pub(crate) fn kinesis_payloads(event: &KinesisEvent) -> Vec<&[u8]> {
    event
        .records
        .iter()
        .map(|record| record.kinesis.data.as_slice())
        .collect()
}

/// Typed extraction of the parts the recorder consumes. A missing or
/// non-string `ErrorMessage` attribute yields `None` here and a rejection
/// downstream; the body stays opaque bytes.
pub(crate) fn sns_notices(event: &SnsEvent) -> Vec<FailureNotice> {
    event
        .records
        .iter()
        .map(|record| {
            let error_message = record
                .sns
                .message_attributes
                .get(ERROR_MESSAGE_ATTRIBUTE)
                .filter(|attr| attr.data_type == "String")
                .map(|attr| attr.value.clone());

            FailureNotice {
                error_message,
                body: record.sns.message.clone().into_bytes(),
                occurred_at: record.sns.timestamp,
            }
        })
        .collect()
}

/// DynamoDB stream batch, reduced to the fields the retrier acts on.
#[derive(Debug, Deserialize)]
pub(crate) struct StreamEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<StreamRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StreamRecord {
    #[serde(rename = "dynamodb")]
    pub change: StreamChange,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StreamChange {
    /// Raw attribute values. Kept as `serde_json::Value` so the batch
    /// envelope always deserializes; the known attributes are decoded per
    /// record in [`image_from_change`].
    #[serde(rename = "NewImage", default)]
    pub new_image: HashMap<String, serde_json::Value>,
}

/// Attribute value shapes the error table uses.
#[derive(Debug, Clone, Deserialize)]
pub(crate) enum StreamAttribute {
    S(String),
    N(String),
    /// Binary attributes arrive base64-encoded.
    B(String),
    BOOL(bool),
}

fn decode_attr(name: &str, value: &serde_json::Value) -> Result<StreamAttribute, PipelineError> {
    serde_json::from_value(value.clone()).map_err(|err| {
        PipelineError::Decode(format!("attribute '{name}' has an unsupported shape: {err}"))
    })
}

/// Build the post-write image from a stream change. Absent attributes stay
/// `None` (the retrier validates); present-but-unparseable ones are a
/// decode error for this record only. Attributes the retrier never reads
/// are ignored whatever their type.
pub(crate) fn image_from_change(change: &StreamChange) -> Result<RecordImage, PipelineError> {
    let mut image = RecordImage::default();

    if let Some(value) = change.new_image.get(ATTR_KEY) {
        if let StreamAttribute::S(key) = decode_attr(ATTR_KEY, value)? {
            image.key = Some(key);
        }
    }

    if let Some(value) = change.new_image.get(ATTR_ERROR_COUNT) {
        if let StreamAttribute::N(raw) = decode_attr(ATTR_ERROR_COUNT, value)? {
            let count = raw.parse::<u64>().map_err(|err| {
                PipelineError::Decode(format!("error count '{raw}' is not an integer: {err}"))
            })?;
            image.error_count = Some(count);
        }
    }

    if let Some(value) = change.new_image.get(ATTR_PAYLOAD) {
        if let StreamAttribute::B(encoded) = decode_attr(ATTR_PAYLOAD, value)? {
            let payload = base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|err| {
                    PipelineError::Decode(format!("payload is not valid base64: {err}"))
                })?;
            image.payload = Some(payload);
        }
    }

    if let Some(value) = change.new_image.get(ATTR_RETRIED) {
        if let StreamAttribute::BOOL(retried) = decode_attr(ATTR_RETRIED, value)? {
            image.retried = Some(retried);
        }
    }

    Ok(image)
}

/// Decode every change in the batch, counting records whose image cannot be
/// decoded at all (they are reported as failed in the batch summary).
pub(crate) fn stream_images(event: &StreamEvent) -> (Vec<RecordImage>, usize) {
    let mut images = Vec::with_capacity(event.records.len());
    let mut undecodable = 0;

    for record in &event.records {
        match image_from_change(&record.change) {
            Ok(image) => images.push(image),
            Err(err) => {
                tracing::error!(error = %err, "undecodable change record");
                undecodable += 1;
            }
        }
    }

    (images, undecodable)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_json(payload: &[u8], count: &str, retried: bool) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(payload);
        format!(
            r#"{{
                "Records": [
                    {{
                        "eventName": "MODIFY",
                        "dynamodb": {{
                            "NewImage": {{
                                "object_path": {{"S": "bucket/obj1"}},
                                "error_count": {{"N": "{count}"}},
                                "payload": {{"B": "{encoded}"}},
                                "retried": {{"BOOL": {retried}}},
                                "error_message": {{"S": "boom"}},
                                "occurred_at": {{"S": "2024-01-15T14:30:00Z"}}
                            }}
                        }}
                    }}
                ]
            }}"#
        )
    }

    #[test]
    fn decodes_stream_image() {
        let raw = stream_json(b"{\"Records\":[]}", "2", false);
        let event: StreamEvent = serde_json::from_str(&raw).unwrap();
        let (images, undecodable) = stream_images(&event);

        assert_eq!(undecodable, 0);
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].key.as_deref(), Some("bucket/obj1"));
        assert_eq!(images[0].error_count, Some(2));
        assert_eq!(images[0].payload.as_deref(), Some(b"{\"Records\":[]}".as_slice()));
        assert_eq!(images[0].retried, Some(false));
    }

    #[test]
    fn missing_attributes_stay_none() {
        let raw = r#"{"Records":[{"dynamodb":{"NewImage":{}}}]}"#;
        let event: StreamEvent = serde_json::from_str(raw).unwrap();
        let (images, undecodable) = stream_images(&event);

        assert_eq!(undecodable, 0);
        assert_eq!(images[0], RecordImage::default());
    }

    #[test]
    fn bad_count_or_base64_is_undecodable() {
        let raw = stream_json(b"{}", "many", false);
        let event: StreamEvent = serde_json::from_str(&raw).unwrap();
        let (images, undecodable) = stream_images(&event);
        assert!(images.is_empty());
        assert_eq!(undecodable, 1);

        let raw = r#"{"Records":[{"dynamodb":{"NewImage":{"payload":{"B":"///not-base64"}}}}]}"#;
        let event: StreamEvent = serde_json::from_str(raw).unwrap();
        let (images, undecodable) = stream_images(&event);
        assert!(images.is_empty());
        assert_eq!(undecodable, 1);
    }

    #[test]
    fn unread_attributes_of_any_type_are_ignored() {
        // Attributes the retrier never reads may carry types the image
        // decoder does not model, e.g. a Map written by an external tool.
        let raw = r#"{
            "Records": [
                {
                    "dynamodb": {
                        "NewImage": {
                            "object_path": {"S": "bucket/obj1"},
                            "metadata": {"M": {"source": {"S": "backfill"}}},
                            "tags": {"SS": ["a", "b"]}
                        }
                    }
                }
            ]
        }"#;

        let event: StreamEvent = serde_json::from_str(raw).unwrap();
        let (images, undecodable) = stream_images(&event);

        assert_eq!(undecodable, 0);
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].key.as_deref(), Some("bucket/obj1"));
    }

    #[test]
    fn unsupported_attribute_shape_skips_only_that_record() {
        let good = stream_json(b"{}", "1", false);
        let mut event: StreamEvent = serde_json::from_str(&good).unwrap();

        // Second record in the same batch with a Map where bytes belong.
        let bad = r#"{"dynamodb":{"NewImage":{"payload":{"M":{}}}}}"#;
        event.records.push(serde_json::from_str(bad).unwrap());

        let (images, undecodable) = stream_images(&event);

        assert_eq!(undecodable, 1);
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].key.as_deref(), Some("bucket/obj1"));
    }
}

//! DynamoDB-backed keyed store.
//!
//! Conditional-check failures on the conditional insert and on the retry
//! lock are mapped to their control-flow outcomes; every other SDK error
//! surfaces as a [`StoreError`].

use async_trait::async_trait;
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::Client;

use redrive_core::{ErrorRecord, InsertOutcome, KeyedStore, LockOutcome, StoreError};

pub(crate) const ATTR_KEY: &str = "object_path";
pub(crate) const ATTR_OCCURRED_AT: &str = "occurred_at";
pub(crate) const ATTR_ERROR_MESSAGE: &str = "error_message";
pub(crate) const ATTR_PAYLOAD: &str = "payload";
pub(crate) const ATTR_ERROR_COUNT: &str = "error_count";
pub(crate) const ATTR_RETRIED: &str = "retried";

pub struct DynamoStore {
    client: Client,
    table: String,
}

impl DynamoStore {
    pub fn new(client: Client, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }
}

#[async_trait]
impl KeyedStore for DynamoStore {
    async fn insert_if_absent(&self, record: &ErrorRecord) -> Result<InsertOutcome, StoreError> {
        let result = self
            .client
            .put_item()
            .table_name(&self.table)
            .item(ATTR_KEY, AttributeValue::S(record.key.clone()))
            .item(
                ATTR_OCCURRED_AT,
                AttributeValue::S(record.occurred_at.to_rfc3339()),
            )
            .item(
                ATTR_ERROR_MESSAGE,
                AttributeValue::S(record.error_message.clone()),
            )
            .item(
                ATTR_PAYLOAD,
                AttributeValue::B(Blob::new(record.payload.clone())),
            )
            .item(
                ATTR_ERROR_COUNT,
                AttributeValue::N(record.error_count.to_string()),
            )
            .item(ATTR_RETRIED, AttributeValue::Bool(record.retried))
            .condition_expression("attribute_not_exists(#key)")
            .expression_attribute_names("#key", ATTR_KEY)
            .send()
            .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(err) if is_conditional_put_failure(&err) => Ok(InsertOutcome::KeyExists),
            Err(err) => Err(StoreError(err.to_string())),
        }
    }

    async fn add_error_count(&self, key: &str, delta: u64) -> Result<u64, StoreError> {
        let output = self
            .client
            .update_item()
            .table_name(&self.table)
            .key(ATTR_KEY, AttributeValue::S(key.to_owned()))
            .update_expression("ADD #count :delta")
            .expression_attribute_names("#count", ATTR_ERROR_COUNT)
            .expression_attribute_values(":delta", AttributeValue::N(delta.to_string()))
            .return_values(ReturnValue::UpdatedNew)
            .send()
            .await
            .map_err(|err| StoreError(err.to_string()))?;

        output
            .attributes()
            .and_then(|attrs| attrs.get(ATTR_ERROR_COUNT))
            .and_then(|value| value.as_n().ok())
            .and_then(|raw| raw.parse::<u64>().ok())
            .ok_or_else(|| StoreError(format!("no updated error count returned for '{key}'")))
    }

    async fn acquire_retry_lock(&self, key: &str) -> Result<LockOutcome, StoreError> {
        let result = self
            .client
            .update_item()
            .table_name(&self.table)
            .key(ATTR_KEY, AttributeValue::S(key.to_owned()))
            .update_expression("SET #retried = :yes")
            .condition_expression("#retried = :no")
            .expression_attribute_names("#retried", ATTR_RETRIED)
            .expression_attribute_values(":yes", AttributeValue::Bool(true))
            .expression_attribute_values(":no", AttributeValue::Bool(false))
            .send()
            .await;

        match result {
            Ok(_) => Ok(LockOutcome::Acquired),
            Err(err) if is_conditional_update_failure(&err) => Ok(LockOutcome::AlreadyRetried),
            Err(err) => Err(StoreError(err.to_string())),
        }
    }
}

fn is_conditional_put_failure(err: &SdkError<PutItemError>) -> bool {
    err.as_service_error()
        .map(PutItemError::is_conditional_check_failed_exception)
        .unwrap_or(false)
}

fn is_conditional_update_failure(err: &SdkError<UpdateItemError>) -> bool {
    err.as_service_error()
        .map(UpdateItemError::is_conditional_check_failed_exception)
        .unwrap_or(false)
}

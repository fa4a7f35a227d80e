//! Fire-and-forget worker invocation through the Lambda API.

use async_trait::async_trait;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::InvocationType;
use aws_sdk_lambda::Client;

use redrive_core::{InvokeError, Invoker, ObjectEvent, ObjectRecord};

pub struct LambdaInvoker {
    client: Client,
    function_arn: String,
}

impl LambdaInvoker {
    pub fn new(client: Client, function_arn: impl Into<String>) -> Self {
        Self {
            client,
            function_arn: function_arn.into(),
        }
    }
}

#[async_trait]
impl Invoker for LambdaInvoker {
    async fn invoke(&self, record: &ObjectRecord) -> Result<(), InvokeError> {
        let envelope = ObjectEvent::single(record.clone());
        let payload =
            serde_json::to_vec(&envelope).map_err(|err| InvokeError(err.to_string()))?;

        // Event invocation: queued asynchronously, no result awaited.
        self.client
            .invoke()
            .function_name(&self.function_arn)
            .invocation_type(InvocationType::Event)
            .payload(Blob::new(payload))
            .send()
            .await
            .map_err(|err| InvokeError(err.to_string()))?;

        Ok(())
    }
}

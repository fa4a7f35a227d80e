// AWS Lambda runtime adapter for the redrive pipeline
//
// Three entry points, one per function: the dispatcher consumes the Kinesis
// fan-out stream, the recorder consumes the SNS dead-letter topic, and the
// retrier consumes the error table's DynamoDB stream.
//
// Philosophy: lambda_runtime owns the event loop, #[tokio::main] in each
// binary provides the runtime, and all collaborators (store, invoker,
// config) are built once at startup and injected - no ambient globals.

use std::sync::Arc;

use aws_lambda_events::kinesis::KinesisEvent;
use aws_lambda_events::sns::SnsEvent;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use tracing::Instrument;

mod events;
mod invoker;
mod response;
mod store;

pub use invoker::LambdaInvoker;
pub use store::DynamoStore;

use redrive_config::{DispatcherConfig, RecorderConfig, RetrierConfig};
use redrive_handlers::{Dispatcher, Recorder, Retrier};
use response::HandlerResponse;

/// Structured JSON logs with `RUST_LOG`-style filtering.
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();
}

async fn aws_sdk_config() -> aws_config::SdkConfig {
    aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await
}

/// Dispatcher entry point: Kinesis batches of forwarded object events.
pub async fn run_dispatcher() -> Result<(), Error> {
    init_tracing();
    let config = DispatcherConfig::from_env()?;
    let aws = aws_sdk_config().await;
    let invoker = Arc::new(LambdaInvoker::new(
        aws_sdk_lambda::Client::new(&aws),
        config.target_arn,
    ));
    let dispatcher = Arc::new(Dispatcher::new(invoker, config.allow_prefixes));

    lambda_runtime::run(service_fn(move |event: LambdaEvent<KinesisEvent>| {
        let dispatcher = dispatcher.clone();
        async move {
            let (kinesis, context) = event.into_parts();
            let span = tracing::info_span!("dispatch", request_id = %context.request_id);
            let payloads = events::kinesis_payloads(&kinesis);
            let summary = dispatcher.dispatch(payloads).instrument(span).await?;
            Ok::<_, Error>(HandlerResponse::ok(summary))
        }
    }))
    .await
}

/// Recorder entry point: SNS dead-letter notifications.
pub async fn run_recorder() -> Result<(), Error> {
    init_tracing();
    let config = RecorderConfig::from_env()?;
    let aws = aws_sdk_config().await;
    let store = Arc::new(DynamoStore::new(
        aws_sdk_dynamodb::Client::new(&aws),
        config.table_name,
    ));
    let recorder = Arc::new(Recorder::new(store));

    lambda_runtime::run(service_fn(move |event: LambdaEvent<SnsEvent>| {
        let recorder = recorder.clone();
        async move {
            let (sns, context) = event.into_parts();
            let span = tracing::info_span!("record", request_id = %context.request_id);
            let notices = events::sns_notices(&sns);
            let summary = recorder.record_batch(&notices).instrument(span).await;
            Ok::<_, Error>(HandlerResponse::ok(summary))
        }
    }))
    .await
}

/// Retrier entry point: DynamoDB stream of error-table writes.
pub async fn run_retrier() -> Result<(), Error> {
    init_tracing();
    let config = RetrierConfig::from_env()?;
    let aws = aws_sdk_config().await;
    let store = Arc::new(DynamoStore::new(
        aws_sdk_dynamodb::Client::new(&aws),
        config.table_name,
    ));
    let invoker = Arc::new(LambdaInvoker::new(
        aws_sdk_lambda::Client::new(&aws),
        config.target_arn,
    ));
    let retrier = Arc::new(Retrier::new(store, invoker, config.max_retry));

    lambda_runtime::run(service_fn(move |event: LambdaEvent<events::StreamEvent>| {
        let retrier = retrier.clone();
        async move {
            let (stream, context) = event.into_parts();
            let span = tracing::info_span!("retry", request_id = %context.request_id);
            let (images, undecodable) = events::stream_images(&stream);
            let mut summary = retrier.handle_batch(&images).instrument(span).await;
            summary.changes_seen += undecodable;
            summary.failed += undecodable;
            Ok::<_, Error>(HandlerResponse::ok(summary))
        }
    }))
    .await
}

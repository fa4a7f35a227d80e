// Recorder Lambda binary
//
// Build with: cargo build -p redrive-lambda --bin recorder

#[tokio::main]
async fn main() -> Result<(), lambda_runtime::Error> {
    redrive_lambda::run_recorder().await
}

use std::process::ExitCode;

use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = garden::start_server().await {
        error!("Server failed: {e:#}");

        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

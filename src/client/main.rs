use std::process::ExitCode;

use keystead::client::prompt::run_prompt;
use keystead::client::LicenseApiClient;
use keystead::config::KeysteadConfig;
use keystead::errors::LicenseResult;

/// Interactive client for a Keystead server.
///
/// Reads `client.base_url`, `client.username` and `client.password` from
/// `keystead.toml` or `KEYSTEAD_CLIENT_*` variables.
#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("keystead_client: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> LicenseResult<()> {
    let config = KeysteadConfig::load()?;

    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_writer(std::io::stderr)
        .try_init();

    let client = LicenseApiClient::new(&config.client)?;
    println!("Using server {}", client.base_url());

    run_prompt(&client).await
}

use std::process::ExitCode;

use keystead::config::KeysteadConfig;
use keystead::errors::LicenseResult;
use keystead::server::bootstrap::{
    execute_server_command, init_tracing, parse_server_command, run_server,
};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("keystead_server: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> LicenseResult<()> {
    let args: Vec<String> = std::env::args().collect();
    if execute_server_command(&parse_server_command(&args))? {
        return Ok(());
    }

    let config = KeysteadConfig::load()?;
    config.validate()?;
    init_tracing(&config)?;

    run_server(config).await
}

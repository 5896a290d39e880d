//! Server startup and the `keystead_server` command line.
//!
//! With no arguments the binary serves. The only other command is
//!
//! ```text
//! keystead_server secret generate
//! ```
//!
//! which prints a fresh 64-hex-character value for `crypto.secret` and exits.
//! The secret is never written to disk by the server; put it in
//! `keystead.toml` or `KEYSTEAD_CRYPT_SECRET` yourself.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::KeysteadConfig;
use crate::encryption::{generate_secret, KeyCodec};
use crate::errors::{LicenseError, LicenseResult};
use crate::server::auth::BasicAuth;
use crate::server::database::Database;
use crate::server::handlers::AppState;
use crate::server::routes::build_router;
use crate::server::service::LicenseService;

/// What the server binary was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerCommand {
    /// Run the HTTP server
    Serve,
    /// Print a new secret and exit
    GenerateSecret,
    /// Unrecognized arguments
    Unknown(String),
}

/// Parse `std::env::args()` (program name included).
pub fn parse_server_command(args: &[String]) -> ServerCommand {
    match args.get(1..).unwrap_or_default() {
        [] => ServerCommand::Serve,
        [cmd, sub] if cmd == "secret" && sub == "generate" => ServerCommand::GenerateSecret,
        rest => ServerCommand::Unknown(rest.join(" ")),
    }
}

/// Usage text for the server binary.
pub fn usage() -> &'static str {
    "usage:\n  keystead_server                   run the server\n  keystead_server secret generate   print a new crypto.secret value"
}

/// Run a one-shot command.
///
/// Returns `Ok(true)` if the command was handled and the process should exit,
/// `Ok(false)` if the server should start.
pub fn execute_server_command(cmd: &ServerCommand) -> LicenseResult<bool> {
    match cmd {
        ServerCommand::Serve => Ok(false),
        ServerCommand::GenerateSecret => {
            println!("{}", hex::encode(generate_secret()?));
            Ok(true)
        }
        ServerCommand::Unknown(args) => Err(LicenseError::Config(format!(
            "unknown command '{args}'\n{}",
            usage()
        ))),
    }
}

/// Install the global `tracing` subscriber.
///
/// A second call is a no-op.
pub fn init_tracing(config: &KeysteadConfig) -> LicenseResult<()> {
    let level = config.log_level()?;

    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(!config.server.production)
        .try_init();

    Ok(())
}

/// Wire the service, auth and rate limiting into a router.
pub fn build_app(config: &KeysteadConfig, db: Arc<Database>) -> LicenseResult<Router> {
    let codec = KeyCodec::new(&config.crypto.secret_bytes()?)?;
    let state = AppState::new(LicenseService::new(db, codec));
    let auth = BasicAuth::from_config(&config.auth);

    build_router(state, auth, &config.rate_limit)
}

/// Connect, migrate and serve until the process is stopped.
pub async fn run_server(config: KeysteadConfig) -> LicenseResult<()> {
    let db = Database::connect(&config.database).await?;
    db.run_migrations().await?;
    info!(db_type = db.db_type(), "Database ready");

    let app = build_app(&config, db)?;

    let addr = config.server.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| LicenseError::Server(format!("failed to bind {addr}: {e}")))?;

    info!(
        "Keystead server listening on http://{addr} (rate limiting {})",
        if config.rate_limit.enabled { "on" } else { "off" }
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| LicenseError::Server(format!("server error: {e}")))
}

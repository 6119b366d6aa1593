//! Research fund console - drives the client session lifecycle from a terminal.
//!
//! This binary wires the session core together the way the web front end
//! does: one `SessionManager`, a `NavigationGuard` in front of every route
//! change, and a listener for forced-logout events.

mod console;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use researchfund_core::{
    ApiClient, Config, CredentialBackend, CredentialStore, NavigationGuard, RouteTable,
    SessionManager,
};

use console::Console;

/// Application name used for the log directory
const APP_NAME: &str = "researchfund";

/// Log file prefix; the appender adds the date
const LOG_FILE_PREFIX: &str = "researchfund.log";

#[derive(Parser, Debug)]
#[command(name = "researchfund", version, about = "Research fund client console")]
struct Cli {
    /// Base URL of the research fund server
    #[arg(long, env = "RESEARCHFUND_API_URL")]
    api_url: Option<String>,

    /// Where to keep the session token: "file" or "keyring"
    #[arg(long, env = "RESEARCHFUND_CREDENTIAL_BACKEND")]
    credential_backend: Option<String>,
}

/// Initialize the tracing subscriber, logging to a daily file so output
/// never interleaves with the console.
fn init_tracing() -> WorkerGuard {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let log_dir = dirs::cache_dir()
        .map(|dir| dir.join(APP_NAME).join("logs"))
        .unwrap_or_else(|| PathBuf::from("./logs"));
    let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing();
    info!("Research fund console starting");

    let mut config = Config::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        Config::default()
    });
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }
    if let Some(backend) = cli.credential_backend {
        config.credential_backend = backend
            .parse::<CredentialBackend>()
            .context("Invalid --credential-backend")?;
    }

    let data_dir = config.data_dir()?;
    let credentials = CredentialStore::open(config.credential_backend, &data_dir);
    let api = ApiClient::new(&config.api_base_url, config.request_timeout())?;
    info!(api = %api.base_url(), backend = ?config.credential_backend, "Session core configured");

    let (session, events) = SessionManager::new(api, credentials);
    session.check_existing_and_start();

    let guard = NavigationGuard::new(session, RouteTable::default());
    let result = Console::new(guard, events).run().await;

    info!("Research fund console shutting down");
    result
}

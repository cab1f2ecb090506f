//! Pairgate CLI
//!
//! Runs the server-side background tasks and exposes admin operations on the
//! shared whitelist store.

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use pairgate_access::AccessContext;
use pairgate_core::config::load_config;
use pairgate_core::tracing_init::init_tracing;

mod cli;

use cli::Command;

#[derive(Parser, Debug)]
#[command(name = "pairgate")]
#[command(version, about = "Pairgate - chat-paired whitelist for game servers")]
struct Args {
    /// Path to a JSON config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the shared SQLite database file.
    #[arg(long, global = true, env = "PAIRGATE_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Name of the local game server.
    #[arg(long, global = true)]
    server_name: Option<String>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(path) = args.db_path {
        config.database.path = Some(path);
    }
    if let Some(name) = args.server_name {
        config.server.name = name;
    }
    if args.log_json {
        config.logging.json = true;
    }

    init_tracing(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        server_name = %config.server.name,
        "Starting pairgate"
    );

    let ctx = AccessContext::open(config).await?;
    let result = cli::run(&ctx, args.command).await;
    ctx.db.close().await;
    result
}

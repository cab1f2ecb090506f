//! CLI subcommands.
//!
//! User-facing output uses writeln! to stdout (this is a CLI binary, not debug output).

use std::io::{self, Write};

use clap::Subcommand;
use pairgate_core::db::unix_timestamp;
use tokio::sync::watch;
use tracing::{error, info};
use uuid::Uuid;

use pairgate_access::{AccessContext, AccessError};
use pairgate_access::maintenance::{CODE_SWEEP_INTERVAL, spawn_code_sweeper};
use pairgate_access::registry::spawn_heartbeat_task;
use pairgate_access::storage::{EntryParams, LinkParams, RegistrationType, WhitelistEntry};
use pairgate_access::whitelist::paginate;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Register this server and run heartbeat and code sweep tasks until Ctrl-C
    Serve,
    /// Issue a registration code for a chat identity
    IssueCode {
        #[arg(long)]
        chat_id: i64,
        #[arg(long)]
        username: Option<String>,
        /// Player name the code is meant for
        #[arg(long)]
        player_name: Option<String>,
    },
    /// Redeem a registration code for a player
    Activate {
        code: String,
        #[arg(long)]
        player_id: Uuid,
        #[arg(long)]
        player_name: String,
    },
    /// Run the access gate for a player
    Check {
        #[arg(long)]
        player_id: Uuid,
        #[arg(long)]
        player_name: String,
        /// Target server (defaults to the local server)
        #[arg(long)]
        server: Option<String>,
        /// Use the cached, id-only proxy lookup
        #[arg(long)]
        proxy: bool,
    },
    /// Whitelist a player
    Add {
        #[arg(long)]
        player_id: Uuid,
        #[arg(long)]
        player_name: String,
        /// Target servers (repeatable, defaults to the local server)
        #[arg(long = "server")]
        servers: Vec<String>,
        #[arg(long)]
        reason: Option<String>,
        #[arg(long, default_value = "console")]
        added_by: String,
        /// Record the entry as an invite from this chat id
        #[arg(long)]
        inviter_chat_id: Option<i64>,
        /// Expire the entry after this many days
        #[arg(long)]
        expires_in_days: Option<u32>,
    },
    /// Remove a player's entry
    Remove {
        #[arg(long)]
        player_id: Uuid,
        #[arg(long)]
        server: Option<String>,
        /// Deactivate instead of deleting
        #[arg(long)]
        soft: bool,
    },
    /// List whitelist entries
    List {
        /// Server to list (defaults to the local server)
        #[arg(long, conflicts_with = "player_id")]
        server: Option<String>,
        /// List one player's entries across servers
        #[arg(long)]
        player_id: Option<Uuid>,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 10)]
        per_page: usize,
        /// Print the page as JSON
        #[arg(long)]
        json: bool,
    },
    /// Count active entries
    Count {
        /// Server to count (omit for all servers)
        #[arg(long)]
        server: Option<String>,
    },
    /// List known servers and their liveness
    Servers {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or create a player link
    Link {
        #[arg(long)]
        chat_id: i64,
        /// Create a link to this player instead of showing the existing one
        #[arg(long, requires = "player_name")]
        player_id: Option<Uuid>,
        #[arg(long)]
        player_name: Option<String>,
        #[arg(long)]
        username: Option<String>,
    },
    /// Deactivate a player's link
    Unlink {
        #[arg(long)]
        player_id: Uuid,
    },
    /// Delete expired registration codes
    SweepCodes,
}

fn format_entry(entry: &WhitelistEntry) -> String {
    format!(
        "{:<36}  {:<16}  {:<12}  {:<8}  {}",
        entry.player_id,
        entry.player_name,
        entry.server_name,
        entry.registration_type,
        entry.reason.as_deref().unwrap_or("-")
    )
}

/// Execute a subcommand. Engine errors surface as their user-facing text;
/// storage failures are logged in full and reported generically.
pub async fn run(ctx: &AccessContext, command: Command) -> anyhow::Result<()> {
    execute(ctx, command).await.map_err(user_facing)
}

fn user_facing(err: anyhow::Error) -> anyhow::Error {
    match err.downcast::<AccessError>() {
        Ok(err) => {
            if matches!(err, AccessError::Storage(_)) {
                error!(error = %err, "Command failed on storage");
            }
            anyhow::anyhow!(err.user_message())
        }
        Err(other) => other,
    }
}

#[allow(clippy::too_many_lines)]
async fn execute(ctx: &AccessContext, command: Command) -> anyhow::Result<()> {
    let mut out = io::stdout();
    let local = ctx.whitelist.server_name().to_string();
    match command {
        Command::Serve => serve(ctx).await?,
        Command::IssueCode {
            chat_id,
            username,
            player_name,
        } => {
            let code = ctx
                .codes
                .issue_code(chat_id, username.as_deref(), player_name.as_deref())
                .await?;
            writeln!(out, "{}", code.code)?;
            writeln!(
                out,
                "Valid for {} minutes.",
                (code.expires_at - code.created_at) / 60
            )?;
        }
        Command::Activate {
            code,
            player_id,
            player_name,
        } => {
            let result = ctx.activation.activate(&code, player_id, &player_name).await?;
            writeln!(out, "{}", result.reason.user_message())?;
            if let Some(entry) = result.entry {
                writeln!(out, "{}", format_entry(&entry))?;
            }
        }
        Command::Check {
            player_id,
            player_name,
            server,
            proxy,
        } => {
            let server = server.unwrap_or(local);
            let decision = if proxy {
                ctx.proxy_gate()
                    .check_access(player_id, &player_name, &server)
                    .await
            } else {
                ctx.server_gate()
                    .check_access(player_id, &player_name, &server)
                    .await
            };
            match decision.deny_message(&server) {
                None => writeln!(out, "allowed ({decision:?})")?,
                Some(message) => writeln!(out, "denied ({decision:?}): {message}")?,
            }
        }
        Command::Add {
            player_id,
            player_name,
            servers,
            reason,
            added_by,
            inviter_chat_id,
            expires_in_days,
        } => {
            let expires_at =
                expires_in_days.map(|days| unix_timestamp() + i64::from(days) * 86_400);
            let registration_type = if inviter_chat_id.is_some() {
                RegistrationType::Invite
            } else {
                RegistrationType::Manual
            };
            let targets = if servers.is_empty() {
                vec![local]
            } else {
                servers
            };
            for server in &targets {
                let entry = ctx
                    .whitelist
                    .add_entry(&EntryParams {
                        reason: reason.as_deref(),
                        added_by: Some(added_by.as_str()),
                        inviter_chat_id,
                        expires_at,
                        ..EntryParams::new(player_id, &player_name, server, registration_type)
                    })
                    .await?;
                ctx.cache.invalidate(player_id, server).await;
                writeln!(out, "{}", format_entry(&entry))?;
            }
        }
        Command::Remove {
            player_id,
            server,
            soft,
        } => {
            let server = server.unwrap_or(local);
            let changed = if soft {
                ctx.whitelist.deactivate(player_id, &server).await?
            } else {
                ctx.whitelist.remove_entry(player_id, &server).await?
            };
            ctx.cache.invalidate(player_id, &server).await;
            if changed {
                writeln!(out, "Player {player_id} removed from {server}.")?;
            } else {
                writeln!(out, "Player {player_id} has no entry on {server}.")?;
            }
        }
        Command::List {
            server,
            player_id,
            page,
            per_page,
            json,
        } => {
            let entries = match player_id {
                Some(id) => ctx.whitelist.entries_by_player(id).await?,
                None => {
                    let server = server.unwrap_or(local);
                    ctx.whitelist.entries_by_server(&server).await?
                }
            };
            let page = paginate(entries, page, per_page);
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&page.items)?)?;
            } else if page.items.is_empty() {
                writeln!(out, "No entries found.")?;
            } else {
                writeln!(
                    out,
                    "{:<36}  {:<16}  {:<12}  {:<8}  REASON",
                    "PLAYER", "NAME", "SERVER", "TYPE"
                )?;
                for entry in &page.items {
                    writeln!(out, "{}", format_entry(entry))?;
                }
                writeln!(
                    out,
                    "\nPage {}/{} ({} entries)",
                    page.page, page.total_pages, page.total
                )?;
            }
        }
        Command::Count { server } => {
            let count = match server {
                Some(server) => ctx.whitelist.count(&server).await?,
                None => ctx.whitelist.count_all().await?,
            };
            writeln!(out, "{count}")?;
        }
        Command::Servers { json } => {
            let servers = ctx.registry.get_all_servers().await?;
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&servers)?)?;
            } else if servers.is_empty() {
                writeln!(out, "No servers registered.")?;
            } else {
                writeln!(out, "{:<16}  {:<24}  {:<9}  STATUS", "NAME", "DISPLAY", "WHITELIST")?;
                for server in &servers {
                    writeln!(
                        out,
                        "{:<16}  {:<24}  {:<9}  {}",
                        server.name,
                        server.display_name,
                        if server.whitelist_enabled { "on" } else { "off" },
                        if server.is_online() { "online" } else { "offline" }
                    )?;
                }
            }
        }
        Command::Link {
            chat_id,
            player_id,
            player_name,
            username,
        } => {
            let link = match (player_id, player_name.as_deref()) {
                (Some(player_id), Some(player_name)) => Some(
                    ctx.links
                        .create_link(&LinkParams {
                            player_id,
                            player_name,
                            chat_id,
                            chat_username: username.as_deref(),
                        })
                        .await?,
                ),
                _ => ctx.links.link_by_chat(chat_id).await?,
            };
            match link {
                Some(link) => writeln!(
                    out,
                    "Chat {} <-> {} ({})",
                    link.chat_id, link.player_name, link.player_id
                )?,
                None => writeln!(out, "Chat {chat_id} is not linked.")?,
            }
        }
        Command::Unlink { player_id } => {
            if ctx.links.unlink_player(player_id).await? {
                writeln!(out, "Player {player_id} unlinked.")?;
            } else {
                writeln!(out, "Player {player_id} has no active link.")?;
            }
        }
        Command::SweepCodes => {
            let removed = ctx.codes.sweep_expired().await?;
            writeln!(out, "Removed {removed} expired code(s).")?;
        }
    }
    Ok(())
}

async fn serve(ctx: &AccessContext) -> anyhow::Result<()> {
    let server = &ctx.config.server;
    ctx.registry
        .register_server(&server.name, &server.display_name, server.whitelist_enabled)
        .await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let heartbeat = spawn_heartbeat_task(
        ctx.registry.clone(),
        server.name.clone(),
        server.display_name.clone(),
        server.whitelist_enabled,
        server.heartbeat_interval(),
        shutdown_rx.clone(),
    );
    let codes = spawn_code_sweeper(ctx.codes.clone(), CODE_SWEEP_INTERVAL, shutdown_rx);

    info!(server_name = %server.name, "Serving; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    let _ = shutdown_tx.send(true);
    for handle in [heartbeat, codes] {
        handle.await?;
    }

    info!("Pairgate stopped");
    Ok(())
}

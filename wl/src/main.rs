//! WavesLab - household simulation environment
//!
//! CLI entry point for controlling nodes and running the reporting loop.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use nodestore::{Outcome, StateStore, StoreError, StoreResult};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use waveslab::api;
use waveslab::cli::{Cli, Command};
use waveslab::config::Config;
use waveslab::ingress::Ingress;
use waveslab::scheduler::Scheduler;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) {
    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    // stdout carries command output; logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    debug!("Logging initialized (level: {:?})", level);
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref());

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    let data_dir = cli.data_dir.clone().unwrap_or_else(|| config.storage.data_dir.clone());

    debug!(command = ?cli.command, data_dir = %data_dir.display(), "main: dispatching command");
    match cli.command {
        Command::Start { id, user } => {
            debug!(%id, ?user, "main: matched Start command");
            Ok(with_store(&data_dir, |store| store.start_node(&id, user.as_deref())))
        }
        Command::Stop { id } => {
            debug!(%id, "main: matched Stop command");
            Ok(with_store(&data_dir, |store| store.stop_node(&id)))
        }
        Command::Status => {
            debug!("main: matched Status command");
            Ok(cmd_status(&data_dir))
        }
        Command::Users => {
            debug!("main: matched Users command");
            Ok(cmd_users(&data_dir))
        }
        Command::Endpoint { id, url } => {
            debug!(%id, %url, "main: matched Endpoint command");
            Ok(cmd_endpoint(&data_dir, &id, &url))
        }
        Command::Serve { bind } => {
            debug!(?bind, "main: matched Serve command");
            let bind = bind.unwrap_or_else(|| config.api.bind.clone());
            cmd_serve(&config, &data_dir, &bind).await
        }
        Command::Listen { bind } => {
            debug!(?bind, "main: matched Listen command");
            let bind = bind.unwrap_or_else(|| config.ingress.bind.clone());
            cmd_listen(&bind).await
        }
    }
}

/// Print an unexpected store failure and map it to exit code 1
fn unexpected(e: StoreError) -> ExitCode {
    eprintln!("{}", format!("Unexpected error: {}", e).red());
    ExitCode::FAILURE
}

fn report(outcome: Outcome) -> ExitCode {
    if outcome.success {
        println!("{}", outcome.message.green());
        ExitCode::SUCCESS
    } else {
        eprintln!("{}", format!("Error: {}", outcome.message).red());
        ExitCode::FAILURE
    }
}

/// Run a start/stop style operation against the store in `data_dir`
fn with_store<F>(data_dir: &Path, op: F) -> ExitCode
where
    F: FnOnce(&StateStore) -> StoreResult<Outcome>,
{
    match StateStore::open(data_dir).and_then(|store| op(&store)) {
        Ok(outcome) => report(outcome),
        Err(e) => unexpected(e),
    }
}

fn cmd_status(data_dir: &Path) -> ExitCode {
    let nodes = match StateStore::open(data_dir).and_then(|store| store.list_nodes()) {
        Ok(nodes) => nodes,
        Err(e) => return unexpected(e),
    };

    if nodes.is_empty() {
        println!("No nodes found.");
    }
    for node in nodes {
        let line = format!("{} - {}", node.status, node.name);
        if node.is_active() {
            println!("{}", line.green());
        } else {
            println!("{}", line);
        }
    }
    ExitCode::SUCCESS
}

fn cmd_users(data_dir: &Path) -> ExitCode {
    let users = match StateStore::open(data_dir).and_then(|store| store.list_users()) {
        Ok(users) => users,
        Err(e) => return unexpected(e),
    };

    if users.is_empty() {
        println!("No users found.");
    }
    for user in users {
        println!("{}", user.username);
    }
    ExitCode::SUCCESS
}

fn cmd_endpoint(data_dir: &Path, id: &str, url: &str) -> ExitCode {
    if url.trim().is_empty() {
        eprintln!("{}", "Error: endpoint URL must not be empty".red());
        return ExitCode::FAILURE;
    }

    match StateStore::open(data_dir).and_then(|store| store.update_endpoint(id, url)) {
        Ok(Some(node)) => report(Outcome::ok(format!(
            "Node '{}' now reports to {}",
            node.id, node.endpoint_url
        ))),
        Ok(None) => report(Outcome::failed(format!("Node '{}' not found", id))),
        Err(e) => unexpected(e),
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
    }
}

async fn cmd_serve(config: &Config, data_dir: &Path, bind: &str) -> Result<ExitCode> {
    let store = match StateStore::open(data_dir) {
        Ok(store) => Arc::new(store),
        Err(e) => return Ok(unexpected(e)),
    };

    let listener = TcpListener::bind(bind)
        .await
        .context(format!("Failed to bind management API to {}", bind))?;

    let mut scheduler = Scheduler::new(config.scheduler.clone(), Arc::clone(&store));
    scheduler.start().context("Failed to start simulation loop")?;

    let served = api::serve(listener, store, shutdown_signal()).await;

    info!("Shutting down WavesLab simulation environment...");
    scheduler.stop().await;

    served.context("Management API failed")?;
    Ok(ExitCode::SUCCESS)
}

async fn cmd_listen(bind: &str) -> Result<ExitCode> {
    let listener = TcpListener::bind(bind)
        .await
        .context(format!("Failed to bind ingress listener to {}", bind))?;

    Ingress::new()
        .serve(listener, shutdown_signal())
        .await
        .context("Ingress listener failed")?;
    Ok(ExitCode::SUCCESS)
}

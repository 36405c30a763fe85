//! `gcs` – Gaze Control System entry point.
//!
//! Wires the whole stack together:
//!
//! 1. Loads `~/.gcs/config.toml` (with `GCS_*` environment overrides).
//! 2. Spawns the perception link, the game/logging link, and the status
//!    WebSocket server, each reconnecting independently.
//! 3. Runs the gaze core on the main task until Ctrl-C.

mod config;

use std::net::SocketAddr;

use colored::Colorize;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

use gcs_middleware::game_link::GameLink;
use gcs_middleware::perception_link::PerceptionLink;
use gcs_middleware::status_server::StatusServer;
use gcs_runtime::core::GazeCore;
use gcs_types::{Condition, CoreEvent, FlagChange};

#[tokio::main]
async fn main() {
    // ── Structured logging ────────────────────────────────────────────────
    // Initialise tracing-subscriber using RUST_LOG (defaults to "info").
    // Set GCS_LOG_FORMAT=json to emit newline-delimited JSON logs suitable
    // for log aggregators.  User-facing output still uses println!.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if std::env::var("GCS_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .compact()
            .init();
    }

    print_banner();

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let cfg = {
                let mut c = config::Config::default();
                config::apply_env_overrides(&mut c);
                c
            };
            if let Err(e) = config::save(&cfg) {
                warn!(error = %e, "could not write default config");
            } else {
                println!(
                    "  Default config written to {}",
                    config::config_path().display().to_string().bold()
                );
            }
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };
    info!(
        perception = %cfg.perception_url,
        game = %cfg.game_url,
        status_port = cfg.status_port,
        "configuration resolved"
    );

    // ── Channels ──────────────────────────────────────────────────────────
    let (core_tx, core_rx) = mpsc::unbounded_channel();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (status_tx, _) = broadcast::channel(64);

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let ctrlc_tx = core_tx.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
        let _ = ctrlc_tx.send(CoreEvent::Shutdown);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    // ── Transport links ───────────────────────────────────────────────────
    tokio::spawn(PerceptionLink::new(cfg.perception_url.clone(), core_tx.clone()).run());
    tokio::spawn(GameLink::new(cfg.game_url.clone(), core_tx.clone()).run(outbound_rx));

    let status_addr: SocketAddr = ([127, 0, 0, 1], cfg.status_port).into();
    let status_server = StatusServer::new(status_tx.clone(), core_tx.clone(), outbound_tx.clone());
    tokio::spawn(async move {
        if let Err(e) = status_server.run(status_addr).await {
            error!(error = %e, "status server failed");
        }
    });

    // ── Initial condition ─────────────────────────────────────────────────
    if let Some(name) = cfg.initial_condition.as_deref() {
        match Condition::parse(name) {
            Some(condition) => {
                println!("  Starting in the {} condition.", condition.to_string().bold());
                let _ = core_tx.send(CoreEvent::Flag(FlagChange::Condition(condition)));
            }
            None => warn!(name, "unknown initial condition, starting with all toggles off"),
        }
    }

    println!();
    println!("  Status stream on {}\n", format!("ws://{status_addr}").bold().cyan());

    // ── Core loop ─────────────────────────────────────────────────────────
    GazeCore::new(outbound_tx, status_tx).run(core_rx).await;

    println!("{}", "  ✓ Gaze core stopped. Bye.".green());
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ______ ______ _____"#.bold().cyan());
    println!("{}", r#"  / ____// ____// ___/"#.bold().cyan());
    println!("{}", r#" / / __ / /     \__ \ "#.bold().cyan());
    println!("{}", r#"/ /_/ // /___  ___/ / "#.bold().cyan());
    println!("{}", r#"\____/ \____/ /____/  "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "GCS".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Gaze Control System for social robot experiments");
    println!();
}

#![cfg_attr(not(test), deny(clippy::panic))]

use clap::Parser;
use dicee_arena_server::config;
use dicee_arena_server::lobby::{lobby_channel, LobbyActor};
use dicee_arena_server::logging;
use dicee_arena_server::registry::RoomRegistry;
use dicee_arena_server::runtime::SystemClock;
use dicee_arena_server::storage::InMemoryStore;
use dicee_arena_server::websocket::{create_router, AppState};
use std::net::SocketAddr;
use std::sync::Arc;

/// Dicee Arena -- realtime multiplayer dice-game backend
#[derive(Parser, Debug)]
#[command(name = "dicee-arena-server")]
#[command(about = "Realtime multiplayer dice-game backend: lobby and room actors over WebSockets")]
#[command(version)]
struct Cli {
    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines and pre-deployment checks.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    /// Useful for debugging configuration loading from multiple sources.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration from config.json if present; otherwise use code defaults.
    let cfg = Arc::new(config::load());

    if cli.print_config {
        let json = serde_json::to_string_pretty(&*cfg)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    // config::load() already validated warn-only; capture the result here so
    // --validate-config gets a proper exit code and normal startup fails hard.
    let validation_result = config::validate_config(&cfg);

    if cli.validate_config {
        match validation_result {
            Ok(()) => {
                println!("Configuration validation passed");
                println!();
                println!("Configuration summary:");
                println!("  Port: {}", cfg.port);
                println!("  Max rooms: {}", cfg.server.max_rooms);
                println!("  Countdown: {}s", cfg.game.starting_countdown_secs);
                println!(
                    "  AFK warning/timeout: {}s/{}s",
                    cfg.game.afk_warning_secs, cfg.game.afk_timeout_secs
                );
                println!("  Reconnect grace: {}s", cfg.game.grace_period_secs);
                println!(
                    "  Lobby chat limit: {}/{}s",
                    cfg.lobby.chat_rate_limit, cfg.lobby.chat_rate_window_secs
                );
                return Ok(());
            }
            Err(e) => {
                eprintln!("Configuration validation failed:\n{e}");
                std::process::exit(1);
            }
        }
    }

    validation_result?;

    // Initialize logging from config.
    logging::init_with_config(&cfg.logging);

    let clock = Arc::new(SystemClock);
    let store = Arc::new(InMemoryStore::new());

    // The lobby mailbox exists before either actor so rooms and the
    // registry can hold its handle from birth.
    let (lobby, lobby_rx) = lobby_channel();
    let registry = Arc::new(RoomRegistry::new(
        lobby.clone(),
        clock.clone(),
        store.clone(),
        cfg.clone(),
    ));
    LobbyActor::spawn(&lobby, lobby_rx, registry.clone(), clock.clone(), cfg.clone());

    // Wake any hibernating rooms so the directory repopulates.
    registry.restore_all().await;

    let state = AppState {
        lobby,
        registry,
        clock,
        config: cfg.clone(),
    };
    let router = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    tracing::info!(%addr, "Dicee Arena server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "Failed to install shutdown handler");
    }
}

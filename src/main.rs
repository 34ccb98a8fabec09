#![cfg_attr(not(test), deny(clippy::panic))]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use poker_table_server::config;
use poker_table_server::logging;
use poker_table_server::messaging::{create_router, SessionParser, SocketServer};
use poker_table_server::session::{GameEventHandler, SessionConfig};
use poker_table_server::table::{InMemoryTables, TableEngine};

/// Poker Table Server -- real-time multiplayer poker table service
#[derive(Parser, Debug)]
#[command(name = "poker-table-server")]
#[command(about = "Real-time multiplayer poker table server over WebSocket")]
#[command(version)]
struct Cli {
    /// Validate configuration and exit without starting the server.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration from config.json if present; otherwise use code
    // defaults.
    let cfg = Arc::new(config::load());

    if cli.print_config {
        let json = serde_json::to_string_pretty(&*cfg)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    if cli.validate_config {
        println!("Configuration validation passed");
        println!();
        println!("Configuration summary:");
        println!("  Port: {}", cfg.port);
        println!("  Upgrade path: {}", cfg.server.ws_path);
        println!("  Action timeout: {}s", cfg.server.action_timeout_secs);
        println!("  Reconnect grace: {}s", cfg.server.reconnect_grace_secs);
        println!(
            "  Tables: {}",
            cfg.server
                .tables
                .iter()
                .map(|t| t.id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        return Ok(());
    }

    logging::init_with_config(&cfg.logging);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    tracing::info!(%addr, "Starting poker table server");

    // Provision the configured tables in the in-memory engine.
    let mut engine = InMemoryTables::new();
    for table in &cfg.server.tables {
        engine
            .create_table(&table.id, table.forced_bets, cfg.server.num_seats)
            .map_err(|e| anyhow::anyhow!("Failed to create table `{}`: {e}", table.id))?;
        tracing::info!(table = %table.id, ?table.forced_bets, "Table created");
    }

    // Transport server with the session-cookie middleware.
    let socket_server = SocketServer::new(cfg.security.max_message_size);
    socket_server.use_middleware(Arc::new(SessionParser::new(
        cfg.security.session_keys.clone(),
    )));

    // The orchestrator consumes connection events and drives the tables.
    let session_config = SessionConfig {
        action_timeout: Duration::from_secs(cfg.server.action_timeout_secs),
        reconnect_grace: Duration::from_secs(cfg.server.reconnect_grace_secs),
    };
    let handler = GameEventHandler::new(
        session_config,
        socket_server.broadcaster().clone(),
        Box::new(engine),
    );
    socket_server.set_handler(handler);

    let cors = if cfg.security.cors_origins == "*" {
        CorsLayer::permissive()
    } else {
        let origins: Vec<_> = cfg
            .security
            .cors_origins
            .split(',')
            .filter_map(|s| s.trim().parse::<axum::http::HeaderValue>().ok())
            .collect();

        if origins.is_empty() {
            tracing::warn!("No valid CORS origins configured, using permissive CORS");
            CorsLayer::permissive()
        } else {
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    };

    let router = create_router(&cfg.server.ws_path)
        .with_state(socket_server)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        ws_path = %cfg.server.ws_path,
        cors_origins = %cfg.security.cors_origins,
        "Server started"
    );

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # swctl
//!
//! Switch fleet management server.
//!
//! swctl keeps an in-memory registry of managed network switches, polls each
//! one's REST management API on a fixed cadence, brokers per-device session
//! tokens, and retrieves OpenAPI schema bundles via a token-gated inbound
//! upload callback — all behind a pre-shared API key.
//!
//! ## API surface
//!
//! | Method | Path                                  | Auth | Description                     |
//! |--------|---------------------------------------|------|---------------------------------|
//! | GET    | `/health`                             | No   | Liveness probe                  |
//! | GET    | `/api/v1/switches`                    | Yes  | List the fleet                  |
//! | POST   | `/api/v1/switches`                    | Yes  | Register a switch               |
//! | GET    | `/api/v1/switches/{id}`               | Yes  | Fetch one switch                |
//! | PUT    | `/api/v1/switches/{id}`               | Yes  | Partial update                  |
//! | DELETE | `/api/v1/switches/{id}`               | Yes  | Remove a switch                 |
//! | POST   | `/api/v1/switches/{id}/sync`          | Yes  | Trigger an immediate sync       |
//! | GET    | `/api/v1/switches/{id}/ports`         | Yes  | Port table                      |
//! | PUT    | `/api/v1/switches/{id}/system`        | Yes  | Push identity fields            |
//! | POST   | `/api/v1/switches/{id}/fetch-schema`  | Yes  | Request a schema upload         |
//! | GET    | `/api/v1/switches/{id}/schema`        | Yes  | Download the stored schema      |
//! | POST   | `/api/v1/upload/schema/{token}`       | No*  | Inbound schema upload callback  |
//!
//! *The upload callback is called by the switches and is gated by its
//! single-use token instead of the API key.
//!
//! ## Architecture
//!
//! ```text
//! main.rs        — entry point, clap, router setup, graceful shutdown
//! auth.rs        — Bearer token middleware, constant-time comparison
//! config.rs      — TOML + env-var configuration
//! state.rs       — AppState shared by all handlers
//! client.rs      — typed reqwest client for the switch management API
//! registry/
//!   device.rs    — Device, DeviceStatus, SystemInfo, spec/patch types
//!   mod.rs       — DeviceRegistry (id allocation, CRUD, sync commits)
//! sync/
//!   session.rs   — SessionManager (token reuse, re-authentication)
//!   mod.rs       — Reconciler (periodic ticker, on-demand triggers)
//! schema/
//!   archive.rs   — tar.gz schema bundle extraction
//!   mod.rs       — SchemaManager (upload tokens, both retrieval phases)
//! routes/
//!   health.rs    — GET /health
//!   devices.rs   — switch CRUD, sync trigger, ports, system push
//!   schema.rs    — fetch-schema, download, upload callback
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Extension, Router,
};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use swctl::{
    auth::{self, ApiKey},
    routes, AppState, Config, DeviceRegistry, Reconciler, SchemaManager, SessionManager,
    SwitchClient,
};

/// Switch fleet management server.
#[derive(Parser)]
#[command(name = "swctl", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default when no subcommand given).
    Serve {
        /// Path to TOML config file.
        #[arg(long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { config }) => run_server(config.as_deref()).await,
        None => run_server(None).await,
    }
}

async fn run_server(config_path: Option<&str>) {
    let config = Config::load(config_path);

    // Initialize tracing
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone());
    tracing_subscriber::fmt().with_env_filter(log_filter).init();

    info!("swctl v{} starting", env!("CARGO_PKG_VERSION"));
    info!("Listening on {}", config.server.listen);

    if config.auth.api_key == "change-me" {
        warn!("Using default API key — set SWCTL_API_KEY or update config");
    }
    if config.callback.base_url.starts_with("http://127.0.0.1") {
        warn!(
            "Callback base URL is {} — switches must be able to reach it; \
             set SWCTL_CALLBACK_URL for real deployments",
            config.callback.base_url
        );
    }

    let registry = Arc::new(DeviceRegistry::new());
    let client = SwitchClient::new(Duration::from_secs(config.sync.request_timeout_secs));
    let sessions = SessionManager::new(
        Arc::clone(&registry),
        client.clone(),
        config.sync.session_ttl_secs,
    );
    let reconciler = Reconciler::new(
        Arc::clone(&registry),
        sessions.clone(),
        client.clone(),
        Duration::from_secs(config.sync.interval_secs),
    );
    let schemas = SchemaManager::new(
        Arc::clone(&registry),
        sessions.clone(),
        client.clone(),
        config.callback.base_url.clone(),
        Duration::from_secs(config.schema.token_ttl_secs),
    );

    let max_upload_size = config.server.max_upload_size;
    let state = AppState {
        config: Arc::new(config),
        start_time: Instant::now(),
        registry,
        reconciler: reconciler.clone(),
        sessions,
        client,
        schemas,
    };

    // Build router
    let public_routes = Router::new()
        .route("/health", get(routes::health::health))
        .route(
            "/api/v1/upload/schema/{token}",
            post(routes::schema::upload_schema).layer(DefaultBodyLimit::max(max_upload_size)),
        );

    let authed_routes = Router::new()
        .route(
            "/api/v1/switches",
            get(routes::devices::list_switches).post(routes::devices::create_switch),
        )
        .route(
            "/api/v1/switches/{id}",
            get(routes::devices::get_switch)
                .put(routes::devices::update_switch)
                .delete(routes::devices::delete_switch),
        )
        .route(
            "/api/v1/switches/{id}/sync",
            post(routes::devices::trigger_sync),
        )
        .route(
            "/api/v1/switches/{id}/ports",
            get(routes::devices::get_ports),
        )
        .route(
            "/api/v1/switches/{id}/system",
            axum::routing::put(routes::devices::update_system),
        )
        .route(
            "/api/v1/switches/{id}/fetch-schema",
            post(routes::schema::fetch_schema),
        )
        .route(
            "/api/v1/switches/{id}/schema",
            get(routes::schema::download_schema),
        )
        .layer(middleware::from_fn(auth::require_api_key));

    let app = Router::new()
        .merge(public_routes)
        .merge(authed_routes)
        .layer(Extension(ApiKey(state.config.auth.api_key.clone())))
        // The dashboard is served from another origin
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let listener = TcpListener::bind(&state.config.server.listen)
        .await
        .expect("Failed to bind");

    // Periodic reconciliation, stopped via the watch channel on shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sync_task = reconciler.spawn(shutdown_rx);

    info!("Server ready");

    // Graceful shutdown
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("Failed to register SIGTERM");
            tokio::select! {
                _ = ctrl_c => info!("Received SIGINT"),
                _ = sigterm.recv() => info!("Received SIGTERM"),
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
            info!("Received SIGINT");
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .expect("Server error");

    // Cleanup: stop the periodic loop; in-flight syncs finish on their own
    info!("Shutting down...");
    let _ = shutdown_tx.send(true);
    let _ = sync_task.await;
    info!("Goodbye");
}

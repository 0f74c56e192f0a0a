// src/main.rs

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use chiliz_chat_server::{api::create_api_router, config::Config, mcp, AppState};
use tokio::io;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// --- HTTP Server Logic ---
async fn run_http_server(state: AppState) -> anyhow::Result<()> {
    let app = Router::new()
        .nest("/api", create_api_router())
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([127, 0, 0, 1], state.config.port));
    info!("🚀 HTTP Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("HTTP server error")
}

// --- Conversation Housekeeping ---
fn spawn_conversation_sweeper(state: AppState) {
    let ttl = state.config.conversation_idle();
    let period = ttl.clamp(Duration::from_secs(1), Duration::from_secs(60));
    tokio::spawn(async move {
        let mut ticks = tokio::time::interval(period);
        loop {
            ticks.tick().await;
            let evicted = state.evict_idle_conversations(ttl);
            if evicted > 0 {
                info!(evicted, open = state.conversations.len(), "Evicted idle conversations");
            }
        }
    });
}

// --- MCP Server Logic ---
async fn run_mcp_server(state: AppState) {
    info!("🚀 Starting MCP server on stdin/stdout...");
    mcp::serve(state, io::BufReader::new(io::stdin()), io::stdout()).await;
}

#[tokio::main]
async fn main() {
    // Logs go to stderr; stdout carries the MCP stream
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chiliz_chat_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("❌ Failed to load configuration: {:#}", e);
            return;
        }
    };

    let app_state = match AppState::from_config(config) {
        Ok(state) => state,
        Err(e) => {
            error!("❌ Failed to initialize clients: {:#}", e);
            return;
        }
    };

    if app_state.signer.is_some() {
        info!("Headless signer enabled for chain {}", app_state.config.chain_id);
    } else {
        warn!("SIGNER_PRIVATE_KEY not set; execute requests will stop at the unsigned transaction");
    }

    // Check if running in MCP mode (stdin/stdout) or HTTP server mode
    let args: Vec<String> = env::args().collect();
    if args.contains(&"--mcp".to_string()) || env::var("MCP_MODE").is_ok() {
        run_mcp_server(app_state).await;
    } else {
        spawn_conversation_sweeper(app_state.clone());
        if let Err(e) = run_http_server(app_state).await {
            error!("❌ {:#}", e);
        }
    }
}

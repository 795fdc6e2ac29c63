//! Mindboard Relay Server
//!
//! Relays board messages between clients subscribed to the same channel and
//! serves the AI mindmap generation route.
//!
//! - `GET /ws`: channel relay websocket (see [`relay`])
//! - `POST /api/mindmap`: `{ "keyword": "..." }` to `{ "nodes": [...] }`
//! - `GET /health`

mod config;
mod mindmap;
mod relay;

use axum::{
    Router,
    extract::{State, ws::WebSocketUpgrade},
    response::IntoResponse,
    routing::{get, post},
};
use config::ServerConfig;
use mindmap::MindmapClient;
use relay::Relay;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

/// Shared application state
struct AppState {
    relay: Arc<Relay>,
    /// `None` when no API key is configured.
    mindmap: Option<MindmapClient>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mindboard_server=info,tower_http=info".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let mindmap = match config.openai.clone() {
        Some(openai) => Some(MindmapClient::new(openai)?),
        None => {
            warn!("OPENAI_API_KEY not set, /api/mindmap will answer 500");
            None
        }
    };

    let state = Arc::new(AppState {
        relay: Arc::new(Relay::new()),
        mindmap,
    });

    let app = Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .route("/api/mindmap", post(mindmap::generate_mindmap))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!("Mindboard relay server listening on {}", config.addr);
    info!("WebSocket endpoint: ws://{}/ws", config.addr);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Index page
async fn index() -> &'static str {
    "Mindboard Relay Server - Connect via WebSocket at /ws"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let relay = state.relay.clone();
    ws.on_upgrade(move |socket| relay::handle_socket(socket, relay))
}

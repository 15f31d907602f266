//! Gateway HTTP server - Axum routes over the chat service

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use duet_core::{ChatService, Conversation, ConversationSummary, Message};

use crate::auth::IdentityResolver;
use crate::protocol::{ApiError, ApiResponse, AskRequest, CreateRequest};

/// Shared state handed to every request
#[derive(Clone)]
pub struct GatewayState {
    pub chat: Arc<ChatService>,
    pub identity: Arc<IdentityResolver>,
    pub start_time: std::time::Instant,
}

impl GatewayState {
    fn owner(&self, headers: &HeaderMap) -> Result<String, ApiError> {
        self.identity.resolve(headers).ok_or(ApiError::Unauthorized)
    }
}

/// The gateway server
pub struct GatewayServer {
    state: GatewayState,
    bind: SocketAddr,
}

impl GatewayServer {
    pub fn new(bind: SocketAddr, chat: Arc<ChatService>, identity: IdentityResolver) -> Self {
        let state = GatewayState {
            chat,
            identity: Arc::new(identity),
            start_time: std::time::Instant::now(),
        };
        Self { state, bind }
    }

    /// Build the Axum router
    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/chat/ai", post(ask_handler))
            .route("/api/chat/create", post(create_handler))
            .route("/api/chat/get", get(list_handler))
            .route("/api/status", get(status_handler))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Serve until `shutdown` is cancelled
    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let router = self.router();
        let listener = tokio::net::TcpListener::bind(self.bind).await?;
        info!(
            "Gateway listening on {} ({} users)",
            listener.local_addr()?,
            self.state.identity.user_count()
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Gateway stopped");
        Ok(())
    }

    /// Start the server in the background, returning a handle
    pub fn spawn(self, shutdown: CancellationToken) -> tokio::task::JoinHandle<anyhow::Result<()>> {
        tokio::spawn(async move { self.run(shutdown).await })
    }
}

// ── HTTP Handlers ──

async fn status_handler(State(state): State<GatewayState>) -> impl IntoResponse {
    let uptime = state.start_time.elapsed().as_secs();
    let ladder = state.chat.orchestrator().ladder_names();

    axum::Json(serde_json::json!({
        "status": "ok",
        "uptime_secs": uptime,
        "ladder": ladder,
    }))
}

/// The body is parsed by hand so that identity is checked first and a
/// malformed body gets the JSON envelope rather than axum's plain-text rejection.
async fn ask_handler(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: String,
) -> Result<axum::Json<ApiResponse<Message>>, ApiError> {
    let owner = state.owner(&headers)?;
    let req: AskRequest = serde_json::from_str(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))?;

    debug!("Prompt from '{}' for conversation {}", owner, req.chat_id);
    let reply = state.chat.send(&owner, &req.chat_id, &req.prompt).await?;
    Ok(axum::Json(ApiResponse::ok(reply)))
}

async fn create_handler(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: String,
) -> Result<axum::Json<ApiResponse<Conversation>>, ApiError> {
    let owner = state.owner(&headers)?;
    let req: CreateRequest = if body.trim().is_empty() {
        CreateRequest::default()
    } else {
        serde_json::from_str(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))?
    };

    let conversation = state.chat.create(&owner, req.name_or_default()).await?;
    Ok(axum::Json(ApiResponse::ok(conversation)))
}

async fn list_handler(
    State(state): State<GatewayState>,
    headers: HeaderMap,
) -> Result<axum::Json<ApiResponse<Vec<ConversationSummary>>>, ApiError> {
    let owner = state.owner(&headers)?;
    let conversations = state.chat.list(&owner).await?;
    Ok(axum::Json(ApiResponse::ok(conversations)))
}

// HTTP surface
// Thin plumbing over RagService: JSON schemas, CORS, and error mapping.
// Handlers hop onto the blocking pool because the core clients are
// synchronous; one request occupies one worker thread while remote calls
// are in flight.


use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::service::RagService;
use crate::store::ChunkMetadata;
use crate::{RagError, Result};

#[derive(Clone)]
struct AppState {
    service: Arc<RagService>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    message: String,
    memory_id: Option<String>,
    use_rag: Option<bool>,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VisionChatRequest {
    prompt: String,
    #[serde(default)]
    image_urls: Vec<String>,
    memory_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StructuredChatRequest {
    message: String,
    schema: Value,
    name: Option<String>,
    memory_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct StructuredChatResponse {
    data: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReindexResponse {
    docs: usize,
    chunks: usize,
    store_path: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RagQueryRequest {
    question: String,
    // Accepted for interface compatibility; the one-shot path has no memory.
    memory_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct RagQueryResponse {
    text: String,
    contexts: Vec<ContextBody>,
}

#[derive(Debug, Serialize)]
struct ContextBody {
    score: f32,
    text: String,
    metadata: ChunkMetadata,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RagStatusResponse {
    has_api_key: bool,
    healthy: bool,
    enabled_for_chat: bool,
    embed_model: String,
}

/// Build the application router for the given service.
#[inline]
pub fn app(service: Arc<RagService>) -> Router {
    let cors = cors_layer(&service.config().cors_origins);
    Router::new()
        .route("/health", get(health_handler))
        .route("/chat", post(chat_handler))
        .route("/chat-vision", post(chat_vision_handler))
        .route("/chat-structured", post(chat_structured_handler))
        .route("/rag/reindex", post(rag_reindex_handler))
        .route("/rag/query", post(rag_query_handler))
        .route("/rag/status", get(rag_status_handler))
        .layer(cors)
        .with_state(AppState { service })
}

/// Bind and serve until the process is stopped.
#[inline]
pub async fn serve(service: RagService, addr: SocketAddr) -> Result<()> {
    let router = app(Arc::new(service));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("askdocs API listening on {addr}");
    axum::serve(listener, router)
        .await
        .map_err(|err| RagError::Other(err.into()))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

async fn health_handler() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> std::result::Result<Json<ChatResponse>, ApiError> {
    let service = Arc::clone(&state.service);
    let text = run_blocking(move || {
        service.chat_text(
            &request.message,
            request.memory_id.as_deref(),
            request.use_rag,
        )
    })
    .await?;
    Ok(Json(ChatResponse { text }))
}

async fn chat_vision_handler(
    State(state): State<AppState>,
    Json(request): Json<VisionChatRequest>,
) -> std::result::Result<Json<ChatResponse>, ApiError> {
    let service = Arc::clone(&state.service);
    let text = run_blocking(move || {
        service.chat_vision(
            &request.prompt,
            &request.image_urls,
            request.memory_id.as_deref(),
        )
    })
    .await?;
    Ok(Json(ChatResponse { text }))
}

async fn chat_structured_handler(
    State(state): State<AppState>,
    Json(request): Json<StructuredChatRequest>,
) -> std::result::Result<Json<StructuredChatResponse>, ApiError> {
    let service = Arc::clone(&state.service);
    let data = run_blocking(move || {
        service.chat_structured(
            &request.message,
            &request.schema,
            request.name.as_deref(),
            request.memory_id.as_deref(),
        )
    })
    .await?;
    Ok(Json(StructuredChatResponse { data }))
}

async fn rag_reindex_handler(
    State(state): State<AppState>,
) -> std::result::Result<Json<ReindexResponse>, ApiError> {
    let service = Arc::clone(&state.service);
    let summary = run_blocking(move || service.reindex()).await?;
    Ok(Json(ReindexResponse {
        docs: summary.docs,
        chunks: summary.chunks,
        store_path: summary.store_path,
    }))
}

async fn rag_query_handler(
    State(state): State<AppState>,
    Json(request): Json<RagQueryRequest>,
) -> std::result::Result<Json<RagQueryResponse>, ApiError> {
    let service = Arc::clone(&state.service);
    let (text, contexts) = run_blocking(move || service.rag_query(&request.question)).await?;
    let contexts = contexts
        .into_iter()
        .map(|context| ContextBody {
            score: context.score,
            text: context.text,
            metadata: context.metadata,
        })
        .collect();
    Ok(Json(RagQueryResponse { text, contexts }))
}

async fn rag_status_handler(State(state): State<AppState>) -> Json<RagStatusResponse> {
    let status = state.service.status();
    Json(RagStatusResponse {
        has_api_key: status.has_api_key,
        healthy: status.healthy,
        enabled_for_chat: status.enabled_for_chat,
        embed_model: status.embed_model,
    })
}

/// The core is synchronous; every handler runs it on the blocking pool.
async fn run_blocking<T, F>(work: F) -> std::result::Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| ApiError(RagError::Other(anyhow::anyhow!("worker panicked: {err}"))))?
        .map_err(ApiError)
}

struct ApiError(RagError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            RagError::Transport(_) | RagError::Format(_) => StatusCode::BAD_GATEWAY,
            RagError::Config(_) | RagError::Io(_) | RagError::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        error!("Request failed: {}", self.0);
        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

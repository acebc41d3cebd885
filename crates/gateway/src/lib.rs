//! HTTP API gateway for Stepwise.
//!
//! Exposes the agent over a small REST surface:
//!
//! - `POST /chat` runs one request through the agent loop
//! - `GET /tools` lists the registered tools
//! - `GET /health` for monitoring
//!
//! Built on Axum for high performance async HTTP.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::extract::rejection::JsonRejection;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use stepwise_agent::AgentLoop;
use stepwise_core::error::{AgentError, StepError};
use stepwise_core::event::EventBus;
use stepwise_core::tool::ToolSpec;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub agent: Arc<AgentLoop>,

    /// Cancelled on shutdown; every request runs under a child token.
    pub shutdown: CancellationToken,
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
///
/// Layers applied:
/// - Request body size limit
/// - Permissive CORS
/// - HTTP trace logging
pub fn build_router(state: SharedState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/tools", get(tools_handler))
        .route("/chat", post(chat_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
///
/// Builds provider, tools and event bus once and shares them across
/// requests. Ctrl-C stops accepting connections and cancels in-flight
/// agent loops.
pub async fn start(config: stepwise_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    if !config.has_api_key() {
        warn!("No API key configured; reasoning-engine calls will fail (set GEMINI_API_KEY)");
    }

    let router = stepwise_providers::build_from_config(&config);
    let provider = router
        .default_provider()
        .ok_or("No default provider configured")?;
    let tools = Arc::new(stepwise_tools::default_registry(&config.tools));
    let event_bus = Arc::new(EventBus::default());

    let agent = Arc::new(AgentLoop::from_config(&config, provider, tools, event_bus));
    let shutdown = CancellationToken::new();
    let state = Arc::new(GatewayState {
        agent,
        shutdown: shutdown.clone(),
    });

    let app = build_router(state, config.gateway.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Gateway listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
        return;
    }
    info!("Shutdown requested, cancelling in-flight requests");
    shutdown.cancel();
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn tools_handler(State(state): State<SharedState>) -> Json<Vec<ToolSpec>> {
    Json(state.agent.tools().specs())
}

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    query: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    result: String,
}

async fn chat_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let query = match payload {
        Ok(Json(ChatRequest { query: Some(q) })) if !q.trim().is_empty() => q,
        Ok(_) | Err(JsonRejection::JsonDataError(_) | JsonRejection::JsonSyntaxError(_)) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "No query provided"})),
            )
                .into_response();
        }
        Err(rejection) => {
            warn!(status = %rejection.status(), "Rejected chat request: {rejection}");
            return (
                rejection.status(),
                Json(json!({"error": rejection.body_text()})),
            )
                .into_response();
        }
    };

    info!(query_len = query.len(), "Chat request received");

    let cancel = state.shutdown.child_token();
    let mut conversation = state.agent.conversation(query);

    match state
        .agent
        .process_with_cancel(&mut conversation, &cancel)
        .await
    {
        Ok(summary) => Json(ChatResponse {
            result: summary.answer,
        })
        .into_response(),
        Err(e) => {
            error!(
                conversation_id = %conversation.id(),
                error = %e,
                "Agent processing failed"
            );
            let (status, body) = error_body(&e);
            (status, Json(body)).into_response()
        }
    }
}

/// Map a terminal agent error to its HTTP status and JSON body.
fn error_body(err: &AgentError) -> (StatusCode, Value) {
    match err {
        AgentError::Step(StepError::Malformed { raw, .. }) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"or": "Invalid JSON from reasoning engine", "raw": raw}),
        ),
        AgentError::Step(StepError::UnknownTool { function, .. }) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"error": "Invalid function call", "function": function}),
        ),
        AgentError::Step(StepError::UnknownStep { raw }) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"error": "Unrecognized step", "raw": raw}),
        ),
        AgentError::Step(e @ StepError::InvalidField { raw, .. }) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"error": e.to_string(), "raw": raw}),
        ),
        AgentError::ToolFault { tool, .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"error": err.to_string(), "function": tool}),
        ),
        AgentError::Provider(_) => (StatusCode::BAD_GATEWAY, json!({"error": err.to_string()})),
        AgentError::EngineTimeout { .. } => {
            (StatusCode::GATEWAY_TIMEOUT, json!({"error": err.to_string()}))
        }
        AgentError::Cancelled => (
            StatusCode::SERVICE_UNAVAILABLE,
            json!({"error": err.to_string()}),
        ),
        AgentError::RoundLimitExceeded { .. } | AgentError::Serialization(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"error": err.to_string()}),
        ),
    }
}

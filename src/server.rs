use axum::{
    extract::State,
    http::{HeaderValue, Method},
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
    routing::{get, post},
    serve, Json, Router,
};
use futures::{Stream, StreamExt};
use serde_json::json;
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::Settings;
use crate::content::ContentService;
use crate::error::ApiError;
use crate::schema::{
    validate_content_type, validate_message, validate_prompt, ChatRequest, ContentResponse,
    QuickGenerateRequest, StreamFrame,
};

pub const API_VERSION: &str = "1.0.0";

/// Pacing between SSE frames so character-wise emission does not saturate the
/// connection.
const STREAM_FRAME_DELAY: Duration = Duration::from_millis(10);

// App state
pub struct AppState {
    pub content: ContentService,
    pub environment: String,
}

// Handlers

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "Content Generator API is running!" }))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "environment": state.environment,
        "api_version": API_VERSION,
    }))
}

async fn content_health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "service": "AI Content Generator" }))
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    let message = validate_message(&request.message)?.to_string();
    validate_content_type(&request.content_type)?;

    if request.stream {
        Ok(chat_stream(state, message).into_response())
    } else {
        let content = state.content.generate_once(&message).await;
        Ok(Json(ContentResponse {
            success: true,
            content,
            message: "Content generated successfully".to_string(),
        })
        .into_response())
    }
}

async fn quick_generate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QuickGenerateRequest>,
) -> Result<Json<ContentResponse>, ApiError> {
    let prompt = validate_prompt(&request.prompt)?.to_string();
    validate_content_type(&request.content_type)?;

    let content = state.content.generate_once(&prompt).await;
    Ok(Json(ContentResponse {
        success: true,
        content,
        message: "Content generated successfully".to_string(),
    }))
}

/// Frames the orchestrator's character stream as SSE: one `start` frame, one
/// `chunk` frame per fragment, one final `end` frame. Generation failures
/// arrive as an ordinary chunk carrying the error text; the response status
/// is already 200 by then.
fn chat_stream(
    state: Arc<AppState>,
    message: String,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = async_stream::stream! {
        yield frame_event(&StreamFrame::start());

        let mut fragments = state.content.generate_stream(&message);
        while let Some(fragment) = fragments.next().await {
            yield frame_event(&StreamFrame::chunk(fragment));
            tokio::time::sleep(STREAM_FRAME_DELAY).await;
        }

        yield frame_event(&StreamFrame::end());
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn frame_event(frame: &StreamFrame) -> Result<Event, Infallible> {
    Ok(Event::default().data(serde_json::to_string(frame).unwrap_or_default()))
}

// Router assembly

pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/content/chat", post(chat))
        .route("/api/content/quick", post(quick_generate))
        .route("/api/content/health", get(content_health))
        .layer(TraceLayer::new_for_http())
}

pub fn build_cors(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .allow_credentials(false)
}

pub struct Server {
    state: Arc<AppState>,
    settings: Settings,
}

impl Server {
    pub fn new(content: ContentService, settings: Settings) -> Self {
        let state = Arc::new(AppState {
            content,
            environment: settings.environment.clone(),
        });
        Server { state, settings }
    }

    pub async fn start(self) -> anyhow::Result<()> {
        let cors = build_cors(&self.settings.cors_origins);
        let app = create_router().layer(cors).with_state(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.settings.port));
        info!("starting server on {}", addr);

        let listener = TcpListener::bind(addr).await?;
        serve(listener, app.into_make_service())
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to install ctrl-c handler: {}", e);
        return;
    }
    info!("shutdown signal received, stopping server");
}

// # non-streaming chat
// curl -X POST http://localhost:8000/api/content/chat \
//   -H "Content-Type: application/json" \
//   -d '{"message": "Write a haiku in exactly 3 lines about rain", "stream": false}'

// # streaming chat (SSE)
// curl -N -X POST http://localhost:8000/api/content/chat \
//   -H "Content-Type: application/json" \
//   -d '{"message": "Give me 50 words about the ocean"}'

// # quick generation
// curl -X POST http://localhost:8000/api/content/quick \
//   -H "Content-Type: application/json" \
//   -d '{"prompt": "a 10-word slogan for a coffee shop"}'

// # health
// curl http://localhost:8000/api/content/health

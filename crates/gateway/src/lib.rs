//! HTTP gateway for Wayfarer.
//!
//! - `GET  /`                : service banner
//! - `GET  /health`          : readiness and configuration summary
//! - `POST /travel-assistant`: run one request, buffered JSON or SSE
//!
//! Built on Axum. The orchestrator is constructed once at startup and shared
//! through router state.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::{
    Router,
    extract::State,
    routing::{get, post},
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use wayfarer_agent::{LoopSettings, Orchestrator, RunError};
use wayfarer_config::AppConfig;

/// Request bodies above this size are rejected.
const BODY_LIMIT: usize = 64 * 1024;

/// Sentinel closing every SSE response.
const STREAM_SENTINEL: &str = "[DONE]";

/// Shared application state for the gateway.
pub struct GatewayState {
    pub orchestrator: Orchestrator,
    pub model: String,
    pub api_key_configured: bool,
}

impl GatewayState {
    pub fn new(orchestrator: Orchestrator, config: &AppConfig) -> Self {
        Self {
            model: orchestrator.settings().model.clone(),
            api_key_configured: config.has_api_key(),
            orchestrator,
        }
    }

    fn tool_names(&self) -> Vec<String> {
        self.orchestrator
            .tools()
            .names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes and layers.
pub fn build_router(state: SharedState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/travel-assistant", post(travel_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
}

/// Any origin when none are configured, otherwise exactly the listed ones.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    if origins.is_empty() {
        return base.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(parsed))
}

/// Start the gateway HTTP server and serve until Ctrl-C.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    // Build shared subsystems once
    let provider = wayfarer_providers::build_from_config(&config)?;
    let tools = Arc::new(wayfarer_tools::default_registry()?);
    let orchestrator = Orchestrator::new(provider, tools, LoopSettings::from(&config));

    let state = Arc::new(GatewayState::new(orchestrator, &config));
    let app = build_router(state, &config.gateway.cors_origins);

    info!(addr = %addr, model = %config.provider.model, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

// --- Handlers ---

#[derive(Serialize)]
struct RootResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    model: String,
    tools: Vec<String>,
}

async fn root_handler(State(state): State<SharedState>) -> Json<RootResponse> {
    Json(RootResponse {
        status: "ok",
        service: "wayfarer travel assistant",
        version: env!("CARGO_PKG_VERSION"),
        model: state.model.clone(),
        tools: state.tool_names(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    model: String,
    tools: Vec<String>,
    api_key_configured: bool,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        model: state.model.clone(),
        tools: state.tool_names(),
        api_key_configured: state.api_key_configured,
    })
}

#[derive(Deserialize)]
struct TravelRequest {
    #[serde(default)]
    query: Option<String>,

    /// Accepted as an alias of `query`.
    #[serde(default)]
    prompt: Option<String>,

    #[serde(default)]
    stream: bool,
}

impl TravelRequest {
    fn text(&self) -> Option<&str> {
        [self.query.as_deref(), self.prompt.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|text| !text.is_empty())
    }
}

#[derive(Serialize)]
struct TravelResponse {
    response: String,
    used_tools: Vec<String>,
    round_trips: u32,
    status: &'static str,
}

#[derive(Serialize)]
struct FailureResponse {
    status: &'static str,
    reason: &'static str,
    detail: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn failure_status(err: &RunError) -> StatusCode {
    match err {
        RunError::RetriesExhausted { .. } | RunError::ReasoningRejected(_) => StatusCode::BAD_GATEWAY,
        RunError::Cancelled => StatusCode::GATEWAY_TIMEOUT,
        RunError::RoundTripLimitExceeded { .. } | RunError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// `POST /travel-assistant`: buffered JSON by default, SSE with `stream: true`.
async fn travel_handler(
    State(state): State<SharedState>,
    Json(payload): Json<TravelRequest>,
) -> Response {
    let Some(text) = payload.text() else {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse {
                error: "Request must include a non-empty 'query' or 'prompt'".into(),
            }),
        )
            .into_response();
    };

    info!(query_len = text.len(), stream = payload.stream, "Travel request received");

    if payload.stream {
        let events = state
            .orchestrator
            .run_stream(text, &CancellationToken::new())
            .map(|event| {
                let data = serde_json::to_string(&event).unwrap_or_default();
                Ok::<_, Infallible>(SseEvent::default().event(event.event_type()).data(data))
            })
            .chain(futures::stream::once(async {
                Ok(SseEvent::default().data(STREAM_SENTINEL))
            }));
        return Sse::new(events).keep_alive(KeepAlive::default()).into_response();
    }

    match state.orchestrator.run(text, &CancellationToken::new()).await {
        Ok(report) => Json(TravelResponse {
            response: report.text,
            used_tools: report.used_tools,
            round_trips: report.round_trips,
            status: "success",
        })
        .into_response(),
        Err(err) => (
            failure_status(&err),
            Json(FailureResponse {
                status: "error",
                reason: err.reason(),
                detail: err.to_string(),
            }),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tower::ServiceExt;
    use wayfarer_core::message::ActionCall;
    use wayfarer_core::provider::{Provider, ProviderRequest, ProviderResponse};
    use wayfarer_core::ProviderError;

    struct ScriptedProvider {
        script: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ProviderResponse::text("out of script")))
        }
    }

    fn app(script: Vec<Result<ProviderResponse, ProviderError>>) -> Router {
        let provider = Arc::new(ScriptedProvider {
            script: Mutex::new(script.into()),
        });
        let tools = Arc::new(wayfarer_tools::default_registry().unwrap());
        let config = AppConfig::default();
        let orchestrator = Orchestrator::new(provider, tools, LoopSettings::from(&config));
        build_router(Arc::new(GatewayState::new(orchestrator, &config)), &[])
    }

    fn post_json(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/travel-assistant")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn weather_call() -> ActionCall {
        ActionCall::new(
            "w1",
            "get_weather",
            json!({"location": "Tokyo"}).as_object().cloned().unwrap(),
        )
    }

    #[tokio::test]
    async fn health_endpoint() {
        let response = app(vec![])
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["model"], "gemini-2.5-flash");
        assert_eq!(body["tools"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn root_lists_tools() {
        let response = app(vec![])
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(
            body["tools"],
            json!(["find_attractions", "get_weather", "search_flights"])
        );
    }

    #[tokio::test]
    async fn buffered_success() {
        let response = app(vec![
            Ok(ProviderResponse::actions(vec![weather_call()])),
            Ok(ProviderResponse::text("Expect mild weather in Tokyo.")),
        ])
        .oneshot(post_json(json!({"query": "Weather in Tokyo?"})))
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["status"], "success");
        assert_eq!(body["response"], "Expect mild weather in Tokyo.");
        assert_eq!(body["used_tools"], json!(["get_weather"]));
        assert_eq!(body["round_trips"], 1);
    }

    #[tokio::test]
    async fn prompt_is_accepted_as_query() {
        let response = app(vec![Ok(ProviderResponse::text("Hello."))])
            .oneshot(post_json(json!({"prompt": "hi"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_query_is_unprocessable() {
        for body in [json!({}), json!({"query": "   "})] {
            let response = app(vec![]).oneshot(post_json(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
            let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
            assert!(body["error"].as_str().unwrap().contains("query"));
        }
    }

    #[tokio::test]
    async fn rejected_reasoning_maps_to_bad_gateway() {
        let response = app(vec![Err(ProviderError::AuthenticationFailed("bad key".into()))])
            .oneshot(post_json(json!({"query": "hi"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["status"], "error");
        assert_eq!(body["reason"], "reasoning call rejected");
    }

    #[tokio::test]
    async fn stream_ends_with_sentinel() {
        let response = app(vec![
            Ok(ProviderResponse::actions(vec![weather_call()])),
            Ok(ProviderResponse::text("Sunny enough.")),
        ])
        .oneshot(post_json(json!({"query": "Weather in Tokyo?", "stream": true})))
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"].to_str().unwrap(),
            "text/event-stream"
        );

        let body = body_text(response).await;
        assert!(body.contains("event: step_started"));
        assert!(body.contains("event: action_requested"));
        assert!(body.contains("event: done"));
        assert!(body.contains("Sunny enough."));
        assert!(body.trim_end().ends_with("data: [DONE]"));
        assert!(body.find("event: done").unwrap() < body.find("[DONE]").unwrap());
    }

    #[test]
    fn failure_statuses() {
        assert_eq!(failure_status(&RunError::Cancelled), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            failure_status(&RunError::RoundTripLimitExceeded { limit: 10 }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}

#![allow(clippy::result_large_err)] // Server helpers return AppError for consistent diagnostics.

//! HTTP front end for the decision pipeline.

use crate::core::config::ServerConfig;
use crate::core::error::AppError;
use crate::core::pipeline::DecisionPipeline;
use crate::core::types::ErrorCategory;
use axum::{
    body::{Body, Bytes},
    extract::Extension,
    http::{header, HeaderMap, HeaderValue, Response, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower::util::MapResponseLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};

/// Route serving the decision pipeline.
pub const BUILD_ROUTE: &str = "/api/v1/buildDecisionSteps";

/// Header carrying the shared API key. Clients send `apiKey`; header names compare
/// case-insensitively and are stored lowercase.
pub const API_KEY_HEADER: &str = "apikey";

/// State shared across requests.
struct ServerState {
    pipeline: Arc<DecisionPipeline>,
    api_key: String,
}

/// Start the HTTP service and block until it terminates.
pub async fn serve(pipeline: Arc<DecisionPipeline>, settings: &ServerConfig) -> Result<(), AppError> {
    serve_internal(pipeline, settings, None).await
}

/// Start the HTTP service and notify once the bind address is known (test helper).
pub async fn serve_with_ready_notifier(
    pipeline: Arc<DecisionPipeline>,
    settings: &ServerConfig,
    ready_notifier: oneshot::Sender<SocketAddr>,
) -> Result<(), AppError> {
    serve_internal(pipeline, settings, Some(ready_notifier)).await
}

/// Assemble the router with auth state, body limit, and the 413 envelope.
pub fn router(pipeline: Arc<DecisionPipeline>, api_key: String, max_body_bytes: usize) -> Router {
    let state = Arc::new(ServerState { pipeline, api_key });
    Router::new()
        .route(BUILD_ROUTE, post(handle_build))
        .route("/healthz", get(handle_health))
        .layer(Extension(state))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(MapResponseLayer::new(|mut response: Response<Body>| {
            if response.status() == StatusCode::PAYLOAD_TOO_LARGE {
                let body = json!({
                    "error": {
                        "code": "WAVELINE-413",
                        "category": "ValidationError",
                        "message": "payload too large",
                        "context": {}
                    }
                })
                .to_string();
                *response.body_mut() = Body::from(body);
                response.headers_mut().insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
            }
            response
        }))
}

async fn serve_internal(
    pipeline: Arc<DecisionPipeline>,
    settings: &ServerConfig,
    ready_notifier: Option<oneshot::Sender<SocketAddr>>,
) -> Result<(), AppError> {
    let api_key = load_api_key(&settings.api_key_env)?;
    let bind_addr: SocketAddr = settings.bind.parse().map_err(|err| {
        AppError::new(
            ErrorCategory::ConfigurationError,
            format!("invalid bind address {}: {}", settings.bind, err),
        )
    })?;
    let app = router(pipeline, api_key, settings.max_body_bytes);
    let listener = TcpListener::bind(bind_addr).await.map_err(|err| {
        AppError::new(
            ErrorCategory::IoError,
            format!("failed to bind listener {}: {}", bind_addr, err),
        )
    })?;
    let local_addr = listener.local_addr().map_err(|err| {
        AppError::new(
            ErrorCategory::IoError,
            format!("failed to determine listener address: {}", err),
        )
    })?;
    if let Some(tx) = ready_notifier {
        let _ = tx.send(local_addr);
    }
    info!("waveline listening on {}", local_addr);
    axum::serve(listener, app.into_make_service())
        .await
        .map_err(|err| {
            AppError::new(
                ErrorCategory::IoError,
                format!("server terminated: {}", err),
            )
        })
}

async fn handle_health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": crate::VERSION,
    }))
}

async fn handle_build(
    Extension(state): Extension<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiRejection> {
    if !is_authorized(&headers, &state.api_key) {
        return Err(ApiRejection::unauthorized());
    }
    let payload: Value = serde_json::from_slice(&body).map_err(|err| {
        AppError::new(
            ErrorCategory::ValidationError,
            format!("request body is not valid JSON: {}", err),
        )
        .with_code("REQUEST-JSON-001")
    })?;
    let raw = payload.as_array().ok_or_else(|| {
        AppError::new(
            ErrorCategory::ValidationError,
            "request body must be a JSON array of steps",
        )
        .with_code("REQUEST-JSON-002")
    })?;

    let reconciled = state.pipeline.run(raw).await.map_err(AppError::from)?;
    let steps = serde_json::to_value(&reconciled.steps).map_err(AppError::from)?;
    Ok(Json(steps))
}

fn load_api_key(var: &str) -> Result<String, AppError> {
    let key = env::var(var).map_err(|_| {
        AppError::new(
            ErrorCategory::ConfigurationError,
            format!("API key environment variable {} is not set", var),
        )
    })?;
    if key.trim().is_empty() {
        return Err(AppError::new(
            ErrorCategory::ConfigurationError,
            format!("API key environment variable {} is empty", var),
        ));
    }
    Ok(key)
}

fn is_authorized(headers: &HeaderMap, expected: &str) -> bool {
    let header_value = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim);
    if let Some(key) = header_value {
        key.as_bytes().ct_eq(expected.as_bytes()).into()
    } else {
        false
    }
}

/// HTTP status for an error category.
pub fn status_for(category: &ErrorCategory) -> StatusCode {
    match category {
        ErrorCategory::ValidationError => StatusCode::BAD_REQUEST,
        ErrorCategory::ReferenceError => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCategory::CollaboratorError | ErrorCategory::CollaboratorFormatError => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

struct ApiRejection {
    status: StatusCode,
    body: Value,
}

impl ApiRejection {
    fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            body: json!({
                "error": {
                    "code": "WAVELINE-401",
                    "message": "Error: 401 - Invalid or missing API key"
                }
            }),
        }
    }
}

impl From<AppError> for ApiRejection {
    fn from(err: AppError) -> Self {
        let status = status_for(&err.category);
        if status.is_server_error() {
            error!(code = %err.code, "request failed: {}", err);
        } else {
            warn!(code = %err.code, "request rejected: {}", err.message);
        }
        Self {
            status,
            body: json!({
                "error": {
                    "code": err.code,
                    "category": err.category.to_string(),
                    "message": err.message,
                    "context": err.context,
                    "trace": cause_chain(&err),
                }
            }),
        }
    }
}

/// Messages of the error's source chain, outermost first.
fn cause_chain(err: &AppError) -> Vec<String> {
    err.source
        .as_ref()
        .map(|source| source.chain().map(|cause| cause.to_string()).collect())
        .unwrap_or_default()
}

impl IntoResponse for ApiRejection {
    fn into_response(self) -> Response<Body> {
        let mut resp = Json(self.body).into_response();
        *resp.status_mut() = self.status;
        resp
    }
}

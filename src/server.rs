use askama::Template;
use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use chrono::{DateTime, Utc};
use hyper::Server;
use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::app::ClassifyUseCase;
use crate::error::VitalsError;
use crate::types::{Feature, FieldMap, UnhealthyReason};

#[derive(Clone)]
struct AppState {
    use_case: ClassifyUseCase,
}

struct FormField {
    key: &'static str,
    label: &'static str,
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    fields: Vec<FormField>,
}

#[derive(Template)]
#[template(path = "result.html")]
struct ResultTemplate {
    result: &'static str,
    healthy: bool,
}

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorTemplate {
    error_message: String,
}

/// Successful JSON classification.
#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub request_id: Uuid,
    pub result: &'static str,
    pub healthy: bool,
    pub reason: Option<UnhealthyReason>,
    pub evaluated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

fn status_for(err: &VitalsError) -> StatusCode {
    match err {
        VitalsError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn render_page<T: Template>(template: T, status: StatusCode) -> Response {
    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            error!("Template rendering failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Template rendering failed").into_response()
        }
    }
}

/// Health check endpoint
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let ctx = state.use_case.context();
    Json(serde_json::json!({
        "status": "ok",
        "service": "vitals_check",
        "version": env!("CARGO_PKG_VERSION"),
        "scaler": ctx.transformer_name(),
        "model": ctx.scorer_name(),
    }))
}

async fn index() -> Response {
    let fields = Feature::ALL
        .into_iter()
        .map(|f| FormField {
            key: f.form_key(),
            label: f.name(),
        })
        .collect();
    render_page(IndexTemplate { fields }, StatusCode::OK)
}

async fn predict_form(State(state): State<AppState>, Form(fields): Form<FieldMap>) -> Response {
    match state.use_case.classify_fields(&fields) {
        Ok(classification) => render_page(
            ResultTemplate {
                result: classification.message(),
                healthy: classification.is_healthy(),
            },
            StatusCode::OK,
        ),
        Err(e) => render_page(
            ErrorTemplate {
                error_message: e.to_string(),
            },
            status_for(&e),
        ),
    }
}

/// JSON values become raw strings so both surfaces share one parser.
/// `null` counts as missing.
fn json_fields(body: HashMap<String, serde_json::Value>) -> FieldMap {
    body.into_iter()
        .filter_map(|(key, value)| match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some((key, s)),
            other => Some((key, other.to_string())),
        })
        .collect()
}

async fn classify_json(
    State(state): State<AppState>,
    Json(body): Json<HashMap<String, serde_json::Value>>,
) -> Response {
    let fields = json_fields(body);
    match state.use_case.classify_fields(&fields) {
        Ok(classification) => Json(ClassifyResponse {
            request_id: Uuid::new_v4(),
            result: classification.message(),
            healthy: classification.is_healthy(),
            reason: classification.reason().cloned(),
            evaluated_at: Utc::now(),
        })
        .into_response(),
        Err(e) => {
            let status = status_for(&e);
            let body = ErrorResponse {
                error: if status == StatusCode::BAD_REQUEST { "invalid_input" } else { "internal" },
                field: e.invalid_field().map(str::to_string),
                message: e.to_string(),
            };
            (status, Json(body)).into_response()
        }
    }
}

async fn metrics_handler() -> Response {
    match crate::metrics::render() {
        Some(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}

/// Build the router: form pages, JSON API, health and metrics.
pub fn create_server(use_case: ClassifyUseCase) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/predict", post(predict_form))
        .route("/api/v1/classify", post(classify_json))
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(AppState { use_case })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}

/// Serve until Ctrl-C.
pub async fn start_server(use_case: ClassifyUseCase, host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| VitalsError::Config(format!("Invalid listen address '{host}:{port}': {e}")))?;

    let app = create_server(use_case);

    info!("HTTP server listening on http://{}", addr);
    Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

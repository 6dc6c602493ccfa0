//! HTTP boundary: multipart uploads in, encoded image out.

use crate::config::ServerConfig;
use crate::error::InpaintError;
use crate::pipeline::InpaintPipeline;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Application state shared across handlers
struct AppState {
    pipeline: InpaintPipeline,
}

#[derive(Serialize)]
struct RootResponse {
    message: &'static str,
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    model: &'static str,
    pool_size: usize,
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    detail: String,
}

/// Failure returned to the client as `{"error": ..., "detail": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    category: &'static str,
    detail: String,
}

impl ApiError {
    fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            category: "request",
            detail: detail.into(),
        }
    }
}

impl From<InpaintError> for ApiError {
    fn from(err: InpaintError) -> Self {
        let status = if err.is_client_fault() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            category: err.stage().as_str(),
            detail: err.to_string(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self {
            status: err.status(),
            category: "request",
            detail: err.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.category,
            detail: self.detail,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Build the router without binding a listener.
pub fn router(pipeline: InpaintPipeline, config: &ServerConfig) -> Router {
    let state = Arc::new(AppState { pipeline });

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/inpaint", post(inpaint_handler))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server until Ctrl+C or SIGTERM
pub async fn run_server(pipeline: InpaintPipeline, config: ServerConfig) -> Result<()> {
    let app = router(pipeline, &config);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid address {}:{}", config.host, config.port))?;

    info!("Server listening on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /        - Liveness message");
    info!("  GET  /health  - Health check");
    info!("  POST /inpaint - Multipart `image` + `mask`, returns the inpainted image");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn root_handler() -> Json<RootResponse> {
    Json(RootResponse {
        message: "AI Inpainting API is running",
    })
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let engine = state.pipeline.engine();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        model: engine.name(),
        pool_size: engine.pool_size(),
    })
}

/// Inpainting endpoint
async fn inpaint_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let start = Instant::now();
    let mut image: Option<Bytes> = None;
    let mut mask: Option<Bytes> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("image") => {
                let content_type = field.content_type().unwrap_or_default().to_owned();
                if !content_type.starts_with("image/") {
                    return Err(ApiError::bad_request("File must be an image"));
                }
                image = Some(field.bytes().await?);
            }
            Some("mask") => mask = Some(field.bytes().await?),
            other => warn!("Ignoring unexpected multipart field {:?}", other),
        }
    }

    let image = image.ok_or_else(|| ApiError::bad_request("missing `image` field"))?;
    let mask = mask.ok_or_else(|| ApiError::bad_request("missing `mask` field"))?;
    info!(
        image_bytes = image.len(),
        mask_bytes = mask.len(),
        "Processing inpaint request"
    );

    let pipeline = state.pipeline.clone();
    let result = tokio::task::spawn_blocking(move || pipeline.run(&image, &mask))
        .await
        .map_err(|e| {
            error!(error = %e, "Inpaint task aborted");
            ApiError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                category: "internal",
                detail: "inpainting task aborted".to_string(),
            }
        })?;

    let result = match result {
        Ok(result) => result,
        Err(e) => {
            if e.is_client_fault() {
                warn!(stage = e.stage().as_str(), error = %e, "Rejected inpaint request");
            } else {
                error!(stage = e.stage().as_str(), error = %e, "Inpaint request failed");
            }
            return Err(e.into());
        }
    };

    info!(
        width = result.canvas.width(),
        height = result.canvas.height(),
        total_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Inpaint completed"
    );

    let mime = result.format.mime_type();
    Ok(([(header::CONTENT_TYPE, mime)], result.into_bytes()).into_response())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        }
    }
}

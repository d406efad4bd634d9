//! HTTP API server.
//!
//! REST endpoints binding the pipeline components, mounted under `/api`.
//! Request validation happens before any component work; batch endpoints
//! report per-item failures in-band and stay 200.

mod error;
mod generations;
mod transcriptions;
mod videos;

use crate::config::Settings;
use crate::error::{KvissError, Result};
use crate::orchestrator::Orchestrator;
use crate::store::Store;
use axum::http::HeaderValue;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Shared application state: the service container built once at startup.
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub settings: Settings,
}

/// Common skip/limit query parameters.
#[derive(Deserialize)]
pub(crate) struct Pagination {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

pub(crate) fn default_limit() -> i64 {
    100
}

impl Pagination {
    pub fn validate(&self) -> Result<()> {
        if self.skip < 0 || self.limit < 1 || self.limit > 500 {
            return Err(KvissError::Validation(
                "skip must be >= 0 and limit between 1 and 500".into(),
            ));
        }
        Ok(())
    }
}

/// Open the store and wire up the service container.
pub fn build_state(settings: Settings) -> Result<Arc<AppState>> {
    let store = Arc::new(Store::open(
        &settings.database_path(),
        settings.embedding.dim as usize,
    )?);
    std::fs::create_dir_all(settings.audio_dir())?;

    let orchestrator = Orchestrator::new(&settings, store);

    Ok(Arc::new(AppState {
        orchestrator,
        settings,
    }))
}

/// Build the `/api` router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.settings.server.cors_origins);

    let api = Router::new()
        .route("/health", get(health))
        .route("/videos/download", post(videos::download))
        .route("/videos/transcribe", post(transcriptions::transcribe))
        .route("/videos", get(videos::list))
        .route(
            "/videos/{external_id}",
            get(videos::get).delete(videos::delete),
        )
        .route("/transcriptions/transcribe", post(transcriptions::transcribe))
        .route("/transcriptions", get(transcriptions::list))
        .route(
            "/transcriptions/video/{external_id}",
            get(transcriptions::for_video),
        )
        .route(
            "/transcriptions/{id}",
            get(transcriptions::get).delete(transcriptions::delete),
        )
        .route("/questions/generate", post(generations::generate))
        .route("/generations", get(generations::list))
        .route(
            "/generations/{id}",
            get(generations::get).delete(generations::delete),
        )
        .route(
            "/generations/{id}/questions/reorder",
            put(generations::reorder),
        )
        .route(
            "/generations/{id}/questions/{question_id}",
            put(generations::update_question).delete(generations::delete_question),
        );

    Router::new().nest("/api", api).layer(cors).with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let parsed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Run the HTTP API server until Ctrl+C.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    let state = build_state(settings)?;
    let app = build_router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown requested");
}

//! Video endpoints.

use super::{AppState, Pagination};
use crate::error::{KvissError, Result};
use crate::media::remove_files_best_effort;
use crate::orchestrator::DownloadBatchSummary;
use crate::store::Video;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Deserialize)]
pub(super) struct DownloadRequest {
    urls: Vec<String>,
}

#[derive(Serialize)]
pub(super) struct VideoListResponse {
    videos: Vec<Video>,
    total: i64,
}

#[derive(Deserialize)]
pub(super) struct DeleteParams {
    #[serde(default)]
    cascade: bool,
}

pub(super) async fn download(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DownloadRequest>,
) -> Result<Json<DownloadBatchSummary>> {
    if req.urls.is_empty() {
        return Err(KvissError::Validation("urls must not be empty".into()));
    }
    if req.urls.iter().any(|u| u.trim().is_empty()) {
        return Err(KvissError::Validation("urls must not contain empty entries".into()));
    }

    Ok(Json(state.orchestrator.download_batch(req.urls).await))
}

pub(super) async fn list(
    State(state): State<Arc<AppState>>,
    Query(page): Query<Pagination>,
) -> Result<Json<VideoListResponse>> {
    page.validate()?;

    let store = state.orchestrator.store();
    let videos = store.list_videos(page.skip, page.limit)?;
    let total = store.count_videos()?;

    Ok(Json(VideoListResponse { videos, total }))
}

pub(super) async fn get(
    State(state): State<Arc<AppState>>,
    Path(external_id): Path<String>,
) -> Result<Json<Video>> {
    let video = state
        .orchestrator
        .store()
        .get_video_by_external_id(&external_id)?
        .ok_or_else(|| KvissError::NotFound(format!("Video {}", external_id)))?;

    Ok(Json(video))
}

pub(super) async fn delete(
    State(state): State<Arc<AppState>>,
    Path(external_id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Result<StatusCode> {
    let paths = state
        .orchestrator
        .store()
        .delete_video(&external_id, params.cascade)?;

    // The rows are gone; file removal is best-effort and the sweep catches
    // anything left behind.
    remove_files_best_effort(&paths);
    let _ = std::fs::remove_dir(state.settings.chunks_dir(&external_id));

    Ok(StatusCode::NO_CONTENT)
}

//! Transcription endpoints.

use super::{AppState, Pagination};
use crate::error::{KvissError, Result};
use crate::orchestrator::TranscribeBatchSummary;
use crate::store::Transcription;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Deserialize)]
pub(super) struct TranscribeRequest {
    video_ids: Vec<String>,
    language: Option<String>,
}

/// Transcription as the API exposes it: external video id, no raw vector.
#[derive(Serialize)]
pub(super) struct TranscriptionView {
    id: i64,
    video_id: String,
    text: String,
    status: String,
    has_embedding: bool,
    created_at: DateTime<Utc>,
}

impl From<Transcription> for TranscriptionView {
    fn from(t: Transcription) -> Self {
        Self {
            id: t.id,
            video_id: t.video_external_id,
            text: t.text,
            status: t.status,
            has_embedding: t.embedding.is_some(),
            created_at: t.created_at,
        }
    }
}

#[derive(Serialize)]
pub(super) struct TranscriptionListResponse {
    transcriptions: Vec<TranscriptionView>,
    total: i64,
}

#[derive(Deserialize)]
pub(super) struct VideoFilter {
    video_id: Option<String>,
}

pub(super) async fn transcribe(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TranscribeRequest>,
) -> Result<Json<TranscribeBatchSummary>> {
    if req.video_ids.is_empty() {
        return Err(KvissError::Validation("video_ids must not be empty".into()));
    }
    if req.video_ids.iter().any(|id| id.trim().is_empty()) {
        return Err(KvissError::Validation(
            "video_ids must not contain empty entries".into(),
        ));
    }

    Ok(Json(
        state
            .orchestrator
            .transcribe_batch(req.video_ids, req.language)
            .await,
    ))
}

pub(super) async fn list(
    State(state): State<Arc<AppState>>,
    Query(page): Query<Pagination>,
    Query(filter): Query<VideoFilter>,
) -> Result<Json<TranscriptionListResponse>> {
    page.validate()?;

    let store = state.orchestrator.store();
    let transcriptions = store
        .list_transcriptions(page.skip, page.limit, filter.video_id.as_deref())?
        .into_iter()
        .map(TranscriptionView::from)
        .collect();
    let total = store.count_transcriptions(filter.video_id.as_deref())?;

    Ok(Json(TranscriptionListResponse {
        transcriptions,
        total,
    }))
}

pub(super) async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<TranscriptionView>> {
    let transcription = state
        .orchestrator
        .store()
        .get_transcription(id)?
        .ok_or_else(|| KvissError::NotFound(format!("Transcription {}", id)))?;

    Ok(Json(transcription.into()))
}

pub(super) async fn for_video(
    State(state): State<Arc<AppState>>,
    Path(external_id): Path<String>,
) -> Result<Json<TranscriptionListResponse>> {
    let store = state.orchestrator.store();

    store
        .get_video_by_external_id(&external_id)?
        .ok_or_else(|| KvissError::NotFound(format!("Video {}", external_id)))?;

    let transcriptions: Vec<TranscriptionView> = store
        .transcriptions_for_video(&external_id)?
        .into_iter()
        .map(TranscriptionView::from)
        .collect();
    let total = transcriptions.len() as i64;

    Ok(Json(TranscriptionListResponse {
        transcriptions,
        total,
    }))
}

pub(super) async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    state.orchestrator.store().delete_transcription(id)?;
    Ok(StatusCode::NO_CONTENT)
}

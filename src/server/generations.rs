//! Generation and question endpoints.

use super::{AppState, Pagination};
use crate::error::{KvissError, Result};
use crate::questions::{clamp_count, GenerationSummary};
use crate::store::{Generation, Question, QuestionUpdate};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Deserialize)]
pub(super) struct GenerateRequest {
    video_ids: Vec<String>,
    question_count: Option<u32>,
}

#[derive(Serialize)]
pub(super) struct GenerationListResponse {
    generations: Vec<Generation>,
    total: i64,
}

#[derive(Serialize)]
pub(super) struct GenerationDetail {
    #[serde(flatten)]
    generation: Generation,
    questions: Vec<Question>,
}

#[derive(Deserialize)]
pub(super) struct ReorderRequest {
    question_ids: Vec<i64>,
}

#[derive(Serialize)]
pub(super) struct QuestionListResponse {
    questions: Vec<Question>,
}

pub(super) async fn generate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<GenerationSummary>> {
    if req.video_ids.is_empty() {
        return Err(KvissError::Validation("video_ids must not be empty".into()));
    }
    if req.video_ids.iter().any(|id| id.trim().is_empty()) {
        return Err(KvissError::Validation(
            "video_ids must not contain empty entries".into(),
        ));
    }

    let count = clamp_count(req.question_count);
    let summary = state
        .orchestrator
        .generate_questions(&req.video_ids, count)
        .await?;

    Ok(Json(summary))
}

pub(super) async fn list(
    State(state): State<Arc<AppState>>,
    Query(page): Query<Pagination>,
) -> Result<Json<GenerationListResponse>> {
    page.validate()?;

    let store = state.orchestrator.store();
    let generations = store.list_generations(page.skip, page.limit)?;
    let total = store.count_generations()?;

    Ok(Json(GenerationListResponse { generations, total }))
}

pub(super) async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<GenerationDetail>> {
    let store = state.orchestrator.store();

    let generation = store
        .get_generation(id)?
        .ok_or_else(|| KvissError::NotFound(format!("Generation {}", id)))?;
    let questions = store.questions_for_generation(id)?;

    Ok(Json(GenerationDetail {
        generation,
        questions,
    }))
}

pub(super) async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    state.orchestrator.store().delete_generation(id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn update_question(
    State(state): State<Arc<AppState>>,
    Path((generation_id, question_id)): Path<(i64, i64)>,
    Json(update): Json<QuestionUpdate>,
) -> Result<Json<Question>> {
    let question = state
        .orchestrator
        .store()
        .update_question(generation_id, question_id, &update)?;

    Ok(Json(question))
}

pub(super) async fn delete_question(
    State(state): State<Arc<AppState>>,
    Path((generation_id, question_id)): Path<(i64, i64)>,
) -> Result<StatusCode> {
    state
        .orchestrator
        .store()
        .delete_question(generation_id, question_id)?;

    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn reorder(
    State(state): State<Arc<AppState>>,
    Path(generation_id): Path<i64>,
    Json(req): Json<ReorderRequest>,
) -> Result<Json<QuestionListResponse>> {
    let questions = state
        .orchestrator
        .store()
        .reorder_questions(generation_id, &req.question_ids)?;

    Ok(Json(QuestionListResponse { questions }))
}

//! HTTP request handlers
//!
//! One handler per engine operation; all of them delegate and let the
//! [`ApiError`](super::ApiError) mapping translate failures.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Serialize;

use super::server::AppContext;
use super::ApiError;
use crate::clients::RequestMeta;
use crate::engine::{
    AckResponse, DemoResponse, FavoriteResponse, HistoryRequest, HistoryResponse, InterviewDetail,
    PublicQuestionsRequest, PublicQuestionsResponse, QuestionResponse, StartInterviewRequest,
    StartInterviewResponse, SubmitAnswerRequest, SubmitInterviewResponse,
};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

/// GET /health - health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "interview_engine".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /interview/start
pub async fn start_interview(
    State(ctx): State<AppContext>,
    meta: RequestMeta,
    Json(req): Json<StartInterviewRequest>,
) -> Result<Json<StartInterviewResponse>, ApiError> {
    Ok(Json(ctx.engine.start_interview(&meta, req).await?))
}

/// GET /interview/:id/question/:index
pub async fn get_next_question(
    State(ctx): State<AppContext>,
    meta: RequestMeta,
    Path((interview_id, question_index)): Path<(String, i32)>,
) -> Result<Json<QuestionResponse>, ApiError> {
    Ok(Json(
        ctx.engine
            .get_next_question(&meta, &interview_id, question_index)
            .await?,
    ))
}

/// POST /interview/:id/question/:index/answer
pub async fn submit_answer(
    State(ctx): State<AppContext>,
    meta: RequestMeta,
    Path((interview_id, question_index)): Path<(String, i32)>,
    Json(req): Json<SubmitAnswerRequest>,
) -> Result<Json<AckResponse>, ApiError> {
    Ok(Json(
        ctx.engine
            .submit_answer(&meta, &interview_id, question_index, req)
            .await?,
    ))
}

/// POST /interview/:id/submit
pub async fn submit_interview(
    State(ctx): State<AppContext>,
    meta: RequestMeta,
    Path(interview_id): Path<String>,
) -> Result<Json<SubmitInterviewResponse>, ApiError> {
    Ok(Json(ctx.engine.submit_interview(&meta, &interview_id).await?))
}

/// GET /interview/:id
pub async fn get_interview(
    State(ctx): State<AppContext>,
    Path(interview_id): Path<String>,
) -> Result<Json<InterviewDetail>, ApiError> {
    Ok(Json(ctx.engine.get_interview(&interview_id).await?))
}

/// GET /interview/history
pub async fn get_interview_history(
    State(ctx): State<AppContext>,
    meta: RequestMeta,
    Query(req): Query<HistoryRequest>,
) -> Result<Json<HistoryResponse>, ApiError> {
    Ok(Json(ctx.engine.get_interview_history(&meta, req).await?))
}

/// POST /interview/:id/favorite - toggle
pub async fn favorite_interview(
    State(ctx): State<AppContext>,
    meta: RequestMeta,
    Path(interview_id): Path<String>,
) -> Result<Json<FavoriteResponse>, ApiError> {
    Ok(Json(ctx.engine.favorite_interview(&meta, &interview_id).await?))
}

/// GET /public-questions
pub async fn get_public_questions(
    State(ctx): State<AppContext>,
    Query(req): Query<PublicQuestionsRequest>,
) -> Result<Json<PublicQuestionsResponse>, ApiError> {
    Ok(Json(ctx.engine.get_public_questions(req).await?))
}

/// GET /demo/:topic
pub async fn demo_interview(
    State(ctx): State<AppContext>,
    Path(topic): Path<String>,
) -> Result<Json<DemoResponse>, ApiError> {
    Ok(Json(ctx.engine.demo_interview(&topic).await?))
}

/// GET /demo - default topic
pub async fn demo_interview_default(
    State(ctx): State<AppContext>,
) -> Result<Json<DemoResponse>, ApiError> {
    Ok(Json(ctx.engine.demo_interview("").await?))
}

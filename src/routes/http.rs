//! HTTP endpoint handlers. These are thin wrappers that forward to the game service.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;

use axum::{
  extract::{rejection::JsonRejection, Path, State},
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::{QuestionRecord, Topic, TopicSelection};
use crate::error::{ApiError, ApiResult, SourceError};
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, source: state.source.kind(), sessions: state.session_count().await })
}

#[instrument(level = "info")]
pub async fn http_get_topics() -> impl IntoResponse {
  Json(TopicsOut { topics: Topic::ALL.iter().map(|t| t.name()).collect() })
}

/// Stateless "generate question": `{topics, level?, previousQuestions?}` -> question or `{error}`.
#[instrument(level = "info", skip(state, body))]
pub async fn http_post_question(
  State(state): State<Arc<AppState>>,
  body: Result<Json<QuestionIn>, JsonRejection>,
) -> ApiResult<Json<QuestionRecord>> {
  let Json(body) = body.map_err(|e| ApiError::Validation(e.body_text()))?;
  let topics = TopicSelection::parse(&body.topics)?;
  if topics.is_empty() {
    return Err(SourceError::NoTopics.into());
  }
  let level = body.level.unwrap_or(1);
  let q = state.fetch_question(&topics, level, &body.previous_questions).await?;
  info!(target: "question", topics = %topics.joined(), level, source = state.source.kind(), "HTTP question served");
  Ok(Json(q))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_session(
  State(state): State<Arc<AppState>>,
  body: Result<Json<StartIn>, JsonRejection>,
) -> ApiResult<Json<SessionOut>> {
  let Json(body) = body.map_err(|e| ApiError::Validation(e.body_text()))?;
  let topics = TopicSelection::parse(&body.topics)?;
  let out = state.start_session(topics, &body.progress).await?;
  info!(target: "session", id = %out.id, phase = %out.phase, "HTTP session started");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
) -> ApiResult<Json<SessionOut>> {
  Ok(Json(state.snapshot(id).await?))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_answer(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
  body: Result<Json<AnswerIn>, JsonRejection>,
) -> ApiResult<Json<SessionOut>> {
  let Json(body) = body.map_err(|e| ApiError::Validation(e.body_text()))?;
  let out = state.answer(id, &body.option).await?;
  let correct = out.outcome.as_ref().map(|o| o.correct).unwrap_or(false);
  info!(target: "session", %id, %correct, level = out.level, lives = out.lives, "HTTP answer evaluated");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_next(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
) -> ApiResult<Json<SessionOut>> {
  Ok(Json(state.next(id).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_hint(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
) -> ApiResult<Json<HintOut>> {
  let (removed, session) = state.hint(id).await?;
  info!(target: "session", %id, tokens = session.tokens, "HTTP hint used");
  Ok(Json(HintOut { removed, session }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_restart(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
) -> ApiResult<Json<SessionOut>> {
  Ok(Json(state.restart(id).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_retry(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
) -> ApiResult<Json<SessionOut>> {
  Ok(Json(state.retry(id).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
) -> ApiResult<Json<SessionOut>> {
  Ok(Json(state.quit(id).await?))
}

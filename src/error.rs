//! Error types shared by the question sources, the session machine and the HTTP layer.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::domain::UnknownTopic;
use crate::game::Phase;

/// Failure of a single question request. Only the message is shown to players.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
  #[error("No topics selected")]
  NoTopics,

  #[error("No questions available for: {0}")]
  EmptyBank(String),

  #[error("{0}")]
  Upstream(String),

  #[error("Invalid JSON format returned from AI: {0}")]
  InvalidJson(String),

  #[error("Invalid question: {0}")]
  InvalidQuestion(String),

  #[error("Question request timed out after {0}s")]
  Timeout(u64),
}

/// A transition the session machine refused. State is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
  #[error("No topics selected")]
  NoTopics,

  #[error("Cannot {action} while {phase}")]
  InvalidTransition { action: &'static str, phase: Phase },

  #[error("Question already answered")]
  AlreadyAnswered,

  #[error("Not an option for this question: {0}")]
  UnknownOption(String),

  #[error("Hint unavailable: {0}")]
  HintUnavailable(&'static str),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Errors surfaced by HTTP and WebSocket handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
  #[error("{0}")]
  Validation(String),

  #[error("Session not found: {0}")]
  NotFound(String),

  #[error(transparent)]
  Source(#[from] SourceError),

  #[error(transparent)]
  Game(#[from] GameError),
}

impl From<UnknownTopic> for ApiError {
  fn from(e: UnknownTopic) -> Self {
    ApiError::Validation(e.to_string())
  }
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::Validation(_) => StatusCode::BAD_REQUEST,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::Source(SourceError::NoTopics) => StatusCode::BAD_REQUEST,
      ApiError::Source(SourceError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
      ApiError::Source(_) => StatusCode::INTERNAL_SERVER_ERROR,
      ApiError::Game(GameError::NoTopics) => StatusCode::BAD_REQUEST,
      ApiError::Game(GameError::UnknownOption(_)) => StatusCode::BAD_REQUEST,
      ApiError::Game(_) => StatusCode::CONFLICT,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let body = Json(json!({ "error": self.to_string() }));
    (status, body).into_response()
  }
}

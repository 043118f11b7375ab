//! WebSocket upgrade + message loop. Each connection drives at most one session.
//! Client messages are parsed as JSON and answered with a single JSON message.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::domain::TopicSelection;
use crate::error::{ApiError, ApiResult};
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "codequest_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "codequest_backend", "WebSocket connected");
  let mut current: Option<Uuid> = None;

  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        // Parse, dispatch, serialize response.
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "codequest_backend", "WS received: {:?}", &incoming);
            match handle_client_ws(incoming, &state, &mut current).await {
              Ok(reply) => reply,
              Err(e) => ServerWsMessage::Error { message: e.to_string() },
            }
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "codequest_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }

  if let Some(id) = current.take() {
    if let Err(e) = state.quit(id).await {
      debug!(target: "session", %id, error = %e, "Quit on disconnect failed");
    }
  }
  info!(target: "codequest_backend", "WebSocket disconnected");
}

fn require(current: &Option<Uuid>) -> ApiResult<Uuid> {
  current.ok_or_else(|| ApiError::Validation("No active session; send `start` first".into()))
}

#[instrument(level = "info", skip(state, current))]
async fn handle_client_ws(
  msg: ClientWsMessage,
  state: &AppState,
  current: &mut Option<Uuid>,
) -> ApiResult<ServerWsMessage> {
  let session = match msg {
    ClientWsMessage::Ping => return Ok(ServerWsMessage::Pong),

    ClientWsMessage::Start { topics, progress } => {
      let topics = TopicSelection::parse(&topics)?;
      // A rejected start leaves the current session intact.
      if topics.is_empty() {
        return Err(crate::error::GameError::NoTopics.into());
      }
      if let Some(old) = current.take() {
        if let Err(e) = state.quit(old).await {
          debug!(target: "session", id = %old, error = %e, "Replaced session was already gone");
        }
      }
      let out = state.start_session(topics, &progress).await?;
      *current = Some(out.id);
      info!(target: "session", id = %out.id, "WS session started");
      out
    }

    ClientWsMessage::Answer { option } => state.answer(require(current)?, &option).await?,
    ClientWsMessage::Next => state.next(require(current)?).await?,
    ClientWsMessage::Restart => state.restart(require(current)?).await?,
    ClientWsMessage::Retry => state.retry(require(current)?).await?,

    ClientWsMessage::Hint => {
      let (removed, session) = state.hint(require(current)?).await?;
      return Ok(ServerWsMessage::Hint { removed, session });
    }

    ClientWsMessage::Quit => {
      let id = require(current)?;
      *current = None;
      state.quit(id).await?
    }
  };
  Ok(ServerWsMessage::Session { session })
}

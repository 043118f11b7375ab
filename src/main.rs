//! CodeQuest · Frontend Trivia Backend
//!
//! - Axum HTTP + WebSocket API
//! - Optional OpenAI question generation (via environment variables)
//! - Static frontend fallback (STATIC_DIR/index.html)
//!
//! Important env variables:
//!   PORT                  : u16 (default 3000)
//!   OPENAI_API_KEY        : enables generated questions if present
//!   OPENAI_BASE_URL       : default "https://api.openai.com/v1"
//!   OPENAI_MODEL          : default "gpt-3.5-turbo"
//!   QUESTION_TIMEOUT_SECS : per-question timeout (default 20)
//!   STATIC_DIR            : frontend directory (default "./static")
//!   AGENT_CONFIG_PATH     : path to TOML config (prompts, rules, question bank)
//!   LOG_LEVEL             : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT            : "pretty" (default) or "json"

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use codequest_backend::config::ServerSettings;
use codequest_backend::routes::build_router;
use codequest_backend::state::AppState;
use codequest_backend::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let settings = ServerSettings::from_env();

  // Shared application state (sessions, question source, prompts, rules).
  let state = Arc::new(AppState::new(&settings));

  // HTTP router with routes, CORS and tracing layers.
  let app = build_router(state, &settings.static_dir);

  let listener = TcpListener::bind(settings.addr).await?;
  info!(target: "codequest_backend", addr = %settings.addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "codequest_backend", error = %e, "Failed to listen for shutdown signal");
    return;
  }
  info!(target: "codequest_backend", "Shutdown signal received");
}

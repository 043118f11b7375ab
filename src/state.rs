//! Application state: live sessions, the question source, prompts and rules.
//!
//! This module owns:
//!   - the session table (id -> state machine)
//!   - the question source (static bank or OpenAI generator)
//!   - the prompts and game rules (from TOML or defaults)
//!
//! Question requests are fulfilled outside the session lock. The machine's
//! generation counter decides whether a result that comes back is still wanted.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::{load_agent_config_from_env, Prompts, ServerSettings};
use crate::domain::{QuestionRecord, Topic, TopicSelection};
use crate::error::{ApiError, ApiResult, GameError, SourceError};
use crate::game::{Delivery, GameRules, QuestionRequest, Session, SessionStore};
use crate::openai::OpenAI;
use crate::protocol::{to_out, SessionOut};
use crate::seeds::seed_questions;
use crate::source::{QuestionBank, QuestionSource};

/// Sessions untouched for this long are dropped when new ones are created.
const SESSION_IDLE_TTL: Duration = Duration::from_secs(60 * 60);

struct SessionEntry {
    session: Session,
    touched: Instant,
}

#[derive(Clone)]
pub struct AppState {
    sessions: Arc<RwLock<HashMap<Uuid, SessionEntry>>>,
    pub source: QuestionSource,
    pub prompts: Prompts,
    pub rules: GameRules,
    pub question_timeout: Duration,
}

impl AppState {
    /// Build state from env: load config, build the bank, init OpenAI.
    #[instrument(level = "info", skip_all)]
    pub fn new(settings: &ServerSettings) -> Self {
        let cfg = load_agent_config_from_env().unwrap_or_default();

        let bank = QuestionBank::new(
            seed_questions()
                .into_iter()
                .chain(cfg.questions.into_iter().map(|q| q.into_record())),
        );
        for topic in Topic::ALL {
            info!(target: "question", %topic, count = bank.count_for(topic), "Startup question inventory");
        }
        if bank.is_empty() {
            warn!(target: "question", "Question bank is empty; bank-served sessions will fail until questions are configured");
        }

        let source = match OpenAI::from_env(settings.question_timeout) {
            Some(oa) => {
                info!(target: "codequest_backend", base_url = %oa.base_url, model = %oa.model, "OpenAI enabled.");
                QuestionSource::Generated(oa)
            }
            None => {
                info!(target: "codequest_backend", "OpenAI disabled. Serving the local question bank.");
                QuestionSource::Bank(bank)
            }
        };

        Self::with_source(source, cfg.prompts, cfg.rules, settings.question_timeout)
    }

    pub fn with_source(
        source: QuestionSource,
        prompts: Prompts,
        rules: GameRules,
        question_timeout: Duration,
    ) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            source,
            prompts,
            rules: rules.sanitized(),
            question_timeout,
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Single question request with a timeout. No retry, no fallback.
    #[instrument(level = "info", skip(self, topics, previous_questions), fields(topics = %topics.joined()))]
    pub async fn fetch_question(
        &self,
        topics: &TopicSelection,
        level: u32,
        previous_questions: &[String],
    ) -> Result<QuestionRecord, SourceError> {
        let fut = self
            .source
            .request_question(&self.prompts, topics, level, previous_questions);
        match tokio::time::timeout(self.question_timeout, fut).await {
            Ok(res) => res,
            Err(_) => Err(SourceError::Timeout(self.question_timeout.as_secs())),
        }
    }

    // --- Session operations ---

    /// Create a session from client-held progress and start it.
    #[instrument(level = "info", skip(self, progress), fields(topics = %topics.joined()))]
    pub async fn start_session(
        &self,
        topics: TopicSelection,
        progress: &BTreeMap<String, String>,
    ) -> ApiResult<SessionOut> {
        let mut session = Session::new(self.rules.clone(), SessionStore::from_pairs(progress));
        let req = session.start(topics)?;
        let id = Uuid::new_v4();
        {
            let mut sessions = self.sessions.write().await;
            sessions.retain(|_, e| e.touched.elapsed() < SESSION_IDLE_TTL);
            sessions.insert(id, SessionEntry { session, touched: Instant::now() });
        }
        info!(target: "session", %id, "Session created");
        self.fulfil(id, req).await
    }

    pub async fn snapshot(&self, id: Uuid) -> ApiResult<SessionOut> {
        let sessions = self.sessions.read().await;
        let entry = sessions.get(&id).ok_or_else(|| ApiError::NotFound(id.to_string()))?;
        Ok(to_out(id, &entry.session))
    }

    #[instrument(level = "info", skip(self, option), fields(%id))]
    pub async fn answer(&self, id: Uuid, option: &str) -> ApiResult<SessionOut> {
        self.with_session(id, |s| s.select_option(option).map(|_| ())).await?;
        self.snapshot(id).await
    }

    #[instrument(level = "info", skip(self), fields(%id))]
    pub async fn next(&self, id: Uuid) -> ApiResult<SessionOut> {
        let req = self.with_session(id, Session::next).await?;
        self.fulfil(id, req).await
    }

    #[instrument(level = "info", skip(self), fields(%id))]
    pub async fn restart(&self, id: Uuid) -> ApiResult<SessionOut> {
        let req = self.with_session(id, Session::restart).await?;
        self.fulfil(id, req).await
    }

    #[instrument(level = "info", skip(self), fields(%id))]
    pub async fn retry(&self, id: Uuid) -> ApiResult<SessionOut> {
        let req = self.with_session(id, Session::retry).await?;
        self.fulfil(id, req).await
    }

    /// Spend a token. Returns the removed option alongside the new snapshot.
    #[instrument(level = "info", skip(self), fields(%id))]
    pub async fn hint(&self, id: Uuid) -> ApiResult<(String, SessionOut)> {
        let removed = self
            .with_session(id, |s| s.use_hint(&mut rand::thread_rng()))
            .await?;
        Ok((removed, self.snapshot(id).await?))
    }

    /// Abandon the session. The final snapshot carries the counters to keep.
    #[instrument(level = "info", skip(self), fields(%id))]
    pub async fn quit(&self, id: Uuid) -> ApiResult<SessionOut> {
        let mut entry = self
            .sessions
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| ApiError::NotFound(id.to_string()))?;
        entry.session.quit();
        info!(target: "session", %id, highest_level = entry.session.highest_level(), "Session quit");
        Ok(to_out(id, &entry.session))
    }

    // --- Internals ---

    async fn with_session<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Session) -> Result<T, GameError>,
    ) -> ApiResult<T> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(&id).ok_or_else(|| ApiError::NotFound(id.to_string()))?;
        entry.touched = Instant::now();
        match f(&mut entry.session) {
            Ok(v) => Ok(v),
            Err(e) => {
                debug!(target: "session", %id, error = %e, phase = %entry.session.phase(), "Transition rejected");
                Err(e.into())
            }
        }
    }

    /// Fetch the requested question without holding the lock, then deliver it.
    async fn fulfil(&self, id: Uuid, req: QuestionRequest) -> ApiResult<SessionOut> {
        let result = self
            .fetch_question(&req.topics, req.level, &req.previous_questions)
            .await;

        let mut sessions = self.sessions.write().await;
        let Some(entry) = sessions.get_mut(&id) else {
            debug!(target: "session", %id, "Session gone before question arrived");
            return Err(ApiError::NotFound(id.to_string()));
        };
        let delivery = match result {
            Ok(q) => entry.session.question_received(req.generation, q),
            Err(e) => {
                warn!(target: "question", %id, error = %e, "Question request failed");
                entry.session.question_failed(req.generation, &e)
            }
        };
        if delivery == Delivery::Discarded {
            debug!(target: "session", %id, generation = req.generation, "Late question result discarded");
        }
        Ok(to_out(id, &entry.session))
    }
}

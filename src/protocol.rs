//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::{AnswerOutcome, Phase, Session};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    Start {
        topics: Vec<String>,
        #[serde(default)]
        progress: BTreeMap<String, String>,
    },
    Answer {
        option: String,
    },
    Next,
    Hint,
    Restart,
    Retry,
    Quit,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Session {
        session: SessionOut,
    },
    Hint {
        removed: String,
        session: SessionOut,
    },
    Error {
        message: String,
    },
}

/// Question as shown to the player. The answer stays hidden until resolved.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOut {
    pub question: String,
    pub options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Session snapshot returned after every transition.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOut {
    pub id: Uuid,
    pub phase: Phase,
    pub active: bool,
    pub loading: bool,
    pub topics: Vec<String>,
    pub level: u32,
    pub question_index_in_level: u32,
    pub questions_per_level: u32,
    /// "questionIndexInLevel/questionsPerLevel"
    pub counter: String,
    pub lives: u32,
    pub tokens: u32,
    pub highest_level: u32,
    pub question: Option<QuestionOut>,
    pub selected_option: Option<String>,
    pub outcome: Option<AnswerOutcome>,
    pub error: Option<String>,
    /// Counters for the client to store and send back on the next start.
    pub progress: BTreeMap<String, String>,
}

/// Convert a live session to the public DTO.
pub fn to_out(id: Uuid, s: &Session) -> SessionOut {
    let revealed = matches!(s.phase(), Phase::Resolved | Phase::GameOver);
    SessionOut {
        id,
        phase: s.phase(),
        active: s.is_active(),
        loading: s.is_loading(),
        topics: s.topics().iter().map(|t| t.name().to_string()).collect(),
        level: s.level(),
        question_index_in_level: s.question_index(),
        questions_per_level: s.rules().questions_per_level,
        counter: s.progress_label(),
        lives: s.lives(),
        tokens: s.tokens(),
        highest_level: s.highest_level(),
        question: s.current().map(|q| QuestionOut {
            question: q.question.clone(),
            options: q.options.clone(),
            correct_answer: revealed.then(|| q.correct_answer.clone()),
            explanation: revealed.then(|| q.explanation.clone()),
        }),
        selected_option: s.selected().map(str::to_string),
        outcome: s.last_outcome().cloned(),
        error: s.last_error().map(str::to_string),
        progress: s.store().to_pairs(),
    }
}

//
// HTTP request/response DTOs
//

/// Body of the stateless "generate question" endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionIn {
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub level: Option<u32>,
    #[serde(default)]
    pub previous_questions: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct StartIn {
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub progress: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerIn {
    pub option: String,
}

#[derive(Debug, Serialize)]
pub struct HintOut {
    pub removed: String,
    pub session: SessionOut,
}

#[derive(Serialize)]
pub struct TopicsOut {
    pub topics: Vec<&'static str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthOut {
    pub ok: bool,
    pub source: &'static str,
    pub sessions: usize,
}

//! Minimal OpenAI client for question generation.
//!
//! We only call chat.completions and request a strict JSON object, which is then
//! schema-checked into a `QuestionRecord`. Calls are instrumented and log the
//! model, latency and token usage (not contents).
//!
//! NOTE: We never log the API key.

use std::time::{Duration, Instant};

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::config::Prompts;
use crate::domain::{QuestionRecord, TopicSelection};
use crate::error::SourceError;
use crate::util::{fill_template, quoted_list, trunc_for_log};

const TEMPERATURE: f32 = 0.9;
const MAX_TOKENS: u32 = 400;

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
  pub timeout: Duration,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env(timeout: Duration) -> Option<Self> {
    let Some(api_key) = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty()) else {
      info!(target: "codequest_backend", "OPENAI_API_KEY not set");
      return None;
    };
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-3.5-turbo".into());
    match Self::new(api_key, base_url, model, timeout) {
      Ok(oa) => Some(oa),
      Err(e) => {
        warn!(target: "codequest_backend", error = %e, "OPENAI_API_KEY is set but the HTTP client could not be built");
        None
      }
    }
  }

  pub fn new(
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
  ) -> Result<Self, reqwest::Error> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(Self { client, api_key, base_url: base_url.trim_end_matches('/').to_string(), model, timeout })
  }

  fn send_error(&self, e: reqwest::Error) -> SourceError {
    if e.is_timeout() {
      SourceError::Timeout(self.timeout.as_secs())
    } else {
      SourceError::Upstream(format!("OpenAI request failed: {}", e))
    }
  }

  /// JSON-object chat completion. Returns the raw message content.
  #[instrument(level = "info", skip(self, system, user), fields(model = %self.model))]
  async fn chat_json_content(&self, system: &str, user: &str) -> Result<String, SourceError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature: TEMPERATURE,
      response_format: Some(ResponseFormat { r#type: "json_object".into() }),
      max_tokens: Some(MAX_TOKENS),
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, "codequest-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await
      .map_err(|e| self.send_error(e))?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_openai_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      return Err(SourceError::Upstream(format!("OpenAI HTTP {}: {}", status, msg)));
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| {
      if e.is_timeout() { self.send_error(e) } else { SourceError::Upstream(format!("Malformed OpenAI response: {}", e)) }
    })?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    Ok(body.choices.into_iter().next()
      .and_then(|c| c.message.content)
      .unwrap_or_default())
  }

  /// Generate one question for the given topics and level.
  #[instrument(
    level = "info",
    skip(self, prompts, topics, previous_questions),
    fields(topics = %topics.joined(), previous = previous_questions.len())
  )]
  pub async fn generate_question(
    &self,
    prompts: &Prompts,
    topics: &TopicSelection,
    level: u32,
    previous_questions: &[String],
  ) -> Result<QuestionRecord, SourceError> {
    if topics.is_empty() {
      return Err(SourceError::NoTopics);
    }
    let user = build_question_prompt(prompts, topics, level, previous_questions);
    let start = Instant::now();
    let result = self.chat_json_content(&prompts.question_system, &user).await;
    let elapsed = start.elapsed();

    let content = match result {
      Ok(c) => c,
      Err(e) => {
        error!(?elapsed, error = %e, "Model call failed during question generation");
        return Err(e);
      }
    };

    let record = parse_question_content(&content)?;
    info!(
      ?elapsed,
      question_preview = %record.question.chars().take(40).collect::<String>(),
      options = record.options.len(),
      "Question successfully generated"
    );
    Ok(record)
  }
}

/// Fill the user prompt. Levels below 1 are treated as level 1.
pub fn build_question_prompt(
  prompts: &Prompts,
  topics: &TopicSelection,
  level: u32,
  previous_questions: &[String],
) -> String {
  let level = level.max(1);
  let level_str = level.to_string();
  fill_template(
    &prompts.question_user_template,
    &[
      ("level", &level_str),
      ("topics", &topics.joined()),
      ("level_description", prompts.level_description(level)),
      ("previous_questions", &quoted_list(previous_questions)),
    ],
  )
}

/// Parse and schema-check the model's message content.
pub fn parse_question_content(content: &str) -> Result<QuestionRecord, SourceError> {
  let trimmed = strip_code_fence(content.trim());
  let record: QuestionRecord = serde_json::from_str(trimmed)
    .map_err(|e| SourceError::InvalidJson(e.to_string()))?;
  record.validate()?;
  Ok(record)
}

// Models sometimes wrap JSON in ```json fences even in JSON mode.
fn strip_code_fence(s: &str) -> &str {
  let Some(rest) = s.strip_prefix("```") else { return s };
  let rest = rest.strip_prefix("json").unwrap_or(rest);
  rest.strip_suffix("```").unwrap_or(rest).trim()
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::Topic;

  #[test]
  fn prompt_carries_level_topics_and_history() {
    let topics: TopicSelection = [Topic::React, Topic::Css].into_iter().collect();
    let prompt = build_question_prompt(&Prompts::default(), &topics, 3, &["What is JSX?".into()]);
    assert!(prompt.contains("Level 3 developer"));
    assert!(prompt.contains("CSS, React"));
    assert!(prompt.contains("Intermediate coding tasks"));
    assert!(prompt.contains("\"What is JSX?\""));
  }

  #[test]
  fn level_zero_prompts_as_level_one() {
    let topics: TopicSelection = [Topic::Html].into_iter().collect();
    let prompt = build_question_prompt(&Prompts::default(), &topics, 0, &[]);
    assert!(prompt.contains("Level 1 developer"));
    assert!(prompt.contains("(none)"));
  }

  #[test]
  fn parses_well_formed_content() {
    let raw = r#"```json
{"question":"Default display of <div>?","options":["block","inline","flex","grid"],"correctAnswer":"block","explanation":"Divs are block-level."}
```"#;
    let q = parse_question_content(raw).unwrap();
    assert_eq!(q.correct_answer, "block");
    assert_eq!(q.options.len(), 4);
  }

  #[test]
  fn rejects_broken_or_inconsistent_content() {
    assert!(matches!(parse_question_content("not json"), Err(SourceError::InvalidJson(_))));
    assert!(matches!(
      parse_question_content(r#"{"question":"q","options":["a","b"],"explanation":"e"}"#),
      Err(SourceError::InvalidJson(_))
    ));
    assert!(matches!(
      parse_question_content(r#"{"question":"q","options":["a","b"],"correctAnswer":"c","explanation":"e"}"#),
      Err(SourceError::InvalidQuestion(_))
    ));
  }

  #[test]
  fn client_keeps_its_timeout_and_trims_base_url() {
    let oa = OpenAI::new("sk-test".into(), "http://localhost:8080/v1/".into(), "m".into(), Duration::from_secs(7))
      .unwrap();
    assert_eq!(oa.base_url, "http://localhost:8080/v1");
    assert_eq!(oa.timeout, Duration::from_secs(7));
  }

  #[test]
  fn extracts_upstream_error_message() {
    let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
    assert_eq!(extract_openai_error(body).as_deref(), Some("Incorrect API key provided"));
    assert_eq!(extract_openai_error("<html>"), None);
  }
}

//! Configuration: server settings from the environment, plus the agent config
//! (prompts, game rules, extra question bank) loaded from TOML.
//!
//! See `AgentConfig` and `Prompts` for the expected TOML schema.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::domain::{QuestionRecord, Topic};
use crate::game::GameRules;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_QUESTION_TIMEOUT_SECS: u64 = 20;

/// Process-level settings read from env variables.
#[derive(Clone, Debug)]
pub struct ServerSettings {
  pub addr: SocketAddr,
  pub question_timeout: Duration,
  pub static_dir: String,
}

impl Default for ServerSettings {
  fn default() -> Self {
    Self {
      addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
      question_timeout: Duration::from_secs(DEFAULT_QUESTION_TIMEOUT_SECS),
      static_dir: "./static".into(),
    }
  }
}

impl ServerSettings {
  pub fn from_env() -> Self {
    let defaults = Self::default();
    let addr = std::env::var("PORT")
      .ok()
      .and_then(|p| p.parse::<u16>().ok())
      .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
      .unwrap_or(defaults.addr);
    let question_timeout = std::env::var("QUESTION_TIMEOUT_SECS")
      .ok()
      .and_then(|s| s.parse::<u64>().ok())
      .filter(|s| *s > 0)
      .map(Duration::from_secs)
      .unwrap_or(defaults.question_timeout);
    let static_dir = std::env::var("STATIC_DIR").unwrap_or(defaults.static_dir);
    Self { addr, question_timeout, static_dir }
  }
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub rules: GameRules,
  #[serde(default)]
  pub questions: Vec<QuestionCfg>,
}

/// Question bank entry accepted in TOML configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct QuestionCfg {
  pub topic: Topic,
  pub question: String,
  pub options: Vec<String>,
  #[serde(alias = "correctAnswer")]
  pub correct_answer: String,
  #[serde(default)]
  pub explanation: String,
}

impl QuestionCfg {
  pub fn into_record(self) -> (Topic, QuestionRecord) {
    let record = QuestionRecord {
      question: self.question,
      options: self.options,
      correct_answer: self.correct_answer,
      explanation: self.explanation,
    };
    (self.topic, record)
  }
}

/// Prompts used by the question generator. Placeholders:
/// `{level}`, `{topics}`, `{level_description}`, `{previous_questions}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub question_system: String,
  pub question_user_template: String,
  /// Difficulty blurb per level. Levels past the last entry reuse the last one.
  pub level_descriptions: BTreeMap<u32, String>,
}

impl Default for Prompts {
  fn default() -> Self {
    let level_descriptions = [
      (1, "Basic syntax and easy-to-remember concepts."),
      (2, "Common real-world coding tasks."),
      (3, "Intermediate coding tasks that require problem-solving skills."),
      (4, "Advanced coding tasks, applying core concepts."),
      (5, "Optimizations, edge cases, and debugging."),
      (6, "High-level JavaScript and React concepts, optimizations."),
      (7, "Expert-level questions focused on performance, security, or design patterns."),
      (8, "Advanced JavaScript and React internals, deep browser APIs."),
      (9, "Cutting-edge JavaScript/React techniques, extremely challenging questions."),
      (10, "Mastery-level questions covering browser internals, deep optimization, and best practices."),
    ]
    .into_iter()
    .map(|(k, v)| (k, v.to_string()))
    .collect();

    Self {
      question_system: "You write multiple-choice frontend development quiz questions. Respond ONLY with strict JSON.".into(),
      question_user_template: r#"Generate a NEW multiple-choice frontend coding question for a Level {level} developer.
Choose one of the following topics from the user's selection: {topics}.

Difficulty for Level {level}: {level_description}

Rules:
- The question must be completely different from: {previous_questions}
- The question must have exactly 4 answer choices, with 1 correct answer.
- The correctAnswer must be copied verbatim from options.
- Return JSON structured as:
{"question": "What is the default flex-direction in CSS Flexbox?", "options": ["row", "column", "row-reverse", "column-reverse"], "correctAnswer": "row", "explanation": "By default, Flexbox arranges elements in a row."}

Ensure uniqueness, variety, and logical progression of difficulty. No duplicates."#
        .into(),
      level_descriptions,
    }
  }
}

impl Prompts {
  /// Description for `level`, clamped into the configured range.
  pub fn level_description(&self, level: u32) -> &str {
    let level = level.max(1);
    self
      .level_descriptions
      .range(..=level)
      .next_back()
      .or_else(|| self.level_descriptions.iter().next())
      .map(|(_, d)| d.as_str())
      .unwrap_or("")
  }
}

/// Attempt to load `AgentConfig` from AGENT_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("AGENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_agent_config(&s) {
      Ok(cfg) => {
        info!(target: "codequest_backend", %path, questions = cfg.questions.len(), "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "codequest_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "codequest_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

pub fn parse_agent_config(s: &str) -> Result<AgentConfig, toml::de::Error> {
  let mut cfg = toml::from_str::<AgentConfig>(s)?;
  if cfg.prompts.level_descriptions.is_empty() {
    warn!(target: "codequest_backend", "No level descriptions configured; using defaults");
    cfg.prompts.level_descriptions = Prompts::default().level_descriptions;
  }
  cfg.rules = cfg.rules.sanitized();
  Ok(cfg)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_config_uses_defaults() {
    let cfg = parse_agent_config("").unwrap();
    assert_eq!(cfg.rules, GameRules::default());
    assert!(cfg.questions.is_empty());
    assert_eq!(cfg.prompts.level_descriptions.len(), 10);
  }

  #[test]
  fn parses_rules_and_question_bank() {
    let raw = r#"
[rules]
questions_per_level = 5
starting_lives = 0

[[questions]]
topic = "CSS"
question = "Which property sets text color?"
options = ["color", "font-color", "text-color"]
correctAnswer = "color"
"#;
    let cfg = parse_agent_config(raw).unwrap();
    assert_eq!(cfg.rules.questions_per_level, 5);
    assert_eq!(cfg.rules.starting_lives, 1);
    assert_eq!(cfg.rules.bonus_life_every, 3);

    let (topic, record) = cfg.questions[0].clone().into_record();
    assert_eq!(topic, Topic::Css);
    assert_eq!(record.correct_answer, "color");
    assert!(record.validate().is_ok());
  }

  #[test]
  fn level_descriptions_clamp_to_known_range() {
    let p = Prompts::default();
    assert_eq!(p.level_description(0), p.level_description(1));
    assert!(p.level_description(2).starts_with("Common real-world"));
    assert!(p.level_description(42).starts_with("Mastery-level"));
  }
}

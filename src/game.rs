//! Session state machine: level/lives/tokens progression for one player.
//!
//! The machine never talks to a question source itself. Transitions that need a
//! question hand back a `QuestionRequest`; the caller fulfils it and reports the
//! outcome with `question_received` / `question_failed`. Every request carries a
//! generation number, and results for anything other than the pending generation
//! are discarded (e.g. a reply that lands after the player quit).
//!
//! Wrong answers that still leave a life reset the in-level counter to 1, so a
//! level is only cleared by `questions_per_level` consecutive correct answers.

use std::collections::BTreeMap;
use std::fmt;

use rand::seq::IteratorRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{QuestionRecord, TopicSelection, MIN_OPTIONS};
use crate::error::{GameError, SourceError};

pub const QUESTIONS_PER_LEVEL: u32 = 3;
pub const STARTING_LIVES: u32 = 1;
pub const BONUS_LIFE_EVERY: u32 = 3;
pub const TOKENS_PER_LEVEL: u32 = 1;

/// Tunable progression numbers. Loaded from the `[rules]` table of the agent config.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameRules {
  pub questions_per_level: u32,
  pub starting_lives: u32,
  /// A life is granted on reaching a level divisible by this. 0 disables.
  pub bonus_life_every: u32,
  pub tokens_per_level: u32,
}

impl Default for GameRules {
  fn default() -> Self {
    Self {
      questions_per_level: QUESTIONS_PER_LEVEL,
      starting_lives: STARTING_LIVES,
      bonus_life_every: BONUS_LIFE_EVERY,
      tokens_per_level: TOKENS_PER_LEVEL,
    }
  }
}

impl GameRules {
  /// Clamp values that would make the machine misbehave.
  pub fn sanitized(mut self) -> Self {
    self.questions_per_level = self.questions_per_level.max(1);
    self.starting_lives = self.starting_lives.max(1);
    self
  }
}

/// Counters that outlive a session. Round-tripped by the client as decimal strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStore {
  pub level: u32,
  pub highest_level: u32,
  pub tokens: u32,
}

pub const KEY_LEVEL: &str = "level";
pub const KEY_HIGHEST_LEVEL: &str = "highestLevel";
pub const KEY_TOKENS: &str = "tokens";

impl Default for SessionStore {
  fn default() -> Self {
    Self { level: 1, highest_level: 0, tokens: 0 }
  }
}

impl SessionStore {
  /// Read counters from key/value pairs. Missing or garbled values keep their default.
  pub fn from_pairs(pairs: &BTreeMap<String, String>) -> Self {
    let defaults = Self::default();
    let read = |key: &str, fallback: u32| {
      pairs
        .get(key)
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(fallback)
    };
    let level = read(KEY_LEVEL, defaults.level).max(1);
    let highest_level = read(KEY_HIGHEST_LEVEL, defaults.highest_level).max(level);
    let tokens = read(KEY_TOKENS, defaults.tokens);
    Self { level, highest_level, tokens }
  }

  pub fn to_pairs(&self) -> BTreeMap<String, String> {
    BTreeMap::from([
      (KEY_LEVEL.to_string(), self.level.to_string()),
      (KEY_HIGHEST_LEVEL.to_string(), self.highest_level.to_string()),
      (KEY_TOKENS.to_string(), self.tokens.to_string()),
    ])
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  Idle,
  AwaitingQuestion,
  AwaitingAnswer,
  Resolved,
  GameOver,
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Phase::Idle => "idle",
      Phase::AwaitingQuestion => "awaiting_question",
      Phase::AwaitingAnswer => "awaiting_answer",
      Phase::Resolved => "resolved",
      Phase::GameOver => "game_over",
    })
  }
}

/// What the caller must fetch next.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuestionRequest {
  pub generation: u64,
  pub topics: TopicSelection,
  pub level: u32,
  pub previous_questions: Vec<String>,
}

/// Whether a delivered result was applied or dropped as stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
  Accepted,
  Discarded,
}

/// Result of answering a question.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOutcome {
  pub correct: bool,
  pub selected: String,
  pub correct_answer: String,
  pub explanation: String,
  pub level_up: bool,
  pub life_gained: bool,
  pub life_lost: bool,
  pub game_over: bool,
}

#[derive(Clone, Debug)]
pub struct Session {
  rules: GameRules,
  phase: Phase,
  topics: TopicSelection,
  level: u32,
  question_index: u32,
  lives: u32,
  tokens: u32,
  highest_level: u32,
  current: Option<QuestionRecord>,
  selected: Option<String>,
  previous_questions: Vec<String>,
  generation: u64,
  pending: Option<u64>,
  last_error: Option<String>,
  last_outcome: Option<AnswerOutcome>,
}

impl Session {
  /// New idle session seeded from persisted counters.
  pub fn new(rules: GameRules, store: SessionStore) -> Self {
    let rules = rules.sanitized();
    let level = store.level.max(1);
    Self {
      rules,
      phase: Phase::Idle,
      topics: TopicSelection::new(),
      level,
      question_index: 1,
      lives: 0,
      tokens: store.tokens,
      highest_level: store.highest_level.max(level),
      current: None,
      selected: None,
      previous_questions: Vec::new(),
      generation: 0,
      pending: None,
      last_error: None,
      last_outcome: None,
    }
  }

  // --- Accessors ---

  pub fn phase(&self) -> Phase { self.phase }
  pub fn rules(&self) -> &GameRules { &self.rules }
  pub fn topics(&self) -> &TopicSelection { &self.topics }
  pub fn level(&self) -> u32 { self.level }
  pub fn question_index(&self) -> u32 { self.question_index }
  pub fn lives(&self) -> u32 { self.lives }
  pub fn tokens(&self) -> u32 { self.tokens }
  pub fn highest_level(&self) -> u32 { self.highest_level }
  pub fn current(&self) -> Option<&QuestionRecord> { self.current.as_ref() }
  pub fn selected(&self) -> Option<&str> { self.selected.as_deref() }
  pub fn previous_questions(&self) -> &[String] { &self.previous_questions }
  pub fn last_error(&self) -> Option<&str> { self.last_error.as_deref() }
  pub fn last_outcome(&self) -> Option<&AnswerOutcome> { self.last_outcome.as_ref() }

  pub fn is_active(&self) -> bool {
    self.phase != Phase::Idle
  }

  /// True while a question request is out and unanswered.
  pub fn is_loading(&self) -> bool {
    self.pending.is_some()
  }

  /// "2/3" style counter for display.
  pub fn progress_label(&self) -> String {
    format!("{}/{}", self.question_index, self.rules.questions_per_level)
  }

  /// Snapshot of the counters to persist after a transition.
  pub fn store(&self) -> SessionStore {
    SessionStore {
      level: self.level,
      highest_level: self.highest_level,
      tokens: self.tokens,
    }
  }

  // --- Transitions ---

  /// Idle -> AwaitingQuestion. Requires at least one topic.
  pub fn start(&mut self, topics: TopicSelection) -> Result<QuestionRequest, GameError> {
    if self.phase != Phase::Idle {
      return Err(self.reject("start"));
    }
    if topics.is_empty() {
      return Err(GameError::NoTopics);
    }
    self.topics = topics;
    self.reset_run();
    info!(target: "session", topics = %self.topics.joined(), "Session started");
    Ok(self.issue_request())
  }

  /// GameOver -> AwaitingQuestion with the same topics.
  pub fn restart(&mut self) -> Result<QuestionRequest, GameError> {
    if self.phase != Phase::GameOver {
      return Err(self.reject("restart"));
    }
    self.reset_run();
    info!(target: "session", topics = %self.topics.joined(), highest_level = self.highest_level, "Session restarted");
    Ok(self.issue_request())
  }

  /// Apply a fetched question if it belongs to the pending request.
  pub fn question_received(&mut self, generation: u64, question: QuestionRecord) -> Delivery {
    if !self.is_pending(generation) {
      debug!(target: "session", generation, pending = ?self.pending, phase = %self.phase, "Discarding stale question");
      return Delivery::Discarded;
    }
    if let Err(e) = question.validate() {
      return self.question_failed(generation, &e);
    }
    self.pending = None;
    self.last_error = None;
    self.last_outcome = None;
    self.selected = None;
    self.previous_questions.push(question.question.clone());
    self.current = Some(question);
    self.phase = Phase::AwaitingAnswer;
    Delivery::Accepted
  }

  /// Record a failed request. The session stays in AwaitingQuestion until `retry`.
  pub fn question_failed(&mut self, generation: u64, error: &SourceError) -> Delivery {
    if !self.is_pending(generation) {
      debug!(target: "session", generation, "Discarding stale failure");
      return Delivery::Discarded;
    }
    self.pending = None;
    self.last_error = Some(error.to_string());
    Delivery::Accepted
  }

  /// Re-issue the question request after a failure.
  pub fn retry(&mut self) -> Result<QuestionRequest, GameError> {
    if self.phase != Phase::AwaitingQuestion || self.pending.is_some() {
      return Err(self.reject("retry"));
    }
    Ok(self.issue_request())
  }

  /// AwaitingAnswer -> Resolved | GameOver. Only the first selection counts.
  pub fn select_option(&mut self, option: &str) -> Result<AnswerOutcome, GameError> {
    match self.phase {
      Phase::AwaitingAnswer => {}
      Phase::Resolved => return Err(GameError::AlreadyAnswered),
      _ => return Err(self.reject("answer")),
    }
    let Some(question) = self.current.as_ref() else {
      return Err(self.reject("answer"));
    };
    if !question.options.iter().any(|o| o == option) {
      return Err(GameError::UnknownOption(option.to_string()));
    }

    let correct = question.is_correct(option);
    let mut outcome = AnswerOutcome {
      correct,
      selected: option.to_string(),
      correct_answer: question.correct_answer.clone(),
      explanation: question.explanation.clone(),
      level_up: false,
      life_gained: false,
      life_lost: false,
      game_over: false,
    };
    self.selected = Some(option.to_string());

    if correct {
      if self.question_index >= self.rules.questions_per_level {
        self.level += 1;
        self.question_index = 1;
        self.tokens += self.rules.tokens_per_level;
        outcome.level_up = true;
        let every = self.rules.bonus_life_every;
        if every > 0 && self.level % every == 0 {
          self.lives += 1;
          outcome.life_gained = true;
        }
        info!(target: "session", level = self.level, lives = self.lives, tokens = self.tokens, "Level up");
      } else {
        self.question_index += 1;
      }
      self.highest_level = self.highest_level.max(self.level);
      self.phase = Phase::Resolved;
    } else if self.lives > 1 {
      self.lives -= 1;
      self.question_index = 1;
      outcome.life_lost = true;
      self.phase = Phase::Resolved;
    } else {
      self.lives = 0;
      outcome.life_lost = true;
      outcome.game_over = true;
      self.phase = Phase::GameOver;
      info!(target: "session", level = self.level, highest_level = self.highest_level, "Game over");
    }

    self.last_outcome = Some(outcome.clone());
    Ok(outcome)
  }

  /// Resolved -> AwaitingQuestion.
  pub fn next(&mut self) -> Result<QuestionRequest, GameError> {
    if self.phase != Phase::Resolved || self.lives == 0 {
      return Err(self.reject("next"));
    }
    Ok(self.issue_request())
  }

  /// Spend a token to drop one wrong option. Returns the removed option.
  pub fn use_hint<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<String, GameError> {
    if self.phase != Phase::AwaitingAnswer {
      return Err(self.reject("use a hint"));
    }
    if self.tokens == 0 {
      return Err(GameError::HintUnavailable("no tokens left"));
    }
    let phase = self.phase;
    let Some(question) = self.current.as_mut() else {
      return Err(GameError::InvalidTransition { action: "use a hint", phase });
    };
    if question.options.len() <= MIN_OPTIONS {
      return Err(GameError::HintUnavailable("only two options left"));
    }
    let picked = question.incorrect_options().choose(rng).map(str::to_string);
    let Some(removed) = picked else {
      return Err(GameError::HintUnavailable("no wrong options to remove"));
    };
    if let Some(idx) = question.options.iter().position(|o| *o == removed) {
      question.options.remove(idx);
    }
    self.tokens -= 1;
    debug!(target: "session", %removed, tokens = self.tokens, "Hint used");
    Ok(removed)
  }

  /// Any state -> Idle. Persisted counters are left as they are.
  pub fn quit(&mut self) {
    self.phase = Phase::Idle;
    self.pending = None;
    self.current = None;
    self.selected = None;
    self.last_error = None;
    self.last_outcome = None;
    self.previous_questions.clear();
    self.lives = 0;
  }

  // --- Internals ---

  fn reset_run(&mut self) {
    self.level = 1;
    self.question_index = 1;
    self.lives = self.rules.starting_lives;
    self.tokens = 0;
    self.highest_level = self.highest_level.max(self.level);
    self.previous_questions.clear();
    self.current = None;
    self.selected = None;
    self.last_error = None;
    self.last_outcome = None;
  }

  fn issue_request(&mut self) -> QuestionRequest {
    self.generation += 1;
    self.pending = Some(self.generation);
    self.phase = Phase::AwaitingQuestion;
    self.last_error = None;
    QuestionRequest {
      generation: self.generation,
      topics: self.topics.clone(),
      level: self.level,
      previous_questions: self.previous_questions.clone(),
    }
  }

  fn is_pending(&self, generation: u64) -> bool {
    self.phase == Phase::AwaitingQuestion && self.pending == Some(generation)
  }

  fn reject(&self, action: &'static str) -> GameError {
    GameError::InvalidTransition { action, phase: self.phase }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::Topic;
  use rand::rngs::StdRng;
  use rand::SeedableRng;

  fn topics(ts: &[Topic]) -> TopicSelection {
    ts.iter().copied().collect()
  }

  fn question(n: usize) -> QuestionRecord {
    QuestionRecord {
      question: format!("Question #{n}?"),
      options: vec!["right".into(), "wrong a".into(), "wrong b".into(), "wrong c".into()],
      correct_answer: "right".into(),
      explanation: "Because.".into(),
    }
  }

  fn started() -> (Session, QuestionRequest) {
    let mut s = Session::new(GameRules::default(), SessionStore::default());
    let req = s.start(topics(&[Topic::Html])).unwrap();
    (s, req)
  }

  fn deliver(s: &mut Session, req: &QuestionRequest, n: usize) {
    assert_eq!(s.question_received(req.generation, question(n)), Delivery::Accepted);
  }

  fn answer_correct_n(s: &mut Session, first: QuestionRequest, n: usize) -> QuestionRequest {
    let mut req = first;
    for i in 0..n {
      deliver(s, &req, i);
      s.select_option("right").unwrap();
      req = s.next().unwrap();
    }
    req
  }

  #[test]
  fn start_resets_counters_and_requests_a_question() {
    let store = SessionStore { level: 4, highest_level: 7, tokens: 2 };
    let mut s = Session::new(GameRules::default(), store);
    let req = s.start(topics(&[Topic::Css, Topic::React])).unwrap();

    assert_eq!(s.phase(), Phase::AwaitingQuestion);
    assert_eq!((s.level(), s.question_index(), s.lives(), s.tokens()), (1, 1, 1, 0));
    assert_eq!(s.highest_level(), 7);
    assert!(s.is_loading());
    assert_eq!(req.level, 1);
    assert!(req.previous_questions.is_empty());
    assert_eq!(req.topics.len(), 2);
  }

  #[test]
  fn start_without_topics_is_rejected_without_mutation() {
    let mut s = Session::new(GameRules::default(), SessionStore::default());
    assert_eq!(s.start(TopicSelection::new()), Err(GameError::NoTopics));
    assert_eq!(s.phase(), Phase::Idle);
    assert!(!s.is_loading());
  }

  #[test]
  fn received_question_is_tracked_in_history() {
    let (mut s, req) = started();
    deliver(&mut s, &req, 1);
    assert_eq!(s.phase(), Phase::AwaitingAnswer);
    assert_eq!(s.previous_questions(), &["Question #1?".to_string()]);
    assert_eq!(s.selected(), None);
  }

  #[test]
  fn correct_answer_advances_counter_within_level() {
    let (mut s, req) = started();
    deliver(&mut s, &req, 1);
    let out = s.select_option("right").unwrap();
    assert!(out.correct && !out.level_up);
    assert_eq!(s.question_index(), 2);
    assert_eq!(s.level(), 1);
    assert_eq!(s.progress_label(), "2/3");
  }

  #[test]
  fn third_correct_answer_levels_up() {
    let (mut s, req) = started();
    let req = answer_correct_n(&mut s, req, 2);
    assert_eq!(s.question_index(), 3);
    deliver(&mut s, &req, 3);
    let out = s.select_option("right").unwrap();

    assert!(out.level_up);
    assert_eq!(s.level(), 2);
    assert_eq!(s.question_index(), 1);
    assert_eq!(s.tokens(), 1);
    assert!(s.highest_level() >= 2);
    assert_eq!(s.next().unwrap().level, 2);
  }

  #[test]
  fn reaching_every_third_level_grants_a_life() {
    let (mut s, req) = started();
    let req = answer_correct_n(&mut s, req, 5);
    assert_eq!((s.level(), s.lives()), (2, 1));
    deliver(&mut s, &req, 6);
    let out = s.select_option("right").unwrap();
    assert!(out.level_up && out.life_gained);
    assert_eq!((s.level(), s.lives(), s.tokens()), (3, 2, 2));
  }

  #[test]
  fn wrong_answer_on_last_life_ends_the_game() {
    let (mut s, req) = started();
    deliver(&mut s, &req, 1);
    let out = s.select_option("wrong a").unwrap();

    assert!(out.game_over && !out.correct);
    assert_eq!(s.phase(), Phase::GameOver);
    assert_eq!(s.lives(), 0);
    assert!(matches!(s.next(), Err(GameError::InvalidTransition { .. })));
    assert!(matches!(s.select_option("right"), Err(GameError::InvalidTransition { .. })));
    assert_eq!(s.lives(), 0);

    let req = s.restart().unwrap();
    assert_eq!(s.phase(), Phase::AwaitingQuestion);
    assert_eq!((s.level(), s.lives()), (1, 1));
    assert_eq!(req.topics, topics(&[Topic::Html]));
  }

  #[test]
  fn wrong_answer_with_spare_life_resets_level_counter() {
    let rules = GameRules { starting_lives: 2, ..GameRules::default() };
    let mut s = Session::new(rules, SessionStore::default());
    let req = s.start(topics(&[Topic::JavaScript])).unwrap();
    let req = answer_correct_n(&mut s, req, 2);
    deliver(&mut s, &req, 9);
    let out = s.select_option("wrong b").unwrap();

    assert!(out.life_lost && !out.game_over);
    assert_eq!(s.phase(), Phase::Resolved);
    assert_eq!((s.level(), s.question_index(), s.lives()), (1, 1, 1));
    assert!(s.next().is_ok());
  }

  #[test]
  fn second_selection_has_no_effect() {
    let (mut s, req) = started();
    deliver(&mut s, &req, 1);
    s.select_option("right").unwrap();
    let before = (s.level(), s.question_index(), s.lives(), s.tokens());
    assert_eq!(s.select_option("right"), Err(GameError::AlreadyAnswered));
    assert_eq!(s.select_option("wrong a"), Err(GameError::AlreadyAnswered));
    assert_eq!(before, (s.level(), s.question_index(), s.lives(), s.tokens()));
    assert_eq!(s.selected(), Some("right"));
  }

  #[test]
  fn unknown_option_is_rejected() {
    let (mut s, req) = started();
    deliver(&mut s, &req, 1);
    assert!(matches!(s.select_option("nope"), Err(GameError::UnknownOption(_))));
    assert_eq!(s.phase(), Phase::AwaitingAnswer);
  }

  #[test]
  fn failure_keeps_session_waiting_until_retry() {
    let (mut s, req) = started();
    assert_eq!(s.question_failed(req.generation, &SourceError::Upstream("boom".into())), Delivery::Accepted);
    assert_eq!(s.phase(), Phase::AwaitingQuestion);
    assert_eq!(s.last_error(), Some("boom"));
    assert!(!s.is_loading());

    let again = s.retry().unwrap();
    assert!(again.generation > req.generation);
    assert_eq!(s.last_error(), None);
    assert!(matches!(s.retry(), Err(GameError::InvalidTransition { .. })));

    // the old generation can no longer land
    assert_eq!(s.question_received(req.generation, question(1)), Delivery::Discarded);
    deliver(&mut s, &again, 1);
  }

  #[test]
  fn late_result_after_quit_is_discarded() {
    let (mut s, req) = started();
    s.quit();
    assert_eq!(s.question_received(req.generation, question(1)), Delivery::Discarded);
    assert_eq!(s.phase(), Phase::Idle);
    assert!(s.previous_questions().is_empty());

    let req2 = s.start(topics(&[Topic::React])).unwrap();
    assert_eq!(s.question_received(req.generation, question(1)), Delivery::Discarded);
    deliver(&mut s, &req2, 2);
  }

  #[test]
  fn invalid_payload_is_recorded_as_failure() {
    let (mut s, req) = started();
    let mut bad = question(1);
    bad.correct_answer = "missing".into();
    assert_eq!(s.question_received(req.generation, bad), Delivery::Accepted);
    assert_eq!(s.phase(), Phase::AwaitingQuestion);
    assert!(s.last_error().unwrap().starts_with("Invalid question"));
  }

  #[test]
  fn hint_removes_a_wrong_option_and_spends_a_token() {
    let mut rng = StdRng::seed_from_u64(7);
    let (mut s, req) = started();
    let req = answer_correct_n(&mut s, req, 3);
    assert_eq!(s.tokens(), 1);
    deliver(&mut s, &req, 4);

    let removed = s.use_hint(&mut rng).unwrap();
    assert_ne!(removed, "right");
    assert_eq!(s.current().unwrap().options.len(), 3);
    assert!(s.current().unwrap().options.contains(&"right".to_string()));
    assert_eq!(s.tokens(), 0);
    assert_eq!(s.use_hint(&mut rng), Err(GameError::HintUnavailable("no tokens left")));
  }

  #[test]
  fn hint_never_goes_below_two_options() {
    let mut rng = StdRng::seed_from_u64(1);
    let store = SessionStore::default();
    let mut s = Session::new(GameRules { tokens_per_level: 5, ..GameRules::default() }, store);
    let req = s.start(topics(&[Topic::Html])).unwrap();
    let req = answer_correct_n(&mut s, req, 3);
    deliver(&mut s, &req, 4);

    assert!(s.use_hint(&mut rng).is_ok());
    assert!(s.use_hint(&mut rng).is_ok());
    assert_eq!(s.current().unwrap().options.len(), 2);
    assert_eq!(s.use_hint(&mut rng), Err(GameError::HintUnavailable("only two options left")));
    assert_eq!(s.tokens(), 3);
    assert_eq!(s.current().unwrap().correct_answer, "right");
  }

  #[test]
  fn random_play_keeps_invariants() {
    let mut rng = StdRng::seed_from_u64(42);
    let rules = GameRules { starting_lives: 3, ..GameRules::default() };
    let mut s = Session::new(rules, SessionStore::default());
    let mut req = s.start(topics(&[Topic::Html, Topic::Css])).unwrap();
    let mut highest = s.highest_level();

    for n in 0..500 {
      deliver(&mut s, &req, n);
      if rng.gen_bool(0.3) {
        let _ = s.use_hint(&mut rng);
        assert!(s.current().unwrap().options.len() >= MIN_OPTIONS);
        assert!(s.current().unwrap().options.contains(&"right".to_string()));
      }
      let (level_before, idx_before) = (s.level(), s.question_index());
      let pick = if rng.gen_bool(0.8) { "right" } else { "wrong a" };
      let out = s.select_option(pick).unwrap();
      if out.level_up {
        assert_eq!(idx_before, s.rules().questions_per_level);
        assert_eq!(s.level(), level_before + 1);
      } else {
        assert_eq!(s.level(), level_before);
      }
      assert!(s.highest_level() >= highest);
      assert!(s.highest_level() >= s.level());
      highest = s.highest_level();

      req = if s.phase() == Phase::GameOver {
        assert_eq!(s.lives(), 0);
        s.restart().unwrap()
      } else {
        assert!(s.lives() > 0);
        s.next().unwrap()
      };
    }
  }

  #[test]
  fn store_round_trips_through_string_pairs() {
    let store = SessionStore { level: 3, highest_level: 9, tokens: 4 };
    let pairs = store.to_pairs();
    assert_eq!(pairs.get("highestLevel").map(String::as_str), Some("9"));
    assert_eq!(SessionStore::from_pairs(&pairs), store);
  }

  #[test]
  fn store_tolerates_garbage_and_keeps_highest_above_level() {
    let pairs = BTreeMap::from([
      ("level".to_string(), "5".to_string()),
      ("highestLevel".to_string(), "2".to_string()),
      ("tokens".to_string(), "lots".to_string()),
    ]);
    let store = SessionStore::from_pairs(&pairs);
    assert_eq!(store, SessionStore { level: 5, highest_level: 5, tokens: 0 });
    assert_eq!(SessionStore::from_pairs(&BTreeMap::new()), SessionStore::default());
  }
}

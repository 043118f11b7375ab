//! Domain models used by the backend: topics, topic selection, and the question record.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SourceError;

/// Smallest and largest number of answer choices a question may carry.
pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 4;

/// Frontend topics a player can pick from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Topic {
  #[serde(rename = "HTML")]
  Html,
  #[serde(rename = "CSS")]
  Css,
  #[serde(rename = "JavaScript")]
  JavaScript,
  #[serde(rename = "React")]
  React,
}

impl Topic {
  pub const ALL: [Topic; 4] = [Topic::Html, Topic::Css, Topic::JavaScript, Topic::React];

  pub fn name(self) -> &'static str {
    match self {
      Topic::Html => "HTML",
      Topic::Css => "CSS",
      Topic::JavaScript => "JavaScript",
      Topic::React => "React",
    }
  }
}

impl fmt::Display for Topic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// Error returned when a topic name is not one of the supported topics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown topic: {0}")]
pub struct UnknownTopic(pub String);

impl FromStr for Topic {
  type Err = UnknownTopic;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let wanted = s.trim();
    Topic::ALL
      .into_iter()
      .find(|t| t.name().eq_ignore_ascii_case(wanted))
      .ok_or_else(|| UnknownTopic(s.to_string()))
  }
}

/// Set of topics chosen for a session. Ordered so prompts and logs are stable.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicSelection(BTreeSet<Topic>);

impl TopicSelection {
  pub fn new() -> Self {
    Self::default()
  }

  /// Parse topic names as sent by clients. Duplicates collapse.
  pub fn parse<S: AsRef<str>>(names: &[S]) -> Result<Self, UnknownTopic> {
    names
      .iter()
      .map(|n| n.as_ref().parse::<Topic>())
      .collect::<Result<BTreeSet<_>, _>>()
      .map(Self)
  }

  pub fn contains(&self, topic: Topic) -> bool {
    self.0.contains(&topic)
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn iter(&self) -> impl Iterator<Item = Topic> + '_ {
    self.0.iter().copied()
  }

  /// Comma-separated names, e.g. "HTML, React".
  pub fn joined(&self) -> String {
    self.iter().map(Topic::name).collect::<Vec<_>>().join(", ")
  }
}

impl FromIterator<Topic> for TopicSelection {
  fn from_iter<I: IntoIterator<Item = Topic>>(iter: I) -> Self {
    Self(iter.into_iter().collect())
  }
}

/// A multiple-choice question as served to the player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRecord {
  pub question: String,
  pub options: Vec<String>,
  pub correct_answer: String,
  pub explanation: String,
}

impl QuestionRecord {
  /// Schema check applied to every question before it reaches a session.
  pub fn validate(&self) -> Result<(), SourceError> {
    if self.question.trim().is_empty() {
      return Err(SourceError::InvalidQuestion("question text is empty".into()));
    }
    let n = self.options.len();
    if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&n) {
      return Err(SourceError::InvalidQuestion(format!(
        "expected {MIN_OPTIONS}-{MAX_OPTIONS} options, got {n}"
      )));
    }
    if self.options.iter().any(|o| o.trim().is_empty()) {
      return Err(SourceError::InvalidQuestion("empty option".into()));
    }
    if !self.options.contains(&self.correct_answer) {
      return Err(SourceError::InvalidQuestion(
        "correctAnswer is not one of the options".into(),
      ));
    }
    Ok(())
  }

  pub fn is_correct(&self, option: &str) -> bool {
    option == self.correct_answer
  }

  /// Options other than the correct answer, in display order.
  pub fn incorrect_options(&self) -> impl Iterator<Item = &str> + '_ {
    self
      .options
      .iter()
      .map(String::as_str)
      .filter(move |o| *o != self.correct_answer)
  }
}

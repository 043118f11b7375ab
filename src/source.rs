//! Question sources: the static bank and the OpenAI generator.
//!
//! Both are single-shot: one call, one question or one `SourceError`. Nothing here
//! retries or falls back to the other source.

use rand::seq::SliceRandom;
use tracing::{debug, instrument};

use crate::config::Prompts;
use crate::domain::{QuestionRecord, Topic, TopicSelection};
use crate::error::SourceError;
use crate::openai::OpenAI;

/// In-memory question bank keyed by topic.
#[derive(Clone, Debug, Default)]
pub struct QuestionBank {
  entries: Vec<(Topic, QuestionRecord)>,
}

impl QuestionBank {
  /// Build a bank, dropping entries that fail the schema check.
  pub fn new(entries: impl IntoIterator<Item = (Topic, QuestionRecord)>) -> Self {
    let entries = entries
      .into_iter()
      .filter(|(topic, q)| match q.validate() {
        Ok(()) => true,
        Err(e) => {
          tracing::warn!(target: "question", %topic, question = %q.question, error = %e, "Skipping bank item");
          false
        }
      })
      .collect();
    Self { entries }
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn count_for(&self, topic: Topic) -> usize {
    self.entries.iter().filter(|(t, _)| *t == topic).count()
  }

  /// Pick uniformly among questions in `topics`, preferring ones not asked yet.
  pub fn pick(
    &self,
    topics: &TopicSelection,
    previous_questions: &[String],
  ) -> Result<QuestionRecord, SourceError> {
    if topics.is_empty() {
      return Err(SourceError::NoTopics);
    }
    let in_topics: Vec<&QuestionRecord> = self
      .entries
      .iter()
      .filter(|(t, _)| topics.contains(*t))
      .map(|(_, q)| q)
      .collect();
    let unseen: Vec<&QuestionRecord> = in_topics
      .iter()
      .copied()
      .filter(|q| !previous_questions.contains(&q.question))
      .collect();
    let pool = if unseen.is_empty() { &in_topics } else { &unseen };

    let mut rng = rand::thread_rng();
    pool
      .choose(&mut rng)
      .map(|q| (*q).clone())
      .ok_or_else(|| SourceError::EmptyBank(topics.joined()))
  }
}

/// Where questions come from for this process.
#[derive(Clone)]
pub enum QuestionSource {
  Bank(QuestionBank),
  Generated(OpenAI),
}

impl QuestionSource {
  pub fn kind(&self) -> &'static str {
    match self {
      QuestionSource::Bank(_) => "bank",
      QuestionSource::Generated(_) => "openai_generated",
    }
  }

  /// One attempt at a question for `topics` at `level`.
  #[instrument(level = "info", skip(self, prompts, topics, previous_questions), fields(source = self.kind(), topics = %topics.joined()))]
  pub async fn request_question(
    &self,
    prompts: &Prompts,
    topics: &TopicSelection,
    level: u32,
    previous_questions: &[String],
  ) -> Result<QuestionRecord, SourceError> {
    if topics.is_empty() {
      return Err(SourceError::NoTopics);
    }
    match self {
      QuestionSource::Bank(bank) => {
        let q = bank.pick(topics, previous_questions)?;
        debug!(target: "question", question = %q.question, "Bank question picked");
        Ok(q)
      }
      QuestionSource::Generated(oa) => {
        oa.generate_question(prompts, topics, level, previous_questions).await
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::seeds::seed_questions;

  fn sel(ts: &[Topic]) -> TopicSelection {
    ts.iter().copied().collect()
  }

  #[test]
  fn bank_skips_invalid_entries() {
    let mut bad = seed_questions()[0].1.clone();
    bad.correct_answer = "nope".into();
    let bank = QuestionBank::new(vec![(Topic::Html, bad)]);
    assert!(bank.is_empty());
  }

  #[test]
  fn bank_only_serves_selected_topics() {
    let bank = QuestionBank::new(seed_questions());
    let css = sel(&[Topic::Css]);
    let css_texts: Vec<String> = seed_questions()
      .into_iter()
      .filter(|(t, _)| *t == Topic::Css)
      .map(|(_, q)| q.question)
      .collect();
    for _ in 0..20 {
      let q = bank.pick(&css, &[]).unwrap();
      assert!(css_texts.contains(&q.question));
    }
  }

  #[test]
  fn bank_prefers_unseen_then_repeats() {
    let bank = QuestionBank::new(seed_questions());
    let html = sel(&[Topic::Html]);
    assert_eq!(bank.count_for(Topic::Html), 2);

    let first = bank.pick(&html, &[]).unwrap();
    let second = bank.pick(&html, &[first.question.clone()]).unwrap();
    assert_ne!(first.question, second.question);

    let both = vec![first.question.clone(), second.question.clone()];
    assert!(bank.pick(&html, &both).is_ok());
  }

  #[test]
  fn bank_reports_missing_topics() {
    let bank = QuestionBank::new(seed_questions().into_iter().filter(|(t, _)| *t == Topic::Css));
    assert_eq!(bank.pick(&TopicSelection::new(), &[]), Err(SourceError::NoTopics));
    assert_eq!(
      bank.pick(&sel(&[Topic::React]), &[]),
      Err(SourceError::EmptyBank("React".into()))
    );
  }

  #[tokio::test]
  async fn no_topics_fails_before_touching_the_source() {
    let source = QuestionSource::Bank(QuestionBank::new(seed_questions()));
    let err = source
      .request_question(&Prompts::default(), &TopicSelection::new(), 1, &[])
      .await
      .unwrap_err();
    assert_eq!(err.to_string(), "No topics selected");
  }

  #[tokio::test]
  async fn unreachable_generator_is_an_upstream_error() {
    let oa = OpenAI::new(
      "sk-test".into(),
      "http://127.0.0.1:9".into(),
      "gpt-3.5-turbo".into(),
      std::time::Duration::from_secs(2),
    )
    .unwrap();
    let source = QuestionSource::Generated(oa);
    let err = source
      .request_question(&Prompts::default(), &sel(&[Topic::Html]), 1, &[])
      .await
      .unwrap_err();
    assert!(matches!(err, SourceError::Upstream(_)));
  }
}

//! Topic/difficulty selection, including the weak-area-first auto mode.
//!
//! In auto mode we do not pick the problem ourselves. We rank the catalog by weakness and
//! hand the ranking to the generator, which makes the final weighted choice.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::config::Catalog;
use crate::domain::{Difficulty, Language, AUTO_TOPIC};
use crate::error::{PracticeError, Result};
use crate::stats::{StatsTracker, TopicStats};

/// One entry of the weakness ranking, weakest first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeakTopic {
  pub topic: String,
  pub correct: u64,
  pub total: u64,
}

/// What the generator is asked for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
  /// A catalog topic or `"auto"`.
  pub topic: String,
  pub difficulty: Difficulty,
  pub language: Language,
  /// Weakest-first ranking. Empty for manual requests.
  #[serde(default)]
  pub weak_topics: Vec<WeakTopic>,
}

impl GenerationRequest {
  pub fn is_auto(&self) -> bool {
    self.topic == AUTO_TOPIC
  }
}

/// The learner's current topic/difficulty choice.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
  pub topic: String,
  pub difficulty: Difficulty,
}

impl Default for Selection {
  fn default() -> Self {
    Self { topic: AUTO_TOPIC.to_string(), difficulty: Difficulty::Auto }
  }
}

impl Selection {
  pub fn is_auto(&self) -> bool {
    self.topic == AUTO_TOPIC
  }

  /// Switch topic. Algorithm topics force `standard`; general topics coming from
  /// `standard`/`auto` fall back to the first general level.
  pub fn select_topic(&mut self, catalog: &Catalog, topic: &str) -> Result<()> {
    if topic == AUTO_TOPIC {
      *self = Selection::default();
      return Ok(());
    }
    if !catalog.contains(topic) {
      return Err(PracticeError::InvalidSelection(format!("unknown topic '{topic}'")));
    }
    self.topic = topic.to_string();
    let allowed = catalog.difficulties_for(topic);
    if !allowed.contains(&self.difficulty) {
      self.difficulty = allowed[0];
    }
    Ok(())
  }

  /// Change difficulty. Ignored in auto mode, rejected when the topic does not offer it.
  pub fn select_difficulty(&mut self, catalog: &Catalog, difficulty: Difficulty) -> Result<()> {
    if self.is_auto() {
      return Ok(());
    }
    if !catalog.difficulties_for(&self.topic).contains(&difficulty) {
      return Err(PracticeError::InvalidSelection(format!(
        "difficulty '{difficulty}' is not offered for topic '{}'",
        self.topic
      )));
    }
    self.difficulty = difficulty;
    Ok(())
  }

  /// Build the outgoing request. Auto mode carries the weakness ranking as a hint.
  pub fn resolve(&self, catalog: &Catalog, stats: &StatsTracker, language: Language) -> GenerationRequest {
    if self.is_auto() {
      GenerationRequest {
        topic: AUTO_TOPIC.to_string(),
        difficulty: Difficulty::Auto,
        language,
        weak_topics: weak_topic_ranking(&catalog.topics, stats),
      }
    } else {
      GenerationRequest {
        topic: self.topic.clone(),
        difficulty: self.difficulty,
        language,
        weak_topics: Vec::new(),
      }
    }
  }
}

/// Rank `topics` weakest first: never-attempted topics, then lowest accuracy, then fewest
/// attempts, then catalog order.
pub fn weak_topic_ranking(topics: &[String], stats: &StatsTracker) -> Vec<WeakTopic> {
  let empty = TopicStats::default();
  let mut ranked: Vec<(&String, &TopicStats)> =
    topics.iter().map(|t| (t, stats.get(t).unwrap_or(&empty))).collect();

  // stable: equal keys keep catalog order
  ranked.sort_by(|(_, a), (_, b)| weakness_cmp(a, b));

  ranked
    .into_iter()
    .map(|(topic, s)| WeakTopic { topic: topic.clone(), correct: s.correct, total: s.total })
    .collect()
}

fn weakness_cmp(a: &TopicStats, b: &TopicStats) -> Ordering {
  match (a.total == 0, b.total == 0) {
    (true, true) => Ordering::Equal,
    (true, false) => Ordering::Less,
    (false, true) => Ordering::Greater,
    (false, false) => a.accuracy_cmp(b).then(a.total.cmp(&b.total)),
  }
}

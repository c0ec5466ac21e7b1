//! Per-topic accuracy counters.
//!
//! The tracker is the only state that survives a restart. Whatever the persisted blob
//! contains beyond `topic -> {correct, total}` is carried along untouched so that a newer
//! client's data survives a round trip through an older one.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::{debug, warn};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicStats {
  pub correct: u64,
  pub total: u64,
  /// Fields we do not know about, preserved verbatim.
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl TopicStats {
  pub fn new(correct: u64, total: u64) -> Self {
    Self { correct: correct.min(total), total, extra: Map::new() }
  }

  /// Accuracy as a whole percentage, rounded half-up. Zero attempts yield 0.
  pub fn rate(&self) -> u8 {
    if self.total == 0 {
      return 0;
    }
    let pct = (200 * u128::from(self.correct) + u128::from(self.total)) / (2 * u128::from(self.total));
    pct.min(100) as u8
  }

  /// Compare accuracies exactly (no floats). Callers handle `total == 0` themselves.
  pub fn accuracy_cmp(&self, other: &TopicStats) -> Ordering {
    let lhs = u128::from(self.correct) * u128::from(other.total);
    let rhs = u128::from(other.correct) * u128::from(self.total);
    lhs.cmp(&rhs)
  }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatsTracker {
  topics: BTreeMap<String, TopicStats>,
  /// Entries that did not look like `{correct, total}` when loaded.
  unknown: Map<String, Value>,
}

impl StatsTracker {
  /// Count one completed grading attempt. Creates the entry on first use.
  pub fn record(&mut self, topic: &str, passed: bool) {
    // A malformed entry under the same key is superseded by real data.
    self.unknown.remove(topic);
    let entry = self.topics.entry(topic.to_string()).or_default();
    entry.total += 1;
    if passed {
      entry.correct += 1;
    }
    debug!(target: "stats", %topic, %passed, correct = entry.correct, total = entry.total, "Recorded attempt");
  }

  pub fn rate(&self, topic: &str) -> u8 {
    self.topics.get(topic).map(TopicStats::rate).unwrap_or(0)
  }

  pub fn get(&self, topic: &str) -> Option<&TopicStats> {
    self.topics.get(topic)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &TopicStats)> {
    self.topics.iter().map(|(k, v)| (k.as_str(), v))
  }

  pub fn is_empty(&self) -> bool {
    self.topics.is_empty() && self.unknown.is_empty()
  }

  /// Drop everything, preserved unknown entries included. There is no undo.
  pub fn reset(&mut self) {
    self.topics.clear();
    self.unknown.clear();
  }

  pub fn from_value(value: Value) -> Self {
    let Value::Object(map) = value else {
      warn!(target: "stats", "Stats blob is not a JSON object; starting empty");
      return Self::default();
    };
    let mut out = Self::default();
    for (topic, raw) in map {
      match serde_json::from_value::<TopicStats>(raw.clone()) {
        Ok(s) => {
          if s.correct > s.total {
            warn!(target: "stats", %topic, correct = s.correct, total = s.total, "correct > total in stored stats; clamping");
          }
          let clamped = TopicStats { extra: s.extra, ..TopicStats::new(s.correct, s.total) };
          out.topics.insert(topic, clamped);
        }
        Err(e) => {
          debug!(target: "stats", %topic, error = %e, "Preserving unrecognized stats entry");
          out.unknown.insert(topic, raw);
        }
      }
    }
    out
  }

  pub fn to_value(&self) -> Value {
    let mut map = self.unknown.clone();
    for (topic, s) in &self.topics {
      map.insert(topic.clone(), serde_json::to_value(s).unwrap_or(Value::Null));
    }
    Value::Object(map)
  }
}

impl Serialize for StatsTracker {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    self.to_value().serialize(serializer)
  }
}

impl<'de> Deserialize<'de> for StatsTracker {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    Value::deserialize(deserializer).map(Self::from_value)
  }
}

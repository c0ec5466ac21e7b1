//! Problem/answer generation seam. The session core only talks to `ProblemGenerator`;
//! the OpenAI client and the built-in seed set both implement it.

use async_trait::async_trait;
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::Catalog;
use crate::domain::{Difficulty, Language, ProblemSource, TestCase};
use crate::error::Result;
use crate::selector::{GenerationRequest, WeakTopic};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneratedProblem {
  /// Concrete topic (never `"auto"`).
  pub topic: String,
  pub difficulty: Difficulty,
  pub problem_text: String,
  pub testcases: Vec<TestCase>,
  pub source: ProblemSource,
}

#[async_trait]
pub trait ProblemGenerator: Send + Sync {
  async fn generate(&self, req: &GenerationRequest) -> Result<GeneratedProblem>;

  async fn alternate_answer(&self, problem_text: &str, language: Language) -> Result<String>;
}

/// Turn an `auto` request into a concrete topic and difficulty.
///
/// Never-attempted topics win outright (picked uniformly among themselves). Otherwise the
/// pick is weighted by error rate, with a small floor so mastered topics still come up.
pub fn resolve_target<R: Rng + ?Sized>(req: &GenerationRequest, catalog: &Catalog, rng: &mut R) -> (String, Difficulty) {
  if !req.is_auto() {
    return (req.topic.clone(), req.difficulty);
  }

  let ranking: Vec<WeakTopic> = if req.weak_topics.is_empty() {
    catalog.topics.iter().map(|t| WeakTopic { topic: t.clone(), correct: 0, total: 0 }).collect()
  } else {
    req.weak_topics.clone()
  };

  let Some(first) = ranking.first().cloned() else {
    return (catalog.topics.first().cloned().unwrap_or_default(), Difficulty::Easy);
  };

  let untried: Vec<&WeakTopic> = ranking.iter().filter(|w| w.total == 0).collect();
  let chosen = if let Some(w) = untried.choose(rng) {
    (*w).clone()
  } else {
    let weights: Vec<f64> = ranking.iter().map(|w| (1.0 - accuracy(w)).max(0.05)).collect();
    match WeightedIndex::new(&weights) {
      Ok(dist) => ranking[dist.sample(rng)].clone(),
      Err(_) => first,
    }
  };

  let difficulty = if catalog.is_algorithm_topic(&chosen.topic) {
    Difficulty::Standard
  } else {
    difficulty_for_accuracy(&chosen)
  };
  (chosen.topic, difficulty)
}

fn accuracy(w: &WeakTopic) -> f64 {
  if w.total == 0 { 0.0 } else { w.correct as f64 / w.total as f64 }
}

/// Weaker topics get easier problems.
fn difficulty_for_accuracy(w: &WeakTopic) -> Difficulty {
  match accuracy(w) {
    a if w.total == 0 || a < 0.4 => Difficulty::Easy,
    a if a < 0.75 => Difficulty::Medium,
    _ => Difficulty::Hard,
  }
}

//! Built-in seed problems, served when no generation service is configured.
//!
//! Every seed is a stdin/stdout exercise with known-good test cases, so the full
//! generate → edit → grade loop works offline against a local sandbox runner.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use tracing::{info, warn};

use crate::config::Catalog;
use crate::domain::{Language, ProblemSource, TestCase};
use crate::error::{PracticeError, Result};
use crate::generator::{resolve_target, GeneratedProblem, ProblemGenerator};
use crate::selector::GenerationRequest;

pub struct SeedProblem {
  pub topic: &'static str,
  pub text: &'static str,
  pub cases: &'static [(&'static str, &'static str)],
}

/// Minimal set of built-in problems that keeps the app useful without a generator.
pub const SEED_PROBLEMS: &[SeedProblem] = &[
  SeedProblem {
    topic: "loops",
    text: "Print the integers from 1 to 10, one per line.",
    cases: &[("", "1\n2\n3\n4\n5\n6\n7\n8\n9\n10")],
  },
  SeedProblem {
    topic: "loops",
    text: "Read an integer N and print the sum 1 + 2 + ... + N.",
    cases: &[("3", "6"), ("10", "55"), ("1", "1")],
  },
  SeedProblem {
    topic: "conditionals",
    text: "Read an integer and print \"even\" if it is even, otherwise \"odd\".",
    cases: &[("4", "even"), ("7", "odd"), ("0", "even")],
  },
  SeedProblem {
    topic: "variables",
    text: "Read two integers a and b on one line and print a + b.",
    cases: &[("1 2", "3"), ("-5 5", "0"), ("100 23", "123")],
  },
  SeedProblem {
    topic: "strings",
    text: "Read a line of text and print it reversed.",
    cases: &[("abc", "cba"), ("racecar", "racecar"), ("a b", "b a")],
  },
  SeedProblem {
    topic: "functions",
    text: "Write a function that returns the maximum of three integers. Read three integers and print the result.",
    cases: &[("1 2 3", "3"), ("-1 -2 -3", "-1"), ("5 5 1", "5")],
  },
  SeedProblem {
    topic: "arrays",
    text: "Read N, then N integers. Print the largest and the smallest separated by a space.",
    cases: &[("3\n4 1 9", "9 1"), ("1\n-7", "-7 -7")],
  },
  SeedProblem {
    topic: "recursion",
    text: "Read N (0 <= N <= 20) and print N! computed recursively.",
    cases: &[("0", "1"), ("5", "120"), ("10", "3628800")],
  },
  SeedProblem {
    topic: "sorting",
    text: "Read N, then N integers. Print them in ascending order separated by spaces.",
    cases: &[("5\n3 1 4 1 5", "1 1 3 4 5"), ("1\n42", "42")],
  },
  SeedProblem {
    topic: "searching",
    text: "Read N, then N sorted integers, then a target T. Print the 0-based index of T or -1.",
    cases: &[("5\n1 3 5 7 9\n7", "3"), ("3\n2 4 6\n5", "-1")],
  },
  SeedProblem {
    topic: "dynamic_programming",
    text: "Read N (1 <= N <= 45). Print the number of ways to climb N stairs taking 1 or 2 steps at a time.",
    cases: &[("1", "1"), ("2", "2"), ("5", "8")],
  },
  SeedProblem {
    topic: "graphs",
    text: "Read N and M, then M undirected edges \"u v\" (1-based). Print the number of connected components.",
    cases: &[("4 2\n1 2\n3 4", "2"), ("3 0", "3"), ("3 2\n1 2\n2 3", "1")],
  },
];

/// Generator backed by `SEED_PROBLEMS`. Alternate answers are not available offline.
pub struct SeedGenerator {
  pub catalog: Catalog,
}

impl SeedGenerator {
  pub fn new(catalog: Catalog) -> Self {
    Self { catalog }
  }
}

#[async_trait]
impl ProblemGenerator for SeedGenerator {
  async fn generate(&self, req: &GenerationRequest) -> Result<GeneratedProblem> {
    let (topic, difficulty, seed) = {
      let mut rng = rand::thread_rng();
      let (topic, difficulty) = resolve_target(req, &self.catalog, &mut rng);
      let candidates: Vec<&SeedProblem> = SEED_PROBLEMS.iter().filter(|p| p.topic == topic).collect();
      let seed = match candidates.choose(&mut rng) {
        Some(p) => *p,
        None => {
          warn!(target: "session", %topic, "No seed problem for topic; using a generic one");
          SEED_PROBLEMS
            .choose(&mut rng)
            .ok_or_else(|| PracticeError::Generation("seed set is empty".into()))?
        }
      };
      (topic, difficulty, seed)
    };

    info!(target: "session", %topic, %difficulty, "Serving seed problem");
    Ok(GeneratedProblem {
      topic,
      difficulty,
      problem_text: seed.text.to_string(),
      testcases: seed.cases.iter().map(|(i, e)| TestCase::new(*i, *e)).collect(),
      source: ProblemSource::Seed,
    })
  }

  async fn alternate_answer(&self, _problem_text: &str, _language: Language) -> Result<String> {
    Err(PracticeError::Generation("Alternate answers need OPENAI_API_KEY".into()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::Difficulty;

  #[test]
  fn every_default_topic_has_a_seed() {
    for topic in Catalog::default().topics {
      assert!(SEED_PROBLEMS.iter().any(|p| p.topic == topic), "no seed for {topic}");
    }
  }

  #[tokio::test]
  async fn manual_request_serves_matching_topic() {
    let gen = SeedGenerator::new(Catalog::default());
    let req = GenerationRequest {
      topic: "recursion".into(),
      difficulty: Difficulty::Easy,
      language: Language::Python,
      weak_topics: Vec::new(),
    };
    let p = gen.generate(&req).await.unwrap();
    assert_eq!(p.topic, "recursion");
    assert_eq!(p.source, ProblemSource::Seed);
    assert_eq!(p.testcases[1], TestCase::new("5", "120"));
  }

  #[tokio::test]
  async fn alternate_answer_is_unavailable_offline() {
    let gen = SeedGenerator::new(Catalog::default());
    assert!(gen.alternate_answer("x", Language::C).await.is_err());
  }
}

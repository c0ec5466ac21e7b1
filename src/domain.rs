//! Domain models: languages, difficulties, problems, test cases and grading results.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Topic identifier meaning "let the generator pick, biased toward weak topics".
pub const AUTO_TOPIC: &str = "auto";

/// Languages the sandbox runner can compile and execute.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
  #[default]
  Python,
  C,
  Cpp,
  Java,
}

impl Language {
  pub const ALL: [Language; 4] = [Language::Python, Language::C, Language::Cpp, Language::Java];

  pub fn as_str(&self) -> &'static str {
    match self {
      Language::Python => "python",
      Language::C => "c",
      Language::Cpp => "cpp",
      Language::Java => "java",
    }
  }
}

impl fmt::Display for Language {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Requested difficulty. `Standard` is the only level algorithm topics accept;
/// `Auto` is the sentinel sent in weak-area-first mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
  Easy,
  Medium,
  Hard,
  Standard,
  Auto,
}

impl Difficulty {
  /// Difficulties offered for general (non-algorithm) topics.
  pub const GENERAL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

  pub fn as_str(&self) -> &'static str {
    match self {
      Difficulty::Easy => "easy",
      Difficulty::Medium => "medium",
      Difficulty::Hard => "hard",
      Difficulty::Standard => "standard",
      Difficulty::Auto => "auto",
    }
  }
}

impl fmt::Display for Difficulty {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Where did the current problem come from?
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemSource {
  #[default]
  Generated, // generation service
  Seed,      // built-in fallback set
  Review,    // re-served from the local archive
}

/// A single input/expected-output pair. Order in a list is significant: it is the
/// correlation key with the grader's per-case results.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
  pub input: String,
  #[serde(alias = "output")]
  pub expected: String,
}

impl TestCase {
  pub fn new(input: impl Into<String>, expected: impl Into<String>) -> Self {
    Self { input: input.into(), expected: expected.into() }
  }
}

/// Problem statement plus the topic/difficulty it was requested for.
/// `topic` holds the concrete topic once the generator resolved an `auto` request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Problem {
  pub id: String,
  pub topic: String,
  pub difficulty: Option<Difficulty>,
  pub text: String,
  #[serde(default)]
  pub source: ProblemSource,
}

impl Problem {
  pub fn is_empty(&self) -> bool {
    self.text.is_empty()
  }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GradeVerdict {
  #[default]
  Pending,
  Correct,
  Wrong,
  Error,
}

/// Per-test-case outcome, index-aligned with the test cases sent in the request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeDetail {
  pub input: String,
  pub expected: String,
  pub stdout: String,
  pub stderr: String,
  pub passed: bool,
}

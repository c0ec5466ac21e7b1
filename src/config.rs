//! Loading backend configuration (topic catalog, prompts, timeouts, storage) from TOML.
//!
//! Every section is optional; anything missing falls back to the defaults below.
//! See `AppConfig`, `Catalog` and `Prompts` for the expected schema.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::domain::Difficulty;
use crate::error::{PracticeError, Result};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub catalog: Catalog,
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub timeouts: Timeouts,
  #[serde(default)]
  pub storage: Storage,
}

/// Topics offered to the learner. `algorithm_topics` is a subset of `topics` whose only
/// legal difficulty is `standard`.
#[derive(Clone, Debug, Deserialize)]
pub struct Catalog {
  pub topics: Vec<String>,
  #[serde(default)]
  pub algorithm_topics: Vec<String>,
}

impl Default for Catalog {
  fn default() -> Self {
    let topics = [
      "variables", "conditionals", "loops", "functions", "arrays", "strings", "recursion",
      "sorting", "searching", "dynamic_programming", "graphs",
    ];
    Self {
      topics: topics.iter().map(|t| t.to_string()).collect(),
      algorithm_topics: ["sorting", "searching", "dynamic_programming", "graphs"]
        .iter()
        .map(|t| t.to_string())
        .collect(),
    }
  }
}

impl Catalog {
  pub fn contains(&self, topic: &str) -> bool {
    self.topics.iter().any(|t| t == topic)
  }

  pub fn is_algorithm_topic(&self, topic: &str) -> bool {
    self.algorithm_topics.iter().any(|t| t == topic)
  }

  /// Difficulties a learner may pick for `topic`.
  pub fn difficulties_for(&self, topic: &str) -> Vec<Difficulty> {
    if self.is_algorithm_topic(topic) {
      vec![Difficulty::Standard]
    } else {
      Difficulty::GENERAL.to_vec()
    }
  }

  pub fn validate(&self) -> Result<()> {
    if self.topics.is_empty() {
      return Err(PracticeError::Config("catalog.topics must not be empty".into()));
    }
    if self.topics.iter().any(|t| t == crate::domain::AUTO_TOPIC) {
      return Err(PracticeError::Config("'auto' is reserved and cannot be a topic".into()));
    }
    if let Some(stray) = self.algorithm_topics.iter().find(|t| !self.contains(t)) {
      return Err(PracticeError::Config(format!("algorithm topic '{stray}' is not listed in catalog.topics")));
    }
    Ok(())
  }
}

/// Prompts used by the generation client. Defaults target short console exercises.
#[derive(Clone, Debug, Deserialize)]
pub struct Prompts {
  pub problem_system: String,
  pub problem_user_template: String,
  pub answer_system: String,
  pub answer_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      problem_system: "You write short programming exercises for learners. Respond ONLY with strict JSON.".into(),
      problem_user_template: "Write one exercise on the topic '{topic}' at difficulty '{difficulty}' to be solved in {language}. The program reads stdin and writes stdout. Return JSON {\"problem_text\": string, \"testcases\": [{\"input\": string, \"expected\": string}]} with 3 to 5 test cases. Do not include the solution.".into(),
      answer_system: "You are a programming tutor. Output ONLY source code, no markdown fences.".into(),
      answer_user_template: "Solve this exercise in {language}. Prefer a different approach from the most obvious one.\n\n{problem_text}".into(),
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Timeouts {
  #[serde(default = "default_generation_secs")]
  pub generation_secs: u64,
  #[serde(default = "default_grading_secs")]
  pub grading_secs: u64,
}

fn default_generation_secs() -> u64 { 60 }
fn default_grading_secs() -> u64 { 30 }

impl Default for Timeouts {
  fn default() -> Self {
    Self { generation_secs: default_generation_secs(), grading_secs: default_grading_secs() }
  }
}

impl Timeouts {
  pub fn generation(&self) -> Duration {
    Duration::from_secs(self.generation_secs)
  }

  pub fn grading(&self) -> Duration {
    Duration::from_secs(self.grading_secs)
  }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Storage {
  /// Directory for `stats.json` and the JSONL archive. PRACTICE_DATA_DIR overrides it.
  #[serde(default = "default_data_dir")]
  pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf { PathBuf::from("./data") }

impl Default for Storage {
  fn default() -> Self {
    Self { data_dir: default_data_dir() }
  }
}

/// Load `AppConfig` from PRACTICE_CONFIG_PATH. On any IO/parse/validation error the
/// defaults are used and the problem is logged.
pub fn load_config_from_env() -> AppConfig {
  let mut cfg = match std::env::var("PRACTICE_CONFIG_PATH") {
    Ok(path) => load_config_file(&path).unwrap_or_else(|e| {
      error!(target: "practice_backend", %path, error = %e, "Failed to load TOML config; using defaults");
      AppConfig::default()
    }),
    Err(_) => AppConfig::default(),
  };

  if let Ok(dir) = std::env::var("PRACTICE_DATA_DIR") {
    cfg.storage.data_dir = PathBuf::from(dir);
  }
  cfg
}

pub fn load_config_file(path: &str) -> Result<AppConfig> {
  let s = std::fs::read_to_string(path).map_err(|e| PracticeError::Config(format!("{path}: {e}")))?;
  let cfg = parse_config(&s)?;
  info!(target: "practice_backend", %path, topics = cfg.catalog.topics.len(), "Loaded config (TOML)");
  Ok(cfg)
}

pub fn parse_config(s: &str) -> Result<AppConfig> {
  let cfg: AppConfig = toml::from_str(s).map_err(|e| PracticeError::Config(e.to_string()))?;
  cfg.catalog.validate()?;
  if cfg.timeouts.generation_secs == 0 || cfg.timeouts.grading_secs == 0 {
    warn!(target: "practice_backend", "Zero timeout configured; every external call will time out");
  }
  Ok(cfg)
}

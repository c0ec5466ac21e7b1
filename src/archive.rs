//! Append-only JSONL archive of served problems and graded submissions.
//!
//! `problems.jsonl` also backs the "review" request: re-serve an earlier problem for
//! the learner's weakest topic without calling the generator.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{Difficulty, GradeDetail, GradeVerdict, Language, ProblemSource, TestCase};
use crate::error::{PracticeError, Result};
use crate::selector::WeakTopic;

const PROBLEMS_FILE: &str = "problems.jsonl";
const CODE_EVAL_FILE: &str = "code_eval.jsonl";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProblemRecord {
  pub topic: String,
  pub difficulty: Difficulty,
  pub problem_text: String,
  pub testcases: Vec<TestCase>,
  pub source: ProblemSource,
  pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
  pub topic: String,
  pub language: Language,
  pub code: String,
  pub testcases: Vec<TestCase>,
  pub verdict: GradeVerdict,
  pub details: Vec<GradeDetail>,
  pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct Archive {
  dir: PathBuf,
}

impl Archive {
  pub fn new(dir: &Path) -> Result<Self> {
    fs::create_dir_all(dir).map_err(|e| PracticeError::Archive(format!("{}: {e}", dir.display())))?;
    Ok(Self { dir: dir.to_path_buf() })
  }

  pub fn append_problem(&self, record: &ProblemRecord) -> Result<()> {
    self.append(PROBLEMS_FILE, record)
  }

  pub fn append_submission(&self, record: &SubmissionRecord) -> Result<()> {
    self.append(CODE_EVAL_FILE, record)
  }

  fn append<T: Serialize>(&self, name: &str, record: &T) -> Result<()> {
    let path = self.dir.join(name);
    let line = serde_json::to_string(record).map_err(|e| PracticeError::Archive(e.to_string()))?;
    let mut file = OpenOptions::new()
      .create(true)
      .append(true)
      .open(&path)
      .map_err(|e| PracticeError::Archive(format!("{}: {e}", path.display())))?;
    writeln!(file, "{line}").map_err(|e| PracticeError::Archive(format!("{}: {e}", path.display())))?;
    debug!(target: "practice_backend", file = name, bytes = line.len(), "Archived record");
    Ok(())
  }

  /// All archived problems, oldest first. Unparseable lines are skipped.
  pub fn problems(&self) -> Result<Vec<ProblemRecord>> {
    let path = self.dir.join(PROBLEMS_FILE);
    if !path.exists() {
      return Ok(Vec::new());
    }
    let file = fs::File::open(&path).map_err(|e| PracticeError::Archive(format!("{}: {e}", path.display())))?;
    let mut out = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
      let line = line.map_err(|e| PracticeError::Archive(e.to_string()))?;
      if line.trim().is_empty() {
        continue;
      }
      match serde_json::from_str::<ProblemRecord>(&line) {
        Ok(r) => out.push(r),
        Err(e) => warn!(target: "practice_backend", line = n + 1, error = %e, "Skipping malformed archive line"),
      }
    }
    Ok(out)
  }

  /// Most recent archived problem for the weakest topic that has one.
  pub fn pick_review(&self, ranking: &[WeakTopic]) -> Result<Option<ProblemRecord>> {
    let problems = self.problems()?;
    Ok(
      ranking
        .iter()
        .find_map(|w| problems.iter().rev().find(|p| p.topic == w.topic))
        .cloned(),
    )
  }
}

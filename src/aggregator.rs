//! Turns a grader response plus the test cases that were actually sent into the
//! user-facing verdict, message and per-case details, and reports the attempt to stats.

use tracing::{error, info, warn};

use crate::domain::{GradeDetail, GradeVerdict, TestCase};
use crate::error::PracticeError;
use crate::grader::GradeResponse;
use crate::stats::StatsTracker;

#[derive(Clone, Debug, PartialEq)]
pub struct GradeOutcome {
  pub verdict: GradeVerdict,
  pub message: String,
  pub details: Vec<GradeDetail>,
  /// Whether the attempt counts toward stats, and as pass or fail.
  pub recorded: Option<bool>,
}

impl GradeOutcome {
  /// Failed grading round trip: nothing judged, nothing recorded.
  pub fn failure(message: impl Into<String>) -> Self {
    Self { verdict: GradeVerdict::Error, message: message.into(), details: Vec::new(), recorded: None }
  }
}

/// Pair detail *i* with `sent[i]`. A count mismatch is a protocol error, never truncated or padded.
pub fn aggregate(response: GradeResponse, sent: &[TestCase]) -> Result<GradeOutcome, PracticeError> {
  // A non-judgeable failure (compile error etc.) may come without any per-case results.
  if response.verdict == GradeVerdict::Error && response.details.is_empty() {
    return Ok(GradeOutcome {
      verdict: GradeVerdict::Error,
      message: non_empty_or(response.message, "Program could not be run."),
      details: Vec::new(),
      recorded: Some(false),
    });
  }

  if response.details.len() != sent.len() {
    return Err(PracticeError::GradingProtocolMismatch { sent: sent.len(), received: response.details.len() });
  }

  let details: Vec<GradeDetail> = sent
    .iter()
    .zip(response.details)
    .map(|(tc, r)| GradeDetail {
      input: tc.input.clone(),
      expected: tc.expected.clone(),
      stdout: r.stdout,
      stderr: r.stderr,
      passed: r.passed,
    })
    .collect();

  let passed = details.iter().filter(|d| d.passed).count();
  let verdict = if response.verdict == GradeVerdict::Error {
    GradeVerdict::Error
  } else if passed == details.len() {
    GradeVerdict::Correct
  } else {
    GradeVerdict::Wrong
  };

  if response.verdict != GradeVerdict::Pending && response.verdict != verdict {
    warn!(target: "grading", reported = ?response.verdict, computed = ?verdict, "Grader verdict disagrees with per-case results; using per-case results");
  }

  let summary = match verdict {
    GradeVerdict::Correct => format!("All {} test cases passed.", details.len()),
    _ => format!("{passed} of {} test cases passed.", details.len()),
  };
  let message = if response.message.trim().is_empty() { summary } else { format!("{summary}\n{}", response.message) };

  Ok(GradeOutcome { verdict, message, details, recorded: Some(verdict == GradeVerdict::Correct) })
}

/// Aggregate and record exactly once. Protocol mismatches surface as `Error` without a record.
pub fn aggregate_and_record(
  response: GradeResponse,
  sent: &[TestCase],
  topic: &str,
  stats: &mut StatsTracker,
) -> GradeOutcome {
  match aggregate(response, sent) {
    Ok(outcome) => {
      if let Some(passed) = outcome.recorded {
        stats.record(topic, passed);
      }
      info!(target: "grading", %topic, verdict = ?outcome.verdict, cases = outcome.details.len(), "Submission graded");
      outcome
    }
    Err(e) => {
      error!(target: "grading", %topic, error = %e, "Grader and client disagree on the submitted test cases");
      GradeOutcome::failure(e.to_string())
    }
  }
}

fn non_empty_or(s: String, fallback: &str) -> String {
  if s.trim().is_empty() { fallback.to_string() } else { s }
}

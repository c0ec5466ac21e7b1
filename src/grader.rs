//! Client for the sandbox runner that compiles and executes submissions.
//!
//! The runner exposes a single `POST /run`. With `testcases` it runs every case and
//! returns one result per case; with `input_data` it runs once (free-input mode).
//! We also accept an already-judged `{verdict, message, details}` reply so that a
//! smarter grader can be swapped in without touching the session core.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::domain::{GradeVerdict, Language, TestCase};
use crate::error::{PracticeError, Result};

/// Judged reply, before alignment with the submitted test cases.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct GradeResponse {
  pub verdict: GradeVerdict,
  #[serde(default)]
  pub message: String,
  #[serde(default)]
  pub details: Vec<CaseResult>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CaseResult {
  #[serde(default)]
  pub stdout: String,
  #[serde(default)]
  pub stderr: String,
  pub passed: bool,
}

/// Result of a single free-input run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FreeRunOutput {
  pub stdout: String,
  pub stderr: String,
  pub exit_code: i32,
  /// Compile error, timeout or unsupported language reported by the runner.
  pub error: Option<String>,
}

#[async_trait]
pub trait Grader: Send + Sync {
  async fn grade(&self, code: &str, language: Language, testcases: &[TestCase]) -> Result<GradeResponse>;

  async fn run_free_input(&self, code: &str, language: Language, stdin: &str) -> Result<FreeRunOutput>;
}

pub struct SandboxGrader {
  pub client: reqwest::Client,
  pub base_url: String,
}

impl SandboxGrader {
  pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| PracticeError::Config(format!("grader client: {e}")))?;
    Ok(Self { client, base_url: base_url.into().trim_end_matches('/').to_string() })
  }

  /// GRADER_URL, default "http://localhost:8000".
  pub fn from_env(timeout: Duration) -> Result<Self> {
    let base_url = std::env::var("GRADER_URL").unwrap_or_else(|_| "http://localhost:8000".into());
    Self::new(base_url, timeout)
  }

  async fn post_run<B: Serialize>(&self, body: &B) -> Result<RunnerReply> {
    let url = format!("{}/run", self.base_url);
    let res = self.client.post(&url)
      .header(USER_AGENT, "practice-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .json(body).send().await
      .map_err(|e| PracticeError::GradingService(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      return Err(PracticeError::GradingService(format!("Runner HTTP {status}: {body}")));
    }

    let text = res.text().await.map_err(|e| PracticeError::GradingService(e.to_string()))?;
    debug!(target: "grading", reply_len = text.len(), "Runner reply received");
    serde_json::from_str::<RunnerReply>(&text)
      .map_err(|e| PracticeError::GradingService(format!("Unrecognized runner reply: {e}")))
  }
}

#[async_trait]
impl Grader for SandboxGrader {
  #[instrument(level = "info", skip(self, code, testcases), fields(%language, code_len = code.len(), cases = testcases.len()))]
  async fn grade(&self, code: &str, language: Language, testcases: &[TestCase]) -> Result<GradeResponse> {
    let body = GradeRequestBody {
      language,
      code,
      testcases: testcases.iter().map(|tc| WireCase { input: &tc.input, output: &tc.expected }).collect(),
    };
    let start = std::time::Instant::now();
    let reply = self.post_run(&body).await?;
    info!(target: "grading", elapsed = ?start.elapsed(), "Runner finished grading");
    reply.into_grade_response()
  }

  #[instrument(level = "info", skip(self, code, stdin), fields(%language, code_len = code.len(), stdin_len = stdin.len()))]
  async fn run_free_input(&self, code: &str, language: Language, stdin: &str) -> Result<FreeRunOutput> {
    let body = FreeRunBody { language, code, input_data: stdin };
    self.post_run(&body).await?.into_free_run()
  }
}

// --- Runner DTOs ---

#[derive(Serialize)]
struct GradeRequestBody<'a> {
  language: Language,
  code: &'a str,
  testcases: Vec<WireCase<'a>>,
}

/// The runner calls the expected output `output`.
#[derive(Serialize)]
struct WireCase<'a> {
  input: &'a str,
  output: &'a str,
}

#[derive(Serialize)]
struct FreeRunBody<'a> {
  language: Language,
  code: &'a str,
  input_data: &'a str,
}

#[derive(Debug, Deserialize)]
struct RunnerCase {
  #[serde(default)]
  expected: String,
  #[serde(default)]
  stdout: String,
  #[serde(default)]
  stderr: String,
  #[serde(default, rename = "exitCode")]
  exit_code: i32,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RunnerReply {
  Judged(GradeResponse),
  Cases(Vec<RunnerCase>),
  CompileError {
    #[serde(rename = "compileError")]
    compile_error: String,
    #[serde(default)]
    stderr: String,
    #[serde(default, rename = "exitCode")]
    exit_code: i32,
  },
  Failure {
    error: String,
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    stderr: String,
    #[serde(default, rename = "exitCode")]
    exit_code: i32,
  },
  FreeRun {
    output: String,
    #[serde(default)]
    stderr: String,
    #[serde(default, rename = "exitCode")]
    exit_code: i32,
  },
}

impl RunnerReply {
  fn into_grade_response(self) -> Result<GradeResponse> {
    match self {
      RunnerReply::Judged(r) => Ok(r),
      RunnerReply::Cases(cases) => {
        // A crash or timeout on any case makes the run non-judgeable.
        let crashed = cases
          .iter()
          .enumerate()
          .find(|(_, c)| c.exit_code != 0)
          .map(|(i, c)| runtime_error_message(i, c));
        let details: Vec<CaseResult> = cases
          .into_iter()
          .map(|c| CaseResult {
            passed: c.exit_code == 0 && outputs_match(&c.stdout, &c.expected),
            stdout: c.stdout,
            stderr: c.stderr,
          })
          .collect();
        match crashed {
          Some(message) => Ok(GradeResponse { verdict: GradeVerdict::Error, message, details }),
          None => {
            let verdict = if details.iter().all(|d| d.passed) { GradeVerdict::Correct } else { GradeVerdict::Wrong };
            Ok(GradeResponse { verdict, message: String::new(), details })
          }
        }
      }
      RunnerReply::CompileError { compile_error, .. } => Ok(GradeResponse {
        verdict: GradeVerdict::Error,
        message: format!("Compile error:\n{compile_error}"),
        details: Vec::new(),
      }),
      RunnerReply::Failure { error, stderr, .. } => {
        let msg = if stderr.is_empty() { error } else { format!("{error}\n{stderr}") };
        Err(PracticeError::GradingService(msg))
      }
      RunnerReply::FreeRun { .. } => Err(PracticeError::GradingService(
        "Runner ignored the test cases and ran in free-input mode".into(),
      )),
    }
  }

  fn into_free_run(self) -> Result<FreeRunOutput> {
    match self {
      RunnerReply::FreeRun { output, stderr, exit_code } => {
        Ok(FreeRunOutput { stdout: output, stderr, exit_code, error: None })
      }
      RunnerReply::CompileError { compile_error, stderr, exit_code } => Ok(FreeRunOutput {
        stdout: String::new(),
        stderr,
        exit_code,
        error: Some(format!("Compile error:\n{compile_error}")),
      }),
      RunnerReply::Failure { error, stdout, stderr, exit_code } => {
        Ok(FreeRunOutput { stdout, stderr, exit_code, error: Some(error) })
      }
      RunnerReply::Judged(_) | RunnerReply::Cases(_) => {
        Err(PracticeError::GradingService("Unexpected graded reply to a free-input run".into()))
      }
    }
  }
}

fn runtime_error_message(index: usize, case: &RunnerCase) -> String {
  let stderr = case.stderr.trim();
  if stderr.is_empty() {
    format!("Runtime error on test case {} (exit code {})", index + 1, case.exit_code)
  } else {
    format!("Runtime error on test case {} (exit code {}):\n{stderr}", index + 1, case.exit_code)
  }
}

/// Compare program output with the expected text, ignoring trailing whitespace on each
/// line, trailing blank lines and CRLF line endings.
pub fn outputs_match(stdout: &str, expected: &str) -> bool {
  normalize_output(stdout) == normalize_output(expected)
}

fn normalize_output(s: &str) -> Vec<&str> {
  let mut lines: Vec<&str> = s.lines().map(|l| l.trim_end()).collect();
  while lines.last().is_some_and(|l| l.is_empty()) {
    lines.pop();
  }
  lines
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parse(s: &str) -> RunnerReply {
    serde_json::from_str(s).unwrap()
  }

  #[test]
  fn output_comparison_ignores_trailing_whitespace() {
    assert!(outputs_match("1\n2\n3\n", "1\n2\n3"));
    assert!(outputs_match("1 \r\n2\r\n\n\n", "1\n2"));
    assert!(!outputs_match("1\n3", "1\n2"));
    assert!(!outputs_match(" 1", "1"));
    assert!(outputs_match("", ""));
  }

  #[test]
  fn per_case_reply_is_judged_locally() {
    let reply = parse(r#"[
      {"input": "2", "expected": "4", "stdout": "4\n", "stderr": "", "exitCode": 0},
      {"input": "3", "expected": "9", "stdout": "6\n", "stderr": "", "exitCode": 0},
      {"input": "0", "expected": "0", "stdout": "0\n", "stderr": "boom", "exitCode": 1}
    ]"#);
    let r = reply.into_grade_response().unwrap();
    assert_eq!(r.verdict, GradeVerdict::Error);
    assert_eq!(r.details.iter().map(|d| d.passed).collect::<Vec<_>>(), vec![true, false, false]);
    assert_eq!(r.details[2].stderr, "boom");
    assert!(r.message.contains("test case 3"));
    assert!(r.message.contains("boom"));
  }

  #[test]
  fn wrong_output_without_crash_is_wrong() {
    let reply = parse(r#"[
      {"input": "2", "expected": "4", "stdout": "4\n", "stderr": "", "exitCode": 0},
      {"input": "3", "expected": "9", "stdout": "6\n", "stderr": "", "exitCode": 0}
    ]"#);
    let r = reply.into_grade_response().unwrap();
    assert_eq!(r.verdict, GradeVerdict::Wrong);
    assert!(r.message.is_empty());
  }

  #[test]
  fn crashing_case_is_error_not_wrong_answer() {
    let reply = parse(r#"[{"input": "1", "expected": "1", "stdout": "", "stderr": "Traceback: ZeroDivisionError", "exitCode": 1}]"#);
    let r = reply.into_grade_response().unwrap();
    assert_eq!(r.verdict, GradeVerdict::Error);
    assert_eq!(r.details.len(), 1);
    assert!(!r.details[0].passed);
    assert!(r.message.contains("ZeroDivisionError"));
  }

  #[test]
  fn timed_out_case_without_stderr_reports_exit_code() {
    let reply = parse(r#"[
      {"input": "1", "expected": "1", "stdout": "1", "stderr": "", "exitCode": 0},
      {"input": "2", "expected": "2", "stdout": "", "stderr": "", "exitCode": 124}
    ]"#);
    let r = reply.into_grade_response().unwrap();
    assert_eq!(r.verdict, GradeVerdict::Error);
    assert!(r.message.contains("exit code 124"));
  }

  #[test]
  fn compile_error_becomes_error_verdict() {
    let reply = parse(r#"{"compileError": "x.c:1: error", "stdout": "", "stderr": "x.c:1: error", "exitCode": 1}"#);
    let r = reply.into_grade_response().unwrap();
    assert_eq!(r.verdict, GradeVerdict::Error);
    assert!(r.details.is_empty());
    assert!(r.message.contains("x.c:1: error"));
  }

  #[test]
  fn runner_error_is_a_service_failure() {
    let reply = parse(r#"{"error": "Unsupported language: rust"}"#);
    assert!(matches!(reply.into_grade_response(), Err(PracticeError::GradingService(m)) if m.contains("rust")));
  }

  #[test]
  fn structured_reply_passes_through() {
    let reply = parse(r#"{"verdict": "Correct", "message": "ok", "details": [{"stdout": "1", "stderr": "", "passed": true}]}"#);
    let r = reply.into_grade_response().unwrap();
    assert_eq!(r.verdict, GradeVerdict::Correct);
    assert_eq!(r.details.len(), 1);
  }

  #[test]
  fn free_run_replies() {
    let ok = parse(r#"{"output": "hi\n", "stderr": "", "exitCode": 0}"#).into_free_run().unwrap();
    assert_eq!(ok.stdout, "hi\n");
    assert!(ok.error.is_none());

    let timeout = parse(r#"{"error": "Execution timed out", "stdout": "partial", "stderr": "\n[timeout]", "exitCode": 124}"#)
      .into_free_run()
      .unwrap();
    assert_eq!(timeout.exit_code, 124);
    assert_eq!(timeout.error.as_deref(), Some("Execution timed out"));
    assert_eq!(timeout.stdout, "partial");
  }

  #[test]
  fn request_body_uses_runner_field_names() {
    let cases = [TestCase::new("1", "2")];
    let body = GradeRequestBody {
      language: Language::Cpp,
      code: "int main(){}",
      testcases: cases.iter().map(|tc| WireCase { input: &tc.input, output: &tc.expected }).collect(),
    };
    let v = serde_json::to_value(&body).unwrap();
    assert_eq!(v["language"], "cpp");
    assert_eq!(v["testcases"][0]["output"], "2");
  }
}

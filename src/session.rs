//! Practice session state machine.
//!
//! `SessionState` is owned by exactly one actor (see `runtime`). Every transition is a
//! plain method that mutates the state and returns the side effects to run; service
//! completions come back in as events carrying the `RequestToken` they were issued with.
//! A completion is applied only if its token is still the latest of its kind, so an
//! overtaken request can never clobber newer state.
//!
//! Phases: `Idle → Generating → Ready → Submitting → Graded`, with `Ready`/`Graded`
//! → `Generating` for the next problem. Alternate answers and free-input runs live
//! beside the phase machine and never touch problem or grade state.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::aggregator::aggregate_and_record;
use crate::archive::{ProblemRecord, SubmissionRecord};
use crate::codec::TestcaseEditor;
use crate::config::Catalog;
use crate::domain::{Difficulty, GradeDetail, GradeVerdict, Language, Problem, ProblemSource, TestCase};
use crate::error::Result;
use crate::generator::GeneratedProblem;
use crate::grader::{FreeRunOutput, GradeResponse};
use crate::selector::{weak_topic_ranking, GenerationRequest, Selection, WeakTopic};
use crate::stats::StatsTracker;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  #[default]
  Idle,
  Generating,
  Ready,
  Submitting,
  Graded,
}

impl Phase {
  pub fn as_str(&self) -> &'static str {
    match self {
      Phase::Idle => "idle",
      Phase::Generating => "generating",
      Phase::Ready => "ready",
      Phase::Submitting => "submitting",
      Phase::Graded => "graded",
    }
  }
}

/// Identity of an outgoing request. Monotonic per session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestToken(u64);

/// Inputs to the state machine: user actions and service completions.
#[derive(Debug)]
pub enum Event {
  SelectTopic(String),
  SelectDifficulty(Difficulty),
  SelectLanguage(Language),
  EditCode(String),
  EditTestcases(String),
  CommitTestcases,
  RequestProblem,
  RequestReview,
  RequestAlternateAnswer,
  Submit,
  RunFreeInput { stdin: String },
  ResetStats,

  ProblemReady { token: RequestToken, result: Result<GeneratedProblem> },
  AnswerReady { token: RequestToken, result: Result<String> },
  GradeReady { token: RequestToken, result: Result<GradeResponse> },
  FreeRunFinished { token: RequestToken, result: Result<FreeRunOutput> },
}

/// Side effects requested by a transition. The runtime executes them and reports
/// completions back as events.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
  Generate { token: RequestToken, request: GenerationRequest },
  LoadReview { token: RequestToken, ranking: Vec<WeakTopic> },
  AlternateAnswer { token: RequestToken, problem_text: String, language: Language },
  Grade { token: RequestToken, code: String, language: Language, testcases: Vec<TestCase> },
  RunFreeInput { token: RequestToken, code: String, language: Language, stdin: String },
  PersistStats(StatsTracker),
  ArchiveProblem(ProblemRecord),
  ArchiveSubmission(SubmissionRecord),
}

/// Everything needed to interpret a grading reply, captured at submission time.
#[derive(Clone, Debug)]
struct PendingGrade {
  token: RequestToken,
  topic: String,
  code: String,
  language: Language,
  snapshot: Vec<TestCase>,
}

#[derive(Clone, Debug)]
pub struct SessionState {
  pub phase: Phase,
  pub loading: bool,
  pub problem: Problem,
  pub language: Language,
  pub code: String,
  pub testcases: TestcaseEditor,
  pub verdict: GradeVerdict,
  pub message: String,
  pub details: Vec<GradeDetail>,
  pub model_answer: String,
  pub answer_loading: bool,
  pub free_run: Option<FreeRunOutput>,
  /// Last user-visible error that is not a grading verdict.
  pub notice: Option<String>,
  pub selection: Selection,
  pub stats: StatsTracker,
  pub catalog: Catalog,

  next_token: u64,
  pending_problem: Option<RequestToken>,
  pending_grade: Option<PendingGrade>,
  pending_answer: Option<RequestToken>,
  pending_run: Option<RequestToken>,
}

impl SessionState {
  pub fn new(catalog: Catalog, stats: StatsTracker) -> Self {
    Self {
      phase: Phase::Idle,
      loading: false,
      problem: Problem::default(),
      language: Language::default(),
      code: String::new(),
      testcases: TestcaseEditor::default(),
      verdict: GradeVerdict::Pending,
      message: String::new(),
      details: Vec::new(),
      model_answer: String::new(),
      answer_loading: false,
      free_run: None,
      notice: None,
      selection: Selection::default(),
      stats,
      catalog,
      next_token: 0,
      pending_problem: None,
      pending_grade: None,
      pending_answer: None,
      pending_run: None,
    }
  }

  pub fn apply(&mut self, event: Event) -> Vec<Effect> {
    match event {
      Event::SelectTopic(topic) => {
        let res = self.selection.select_topic(&self.catalog, &topic);
        self.surface(res);
        Vec::new()
      }
      Event::SelectDifficulty(d) => {
        let res = self.selection.select_difficulty(&self.catalog, d);
        self.surface(res);
        Vec::new()
      }
      Event::SelectLanguage(language) => {
        self.language = language;
        Vec::new()
      }
      Event::EditCode(code) => {
        self.code = code;
        Vec::new()
      }
      Event::EditTestcases(raw) => {
        self.testcases.edit(raw);
        Vec::new()
      }
      Event::CommitTestcases => {
        // The decode error stays on the editor; nothing else to surface.
        let _ = self.testcases.commit();
        Vec::new()
      }
      Event::RequestProblem => {
        let req = self.selection.resolve(&self.catalog, &self.stats, self.language);
        self.request_problem(req)
      }
      Event::RequestReview => self.request_review(),
      Event::RequestAlternateAnswer => self.request_alternate_answer(),
      Event::Submit => self.submit_current(),
      Event::RunFreeInput { stdin } => self.run_free_input(stdin),
      Event::ResetStats => self.reset_stats(),

      Event::ProblemReady { token, result } => self.on_problem(token, result),
      Event::AnswerReady { token, result } => self.on_answer(token, result),
      Event::GradeReady { token, result } => self.on_grade(token, result),
      Event::FreeRunFinished { token, result } => self.on_free_run(token, result),
    }
  }

  fn issue(&mut self) -> RequestToken {
    self.next_token += 1;
    RequestToken(self.next_token)
  }

  fn surface(&mut self, res: Result<()>) {
    self.notice = res.err().map(|e| e.to_string());
  }

  /// Start loading the next problem. Allowed from any phase; invalidates any in-flight
  /// generation and grading request.
  pub fn request_problem(&mut self, request: GenerationRequest) -> Vec<Effect> {
    let token = self.begin_problem_request();
    info!(target: "session", ?token, topic = %request.topic, difficulty = %request.difficulty, "Requesting problem");
    vec![Effect::Generate { token, request }]
  }

  /// Re-serve an archived problem for the weakest topic that has one.
  pub fn request_review(&mut self) -> Vec<Effect> {
    let ranking = weak_topic_ranking(&self.catalog.topics, &self.stats);
    let token = self.begin_problem_request();
    info!(target: "session", ?token, "Requesting review problem");
    vec![Effect::LoadReview { token, ranking }]
  }

  fn begin_problem_request(&mut self) -> RequestToken {
    let token = self.issue();
    if let Some(stale) = self.pending_grade.take() {
      debug!(target: "session", token = ?stale.token, "Grading request superseded by new problem request");
    }
    self.pending_problem = Some(token);
    self.phase = Phase::Generating;
    self.loading = true;
    self.notice = None;
    self.clear_grade();
    token
  }

  fn clear_grade(&mut self) {
    self.verdict = GradeVerdict::Pending;
    self.message.clear();
    self.details.clear();
  }

  fn on_problem(&mut self, token: RequestToken, result: Result<GeneratedProblem>) -> Vec<Effect> {
    if self.pending_problem != Some(token) {
      debug!(target: "session", ?token, "Discarding stale problem response");
      return Vec::new();
    }
    self.pending_problem = None;
    self.loading = false;

    match result {
      Ok(gen) => {
        let mut effects = Vec::new();
        if gen.source != ProblemSource::Review {
          effects.push(Effect::ArchiveProblem(ProblemRecord {
            topic: gen.topic.clone(),
            difficulty: gen.difficulty,
            problem_text: gen.problem_text.clone(),
            testcases: gen.testcases.clone(),
            source: gen.source,
            created_at: Utc::now(),
          }));
        }
        info!(target: "session", ?token, topic = %gen.topic, cases = gen.testcases.len(), source = ?gen.source, "Problem ready");
        self.problem = Problem {
          id: uuid::Uuid::new_v4().to_string(),
          topic: gen.topic,
          difficulty: Some(gen.difficulty),
          text: gen.problem_text,
          source: gen.source,
        };
        self.testcases.replace(gen.testcases);
        // Answers and free runs belong to the previous problem.
        self.model_answer.clear();
        self.answer_loading = false;
        self.pending_answer = None;
        self.free_run = None;
        self.pending_run = None;
        self.phase = Phase::Ready;
        effects
      }
      Err(e) => {
        warn!(target: "session", ?token, error = %e, "Problem request failed; keeping previous problem");
        self.notice = Some(e.to_string());
        self.phase = if self.problem.is_empty() { Phase::Idle } else { Phase::Ready };
        Vec::new()
      }
    }
  }

  /// Submit the editor contents. Submission is a commit point for the test-case text:
  /// a decode error blocks the submission and stays visible on the editor.
  pub fn submit_current(&mut self) -> Vec<Effect> {
    let snapshot = match self.testcases.commit() {
      Ok(cases) => cases.to_vec(),
      Err(e) => {
        self.notice = Some(e.to_string());
        return Vec::new();
      }
    };
    self.submit_for_grading(self.code.clone(), snapshot, self.language)
  }

  /// Send `code` for grading against `testcases`. The list is kept as the alignment
  /// snapshot for the reply, whatever happens to the editor meanwhile.
  pub fn submit_for_grading(&mut self, code: String, testcases: Vec<TestCase>, language: Language) -> Vec<Effect> {
    if !matches!(self.phase, Phase::Ready | Phase::Graded) {
      self.notice = Some(format!("Cannot submit while {}", self.phase.as_str()));
      return Vec::new();
    }
    if testcases.is_empty() {
      self.notice = Some("There are no test cases to grade against".into());
      return Vec::new();
    }

    let token = self.issue();
    self.code = code.clone();
    self.language = language;
    self.pending_grade = Some(PendingGrade {
      token,
      topic: self.problem.topic.clone(),
      code: code.clone(),
      language,
      snapshot: testcases.clone(),
    });
    self.phase = Phase::Submitting;
    self.notice = None;
    self.clear_grade();
    info!(target: "session", ?token, %language, cases = testcases.len(), "Submitting for grading");
    vec![Effect::Grade { token, code, language, testcases }]
  }

  fn on_grade(&mut self, token: RequestToken, result: Result<GradeResponse>) -> Vec<Effect> {
    let pending = match self.pending_grade.take() {
      Some(p) if p.token == token => p,
      other => {
        self.pending_grade = other;
        debug!(target: "session", ?token, "Discarding stale grading response");
        return Vec::new();
      }
    };

    let mut effects = Vec::new();
    match result {
      Ok(response) => {
        let outcome = aggregate_and_record(response, &pending.snapshot, &pending.topic, &mut self.stats);
        if outcome.recorded.is_some() {
          effects.push(Effect::PersistStats(self.stats.clone()));
        }
        self.verdict = outcome.verdict;
        self.message = outcome.message;
        self.details = outcome.details;
      }
      Err(e) => {
        warn!(target: "session", ?token, error = %e, "Grading failed");
        self.verdict = GradeVerdict::Error;
        self.message = e.to_string();
        self.details.clear();
      }
    }
    effects.push(Effect::ArchiveSubmission(SubmissionRecord {
      topic: pending.topic,
      language: pending.language,
      code: pending.code,
      testcases: pending.snapshot,
      verdict: self.verdict,
      details: self.details.clone(),
      created_at: Utc::now(),
    }));
    self.phase = Phase::Graded;
    effects
  }

  /// Ask for a model answer to the current problem. Independent of the phase machine.
  pub fn request_alternate_answer(&mut self) -> Vec<Effect> {
    if self.problem.is_empty() {
      self.notice = Some("Generate a problem first".into());
      return Vec::new();
    }
    let token = self.issue();
    self.pending_answer = Some(token);
    self.answer_loading = true;
    vec![Effect::AlternateAnswer { token, problem_text: self.problem.text.clone(), language: self.language }]
  }

  fn on_answer(&mut self, token: RequestToken, result: Result<String>) -> Vec<Effect> {
    if self.pending_answer != Some(token) {
      debug!(target: "session", ?token, "Discarding stale answer");
      return Vec::new();
    }
    self.pending_answer = None;
    self.answer_loading = false;
    match result {
      Ok(answer) => self.model_answer = answer,
      Err(e) => {
        warn!(target: "session", ?token, error = %e, "Alternate answer failed");
        self.notice = Some(e.to_string());
      }
    }
    Vec::new()
  }

  /// Run the current code once against free stdin. Never touches grade state or stats.
  pub fn run_free_input(&mut self, stdin: String) -> Vec<Effect> {
    let token = self.issue();
    self.pending_run = Some(token);
    self.free_run = None;
    vec![Effect::RunFreeInput { token, code: self.code.clone(), language: self.language, stdin }]
  }

  fn on_free_run(&mut self, token: RequestToken, result: Result<FreeRunOutput>) -> Vec<Effect> {
    if self.pending_run != Some(token) {
      debug!(target: "session", ?token, "Discarding stale free-run output");
      return Vec::new();
    }
    self.pending_run = None;
    match result {
      Ok(out) => self.free_run = Some(out),
      Err(e) => self.notice = Some(e.to_string()),
    }
    Vec::new()
  }

  pub fn reset_stats(&mut self) -> Vec<Effect> {
    self.stats.reset();
    info!(target: "session", "Stats reset");
    vec![Effect::PersistStats(self.stats.clone())]
  }

  pub fn is_free_run_pending(&self) -> bool {
    self.pending_run.is_some()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::PracticeError;
  use crate::grader::CaseResult;

  fn session() -> SessionState {
    let catalog = Catalog {
      topics: vec!["loops".into(), "strings".into(), "graphs".into()],
      algorithm_topics: vec!["graphs".into()],
    };
    SessionState::new(catalog, StatsTracker::default())
  }

  fn manual(topic: &str, difficulty: Difficulty) -> GenerationRequest {
    GenerationRequest { topic: topic.into(), difficulty, language: Language::Python, weak_topics: Vec::new() }
  }

  fn generated(topic: &str, text: &str, cases: Vec<TestCase>) -> GeneratedProblem {
    GeneratedProblem {
      topic: topic.into(),
      difficulty: Difficulty::Easy,
      problem_text: text.into(),
      testcases: cases,
      source: ProblemSource::Generated,
    }
  }

  fn token_of(effects: &[Effect]) -> RequestToken {
    match effects.first() {
      Some(Effect::Generate { token, .. })
      | Some(Effect::LoadReview { token, .. })
      | Some(Effect::Grade { token, .. })
      | Some(Effect::AlternateAnswer { token, .. })
      | Some(Effect::RunFreeInput { token, .. }) => *token,
      other => panic!("no request effect: {other:?}"),
    }
  }

  fn ready(s: &mut SessionState, cases: Vec<TestCase>) {
    let t = token_of(&s.request_problem(manual("loops", Difficulty::Easy)));
    s.apply(Event::ProblemReady { token: t, result: Ok(generated("loops", "p", cases)) });
    assert_eq!(s.phase, Phase::Ready);
  }

  fn passed(n: usize) -> GradeResponse {
    GradeResponse {
      verdict: GradeVerdict::Correct,
      message: String::new(),
      details: (0..n).map(|_| CaseResult { stdout: "ok".into(), stderr: String::new(), passed: true }).collect(),
    }
  }

  #[test]
  fn end_to_end_generate_then_grade() {
    let mut s = session();
    let expected = "1\n2\n3\n4\n5\n6\n7\n8\n9\n10";
    let effects = s.request_problem(manual("loops", Difficulty::Easy));
    assert_eq!(s.phase, Phase::Generating);
    assert!(s.loading);
    let t = token_of(&effects);

    let effects = s.apply(Event::ProblemReady {
      token: t,
      result: Ok(generated("loops", "print 1..10", vec![TestCase::new("", expected)])),
    });
    assert!(matches!(effects.as_slice(), [Effect::ArchiveProblem(_)]));
    assert_eq!(s.phase, Phase::Ready);
    assert!(!s.loading);
    assert_eq!(s.problem.text, "print 1..10");
    assert_eq!(s.testcases.committed(), &[TestCase::new("", expected)]);

    s.apply(Event::EditCode("for i in range(1, 11): print(i)".into()));
    let effects = s.apply(Event::Submit);
    assert_eq!(s.phase, Phase::Submitting);
    let t = token_of(&effects);

    let effects = s.apply(Event::GradeReady { token: t, result: Ok(passed(1)) });
    assert_eq!(s.phase, Phase::Graded);
    assert_eq!(s.verdict, GradeVerdict::Correct);
    assert_eq!(s.details.len(), 1);
    assert_eq!(s.details[0].expected, expected);
    assert_eq!(s.stats.get("loops").map(|st| (st.correct, st.total)), Some((1, 1)));
    assert!(matches!(effects.as_slice(), [Effect::PersistStats(_), Effect::ArchiveSubmission(_)]));
  }

  #[test]
  fn later_problem_request_wins_over_earlier_slow_one() {
    let mut s = session();
    let first = token_of(&s.request_problem(manual("loops", Difficulty::Easy)));
    let second = token_of(&s.request_problem(manual("strings", Difficulty::Hard)));

    s.apply(Event::ProblemReady { token: second, result: Ok(generated("strings", "new", vec![TestCase::new("a", "a")])) });
    let effects = s.apply(Event::ProblemReady { token: first, result: Ok(generated("loops", "old", vec![TestCase::new("b", "b")])) });

    assert!(effects.is_empty());
    assert_eq!(s.problem.text, "new");
    assert_eq!(s.problem.topic, "strings");
    assert_eq!(s.testcases.committed(), &[TestCase::new("a", "a")]);
    assert_eq!(s.phase, Phase::Ready);
  }

  #[test]
  fn earlier_response_arriving_first_is_still_discarded() {
    let mut s = session();
    let first = token_of(&s.request_problem(manual("loops", Difficulty::Easy)));
    let _second = token_of(&s.request_problem(manual("strings", Difficulty::Hard)));
    s.apply(Event::ProblemReady { token: first, result: Ok(generated("loops", "old", Vec::new())) });
    assert!(s.problem.is_empty());
    assert_eq!(s.phase, Phase::Generating);
    assert!(s.loading);
  }

  #[test]
  fn generation_failure_keeps_previous_problem() {
    let mut s = session();
    ready(&mut s, vec![TestCase::new("1", "1")]);
    let t = token_of(&s.request_problem(manual("strings", Difficulty::Easy)));
    s.apply(Event::ProblemReady { token: t, result: Err(PracticeError::Generation("boom".into())) });
    assert_eq!(s.phase, Phase::Ready);
    assert!(!s.loading);
    assert_eq!(s.problem.text, "p");
    assert_eq!(s.testcases.committed(), &[TestCase::new("1", "1")]);
    assert!(s.notice.as_deref().unwrap_or_default().contains("boom"));
  }

  #[test]
  fn first_generation_failure_returns_to_idle() {
    let mut s = session();
    let t = token_of(&s.request_problem(manual("loops", Difficulty::Easy)));
    s.apply(Event::ProblemReady {
      token: t,
      result: Err(PracticeError::Timeout { operation: "generation", after: std::time::Duration::from_secs(1) }),
    });
    assert_eq!(s.phase, Phase::Idle);
    assert!(s.notice.is_some());
  }

  #[test]
  fn new_problem_request_clears_verdict_and_drops_pending_grade() {
    let mut s = session();
    ready(&mut s, vec![TestCase::new("1", "1")]);
    let grade = token_of(&s.apply(Event::Submit));
    let gen = token_of(&s.request_problem(manual("strings", Difficulty::Easy)));
    assert_eq!(s.verdict, GradeVerdict::Pending);

    let effects = s.apply(Event::GradeReady { token: grade, result: Ok(passed(1)) });
    assert!(effects.is_empty());
    assert_eq!(s.verdict, GradeVerdict::Pending);
    assert!(s.stats.is_empty());

    s.apply(Event::ProblemReady { token: gen, result: Ok(generated("strings", "q", vec![TestCase::new("x", "x")])) });
    assert_eq!(s.phase, Phase::Ready);
  }

  #[test]
  fn grading_uses_snapshot_not_current_editor_text() {
    let mut s = session();
    ready(&mut s, vec![TestCase::new("1", "one"), TestCase::new("2", "two"), TestCase::new("3", "three")]);
    let t = token_of(&s.apply(Event::Submit));

    s.apply(Event::EditTestcases(r#"[{"input": "9", "expected": "nine"}]"#.into()));
    s.apply(Event::CommitTestcases);
    assert_eq!(s.testcases.committed().len(), 1);

    s.apply(Event::GradeReady { token: t, result: Ok(passed(3)) });
    assert_eq!(s.verdict, GradeVerdict::Correct);
    assert_eq!(s.details.iter().map(|d| d.expected.as_str()).collect::<Vec<_>>(), vec!["one", "two", "three"]);
  }

  #[test]
  fn mismatched_detail_count_is_error_and_leaves_stats() {
    let mut s = session();
    ready(&mut s, vec![TestCase::new("1", "1"), TestCase::new("2", "2"), TestCase::new("3", "3")]);
    let t = token_of(&s.apply(Event::Submit));
    let effects = s.apply(Event::GradeReady { token: t, result: Ok(passed(2)) });
    assert_eq!(s.verdict, GradeVerdict::Error);
    assert_eq!(s.phase, Phase::Graded);
    assert!(s.details.is_empty());
    assert!(s.stats.is_empty());
    assert!(!effects.iter().any(|e| matches!(e, Effect::PersistStats(_))));
  }

  #[test]
  fn grading_service_failure_is_error_verdict_without_stats() {
    let mut s = session();
    ready(&mut s, vec![TestCase::new("1", "1")]);
    let t = token_of(&s.apply(Event::Submit));
    s.apply(Event::GradeReady { token: t, result: Err(PracticeError::GradingService("connection refused".into())) });
    assert_eq!(s.verdict, GradeVerdict::Error);
    assert!(s.message.contains("connection refused"));
    assert!(s.details.is_empty());
    assert!(s.stats.is_empty());
    assert_eq!(s.phase, Phase::Graded);
  }

  #[test]
  fn invalid_testcase_text_blocks_submission() {
    let mut s = session();
    ready(&mut s, vec![TestCase::new("1", "1")]);
    s.apply(Event::EditTestcases("[{oops".into()));
    let effects = s.apply(Event::Submit);
    assert!(effects.is_empty());
    assert_eq!(s.phase, Phase::Ready);
    assert!(s.testcases.error().is_some());
    assert_eq!(s.testcases.display_text(), "[{oops");
  }

  #[test]
  fn submit_is_rejected_outside_ready_or_graded() {
    let mut s = session();
    assert!(s.submit_for_grading("x".into(), vec![TestCase::new("1", "1")], Language::C).is_empty());
    assert_eq!(s.phase, Phase::Idle);

    ready(&mut s, vec![TestCase::new("1", "1")]);
    s.apply(Event::Submit);
    assert!(s.apply(Event::Submit).is_empty());
    assert_eq!(s.phase, Phase::Submitting);
  }

  #[test]
  fn stale_alternate_answer_is_discarded_after_new_problem() {
    let mut s = session();
    ready(&mut s, vec![TestCase::new("1", "1")]);
    let ans = token_of(&s.apply(Event::RequestAlternateAnswer));
    assert!(s.answer_loading);
    ready(&mut s, vec![TestCase::new("2", "2")]);
    s.apply(Event::AnswerReady { token: ans, result: Ok("print(1)".into()) });
    assert!(s.model_answer.is_empty());

    let ans = token_of(&s.apply(Event::RequestAlternateAnswer));
    s.apply(Event::AnswerReady { token: ans, result: Ok("print(2)".into()) });
    assert_eq!(s.model_answer, "print(2)");
    assert!(!s.answer_loading);
  }

  #[test]
  fn alternate_answer_does_not_touch_grade_state() {
    let mut s = session();
    ready(&mut s, vec![TestCase::new("1", "1")]);
    let grade = token_of(&s.apply(Event::Submit));
    let ans = token_of(&s.apply(Event::RequestAlternateAnswer));
    assert_eq!(s.phase, Phase::Submitting);
    s.apply(Event::AnswerReady { token: ans, result: Ok("x".into()) });
    s.apply(Event::GradeReady { token: grade, result: Ok(passed(1)) });
    assert_eq!(s.verdict, GradeVerdict::Correct);
    assert_eq!(s.model_answer, "x");
  }

  #[test]
  fn selecting_algorithm_topic_forces_standard() {
    let mut s = session();
    s.apply(Event::SelectTopic("loops".into()));
    s.apply(Event::SelectDifficulty(Difficulty::Hard));
    s.apply(Event::SelectTopic("graphs".into()));
    assert_eq!(s.selection.difficulty, Difficulty::Standard);
    s.apply(Event::SelectDifficulty(Difficulty::Hard));
    assert!(s.notice.is_some());
    assert_eq!(s.selection.difficulty, Difficulty::Standard);
  }

  #[test]
  fn auto_request_carries_weak_topic_hint() {
    let mut s = session();
    s.stats.record("loops", true);
    let effects = s.apply(Event::RequestProblem);
    match effects.as_slice() {
      [Effect::Generate { request, .. }] => {
        assert!(request.is_auto());
        let order: Vec<&str> = request.weak_topics.iter().map(|w| w.topic.as_str()).collect();
        assert_eq!(order, vec!["strings", "graphs", "loops"]);
      }
      other => panic!("unexpected effects: {other:?}"),
    }
  }

  #[test]
  fn free_run_is_independent_of_grading() {
    let mut s = session();
    ready(&mut s, vec![TestCase::new("1", "1")]);
    let t = token_of(&s.apply(Event::RunFreeInput { stdin: "5".into() }));
    assert!(s.is_free_run_pending());
    s.apply(Event::FreeRunFinished {
      token: t,
      result: Ok(FreeRunOutput { stdout: "5\n".into(), ..Default::default() }),
    });
    assert_eq!(s.free_run.as_ref().map(|o| o.stdout.as_str()), Some("5\n"));
    assert_eq!(s.verdict, GradeVerdict::Pending);
    assert!(s.stats.is_empty());
  }

  #[test]
  fn free_run_from_previous_problem_is_discarded() {
    let mut s = session();
    ready(&mut s, vec![TestCase::new("1", "1")]);
    let old = token_of(&s.apply(Event::RunFreeInput { stdin: "5".into() }));
    ready(&mut s, vec![TestCase::new("2", "4")]);
    assert!(!s.is_free_run_pending());
    s.apply(Event::FreeRunFinished {
      token: old,
      result: Ok(FreeRunOutput { stdout: "old output".into(), ..Default::default() }),
    });
    assert!(s.free_run.is_none());
    assert!(s.notice.is_none());
  }

  #[test]
  fn reset_stats_persists_empty_object() {
    let mut s = session();
    s.stats.record("loops", false);
    let effects = s.apply(Event::ResetStats);
    assert!(s.stats.is_empty());
    assert!(matches!(effects.as_slice(), [Effect::PersistStats(st)] if st.is_empty()));
  }

  #[test]
  fn review_problem_is_not_archived_again() {
    let mut s = session();
    let t = token_of(&s.apply(Event::RequestReview));
    let mut review = generated("loops", "again", vec![TestCase::new("1", "1")]);
    review.source = ProblemSource::Review;
    let effects = s.apply(Event::ProblemReady { token: t, result: Ok(review) });
    assert!(effects.is_empty());
    assert_eq!(s.problem.source, ProblemSource::Review);
  }
}

//! Two-way conversion between the structured test-case list and the editable text blob.
//!
//! The text form is pretty-printed JSON so that a learner can hand-edit generated cases.
//! Decoding only happens at commit points (editor blur, submission); in between, the raw
//! text may be anything.

use crate::domain::TestCase;
use crate::error::ParseError;

/// Serialize test cases as a pretty JSON array (`input` before `expected`, two-space indent).
/// The empty list encodes to `[]`.
pub fn encode(testcases: &[TestCase]) -> String {
  serde_json::to_string_pretty(testcases).unwrap_or_else(|_| "[]".into())
}

/// Parse editor text back into test cases, preserving order.
pub fn decode(text: &str) -> Result<Vec<TestCase>, ParseError> {
  let cases: Vec<TestCase> = serde_json::from_str(text)?;
  Ok(cases)
}

/// Editor-side holder for the raw text and the last committed list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TestcaseEditor {
  committed: Vec<TestCase>,
  raw: Option<String>,
  error: Option<ParseError>,
}

impl TestcaseEditor {
  /// Replace the list wholesale (new problem arrived). Pending edits are dropped.
  pub fn replace(&mut self, testcases: Vec<TestCase>) {
    self.raw = if testcases.is_empty() { Some(encode(&testcases)) } else { None };
    self.committed = testcases;
    self.error = None;
  }

  /// Record an in-progress edit. Never validates.
  pub fn edit(&mut self, raw: String) {
    self.raw = Some(raw);
  }

  /// Decode the raw text. On failure the previous list is kept and the error is
  /// exposed inline; editing stays possible.
  pub fn commit(&mut self) -> Result<&[TestCase], ParseError> {
    if let Some(raw) = &self.raw {
      match decode(raw) {
        Ok(cases) => {
          self.committed = cases;
          self.error = None;
        }
        Err(e) => {
          self.error = Some(e.clone());
          return Err(e);
        }
      }
    }
    Ok(&self.committed)
  }

  /// Text shown in the editor. Empty string until something has been generated or typed.
  pub fn display_text(&self) -> String {
    match &self.raw {
      Some(raw) => raw.clone(),
      None if self.committed.is_empty() => String::new(),
      None => encode(&self.committed),
    }
  }

  pub fn committed(&self) -> &[TestCase] {
    &self.committed
  }

  pub fn error(&self) -> Option<&ParseError> {
    self.error.as_ref()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;

  fn sample() -> Vec<TestCase> {
    vec![
      TestCase::new("3\n", "6\n"),
      TestCase::new("", "1\n2\n3"),
      TestCase::new("3\n", "6\n"),
    ]
  }

  #[test]
  fn round_trip_preserves_order_and_duplicates() {
    let cases = sample();
    assert_eq!(decode(&encode(&cases)).unwrap(), cases);
    assert_eq!(decode(&encode(&[])).unwrap(), Vec::<TestCase>::new());
  }

  #[test]
  fn encode_is_stable_pretty_json() {
    let text = encode(&[TestCase::new("1 2", "3")]);
    assert_eq!(text, "[\n  {\n    \"input\": \"1 2\",\n    \"expected\": \"3\"\n  }\n]");
    assert_eq!(encode(&[]), "[]");
  }

  #[test]
  fn decode_rejects_malformed_text() {
    assert!(decode("").is_err());
    assert!(decode("[{\"input\": \"1\"}]").is_err());
    assert!(decode("{\"input\": \"1\", \"expected\": \"2\"}").is_err());
    let err = decode("[\n  {\"input\": 1, \"expected\": \"2\"}\n]").unwrap_err();
    assert_eq!(err.line, 2);
  }

  #[test]
  fn decode_accepts_runner_output_alias() {
    let cases = decode(r#"[{"input": "a", "output": "b"}]"#).unwrap();
    assert_eq!(cases, vec![TestCase::new("a", "b")]);
  }

  #[test]
  fn editor_placeholder_is_empty_before_generation() {
    let editor = TestcaseEditor::default();
    assert_eq!(editor.display_text(), "");
  }

  #[test]
  fn editor_shows_explicit_empty_list_after_generation() {
    let mut editor = TestcaseEditor::default();
    editor.replace(Vec::new());
    assert_eq!(editor.display_text(), "[]");
  }

  #[test]
  fn invalid_edit_is_tolerated_until_commit() {
    let mut editor = TestcaseEditor::default();
    editor.replace(sample());
    editor.edit("[{\"input\": ".into());
    assert!(editor.error().is_none());
    assert_eq!(editor.display_text(), "[{\"input\": ");

    assert!(editor.commit().is_err());
    assert!(editor.error().is_some());
    assert_eq!(editor.committed(), sample().as_slice());

    editor.edit(r#"[{"input": "x", "expected": "y"}]"#.into());
    assert_eq!(editor.commit().unwrap(), &[TestCase::new("x", "y")]);
    assert!(editor.error().is_none());
  }

  #[test]
  fn round_trip_keeps_awkward_text_exact() {
    let tables: Vec<Vec<TestCase>> = vec![
      vec![TestCase::new("", "")],
      vec![TestCase::new("héllo wörld", "ñ → ✓ 中文 🎉")],
      vec![TestCase::new(r#"say "hi""#, r"C:\path\to\file")],
      vec![TestCase::new("a\r\nb\r\n", "line1\nline2\n\n")],
      vec![TestCase::new("1\t2\t3", "  leading and trailing  ")],
      vec![TestCase::new("\u{0}\u{1f}", "}]{[\",:")],
      (0..500).map(|i| TestCase::new(i.to_string(), (i * i).to_string())).collect(),
    ];
    for cases in tables {
      assert_eq!(decode(&encode(&cases)).unwrap(), cases);
    }
  }

  proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn any_case_list_survives_encode_then_decode(
      pairs in proptest::collection::vec((".*", ".*"), 0..8)
    ) {
      let cases: Vec<TestCase> = pairs.into_iter().map(|(i, e)| TestCase::new(i, e)).collect();
      prop_assert_eq!(decode(&encode(&cases)).unwrap(), cases);
    }
  }
}

//! Minimal OpenAI client acting as the problem/answer generation service.
//!
//! We only call chat.completions and request either plain text or a strict JSON object.
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key and we keep payload truncations short.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::config::{Catalog, Prompts};
use crate::domain::{Language, ProblemSource, TestCase};
use crate::error::{PracticeError, Result};
use crate::generator::{resolve_target, GeneratedProblem, ProblemGenerator};
use crate::selector::GenerationRequest;
use crate::util::{fill_template, strip_code_fences, trunc_for_log};

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
  pub prompts: Prompts,
  pub catalog: Catalog,
}

/// Shape we ask the model for.
#[derive(Deserialize)]
struct Gen {
  #[serde(alias = "problemText")]
  problem_text: String,
  #[serde(default)]
  testcases: Vec<TestCase>,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env(prompts: Prompts, catalog: Catalog, timeout: Duration) -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok()?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());

    let client = match reqwest::Client::builder().timeout(timeout).build() {
      Ok(c) => c,
      Err(e) => {
        error!(target: "practice_backend", error = %e, "Failed to build OpenAI HTTP client");
        return None;
      }
    };

    Some(Self { client, api_key, base_url, model, prompts, catalog })
  }

  async fn chat(&self, system: &str, user: &str, temperature: f32, json: bool) -> Result<String> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature,
      response_format: json.then(|| ResponseFormat { r#type: "json_object".into() }),
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, "practice-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await
      .map_err(|e| PracticeError::Generation(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_openai_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      return Err(PracticeError::Generation(format!("OpenAI HTTP {}: {}", status, msg)));
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| PracticeError::Generation(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    Ok(body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default())
  }

  /// Plain-text chat completion.
  #[instrument(level = "info", skip(self, system, user), fields(model = %self.model))]
  async fn chat_plain(&self, system: &str, user: &str, temperature: f32) -> Result<String> {
    Ok(self.chat(system, user, temperature, false).await?.trim().to_string())
  }

  /// JSON-object chat completion. Generic over the target type T.
  #[instrument(level = "info", skip(self, system, user), fields(model = %self.model))]
  async fn chat_json<T: for<'a> Deserialize<'a>>(&self, system: &str, user: &str, temperature: f32) -> Result<T> {
    let text = self.chat(system, user, temperature, true).await?;
    serde_json::from_str::<T>(&text).map_err(|e| PracticeError::Generation(format!("JSON parse error: {}", e)))
  }
}

#[async_trait]
impl ProblemGenerator for OpenAI {
  #[instrument(level = "info", skip(self, req), fields(topic = %req.topic, difficulty = %req.difficulty, language = %req.language, weak = req.weak_topics.len()))]
  async fn generate(&self, req: &GenerationRequest) -> Result<GeneratedProblem> {
    let (topic, difficulty) = resolve_target(req, &self.catalog, &mut rand::thread_rng());
    let pairs = [("topic", topic.as_str()), ("difficulty", difficulty.as_str()), ("language", req.language.as_str())];
    let system = fill_template(&self.prompts.problem_system, &pairs);
    let user = fill_template(&self.prompts.problem_user_template, &pairs);

    let start = std::time::Instant::now();
    let result = self.chat_json::<Gen>(&system, &user, 0.9).await;
    let elapsed = start.elapsed();

    let gen = match result {
      Ok(g) => g,
      Err(e) => {
        error!(?elapsed, error = %e, "Model call failed during problem generation");
        return Err(e);
      }
    };
    if gen.problem_text.trim().is_empty() {
      return Err(PracticeError::Generation("Model returned an empty problem".into()));
    }
    if gen.testcases.is_empty() {
      warn!(%topic, "Model returned no test cases");
    }

    info!(
      ?elapsed,
      %topic,
      %difficulty,
      cases = gen.testcases.len(),
      preview = %gen.problem_text.chars().take(40).collect::<String>(),
      "Problem generated"
    );

    Ok(GeneratedProblem {
      topic,
      difficulty,
      problem_text: gen.problem_text,
      testcases: gen.testcases,
      source: ProblemSource::Generated,
    })
  }

  #[instrument(level = "info", skip(self, problem_text), fields(%language, problem_len = problem_text.len()))]
  async fn alternate_answer(&self, problem_text: &str, language: Language) -> Result<String> {
    let pairs = [("problem_text", problem_text), ("language", language.as_str())];
    let system = fill_template(&self.prompts.answer_system, &pairs);
    let user = fill_template(&self.prompts.answer_user_template, &pairs);
    let text = self.chat_plain(&system, &user, 0.7).await?;
    Ok(strip_code_fences(&text))
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn generated_payload_accepts_both_spellings() {
    let g: Gen = serde_json::from_str(r#"{"problemText": "print 1..10", "testcases": [{"input": "", "expected": "1"}]}"#).unwrap();
    assert_eq!(g.problem_text, "print 1..10");
    assert_eq!(g.testcases.len(), 1);
    let g: Gen = serde_json::from_str(r#"{"problem_text": "sum"}"#).unwrap();
    assert!(g.testcases.is_empty());
  }

  #[test]
  fn openai_error_body_is_extracted() {
    assert_eq!(
      extract_openai_error(r#"{"error": {"message": "bad key", "type": "auth"}}"#).as_deref(),
      Some("bad key")
    );
    assert!(extract_openai_error("not json").is_none());
  }
}

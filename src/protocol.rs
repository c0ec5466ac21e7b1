//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::config::Catalog;
use crate::domain::{Difficulty, GradeDetail, GradeVerdict, Language, Problem, AUTO_TOPIC};
use crate::error::ParseError;
use crate::grader::FreeRunOutput;
use crate::selector::Selection;
use crate::session::{Phase, SessionState};
use crate::stats::StatsTracker;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    GetSession,
    SelectTopic {
        topic: String,
    },
    SelectDifficulty {
        difficulty: Difficulty,
    },
    SelectLanguage {
        language: Language,
    },
    EditCode {
        code: String,
    },
    EditTestcases {
        text: String,
    },
    CommitTestcases,
    NewProblem,
    ReviewProblem,
    AlternateAnswer,
    /// Optional fields are applied as edits right before submitting.
    Submit {
        #[serde(default)]
        code: Option<String>,
        #[serde(default)]
        testcases: Option<String>,
        #[serde(default)]
        language: Option<Language>,
    },
    RunFreeInput {
        #[serde(default)]
        stdin: String,
    },
    ResetStats,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Session {
        session: SessionSnapshot,
    },
    Error {
        message: String,
    },
}

/// Everything the UI renders, published after every processed event.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub loading: bool,
    pub problem: Option<Problem>,
    pub language: Language,
    pub code: String,
    pub testcases_text: String,
    pub testcases_error: Option<ParseErrorOut>,
    pub verdict: GradeVerdict,
    pub message: String,
    pub details: Vec<GradeDetail>,
    pub model_answer: String,
    pub answer_loading: bool,
    pub free_run: Option<FreeRunOutput>,
    pub free_run_pending: bool,
    pub notice: Option<String>,
    pub selection: Selection,
    /// Difficulties the UI may offer for the selected topic.
    pub difficulties: Vec<Difficulty>,
    pub stats: Vec<TopicStatsOut>,
}

impl From<&SessionState> for SessionSnapshot {
    fn from(s: &SessionState) -> Self {
        let difficulties = if s.selection.is_auto() {
            vec![Difficulty::Auto]
        } else {
            s.catalog.difficulties_for(&s.selection.topic)
        };
        Self {
            phase: s.phase,
            loading: s.loading,
            problem: (!s.problem.is_empty()).then(|| s.problem.clone()),
            language: s.language,
            code: s.code.clone(),
            testcases_text: s.testcases.display_text(),
            testcases_error: s.testcases.error().map(ParseErrorOut::from),
            verdict: s.verdict,
            message: s.message.clone(),
            details: s.details.clone(),
            model_answer: s.model_answer.clone(),
            answer_loading: s.answer_loading,
            free_run: s.free_run.clone(),
            free_run_pending: s.is_free_run_pending(),
            notice: s.notice.clone(),
            selection: s.selection.clone(),
            difficulties,
            stats: stats_out(&s.stats),
        }
    }
}

/// Inline decode error shown next to the test-case editor.
#[derive(Clone, Debug, Serialize)]
pub struct ParseErrorOut {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl From<&ParseError> for ParseErrorOut {
    fn from(e: &ParseError) -> Self {
        Self { message: e.message.clone(), line: e.line, column: e.column }
    }
}

//
// HTTP request/response DTOs
//

#[derive(Clone, Debug, Serialize)]
pub struct TopicStatsOut {
    pub topic: String,
    pub correct: u64,
    pub total: u64,
    /// Rounded accuracy percentage, 0 when never attempted.
    pub rate: u8,
}

pub fn stats_out(stats: &StatsTracker) -> Vec<TopicStatsOut> {
    stats
        .iter()
        .map(|(topic, s)| TopicStatsOut {
            topic: topic.to_string(),
            correct: s.correct,
            total: s.total,
            rate: stats.rate(topic),
        })
        .collect()
}

#[derive(Serialize)]
pub struct StatsOut {
    pub topics: Vec<TopicStatsOut>,
}

#[derive(Serialize)]
pub struct TopicOut {
    pub name: String,
    pub algorithm: bool,
    pub difficulties: Vec<Difficulty>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogOut {
    pub auto_topic: &'static str,
    pub topics: Vec<TopicOut>,
    pub languages: Vec<Language>,
}

impl From<&Catalog> for CatalogOut {
    fn from(c: &Catalog) -> Self {
        Self {
            auto_topic: AUTO_TOPIC,
            topics: c
                .topics
                .iter()
                .map(|t| TopicOut {
                    name: t.clone(),
                    algorithm: c.is_algorithm_topic(t),
                    difficulties: c.difficulties_for(t),
                })
                .collect(),
            languages: Language::ALL.to_vec(),
        }
    }
}

#[derive(Serialize)]
pub struct AckOut {
    pub ok: bool,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub message: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub generator: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_parse_from_tagged_json() {
        let m: ClientWsMessage =
            serde_json::from_str(r#"{"type": "select_difficulty", "difficulty": "standard"}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::SelectDifficulty { difficulty: Difficulty::Standard }));

        let m: ClientWsMessage = serde_json::from_str(r#"{"type": "submit", "language": "cpp"}"#).unwrap();
        assert!(matches!(
            m,
            ClientWsMessage::Submit { code: None, testcases: None, language: Some(Language::Cpp) }
        ));

        assert!(serde_json::from_str::<ClientWsMessage>(r#"{"type": "select_language", "language": "rust"}"#).is_err());
    }

    #[test]
    fn fresh_session_snapshot_shape() {
        let state = SessionState::new(Catalog::default(), StatsTracker::default());
        let v = serde_json::to_value(ServerWsMessage::Session { session: SessionSnapshot::from(&state) }).unwrap();
        assert_eq!(v["type"], "session");
        assert_eq!(v["session"]["phase"], "idle");
        assert_eq!(v["session"]["verdict"], "Pending");
        assert_eq!(v["session"]["testcasesText"], "");
        assert!(v["session"]["problem"].is_null());
        assert_eq!(v["session"]["difficulties"], serde_json::json!(["auto"]));
    }

    #[test]
    fn catalog_marks_algorithm_topics() {
        let out = CatalogOut::from(&Catalog::default());
        let graphs = out.topics.iter().find(|t| t.name == "graphs").unwrap();
        assert!(graphs.algorithm);
        assert_eq!(graphs.difficulties, vec![Difficulty::Standard]);
        let loops = out.topics.iter().find(|t| t.name == "loops").unwrap();
        assert_eq!(loops.difficulties, Difficulty::GENERAL.to_vec());
    }
}

//! End-to-end integration tests for the examination flow.
//!
//! These tests spawn the real HTTP server on an ephemeral port and drive
//! complete sessions over the wire, covering the happy path, input
//! rejection, degraded grading, and retry semantics.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use viva_orchestrator::{
    create_router, AppState, CompetencyAnalyzer, Config, Evaluator, ExamOrchestrator,
    GradingResult, HeuristicEvaluator, Question, QuestionSource, Result as VivaResult,
    ScriptedQuestionSource, SubjectScore, TranscriptAnalyzer, Turn, VivaError,
};

/// Path to the exam-script fixtures.
fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

/// Question source returning a fixed in-memory question set.
struct StubSource(Vec<Question>);

#[async_trait]
impl QuestionSource for StubSource {
    async fn questions_for(&self, document_ref: &str) -> VivaResult<Vec<Question>> {
        if self.0.is_empty() {
            return Err(VivaError::document_unprocessable(
                document_ref,
                "no questions available",
            ));
        }
        Ok(self.0.clone())
    }
}

/// Evaluator returning preset scores in order, honoring the challenge band.
struct ScriptedEvaluator(Mutex<VecDeque<u32>>);

impl ScriptedEvaluator {
    fn new(scores: &[u32]) -> Self {
        Self(Mutex::new(scores.iter().copied().collect()))
    }
}

#[async_trait]
impl Evaluator for ScriptedEvaluator {
    async fn evaluate(&self, question: &Question, _response_text: &str) -> VivaResult<GradingResult> {
        let score = self
            .0
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| VivaError::evaluation_unavailable("no scores left"))?;
        let mut result = GradingResult::new(score, "Graded by the scripted evaluator.");
        if question.is_upper_band(score) {
            result = result.with_challenge("Defend that position under pressure.");
        }
        Ok(result)
    }
}

/// Evaluator that always fails, for the degraded-grading scenario.
struct BrokenEvaluator;

#[async_trait]
impl Evaluator for BrokenEvaluator {
    async fn evaluate(&self, _question: &Question, _response_text: &str) -> VivaResult<GradingResult> {
        Err(VivaError::evaluation_unavailable("grading backend is down"))
    }
}

fn sample_questions(n: usize) -> Vec<Question> {
    (0..n)
        .map(|i| {
            Question::new(
                format!("Question {}?", i + 1),
                viva_orchestrator::DifficultyLevel::Easy,
            )
            .with_source(3, "Introduction")
        })
        .collect()
}

/// Spawns the server on an ephemeral port and returns its base URL.
async fn spawn_server(
    source: impl QuestionSource + 'static,
    evaluator: impl Evaluator + 'static,
) -> String {
    let orchestrator = ExamOrchestrator::new(
        Config::default(),
        Arc::new(source),
        Arc::new(evaluator),
        Arc::new(TranscriptAnalyzer),
    );
    spawn_server_with(orchestrator).await
}

async fn spawn_server_with(orchestrator: ExamOrchestrator) -> String {
    let router = create_router(AppState::new(orchestrator));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind ephemeral port");
    let addr: SocketAddr = listener.local_addr().expect("Failed to read local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{addr}")
}

async fn start_exam(client: &reqwest::Client, base: &str, document: &str) -> reqwest::Response {
    client
        .post(format!("{base}/api/exam/start"))
        .json(&serde_json::json!({"documentRef": document}))
        .send()
        .await
        .expect("start request failed")
}

async fn submit(client: &reqwest::Client, base: &str, text: &str) -> reqwest::Response {
    client
        .post(format!("{base}/api/exam/response"))
        .json(&serde_json::json!({"text": text}))
        .send()
        .await
        .expect("response request failed")
}

/// Scenario A: one question, a weak answer, completion after a single turn.
#[tokio::test]
async fn test_single_question_session_completes() {
    let base = spawn_server(StubSource(sample_questions(1)), ScriptedEvaluator::new(&[3])).await;
    let client = reqwest::Client::new();

    let response = start_exam(&client, &base, "attention.pdf").await;
    assert_eq!(response.status(), 200);
    let session: serde_json::Value = response.json().await.expect("invalid session json");
    assert_eq!(session["phase"], "awaiting_response");
    assert_eq!(session["transcript"].as_array().map(Vec::len), Some(1));

    let response = submit(&client, &base, "ok").await;
    assert_eq!(response.status(), 200);
    let session: serde_json::Value = response.json().await.expect("invalid session json");

    assert_eq!(session["phase"], "complete");
    assert_eq!(session["score"], 3);
    assert_eq!(session["streak"], 0);
    assert_eq!(session["cursor"], 1);
    assert_eq!(session["transcript"].as_array().map(Vec::len), Some(2));
}

/// Scenario B: two questions scored 8 and 9; streak builds and the first
/// grading carries a devil's-advocate challenge.
#[tokio::test]
async fn test_two_question_session_with_streak() {
    let base = spawn_server(
        StubSource(sample_questions(2)),
        ScriptedEvaluator::new(&[8, 9]),
    )
    .await;
    let client = reqwest::Client::new();

    start_exam(&client, &base, "attention.pdf").await;

    let mid: serde_json::Value = submit(&client, &base, "A solid first answer.")
        .await
        .json()
        .await
        .expect("invalid session json");
    assert_eq!(mid["streak"], 1);
    assert_eq!(mid["phase"], "awaiting_response");
    let challenge = &mid["transcript"][1]["grading"]["devils_advocate_challenge"];
    assert!(challenge.is_string(), "upper-band grading should carry a challenge");

    let done: serde_json::Value = submit(&client, &base, "A solid second answer.")
        .await
        .json()
        .await
        .expect("invalid session json");
    assert_eq!(done["phase"], "complete");
    assert_eq!(done["score"], 17);
    assert_eq!(done["streak"], 2);
    assert_eq!(done["transcript"].as_array().map(Vec::len), Some(4));
}

/// Scenario C: a blank submission is rejected without changing state.
#[tokio::test]
async fn test_blank_submission_rejected() {
    let base = spawn_server(StubSource(sample_questions(1)), ScriptedEvaluator::new(&[5])).await;
    let client = reqwest::Client::new();

    start_exam(&client, &base, "attention.pdf").await;

    let response = submit(&client, &base, "   ").await;
    assert_eq!(response.status(), 422);
    let error: serde_json::Value = response.json().await.expect("invalid error json");
    assert_eq!(error["kind"], "invalid_input");

    let status: serde_json::Value = client
        .get(format!("{base}/api/exam"))
        .send()
        .await
        .expect("status request failed")
        .json()
        .await
        .expect("invalid status json");
    assert_eq!(status["session"]["phase"], "awaiting_response");
    assert_eq!(
        status["session"]["transcript"].as_array().map(Vec::len),
        Some(1)
    );
}

/// Scenario D: a broken evaluator degrades the turn to zero and the exam
/// still advances.
#[tokio::test]
async fn test_broken_evaluator_degrades_and_advances() {
    let base = spawn_server(StubSource(sample_questions(2)), BrokenEvaluator).await;
    let client = reqwest::Client::new();

    start_exam(&client, &base, "attention.pdf").await;
    let session: serde_json::Value = submit(&client, &base, "An honest attempt.")
        .await
        .json()
        .await
        .expect("invalid session json");

    let grading = &session["transcript"][1]["grading"];
    assert_eq!(grading["score"], 0);
    assert_eq!(grading["degraded"], true);
    assert_eq!(session["cursor"], 1);
    assert_eq!(session["phase"], "awaiting_response");
}

/// An unprocessable document never creates a session.
#[tokio::test]
async fn test_unprocessable_document_cannot_start() {
    let base = spawn_server(StubSource(Vec::new()), ScriptedEvaluator::new(&[])).await;
    let client = reqwest::Client::new();

    let response = start_exam(&client, &base, "garbage.bin").await;
    assert_eq!(response.status(), 422);
    let error: serde_json::Value = response.json().await.expect("invalid error json");
    assert_eq!(error["kind"], "document_unprocessable");

    let status: serde_json::Value = client
        .get(format!("{base}/api/exam"))
        .send()
        .await
        .expect("status request failed")
        .json()
        .await
        .expect("invalid status json");
    assert!(status["session"].is_null());
}

/// Retry discards progress and restarts from the same question set.
#[tokio::test]
async fn test_retry_resets_the_session() {
    let base = spawn_server(
        StubSource(sample_questions(2)),
        ScriptedEvaluator::new(&[8, 9, 10]),
    )
    .await;
    let client = reqwest::Client::new();

    start_exam(&client, &base, "attention.pdf").await;
    let graded: serde_json::Value = submit(&client, &base, "First answer.")
        .await
        .json()
        .await
        .expect("invalid session json");
    assert_eq!(graded["score"], 8);
    let old_id = graded["id"].as_str().expect("missing id").to_string();

    let response = client
        .post(format!("{base}/api/exam/retry"))
        .send()
        .await
        .expect("retry request failed");
    assert_eq!(response.status(), 200);
    let fresh: serde_json::Value = response.json().await.expect("invalid session json");

    assert_ne!(fresh["id"].as_str(), Some(old_id.as_str()));
    assert_eq!(fresh["score"], 0);
    assert_eq!(fresh["streak"], 0);
    assert_eq!(fresh["cursor"], 0);
    assert_eq!(fresh["phase"], "awaiting_response");
    assert_eq!(fresh["transcript"].as_array().map(Vec::len), Some(1));
}

/// Full session against the fixture script and the reference evaluator.
#[tokio::test]
async fn test_fixture_script_with_heuristic_evaluator() {
    let base = spawn_server(
        ScriptedQuestionSource::new(fixture_dir()),
        HeuristicEvaluator,
    )
    .await;
    let client = reqwest::Client::new();

    let response = start_exam(&client, &base, "transformer-paper.pdf").await;
    assert_eq!(response.status(), 200);
    let session: serde_json::Value = response.json().await.expect("invalid session json");
    assert_eq!(session["questions"].as_array().map(Vec::len), Some(5));
    assert_eq!(session["difficulty"], "easy");

    // Answer every question tersely; the heuristic grades each in the low band.
    let mut last = session;
    for _ in 0..5 {
        last = submit(&client, &base, "ok")
            .await
            .json()
            .await
            .expect("invalid session json");
    }

    assert_eq!(last["phase"], "complete");
    assert_eq!(last["score"], 15); // 5 questions x 3 points
    assert_eq!(last["transcript"].as_array().map(Vec::len), Some(10));
    // The analyzer groups by section, one subject per fixture question.
    // (Delivered via the session_complete event; here we just confirm the
    //  transcript shape held.)
}

/// A stale question source result cannot clobber a newer session: starting
/// twice concurrently leaves exactly one live session.
#[tokio::test]
async fn test_second_start_while_in_progress_conflicts() {
    let base = spawn_server(StubSource(sample_questions(1)), ScriptedEvaluator::new(&[9])).await;
    let client = reqwest::Client::new();

    start_exam(&client, &base, "attention.pdf").await;
    let response = start_exam(&client, &base, "attention.pdf").await;
    assert_eq!(response.status(), 422);
    let error: serde_json::Value = response.json().await.expect("invalid error json");
    assert_eq!(error["kind"], "invalid_input");
}

/// The report crate renders what the orchestrator produced.
#[tokio::test]
async fn test_report_built_from_completed_session() {
    let base = spawn_server(
        StubSource(sample_questions(2)),
        ScriptedEvaluator::new(&[9, 3]),
    )
    .await;
    let client = reqwest::Client::new();

    start_exam(&client, &base, "attention.pdf").await;
    submit(&client, &base, "First.").await;
    let session: serde_json::Value = submit(&client, &base, "Second.")
        .await
        .json()
        .await
        .expect("invalid session json");

    let report = viva_report::Report::builder()
        .document_name(session["document_ref"].as_str().unwrap_or_default())
        .total_questions(2)
        .outcome(viva_report::QuestionOutcome::new(
            "Question 1?",
            "easy",
            9,
            10,
            "Graded by the scripted evaluator.",
        ))
        .outcome(viva_report::QuestionOutcome::new(
            "Question 2?",
            "easy",
            3,
            10,
            "Graded by the scripted evaluator.",
        ))
        .build();

    assert_eq!(report.summary.final_score, 12);
    assert_eq!(u64::from(report.summary.final_score), session["score"].as_u64().unwrap_or(0));
    assert!(report.summary.verdict.passed);
    assert_eq!(report.gaps.len(), 1);
}

/// Analyzer adapter sanity: subjects derive from the fixture's sections.
#[tokio::test]
async fn test_transcript_analyzer_subjects() {
    let script = viva_orchestrator::ExamScript::load(&fixture_dir().join("transformer-paper.json"))
        .expect("fixture should load");
    let transcript: Vec<Turn> = script
        .questions
        .iter()
        .flat_map(|q| {
            vec![
                Turn::Examiner {
                    question: q.clone(),
                    issued_at: chrono::Utc::now(),
                },
                Turn::Student {
                    response_text: "answer".to_string(),
                    submitted_at: chrono::Utc::now(),
                    grading: Some(GradingResult::new(8, "Good.")),
                },
            ]
        })
        .collect();

    let breakdown: Vec<SubjectScore> = TranscriptAnalyzer.analyze(&transcript).await;
    assert_eq!(breakdown.len(), 5);
    assert!(breakdown.iter().all(|s| s.score == 80));
    assert!(breakdown.iter().any(|s| s.subject == "Introduction"));
    assert!(breakdown.iter().any(|s| s.subject == "Conclusion"));
}

/// The orchestrator's serialized session round-trips losslessly.
#[tokio::test]
async fn test_session_snapshot_roundtrip() {
    let orchestrator = ExamOrchestrator::new(
        Config::default(),
        Arc::new(StubSource(sample_questions(1))),
        Arc::new(ScriptedEvaluator::new(&[7])),
        Arc::new(TranscriptAnalyzer),
    );
    orchestrator
        .start("attention.pdf")
        .await
        .expect("start failed");
    orchestrator
        .submit_response("An answer.")
        .await
        .expect("submit failed");

    let snapshot = orchestrator.snapshot().await.expect("missing session");
    let json = serde_json::to_string(&snapshot).expect("serialize failed");
    let restored: viva_orchestrator::Session =
        serde_json::from_str(&json).expect("deserialize failed");
    assert_eq!(restored, snapshot);
}

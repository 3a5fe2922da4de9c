//! WebSocket integration tests for the session event stream.
//!
//! Connects a real WebSocket client to a spawned server and verifies the
//! event sequence a presentation layer would observe across a full session.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio_tungstenite::connect_async;
use tungstenite::Message;
use viva_orchestrator::{
    create_router, AppState, Config, Evaluator, ExamOrchestrator, GradingResult, Question,
    QuestionSource, Result as VivaResult, TranscriptAnalyzer, VivaError,
};

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

struct FixedEvaluator(u32);

#[async_trait]
impl Evaluator for FixedEvaluator {
    async fn evaluate(&self, question: &Question, _response_text: &str) -> VivaResult<GradingResult> {
        let mut result = GradingResult::new(self.0, "Graded.");
        if question.is_upper_band(self.0) {
            result = result.with_challenge("Defend it.");
        }
        Ok(result)
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

async fn spawn_server(questions: Vec<Question>, score: u32) -> SocketAddr {
    let orchestrator = ExamOrchestrator::new(
        Config::default(),
        Arc::new(StubSource(questions)),
        Arc::new(FixedEvaluator(score)),
        Arc::new(TranscriptAnalyzer),
    );
    let router = create_router(AppState::new(orchestrator));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind ephemeral port");
    let addr = listener.local_addr().expect("Failed to read local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// Reads the next JSON text frame, skipping pings, with a timeout.
async fn next_event(
    stream: &mut (impl StreamExt<Item = Result<Message, tungstenite::Error>> + Unpin),
) -> serde_json::Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("timed out waiting for event")
            .expect("stream ended unexpectedly")
            .expect("websocket error");
        match frame {
            Message::Text(text) => {
                return serde_json::from_str(&text).expect("invalid event json");
            }
            Message::Ping(_) | Message::Pong(_) => {}
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_connected_event_carries_snapshot() {
    let addr = spawn_server(sample_questions(1), 8).await;

    let (mut stream, _) = connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("ws connect failed");

    let connected = next_event(&mut stream).await;
    assert_eq!(connected["event"], "connected");
    assert!(connected["payload"]["session"].is_null());
}

#[tokio::test]
async fn test_event_sequence_for_full_session() {
    let addr = spawn_server(sample_questions(1), 9).await;
    let client = reqwest::Client::new();

    let (mut stream, _) = connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("ws connect failed");
    let connected = next_event(&mut stream).await;
    assert_eq!(connected["event"], "connected");

    // Drive the exam over HTTP while observing events over the socket.
    client
        .post(format!("http://{addr}/api/exam/start"))
        .json(&serde_json::json!({"documentRef": "attention.pdf"}))
        .send()
        .await
        .expect("start failed");

    let examiner_turn = next_event(&mut stream).await;
    assert_eq!(examiner_turn["event"], "turn_added");
    assert_eq!(examiner_turn["payload"]["turn"]["role"], "examiner");
    assert_eq!(examiner_turn["payload"]["phase"], "awaiting_response");

    client
        .post(format!("http://{addr}/api/exam/response"))
        .json(&serde_json::json!({"text": "A final answer."}))
        .send()
        .await
        .expect("submit failed");

    let student_turn = next_event(&mut stream).await;
    assert_eq!(student_turn["event"], "turn_added");
    assert_eq!(student_turn["payload"]["turn"]["role"], "student");
    assert_eq!(student_turn["payload"]["phase"], "grading");

    let grading = next_event(&mut stream).await;
    assert_eq!(grading["event"], "grading_applied");
    assert_eq!(grading["payload"]["grading"]["score"], 9);
    assert_eq!(grading["payload"]["maxScore"], 10);
    assert_eq!(grading["payload"]["streak"], 1);

    let complete = next_event(&mut stream).await;
    assert_eq!(complete["event"], "session_complete");
    assert_eq!(complete["payload"]["finalScore"], 9);
    assert_eq!(complete["payload"]["maxScore"], 10);
    let breakdown = complete["payload"]["breakdown"]
        .as_array()
        .expect("breakdown should be an array");
    assert_eq!(breakdown.len(), 1);
    assert_eq!(breakdown[0]["subject"], "Introduction");
    assert_eq!(breakdown[0]["score"], 90);
}

#[tokio::test]
async fn test_second_client_sees_current_snapshot() {
    let addr = spawn_server(sample_questions(2), 8).await;
    let client = reqwest::Client::new();

    client
        .post(format!("http://{addr}/api/exam/start"))
        .json(&serde_json::json!({"documentRef": "attention.pdf"}))
        .send()
        .await
        .expect("start failed");

    // A client that connects mid-session receives the live snapshot.
    let (mut stream, _) = connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("ws connect failed");
    let connected = next_event(&mut stream).await;
    assert_eq!(connected["event"], "connected");
    let session = &connected["payload"]["session"];
    assert_eq!(session["phase"], "awaiting_response");
    assert_eq!(session["document_ref"], "attention.pdf");
    assert_eq!(session["transcript"].as_array().map(Vec::len), Some(1));
}

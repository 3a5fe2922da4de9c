//! Contracts for the orchestrator's external collaborators.
//!
//! The orchestrator never derives questions, grades responses, or analyzes
//! competencies itself. Each of those concerns is an async capability behind
//! an object-safe trait so that rule-based, model-based, or remote services
//! can be substituted without touching the state machine. Reference
//! implementations live in [`crate::adapters`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::session::{GradingResult, Question, Turn};

/// Score for one competency subject, on a 0-100 scale.
///
/// The sequence of subject scores forms the radar-style breakdown delivered
/// with the completion event and the post-exam report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectScore {
    /// Name of the competency subject.
    pub subject: String,
    /// Achieved score in `[0, 100]`.
    pub score: u8,
    /// Upper bound of the scale, always 100.
    pub full_mark: u8,
}

impl SubjectScore {
    /// Creates a subject score on the standard 0-100 scale.
    #[must_use]
    pub fn new(subject: impl Into<String>, score: u8) -> Self {
        Self {
            subject: subject.into(),
            score: score.min(100),
            full_mark: 100,
        }
    }
}

/// Supplies the ordered question set for a document.
///
/// # Errors
///
/// Implementations fail with [`crate::VivaError::DocumentUnprocessable`] when
/// no questions can be derived; an empty question set is a failure, never a
/// valid result.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Derives the ordered, non-empty question set for `document_ref`.
    async fn questions_for(&self, document_ref: &str) -> Result<Vec<Question>>;
}

/// Scores a student response against a question.
///
/// # Contract
///
/// - `response_text` is non-empty (the state machine rejects blank input
///   before evaluation is ever invoked).
/// - The returned score is within `[0, question.max_points]` and the feedback
///   is non-empty.
/// - A devil's-advocate challenge is present only for upper-band scores
///   (at least 8/10 of the maximum).
///
/// # Errors
///
/// Implementations fail with [`crate::VivaError::EvaluationUnavailable`];
/// the orchestrator retries up to a bounded count and then degrades the turn
/// to a zero score so the examination always terminates.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Evaluates `response_text` as an answer to `question`.
    async fn evaluate(&self, question: &Question, response_text: &str) -> Result<GradingResult>;
}

/// Produces the per-subject competency breakdown for a finished session.
///
/// Invoked exactly once, when the session enters its terminal phase, with
/// the full transcript. Infallible by contract: implementations degrade to
/// an empty breakdown rather than failing the exam.
#[async_trait]
pub trait CompetencyAnalyzer: Send + Sync {
    /// Analyzes the full transcript of a completed session.
    async fn analyze(&self, transcript: &[Turn]) -> Vec<SubjectScore>;
}

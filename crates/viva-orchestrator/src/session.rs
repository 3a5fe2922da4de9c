//! Session state types for the Viva exam orchestrator.
//!
//! This module defines the examination data model and the synchronous state
//! machine transitions, including the transcript, score/streak aggregation,
//! and the phase lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VivaError};
use crate::policy::DifficultyPolicy;

/// Default maximum points awarded for a question.
const fn default_max_points() -> u32 {
    10
}

// ============================================================================
// DifficultyLevel
// ============================================================================

/// Difficulty tag attached to a question and mirrored on the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DifficultyLevel {
    /// Foundational recall and explanation questions.
    #[default]
    #[serde(rename = "easy")]
    Easy,
    /// Analysis and trade-off questions.
    #[serde(rename = "hard")]
    Hard,
    /// Adversarial rebuttal questions.
    #[serde(rename = "devils-advocate")]
    DevilsAdvocate,
}

impl DifficultyLevel {
    /// Returns the next level up, saturating at `DevilsAdvocate`.
    #[must_use]
    pub const fn escalate(self) -> Self {
        match self {
            Self::Easy => Self::Hard,
            Self::Hard | Self::DevilsAdvocate => Self::DevilsAdvocate,
        }
    }

    /// Returns the next level down, saturating at `Easy`.
    #[must_use]
    pub const fn ease(self) -> Self {
        match self {
            Self::Easy | Self::Hard => Self::Easy,
            Self::DevilsAdvocate => Self::Hard,
        }
    }

    /// Returns a human-readable name for the level.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Easy => "Easy",
            Self::Hard => "Hard",
            Self::DevilsAdvocate => "Devil's Advocate",
        }
    }
}

impl std::fmt::Display for DifficultyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// ============================================================================
// Question
// ============================================================================

/// Location of the material a question was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReference {
    /// Page number in the source document.
    pub page: u32,
    /// Section heading in the source document.
    pub section: String,
}

/// A single examiner question. Immutable once the session starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// The question text put to the student.
    pub text: String,

    /// Declared difficulty of the question.
    pub difficulty: DifficultyLevel,

    /// Where in the document the question comes from, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceReference>,

    /// Maximum points an answer can earn.
    #[serde(default = "default_max_points")]
    pub max_points: u32,
}

impl Question {
    /// Creates a question with the default maximum points.
    #[must_use]
    pub fn new(text: impl Into<String>, difficulty: DifficultyLevel) -> Self {
        Self {
            text: text.into(),
            difficulty,
            source: None,
            max_points: default_max_points(),
        }
    }

    /// Attaches a source reference.
    #[must_use]
    pub fn with_source(mut self, page: u32, section: impl Into<String>) -> Self {
        self.source = Some(SourceReference {
            page,
            section: section.into(),
        });
        self
    }

    /// Overrides the maximum points.
    #[must_use]
    pub const fn with_max_points(mut self, max_points: u32) -> Self {
        self.max_points = max_points;
        self
    }

    /// Returns `true` if `score` meets the pass threshold (7/10 of maximum).
    ///
    /// Pure integer arithmetic so the threshold stays correct for any
    /// `max_points`, not just a 10-point scale.
    #[must_use]
    pub const fn is_passing(&self, score: u32) -> bool {
        score * 10 >= self.max_points * 7
    }

    /// Returns `true` if `score` lands in the upper band (8/10 of maximum),
    /// the band in which a devil's-advocate challenge is surfaced.
    #[must_use]
    pub const fn is_upper_band(&self, score: u32) -> bool {
        score * 10 >= self.max_points * 8
    }
}

// ============================================================================
// GradingResult
// ============================================================================

/// Outcome of evaluating one student response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradingResult {
    /// Points awarded, in `[0, question.max_points]`.
    pub score: u32,

    /// Examiner feedback on the response.
    pub feedback: String,

    /// Follow-up rebuttal, present only for upper-band scores.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devils_advocate_challenge: Option<String>,

    /// Set when this result is a zero-score fallback after the evaluator
    /// failed repeatedly, so the presentation layer can flag degraded grading.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
}

impl GradingResult {
    /// Creates a grading result with the given score and feedback.
    #[must_use]
    pub fn new(score: u32, feedback: impl Into<String>) -> Self {
        Self {
            score,
            feedback: feedback.into(),
            devils_advocate_challenge: None,
            degraded: false,
        }
    }

    /// Attaches a devil's-advocate challenge.
    #[must_use]
    pub fn with_challenge(mut self, challenge: impl Into<String>) -> Self {
        self.devils_advocate_challenge = Some(challenge.into());
        self
    }

    /// Creates the zero-score fallback used when the evaluator stays
    /// unavailable past the retry bound.
    #[must_use]
    pub fn degraded(reason: impl std::fmt::Display) -> Self {
        Self {
            score: 0,
            feedback: format!(
                "Automatic grading was unavailable for this response ({reason}). \
                 The turn is scored 0 and the examination continues."
            ),
            devils_advocate_challenge: None,
            degraded: true,
        }
    }
}

// ============================================================================
// Turn
// ============================================================================

/// One transcript entry: an examiner question or a student response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Turn {
    /// The examiner poses a question.
    Examiner {
        /// The question as asked.
        question: Question,
        /// When the question was issued.
        issued_at: DateTime<Utc>,
    },
    /// The student answers the most recent question.
    Student {
        /// The free-text response. Never empty.
        response_text: String,
        /// When the response was submitted.
        submitted_at: DateTime<Utc>,
        /// Grading outcome, attached once evaluation resolves.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        grading: Option<GradingResult>,
    },
}

impl Turn {
    /// Returns `true` for an examiner turn.
    #[must_use]
    pub const fn is_examiner(&self) -> bool {
        matches!(self, Self::Examiner { .. })
    }

    /// Returns `true` for a student turn.
    #[must_use]
    pub const fn is_student(&self) -> bool {
        matches!(self, Self::Student { .. })
    }

    /// Returns the grading attached to a student turn, if any.
    #[must_use]
    pub const fn grading(&self) -> Option<&GradingResult> {
        match self {
            Self::Student { grading, .. } => grading.as_ref(),
            Self::Examiner { .. } => None,
        }
    }

    /// Returns the question carried by an examiner turn, if any.
    #[must_use]
    pub const fn question(&self) -> Option<&Question> {
        match self {
            Self::Examiner { question, .. } => Some(question),
            Self::Student { .. } => None,
        }
    }
}

// ============================================================================
// ExamPhase
// ============================================================================

/// Lifecycle phase of an examination session.
///
/// The phase transitions through these states:
/// - `Idle` -> `AwaitingQuestion` -> `AwaitingResponse` -> `Grading`
///   -> `Advancing` -> `AwaitingQuestion` | `Complete`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamPhase {
    /// Session created, question set not yet confirmed.
    #[default]
    Idle,
    /// The next question is about to be issued.
    AwaitingQuestion,
    /// A question is on the table; waiting for the student.
    AwaitingResponse,
    /// A response is pending evaluation.
    Grading,
    /// Grading applied; deciding whether to continue or finish.
    Advancing,
    /// All questions answered and graded. The session is immutable.
    Complete,
}

impl ExamPhase {
    /// Returns `true` if this phase is terminal.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Returns `true` if the session accepts a student response.
    #[must_use]
    pub const fn accepts_response(&self) -> bool {
        matches!(self, Self::AwaitingResponse)
    }
}

impl std::fmt::Display for ExamPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::AwaitingQuestion => "awaiting_question",
            Self::AwaitingResponse => "awaiting_response",
            Self::Grading => "grading",
            Self::Advancing => "advancing",
            Self::Complete => "complete",
        };
        write!(f, "{name}")
    }
}

// ============================================================================
// GradingTicket
// ============================================================================

/// Proof that a grading result belongs to a specific pending turn.
///
/// Minted by [`Session::submit_response`] and required by
/// [`Session::apply_grading`]. A retried or replaced session carries a fresh
/// id, so tickets from an abandoned session can never mutate the new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradingTicket {
    /// Id of the session the pending turn belongs to.
    pub session_id: String,
    /// Transcript index of the pending student turn.
    pub turn_index: usize,
}

// ============================================================================
// Session
// ============================================================================

/// One examination attempt, from question set to verdict.
///
/// The session is mutated exclusively through its transition methods; every
/// method checks the current phase and rejects out-of-order events without
/// changing state. Serializes losslessly for snapshot consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque session identifier.
    pub id: String,

    /// Name/handle of the document under examination. Content is external.
    pub document_ref: String,

    /// Ordered question set, fixed for the session's lifetime.
    pub questions: Vec<Question>,

    /// Append-only alternating transcript of examiner and student turns.
    pub transcript: Vec<Turn>,

    /// Index of the question currently being asked. Monotonically increasing;
    /// equals `questions.len()` exactly when the session is complete.
    pub cursor: usize,

    /// Running sum of awarded points. Only ever accumulated.
    pub score: u32,

    /// Count of consecutive passing-grade turns.
    pub streak: u32,

    /// Current difficulty, mirroring the active question's tag under the
    /// fixed-sequence policy.
    pub difficulty: DifficultyLevel,

    /// Current lifecycle phase.
    pub phase: ExamPhase,

    /// When the session was created.
    pub started_at: DateTime<Utc>,

    /// When the session state last changed.
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Creates a new session in the `Idle` phase.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        document_ref: impl Into<String>,
        questions: Vec<Question>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            document_ref: document_ref.into(),
            questions,
            transcript: Vec::new(),
            cursor: 0,
            score: 0,
            streak: 0,
            difficulty: DifficultyLevel::default(),
            phase: ExamPhase::Idle,
            started_at: now,
            updated_at: now,
        }
    }

    /// Builds a fresh session from the same document and question set, with
    /// zeroed counters and a new id. Used by retry: a completed (or abandoned)
    /// session is never mutated, it is replaced.
    #[must_use]
    pub fn retry(&self, new_id: impl Into<String>) -> Self {
        Self::new(new_id, self.document_ref.clone(), self.questions.clone())
    }

    /// Confirms the question set and leaves `Idle`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` when not in `Idle`, and `InvalidInput`
    /// when the question set is empty (no session may start without at least
    /// one question).
    pub fn ready(&mut self) -> Result<()> {
        if self.phase != ExamPhase::Idle {
            return Err(VivaError::invalid_transition(
                self.phase,
                ExamPhase::AwaitingQuestion,
            ));
        }
        if self.questions.is_empty() {
            return Err(VivaError::invalid_input(
                "cannot start a session with an empty question set",
            ));
        }
        self.cursor = 0;
        self.phase = ExamPhase::AwaitingQuestion;
        self.touch();
        Ok(())
    }

    /// Appends the examiner turn for the question under the cursor and sets
    /// the session difficulty through the given policy.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` when not in `AwaitingQuestion`.
    pub fn issue_question(&mut self, policy: &DifficultyPolicy) -> Result<()> {
        if self.phase != ExamPhase::AwaitingQuestion {
            return Err(VivaError::invalid_transition(
                self.phase,
                ExamPhase::AwaitingResponse,
            ));
        }
        let question = match self.questions.get(self.cursor) {
            Some(q) => q.clone(),
            None => {
                return Err(VivaError::invalid_transition(
                    self.phase,
                    ExamPhase::AwaitingResponse,
                ));
            }
        };
        self.difficulty = policy.select(self, &question);
        self.transcript.push(Turn::Examiner {
            question,
            issued_at: Utc::now(),
        });
        self.phase = ExamPhase::AwaitingResponse;
        self.touch();
        Ok(())
    }

    /// Records a student response and mints the grading ticket for it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for blank text or when no response is currently
    /// accepted (double submission, submission after completion). State is
    /// unchanged on error.
    pub fn submit_response(&mut self, text: &str) -> Result<GradingTicket> {
        if !self.phase.accepts_response() {
            return Err(VivaError::invalid_input(format!(
                "cannot submit a response while the session is {}",
                self.phase
            )));
        }
        if text.trim().is_empty() {
            return Err(VivaError::invalid_input("response text is empty"));
        }
        self.transcript.push(Turn::Student {
            response_text: text.to_string(),
            submitted_at: Utc::now(),
            grading: None,
        });
        self.phase = ExamPhase::Grading;
        self.touch();
        Ok(GradingTicket {
            session_id: self.id.clone(),
            turn_index: self.transcript.len() - 1,
        })
    }

    /// Attaches a grading result to the pending student turn and updates the
    /// score and streak aggregates.
    ///
    /// # Errors
    ///
    /// Returns `StaleResult` when the ticket does not match the pending turn
    /// (late evaluator response after advance/retry, or duplicate delivery)
    /// and `GradingOutOfRange` when the score exceeds the question's maximum.
    /// State is unchanged on error.
    pub fn apply_grading(&mut self, ticket: &GradingTicket, result: GradingResult) -> Result<()> {
        if ticket.session_id != self.id {
            return Err(VivaError::stale_result(
                ticket.session_id.clone(),
                ticket.turn_index,
                "ticket was minted for a different session",
            ));
        }
        if self.phase != ExamPhase::Grading {
            return Err(VivaError::stale_result(
                ticket.session_id.clone(),
                ticket.turn_index,
                format!("session is {}, not awaiting a grading result", self.phase),
            ));
        }
        if ticket.turn_index + 1 != self.transcript.len() {
            return Err(VivaError::stale_result(
                ticket.session_id.clone(),
                ticket.turn_index,
                "the transcript has moved past this turn",
            ));
        }

        let max_points = self
            .questions
            .get(self.cursor)
            .map_or(default_max_points(), |q| q.max_points);
        if result.score > max_points {
            return Err(VivaError::GradingOutOfRange {
                score: result.score,
                max_points,
            });
        }
        let passing = self
            .questions
            .get(self.cursor)
            .is_some_and(|q| q.is_passing(result.score));

        match self.transcript.last_mut() {
            Some(Turn::Student { grading, .. }) if grading.is_none() => {
                self.score += result.score;
                self.streak = if passing { self.streak + 1 } else { 0 };
                *grading = Some(result);
            }
            _ => {
                return Err(VivaError::stale_result(
                    ticket.session_id.clone(),
                    ticket.turn_index,
                    "the pending turn is not an ungraded student turn",
                ));
            }
        }

        self.phase = ExamPhase::Advancing;
        self.touch();
        Ok(())
    }

    /// Moves past the graded question: on to the next one, or into
    /// `Complete` when the question set is exhausted.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` when not in `Advancing`.
    pub fn advance(&mut self) -> Result<ExamPhase> {
        if self.phase != ExamPhase::Advancing {
            return Err(VivaError::invalid_transition(
                self.phase,
                ExamPhase::AwaitingQuestion,
            ));
        }
        if self.cursor + 1 < self.questions.len() {
            self.cursor += 1;
            self.phase = ExamPhase::AwaitingQuestion;
        } else {
            self.cursor = self.questions.len();
            self.phase = ExamPhase::Complete;
        }
        self.touch();
        Ok(self.phase)
    }

    /// The question currently under the cursor, if the session is not
    /// complete.
    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.cursor)
    }

    /// Sum of maximum points across all questions.
    #[must_use]
    pub fn max_score(&self) -> u32 {
        self.questions.iter().map(|q| q.max_points).sum()
    }

    /// Number of questions in the session.
    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    /// Number of student turns that have been graded so far.
    #[must_use]
    pub fn answered_questions(&self) -> usize {
        self.transcript
            .iter()
            .filter(|t| t.grading().is_some())
            .count()
    }

    /// Returns `true` once every question is answered and graded.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Score and maximum points of the most recently graded turn, if any.
    ///
    /// Walks the transcript backwards pairing each student turn with the
    /// examiner turn that precedes it.
    #[must_use]
    pub fn last_graded_outcome(&self) -> Option<(u32, u32)> {
        for (index, turn) in self.transcript.iter().enumerate().rev() {
            if let Some(grading) = turn.grading() {
                let max_points = self.transcript[..index]
                    .iter()
                    .rev()
                    .find_map(Turn::question)
                    .map_or(default_max_points(), |q| q.max_points);
                return Some((grading.score, max_points));
            }
        }
        None
    }

    /// Updates the `updated_at` timestamp to the current time.
    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// ============================================================================
// Tests
// ============================================================================

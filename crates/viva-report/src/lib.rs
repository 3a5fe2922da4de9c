//! Viva Report Generation
//!
//! This crate provides types and utilities for generating post-exam verdict
//! reports. Reports can be serialized to JSON for programmatic access or
//! rendered to Markdown for human consumption.
//!
//! # Types
//!
//! - [`Report`] - The complete report structure for one finished session
//! - [`ReportSummary`] - Verdict and headline numbers
//! - [`Verdict`] / [`Grade`] - Pass mark and letter-grade banding
//! - [`QuestionOutcome`] - Per-question score and feedback
//! - [`SubjectRating`] - One competency subject on a 0-100 scale
//! - [`LogicalGap`] - A weakness surfaced by a low-scoring turn
//!
//! # Generators
//!
//! - [`json::JsonGenerator`] - Generate JSON reports with compact or pretty formatting
//! - [`MarkdownGenerator`] - Generate human-readable Markdown reports
//!
//! # Example
//!
//! ```rust
//! use viva_report::{Report, QuestionOutcome, SubjectRating};
//!
//! let report = Report::builder()
//!     .document_name("attention.pdf")
//!     .total_questions(2)
//!     .outcome(QuestionOutcome::new("What is self-attention?", "easy", 9, 10, "Excellent."))
//!     .outcome(QuestionOutcome::new("Why multi-head?", "hard", 8, 10, "Good."))
//!     .subject(SubjectRating::new("Fundamentals", 85))
//!     .build();
//!
//! assert_eq!(report.summary.final_score, 17);
//! assert!(report.summary.verdict.passed);
//! ```

pub mod json;
mod markdown;

pub use markdown::MarkdownGenerator;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during report generation.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Failed to serialize the report to JSON.
    #[error("failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failed to read or write report files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid report data.
    #[error("invalid report data: {0}")]
    InvalidData(String),
}

/// Result type for report operations.
pub type Result<T> = std::result::Result<T, ReportError>;

// ============================================================================
// Verdict and Grade
// ============================================================================

/// Overall percentage below which the examination is failed.
pub const PASS_MARK_PERCENT: u8 = 60;

/// Letter grade banding over the overall percentage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    /// 90% and above.
    #[serde(rename = "A+")]
    APlus,
    /// 80% and above.
    #[serde(rename = "A")]
    A,
    /// 70% and above.
    #[serde(rename = "B")]
    B,
    /// 60% and above.
    #[serde(rename = "C")]
    C,
    /// 50% and above.
    #[serde(rename = "D")]
    D,
    /// Below 50%.
    #[default]
    #[serde(rename = "F")]
    F,
}

impl Grade {
    /// Assigns the letter grade for an overall percentage.
    #[must_use]
    pub const fn from_percentage(percentage: u8) -> Self {
        match percentage {
            90..=u8::MAX => Self::APlus,
            80..=89 => Self::A,
            70..=79 => Self::B,
            60..=69 => Self::C,
            50..=59 => Self::D,
            _ => Self::F,
        }
    }

    /// The letter shown on the verdict card.
    #[must_use]
    pub const fn letter(&self) -> &'static str {
        match self {
            Self::APlus => "A+",
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        }
    }

    /// The descriptive label paired with the letter.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::APlus => "Exceptional",
            Self::A => "Excellent",
            Self::B => "Good",
            Self::C => "Satisfactory",
            Self::D => "Needs Improvement",
            Self::F => "Failed",
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Final verdict over a finished examination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Overall percentage, rounded half up.
    pub percentage: u8,
    /// Letter grade for the percentage.
    pub grade: Grade,
    /// Whether the percentage reaches the pass mark.
    pub passed: bool,
}

impl Verdict {
    /// Computes the verdict from a final and maximum score.
    ///
    /// A zero maximum (no gradable questions) yields 0% and a fail.
    #[must_use]
    pub const fn from_scores(final_score: u32, max_score: u32) -> Self {
        let percentage = if max_score == 0 {
            0
        } else {
            let pct = (final_score * 100 + max_score / 2) / max_score;
            if pct > 100 {
                100
            } else {
                pct
            }
        };
        #[allow(clippy::cast_possible_truncation)]
        let percentage = percentage as u8;
        Self {
            percentage,
            grade: Grade::from_percentage(percentage),
            passed: percentage >= PASS_MARK_PERCENT,
        }
    }
}

// ============================================================================
// Report Components
// ============================================================================

/// Score for one competency subject, on a 0-100 scale.
///
/// This is a local copy of the orchestrator's subject-score shape to avoid a
/// cross-crate dependency; the CLI converts between the two.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRating {
    /// Name of the competency subject.
    pub subject: String,
    /// Achieved score in `[0, 100]`.
    pub score: u8,
    /// Upper bound of the scale, always 100.
    pub full_mark: u8,
}

impl SubjectRating {
    /// Creates a rating on the standard 0-100 scale.
    #[must_use]
    pub fn new(subject: impl Into<String>, score: u8) -> Self {
        Self {
            subject: subject.into(),
            score: score.min(100),
            full_mark: 100,
        }
    }
}

/// Outcome of one examined question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOutcome {
    /// The question as asked.
    pub question: String,
    /// Difficulty tag of the question.
    pub difficulty: String,
    /// Points awarded.
    pub score: u32,
    /// Maximum points available.
    pub max_points: u32,
    /// Whether the score reached the pass threshold (7/10 of maximum).
    pub passed: bool,
    /// Examiner feedback on the response.
    pub feedback: String,
}

impl QuestionOutcome {
    /// Creates an outcome, deriving the pass flag from the scores.
    #[must_use]
    pub fn new(
        question: impl Into<String>,
        difficulty: impl Into<String>,
        score: u32,
        max_points: u32,
        feedback: impl Into<String>,
    ) -> Self {
        Self {
            question: question.into(),
            difficulty: difficulty.into(),
            score,
            max_points,
            passed: score * 10 >= max_points * 7,
            feedback: feedback.into(),
        }
    }

    /// Achieved percentage for this question.
    #[must_use]
    pub const fn percentage(&self) -> u32 {
        if self.max_points == 0 {
            0
        } else {
            self.score * 100 / self.max_points
        }
    }
}

/// Severity of a logical gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapSeverity {
    /// Minor weakness: the turn fell just short of the pass threshold.
    Low,
    /// Clear weakness: under 60% on the turn.
    Medium,
    /// Fundamental weakness: under 40% on the turn.
    High,
}

/// A weakness surfaced by a low-scoring turn.
///
/// Gaps are derived from question outcomes: any turn below the pass
/// threshold produces a gap whose severity tracks how far short it fell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalGap {
    /// The question whose answer exposed the gap.
    pub question: String,
    /// The examiner feedback describing the weakness.
    pub description: String,
    /// How serious the gap is.
    pub severity: GapSeverity,
}

impl LogicalGap {
    /// Derives a gap from an outcome, if the turn fell below the pass
    /// threshold.
    #[must_use]
    pub fn from_outcome(outcome: &QuestionOutcome) -> Option<Self> {
        let percentage = outcome.percentage();
        let severity = if percentage < 40 {
            GapSeverity::High
        } else if percentage < 60 {
            GapSeverity::Medium
        } else if percentage < 70 {
            GapSeverity::Low
        } else {
            return None;
        };
        Some(Self {
            question: outcome.question.clone(),
            description: outcome.feedback.clone(),
            severity,
        })
    }
}

/// Gap counts by severity level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GapCounts {
    /// Number of high-severity gaps.
    pub high: usize,
    /// Number of medium-severity gaps.
    pub medium: usize,
    /// Number of low-severity gaps.
    pub low: usize,
}

impl GapCounts {
    /// Returns the total number of gaps.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.high + self.medium + self.low
    }
}

// ============================================================================
// Report
// ============================================================================

/// Verdict and headline numbers for a finished examination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// The computed verdict.
    pub verdict: Verdict,
    /// Final accumulated score.
    pub final_score: u32,
    /// Maximum attainable score.
    pub max_score: u32,
    /// Questions answered and graded.
    pub questions_answered: usize,
    /// Questions in the examination.
    pub total_questions: usize,
}

/// Complete post-exam report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// Name of the examined document.
    pub document_name: String,

    /// Verdict and headline numbers.
    pub summary: ReportSummary,

    /// Per-question outcomes in examination order.
    pub outcomes: Vec<QuestionOutcome>,

    /// Competency breakdown (radar data).
    pub breakdown: Vec<SubjectRating>,

    /// Logical gaps derived from sub-threshold turns.
    pub gaps: Vec<LogicalGap>,
}

impl Report {
    /// Creates a new report builder.
    #[must_use]
    pub fn builder() -> ReportBuilder {
        ReportBuilder::default()
    }

    /// Serializes the report to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::Serialization` if JSON serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(ReportError::from)
    }

    /// Returns the number of gaps by severity.
    #[must_use]
    pub fn gap_counts(&self) -> GapCounts {
        let mut counts = GapCounts::default();
        for gap in &self.gaps {
            match gap.severity {
                GapSeverity::High => counts.high += 1,
                GapSeverity::Medium => counts.medium += 1,
                GapSeverity::Low => counts.low += 1,
            }
        }
        counts
    }

    /// Returns `true` if the report contains any high-severity gaps.
    #[must_use]
    pub fn has_high_gaps(&self) -> bool {
        self.gaps.iter().any(|g| g.severity == GapSeverity::High)
    }
}

// ============================================================================
// ReportBuilder
// ============================================================================

/// Builder for constructing [`Report`] instances.
///
/// The summary (scores, verdict) and the gap list are derived from the
/// accumulated outcomes at build time.
#[derive(Debug, Clone, Default)]
pub struct ReportBuilder {
    document_name: Option<String>,
    total_questions: Option<usize>,
    outcomes: Vec<QuestionOutcome>,
    breakdown: Vec<SubjectRating>,
}

impl ReportBuilder {
    /// Sets the examined document's name.
    #[must_use]
    pub fn document_name(mut self, name: impl Into<String>) -> Self {
        self.document_name = Some(name.into());
        self
    }

    /// Sets the total question count. Defaults to the number of outcomes.
    #[must_use]
    pub const fn total_questions(mut self, total: usize) -> Self {
        self.total_questions = Some(total);
        self
    }

    /// Adds a question outcome.
    #[must_use]
    pub fn outcome(mut self, outcome: QuestionOutcome) -> Self {
        self.outcomes.push(outcome);
        self
    }

    /// Sets all outcomes at once.
    #[must_use]
    pub fn outcomes(mut self, outcomes: Vec<QuestionOutcome>) -> Self {
        self.outcomes = outcomes;
        self
    }

    /// Adds a competency subject rating.
    #[must_use]
    pub fn subject(mut self, rating: SubjectRating) -> Self {
        self.breakdown.push(rating);
        self
    }

    /// Sets the whole competency breakdown at once.
    #[must_use]
    pub fn breakdown(mut self, breakdown: Vec<SubjectRating>) -> Self {
        self.breakdown = breakdown;
        self
    }

    /// Builds the report, deriving summary and gaps from the outcomes.
    #[must_use]
    pub fn build(self) -> Report {
        let final_score: u32 = self.outcomes.iter().map(|o| o.score).sum();
        let max_score: u32 = self.outcomes.iter().map(|o| o.max_points).sum();
        let questions_answered = self.outcomes.len();
        let total_questions = self.total_questions.unwrap_or(questions_answered);
        let gaps = self
            .outcomes
            .iter()
            .filter_map(LogicalGap::from_outcome)
            .collect();

        Report {
            document_name: self.document_name.unwrap_or_default(),
            summary: ReportSummary {
                verdict: Verdict::from_scores(final_score, max_score),
                final_score,
                max_score,
                questions_answered,
                total_questions,
            },
            outcomes: self.outcomes,
            breakdown: self.breakdown,
            gaps,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

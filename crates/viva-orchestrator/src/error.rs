//! Error types for the Viva exam orchestrator.
//!
//! This module defines the error hierarchy for all orchestrator operations,
//! including configuration loading, exam-script loading, state transitions,
//! and collaborator failures.

use std::path::PathBuf;

/// A specialized `Result` type for Viva orchestrator operations.
pub type Result<T> = std::result::Result<T, VivaError>;

/// Errors that can occur while running an examination session.
///
/// Error variants are organized by subsystem and include actionable
/// suggestions where possible to help users resolve issues.
#[derive(Debug, thiserror::Error)]
pub enum VivaError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your viva.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Session Creation Errors
    // ========================================================================
    /// No question set could be derived for the document.
    ///
    /// Fatal to session creation: no partial session is produced and the
    /// orchestrator never leaves the idle state.
    #[error("Cannot derive questions for '{document}': {reason}\n\nSuggestion: Check that an exam script exists for this document and contains at least one question")]
    DocumentUnprocessable {
        /// The document reference that could not be processed.
        document: String,
        /// Why no questions could be derived.
        reason: String,
    },

    // ========================================================================
    // User Input Errors
    // ========================================================================
    /// The submitted input was rejected without changing session state.
    ///
    /// Covers empty responses, double submission, and commands issued in a
    /// phase that does not accept them. Recoverable: the caller re-prompts.
    #[error("Invalid input: {reason}")]
    InvalidInput {
        /// Why the input was rejected.
        reason: String,
    },

    // ========================================================================
    // Grading Errors
    // ========================================================================
    /// A grading result arrived for a turn that is no longer pending.
    ///
    /// Defends against a slow evaluator call resolving after the session has
    /// advanced, been retried, or been discarded. The result is dropped
    /// without mutating state.
    #[error("Stale grading result for session '{session_id}' turn {turn_index}: {reason}")]
    StaleResult {
        /// The session the result was minted for.
        session_id: String,
        /// The transcript turn the result was minted for.
        turn_index: usize,
        /// Why the result no longer applies.
        reason: String,
    },

    /// The evaluator collaborator failed or timed out.
    ///
    /// Transient: the orchestrator retries up to a bounded count and then
    /// falls back to a degraded zero-score turn so the exam still terminates.
    #[error("Evaluator unavailable: {message}\n\nSuggestion: Check the grading service; after retry exhaustion the turn is scored 0 and the exam continues")]
    EvaluationUnavailable {
        /// Description of the failure.
        message: String,
    },

    /// An evaluator returned a score outside `[0, max_points]`.
    #[error("Grading score {score} exceeds the question's maximum of {max_points}")]
    GradingOutOfRange {
        /// The offending score.
        score: u32,
        /// The maximum points the question allows.
        max_points: u32,
    },

    // ========================================================================
    // State Machine Errors
    // ========================================================================
    /// Invalid state transition attempted.
    #[error("Invalid state transition: cannot go from {from} to {to}")]
    InvalidTransition {
        /// The current phase.
        from: String,
        /// The attempted target phase.
        to: String,
    },

    // ========================================================================
    // General I/O Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VivaError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `DocumentUnprocessable` error.
    #[must_use]
    pub fn document_unprocessable(document: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DocumentUnprocessable {
            document: document.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new `InvalidInput` error.
    #[must_use]
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Creates a new `StaleResult` error.
    #[must_use]
    pub fn stale_result(
        session_id: impl Into<String>,
        turn_index: usize,
        reason: impl Into<String>,
    ) -> Self {
        Self::StaleResult {
            session_id: session_id.into(),
            turn_index,
            reason: reason.into(),
        }
    }

    /// Creates a new `EvaluationUnavailable` error.
    #[must_use]
    pub fn evaluation_unavailable(message: impl Into<String>) -> Self {
        Self::EvaluationUnavailable {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidTransition` error.
    #[must_use]
    pub fn invalid_transition(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Returns `true` if this error is transient and may be retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::EvaluationUnavailable { .. })
    }

    /// Returns `true` if the caller can recover by re-prompting the user.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::InvalidInput { .. })
    }

    /// Returns `true` if this error is fatal to session creation.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigParseError { .. }
                | Self::ConfigValidationError { .. }
                | Self::DocumentUnprocessable { .. }
        )
    }

    /// Returns a short machine-readable kind for API error bodies.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ConfigParseError { .. } => "config_parse",
            Self::ConfigValidationError { .. } => "config_validation",
            Self::DocumentUnprocessable { .. } => "document_unprocessable",
            Self::InvalidInput { .. } => "invalid_input",
            Self::StaleResult { .. } => "stale_result",
            Self::EvaluationUnavailable { .. } => "evaluation_unavailable",
            Self::GradingOutOfRange { .. } => "grading_out_of_range",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
        }
    }
}

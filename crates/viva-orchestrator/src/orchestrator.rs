//! The exam session orchestrator.
//!
//! [`ExamOrchestrator`] owns one session slot and drives the state machine in
//! response to presentation-layer commands, calling out to the collaborator
//! capabilities at the two genuine suspension points: question derivation
//! (while idle) and response evaluation (while grading). Both calls are
//! awaited without the session lock held, so a user can abandon or retry
//! mid-flight; the late result is then rejected by the grading ticket (or the
//! occupied-slot check) instead of corrupting newer state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::collaborators::{CompetencyAnalyzer, Evaluator, QuestionSource};
use crate::config::Config;
use crate::error::{Result, VivaError};
use crate::events::{EventBroadcaster, SessionEvent};
use crate::session::{ExamPhase, GradingResult, Question, Session};

/// Orchestrates a single examination session against pluggable collaborators.
///
/// Cloning is cheap; clones share the same session slot and broadcaster.
#[derive(Clone)]
pub struct ExamOrchestrator {
    config: Config,
    question_source: Arc<dyn QuestionSource>,
    evaluator: Arc<dyn Evaluator>,
    analyzer: Arc<dyn CompetencyAnalyzer>,
    session: Arc<Mutex<Option<Session>>>,
    broadcaster: EventBroadcaster,
    session_counter: Arc<AtomicU64>,
}

impl std::fmt::Debug for ExamOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExamOrchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ExamOrchestrator {
    /// Creates an orchestrator with the given configuration and
    /// collaborators. The session slot starts empty (idle).
    #[must_use]
    pub fn new(
        config: Config,
        question_source: Arc<dyn QuestionSource>,
        evaluator: Arc<dyn Evaluator>,
        analyzer: Arc<dyn CompetencyAnalyzer>,
    ) -> Self {
        Self {
            config,
            question_source,
            evaluator,
            analyzer,
            session: Arc::new(Mutex::new(None)),
            broadcaster: EventBroadcaster::default(),
            session_counter: Arc::new(AtomicU64::new(1)),
        }
    }

    /// The event broadcaster for this orchestrator.
    #[must_use]
    pub const fn broadcaster(&self) -> &EventBroadcaster {
        &self.broadcaster
    }

    /// Subscribes to session events.
    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SessionEvent> {
        self.broadcaster.subscribe()
    }

    /// Returns a read-only snapshot of the current session, if any.
    pub async fn snapshot(&self) -> Option<Session> {
        self.session.lock().await.clone()
    }

    /// Starts a new session for the given document.
    ///
    /// Suspends on the question source; if the user starts another session
    /// while questions are being derived, the slower result is discarded.
    ///
    /// # Errors
    ///
    /// `DocumentUnprocessable` when no questions can be derived (the
    /// orchestrator stays idle and no partial session is created), and
    /// `InvalidInput` when a session is already in progress.
    pub async fn start(&self, document_ref: &str) -> Result<Session> {
        {
            let guard = self.session.lock().await;
            if let Some(session) = guard.as_ref() {
                if !session.is_complete() {
                    return Err(VivaError::invalid_input(
                        "an examination is already in progress; retry or discard it first",
                    ));
                }
            }
        }

        info!(document = %document_ref, "Deriving questions");
        let questions = self.question_source.questions_for(document_ref).await?;
        if questions.is_empty() {
            return Err(VivaError::document_unprocessable(
                document_ref,
                "question source returned an empty set",
            ));
        }

        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            if !session.is_complete() {
                warn!(document = %document_ref, "Discarding question set: another session started first");
                return Err(VivaError::invalid_input(
                    "another session was started while questions were being derived",
                ));
            }
        }

        let mut session = Session::new(self.next_session_id(), document_ref, questions);
        session.ready()?;
        session.issue_question(&self.config.difficulty_policy)?;

        info!(
            session = %session.id,
            questions = session.total_questions(),
            "Session started"
        );
        self.emit_last_turn(&session);
        let snapshot = session.clone();
        *guard = Some(session);
        Ok(snapshot)
    }

    /// Submits a student response, grades it, and advances the session.
    ///
    /// Suspends on the evaluator (bounded retries, per-attempt timeout,
    /// zero-score fallback) without holding the session lock.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for blank text, double submission, or when no session
    /// is active; `StaleResult` when the session was retried or discarded
    /// while grading was in flight (the new session is untouched).
    pub async fn submit_response(&self, text: &str) -> Result<Session> {
        let (ticket, question) = {
            let mut guard = self.session.lock().await;
            let session = guard
                .as_mut()
                .ok_or_else(|| VivaError::invalid_input("no examination session is active"))?;
            let question = session
                .current_question()
                .cloned()
                .ok_or_else(|| VivaError::invalid_input("session has no active question"))?;
            let ticket = session.submit_response(text)?;
            self.emit_last_turn(session);
            (ticket, question)
        };

        let grading = self.grade_with_retry(&question, text).await;

        let (snapshot, completion) = {
            let mut guard = self.session.lock().await;
            let session = guard.as_mut().ok_or_else(|| {
                warn!(
                    session = %ticket.session_id,
                    "Dropping grading result: session was discarded while grading was in flight"
                );
                VivaError::stale_result(
                    ticket.session_id.clone(),
                    ticket.turn_index,
                    "session was discarded while grading was in flight",
                )
            })?;

            if let Err(e) = session.apply_grading(&ticket, grading.clone()) {
                warn!(error = %e, "Dropping grading result");
                return Err(e);
            }
            self.broadcaster.send(SessionEvent::grading_applied(
                grading,
                session.score,
                session.max_score(),
                session.streak,
            ));

            let completion = match session.advance()? {
                ExamPhase::AwaitingQuestion => {
                    session.issue_question(&self.config.difficulty_policy)?;
                    self.emit_last_turn(session);
                    None
                }
                _ => {
                    info!(
                        session = %session.id,
                        score = session.score,
                        max_score = session.max_score(),
                        "Session complete"
                    );
                    Some((
                        session.id.clone(),
                        session.score,
                        session.max_score(),
                        session.transcript.clone(),
                    ))
                }
            };
            (session.clone(), completion)
        };

        if let Some((session_id, final_score, max_score, transcript)) = completion {
            // Competency analysis is the session's final suspension point;
            // run it without the lock and re-check the slot afterwards.
            let breakdown = self.analyzer.analyze(&transcript).await;
            let guard = self.session.lock().await;
            let still_current = guard
                .as_ref()
                .is_some_and(|s| s.id == session_id && s.is_complete());
            if still_current {
                self.broadcaster.send(SessionEvent::session_complete(
                    final_score,
                    max_score,
                    breakdown,
                ));
            } else {
                warn!(session = %session_id, "Session replaced before verdict delivery; dropping completion event");
            }
        }

        Ok(snapshot)
    }

    /// Discards the current session and starts over with the same questions.
    ///
    /// Accepted in any phase: a completed session is replaced (never
    /// mutated), and an in-flight one is abandoned, its pending grading
    /// result left to die against the ticket guard.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when there is no session to retry.
    pub async fn retry(&self) -> Result<Session> {
        let mut guard = self.session.lock().await;
        let current = guard
            .as_ref()
            .ok_or_else(|| VivaError::invalid_input("no examination session to retry"))?;

        let mut fresh = current.retry(self.next_session_id());
        fresh.ready()?;
        fresh.issue_question(&self.config.difficulty_policy)?;

        info!(old = %current.id, new = %fresh.id, "Session retried");
        self.emit_last_turn(&fresh);
        let snapshot = fresh.clone();
        *guard = Some(fresh);
        Ok(snapshot)
    }

    /// Discards the current session entirely, returning the orchestrator to
    /// idle so a different document can be started.
    ///
    /// Returns `true` if a session was discarded.
    pub async fn new_session(&self) -> bool {
        let discarded = self.session.lock().await.take();
        if let Some(session) = &discarded {
            info!(session = %session.id, "Session discarded");
        }
        discarded.is_some()
    }

    /// Calls the evaluator with bounded retries and a per-attempt timeout.
    ///
    /// Contract breaches (out-of-range score, empty feedback) count as
    /// failed attempts. After exhaustion the turn is degraded to a zero
    /// score so the examination always terminates.
    async fn grade_with_retry(&self, question: &Question, response_text: &str) -> GradingResult {
        let attempts = self.config.evaluator.max_attempts;
        let timeout = Duration::from_secs(u64::from(self.config.evaluator.timeout_seconds));

        for attempt in 1..=attempts {
            let outcome = tokio::time::timeout(
                timeout,
                self.evaluator.evaluate(question, response_text),
            )
            .await;

            match outcome {
                Ok(Ok(result)) => match Self::validate_grading(question, result) {
                    Ok(result) => return result,
                    Err(e) => {
                        warn!(attempt, error = %e, "Evaluator breached its contract");
                    }
                },
                Ok(Err(e)) => {
                    warn!(attempt, error = %e, "Evaluator attempt failed");
                }
                Err(_) => {
                    warn!(
                        attempt,
                        timeout_secs = self.config.evaluator.timeout_seconds,
                        "Evaluator attempt timed out"
                    );
                }
            }
        }

        warn!(attempts, "Evaluator exhausted; degrading turn to zero score");
        GradingResult::degraded(format!("evaluator failed after {attempts} attempts"))
    }

    /// Enforces the evaluator output contract.
    fn validate_grading(question: &Question, mut result: GradingResult) -> Result<GradingResult> {
        if result.score > question.max_points {
            return Err(VivaError::GradingOutOfRange {
                score: result.score,
                max_points: question.max_points,
            });
        }
        if result.feedback.trim().is_empty() {
            return Err(VivaError::evaluation_unavailable(
                "evaluator returned empty feedback",
            ));
        }
        if result.devils_advocate_challenge.is_some() && !question.is_upper_band(result.score) {
            warn!(score = result.score, "Stripping challenge from sub-band grading result");
            result.devils_advocate_challenge = None;
        }
        Ok(result)
    }

    /// Broadcasts the most recently appended turn.
    fn emit_last_turn(&self, session: &Session) {
        if let Some(turn) = session.transcript.last() {
            self.broadcaster.send(SessionEvent::turn_added(
                turn.clone(),
                session.phase,
                session.cursor,
            ));
        }
    }

    /// Mints the next opaque session id.
    fn next_session_id(&self) -> String {
        let n = self.session_counter.fetch_add(1, Ordering::Relaxed);
        format!("exam-{n}")
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Difficulty selection policies.
//!
//! The state machine never decides difficulty itself; it consults a
//! [`DifficultyPolicy`] at the moment a question is issued. This keeps the
//! transition logic independent of any particular adaptation rule.

use serde::{Deserialize, Serialize};

use crate::session::{DifficultyLevel, Question, Session};

/// Strategy for choosing the session difficulty when a question is issued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DifficultyPolicy {
    /// Mirror the active question's declared tag. The progression is driven
    /// entirely by the fixed question sequence.
    #[default]
    FixedSequence,

    /// Start from the declared tag, escalate one level once the streak
    /// reaches three, and ease one level after a sub-threshold grade.
    AdaptiveByScore,
}

impl DifficultyPolicy {
    /// Streak length at which the adaptive policy escalates.
    const ESCALATION_STREAK: u32 = 3;

    /// Selects the difficulty for the question about to be issued.
    #[must_use]
    pub fn select(&self, session: &Session, question: &Question) -> DifficultyLevel {
        match self {
            Self::FixedSequence => question.difficulty,
            Self::AdaptiveByScore => {
                if session.streak >= Self::ESCALATION_STREAK {
                    return question.difficulty.escalate();
                }
                let below_threshold = session
                    .last_graded_outcome()
                    .is_some_and(|(score, max_points)| score * 10 < max_points * 7);
                if below_threshold {
                    question.difficulty.ease()
                } else {
                    question.difficulty
                }
            }
        }
    }
}

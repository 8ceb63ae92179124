use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::QuizId;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("completed_at is before started_at")]
    InvalidTimeRange,

    #[error("score ({score}) exceeds total ({total})")]
    ScoreExceedsTotal { score: u32, total: u32 },

    #[error("unanswered count ({unanswered}) exceeds incorrect count ({incorrect})")]
    UnansweredMismatch { unanswered: u32, incorrect: u32 },

    #[error("percentage {percentage} does not match score {score}/{total}")]
    PercentageMismatch { percentage: u8, score: u32, total: u32 },

    #[error("unknown completion kind: {0}")]
    UnknownCompletion(String),
}

//
// ─── COMPLETION ───────────────────────────────────────────────────────────────
//

/// How a quiz session reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    /// Explicit submission with every question answered.
    Submitted,
    /// The countdown reached zero; unanswered questions scored as incorrect.
    TimedOut,
}

impl Completion {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Completion::Submitted => "submitted",
            Completion::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Completion {
    type Err = AttemptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(Self::Submitted),
            "timed_out" => Ok(Self::TimedOut),
            other => Err(AttemptError::UnknownCompletion(other.to_string())),
        }
    }
}

//
// ─── QUIZ RESULT ──────────────────────────────────────────────────────────────
//

/// Final outcome of a completed quiz session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "QuizResultRepr")]
pub struct QuizResult {
    score: u32,
    total: u32,
    percentage: u8,
    unanswered: u32,
    completion: Completion,
}

#[derive(Deserialize)]
struct QuizResultRepr {
    score: u32,
    total: u32,
    percentage: u8,
    unanswered: u32,
    completion: Completion,
}

impl TryFrom<QuizResultRepr> for QuizResult {
    type Error = AttemptError;

    fn try_from(raw: QuizResultRepr) -> Result<Self, Self::Error> {
        Self::from_persisted(
            raw.score,
            raw.total,
            raw.percentage,
            raw.unanswered,
            raw.completion,
        )
    }
}

/// `round(score / total * 100)` with halves rounded up, in integer arithmetic.
#[must_use]
pub fn percentage_of(score: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let score = u64::from(score.min(total));
    let total = u64::from(total);
    let rounded = (200 * score + total) / (2 * total);
    u8::try_from(rounded).unwrap_or(100)
}

impl QuizResult {
    /// Build a result from raw counts; the percentage is derived.
    ///
    /// `score` is clamped to `total`.
    #[must_use]
    pub fn tally(score: u32, total: u32, unanswered: u32, completion: Completion) -> Self {
        let score = score.min(total);
        Self {
            score,
            total,
            percentage: percentage_of(score, total),
            unanswered: unanswered.min(total - score),
            completion,
        }
    }

    /// Rehydrate a result from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError` if the stored counts are inconsistent.
    pub fn from_persisted(
        score: u32,
        total: u32,
        percentage: u8,
        unanswered: u32,
        completion: Completion,
    ) -> Result<Self, AttemptError> {
        if score > total {
            return Err(AttemptError::ScoreExceedsTotal { score, total });
        }
        let incorrect = total - score;
        if unanswered > incorrect {
            return Err(AttemptError::UnansweredMismatch {
                unanswered,
                incorrect,
            });
        }
        if percentage != percentage_of(score, total) {
            return Err(AttemptError::PercentageMismatch {
                percentage,
                score,
                total,
            });
        }
        Ok(Self {
            score,
            total,
            percentage,
            unanswered,
            completion,
        })
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Score as a 0–100 percentage, rounded half-up.
    #[must_use]
    pub fn percentage(&self) -> u8 {
        self.percentage
    }

    /// Questions without a recorded answer at completion.
    #[must_use]
    pub fn unanswered(&self) -> u32 {
        self.unanswered
    }

    /// Answered questions whose selection was wrong, plus unanswered ones.
    #[must_use]
    pub fn incorrect(&self) -> u32 {
        self.total - self.score
    }

    #[must_use]
    pub fn completion(&self) -> Completion {
        self.completion
    }

    #[must_use]
    pub fn timed_out(&self) -> bool {
        matches!(self.completion, Completion::TimedOut)
    }
}

//
// ─── QUIZ ATTEMPT ─────────────────────────────────────────────────────────────
//

/// A finished quiz attempt as handed to the result sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizAttempt {
    quiz_id: QuizId,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    result: QuizResult,
    passed: bool,
}

impl QuizAttempt {
    /// # Errors
    ///
    /// Returns `AttemptError::InvalidTimeRange` if `completed_at` is before `started_at`.
    pub fn new(
        quiz_id: QuizId,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        result: QuizResult,
        passed: bool,
    ) -> Result<Self, AttemptError> {
        if completed_at < started_at {
            return Err(AttemptError::InvalidTimeRange);
        }
        Ok(Self {
            quiz_id,
            started_at,
            completed_at,
            result,
            passed,
        })
    }

    #[must_use]
    pub fn quiz_id(&self) -> &QuizId {
        &self.quiz_id
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    #[must_use]
    pub fn result(&self) -> &QuizResult {
        &self.result
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.passed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn percentage_rounds_half_up() {
        assert_eq!(percentage_of(2, 3), 67);
        assert_eq!(percentage_of(1, 3), 33);
        assert_eq!(percentage_of(1, 8), 13); // 12.5
        assert_eq!(percentage_of(1, 200), 1); // 0.5
        assert_eq!(percentage_of(0, 5), 0);
        assert_eq!(percentage_of(5, 5), 100);
    }

    #[test]
    fn tally_tracks_unanswered() {
        let result = QuizResult::tally(1, 4, 2, Completion::TimedOut);
        assert_eq!(result.incorrect(), 3);
        assert_eq!(result.unanswered(), 2);
        assert!(result.timed_out());
    }

    #[test]
    fn persisted_result_rejects_inconsistent_counts() {
        assert!(matches!(
            QuizResult::from_persisted(4, 3, 100, 0, Completion::Submitted),
            Err(AttemptError::ScoreExceedsTotal { .. })
        ));
        assert!(matches!(
            QuizResult::from_persisted(2, 3, 50, 0, Completion::Submitted),
            Err(AttemptError::PercentageMismatch { .. })
        ));
        assert!(matches!(
            QuizResult::from_persisted(2, 3, 67, 2, Completion::TimedOut),
            Err(AttemptError::UnansweredMismatch { .. })
        ));
    }

    #[test]
    fn deserialized_result_is_checked() {
        let json = r#"{"score":5,"total":3,"percentage":7,"unanswered":9,"completion":"submitted"}"#;
        assert!(serde_json::from_str::<QuizResult>(json).is_err());

        let json = r#"{"score":2,"total":3,"percentage":67,"unanswered":1,"completion":"timed_out"}"#;
        let result: QuizResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.incorrect(), 1);
        assert!(result.timed_out());
    }

    #[test]
    fn attempt_rejects_reversed_times() {
        let now = fixed_now();
        let result = QuizResult::tally(1, 1, 0, Completion::Submitted);
        let err = QuizAttempt::new(
            QuizId::new("cpp-memory").unwrap(),
            now,
            now - chrono::Duration::seconds(1),
            result,
            true,
        )
        .unwrap_err();
        assert_eq!(err, AttemptError::InvalidTimeRange);
    }

    #[test]
    fn completion_round_trips_through_str() {
        for kind in [Completion::Submitted, Completion::TimedOut] {
            assert_eq!(kind.as_str().parse::<Completion>().unwrap(), kind);
        }
    }
}

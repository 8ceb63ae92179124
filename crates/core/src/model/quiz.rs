use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::attempt::QuizResult;
use crate::model::ids::QuizId;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("quiz title cannot be empty")]
    EmptyTitle,

    #[error("quiz topic cannot be empty")]
    EmptyTopic,

    #[error("quiz time limit must be at least one minute")]
    ZeroTimeLimit,

    #[error("passing score must be between 0 and 100, got {0}")]
    PassingScoreOutOfRange(u8),

    #[error("unknown difficulty: {0}")]
    UnknownDifficulty(String),
}

//
// ─── DIFFICULTY ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = QuizError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            other => Err(QuizError::UnknownDifficulty(other.to_string())),
        }
    }
}

//
// ─── PASSING SCORE ────────────────────────────────────────────────────────────
//

/// Minimum percentage needed to pass a quiz.
///
/// The session only reports a percentage; whether that is a pass is decided
/// against this threshold by whoever consumes the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct PassingScore(u8);

impl PassingScore {
    pub const DEFAULT_PERCENT: u8 = 70;

    /// # Errors
    ///
    /// Returns `QuizError::PassingScoreOutOfRange` for values above 100.
    pub fn new(percent: u8) -> Result<Self, QuizError> {
        if percent > 100 {
            return Err(QuizError::PassingScoreOutOfRange(percent));
        }
        Ok(Self(percent))
    }

    #[must_use]
    pub fn percent(self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn is_met_by(self, result: &QuizResult) -> bool {
        result.percentage() >= self.0
    }
}

impl Default for PassingScore {
    fn default() -> Self {
        Self(Self::DEFAULT_PERCENT)
    }
}

impl TryFrom<u8> for PassingScore {
    type Error = QuizError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PassingScore> for u8 {
    fn from(value: PassingScore) -> Self {
        value.0
    }
}

//
// ─── QUIZ ─────────────────────────────────────────────────────────────────────
//

/// Catalog entry describing a timed quiz. Questions live in the question bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quiz {
    id: QuizId,
    title: String,
    description: Option<String>,
    topic: String,
    difficulty: Difficulty,
    time_limit_minutes: u32,
    passing_score: PassingScore,
}

impl Quiz {
    /// Creates a new quiz with the default passing score.
    ///
    /// # Errors
    ///
    /// Returns `QuizError` if title or topic are blank or the time limit is zero.
    pub fn new(
        id: QuizId,
        title: impl Into<String>,
        description: Option<String>,
        topic: impl Into<String>,
        difficulty: Difficulty,
        time_limit_minutes: u32,
    ) -> Result<Self, QuizError> {
        let title = title.into().trim().to_string();
        if title.is_empty() {
            return Err(QuizError::EmptyTitle);
        }
        let topic = topic.into().trim().to_string();
        if topic.is_empty() {
            return Err(QuizError::EmptyTopic);
        }
        if time_limit_minutes == 0 {
            return Err(QuizError::ZeroTimeLimit);
        }
        let description = description
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());

        Ok(Self {
            id,
            title,
            description,
            topic,
            difficulty,
            time_limit_minutes,
            passing_score: PassingScore::default(),
        })
    }

    #[must_use]
    pub fn with_passing_score(mut self, passing_score: PassingScore) -> Self {
        self.passing_score = passing_score;
        self
    }

    #[must_use]
    pub fn id(&self) -> &QuizId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn time_limit_minutes(&self) -> u32 {
        self.time_limit_minutes
    }

    #[must_use]
    pub fn passing_score(&self) -> PassingScore {
        self.passing_score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attempt::Completion;

    fn quiz_id() -> QuizId {
        QuizId::new("python-basics").unwrap()
    }

    #[test]
    fn quiz_requires_time_limit() {
        let err = Quiz::new(quiz_id(), "Python", None, "Python", Difficulty::Beginner, 0)
            .unwrap_err();
        assert_eq!(err, QuizError::ZeroTimeLimit);
    }

    #[test]
    fn quiz_trims_and_drops_blank_description() {
        let quiz = Quiz::new(
            quiz_id(),
            "  Python Fundamentals ",
            Some("   ".into()),
            "Python",
            Difficulty::Beginner,
            30,
        )
        .unwrap();
        assert_eq!(quiz.title(), "Python Fundamentals");
        assert_eq!(quiz.description(), None);
        assert_eq!(quiz.passing_score().percent(), 70);
    }

    #[test]
    fn passing_score_threshold_is_inclusive() {
        let threshold = PassingScore::default();
        let pass = QuizResult::tally(7, 10, 0, Completion::Submitted);
        let fail = QuizResult::tally(2, 3, 0, Completion::Submitted);
        assert!(threshold.is_met_by(&pass));
        assert!(!threshold.is_met_by(&fail));
    }

    #[test]
    fn passing_score_rejects_over_100() {
        assert_eq!(
            PassingScore::new(101).unwrap_err(),
            QuizError::PassingScoreOutOfRange(101)
        );
    }

    #[test]
    fn difficulty_parses_case_insensitively() {
        assert_eq!("Advanced".parse::<Difficulty>().unwrap(), Difficulty::Advanced);
        assert!("expert".parse::<Difficulty>().is_err());
    }
}

use chrono::{DateTime, Utc};
use std::fmt;

use learn_core::model::{AttemptId, Question, Quiz, QuizAttempt, QuizResult};
use learn_core::quiz_session::{QuizProgress, QuizSession, Tick};

use crate::error::QuizServiceError;

//
// ─── OUTCOME ───────────────────────────────────────────────────────────────────
//

/// Final outcome of a completed run, after its attempt has been stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizOutcome {
    pub result: QuizResult,
    pub passed: bool,
    pub attempt_id: AttemptId,
}

//
// ─── RUN ───────────────────────────────────────────────────────────────────────
//

/// One user's pass through a quiz.
///
/// Wraps the session state machine with the quiz definition and the wall-clock
/// timestamps needed to build a persisted `QuizAttempt`.
pub struct QuizRun {
    quiz: Quiz,
    session: QuizSession,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    attempt_id: Option<AttemptId>,
}

impl QuizRun {
    /// Start a run over `questions` with the given countdown.
    ///
    /// `started_at` should come from the services layer clock.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::EmptyBank` when `questions` is empty and
    /// `QuizServiceError::Session` for an invalid time limit.
    pub fn new(
        quiz: Quiz,
        questions: Vec<Question>,
        time_limit_minutes: u32,
        started_at: DateTime<Utc>,
    ) -> Result<Self, QuizServiceError> {
        if questions.is_empty() {
            return Err(QuizServiceError::EmptyBank(quiz.id().clone()));
        }

        let session = QuizSession::started(questions, time_limit_minutes)?;
        Ok(Self {
            quiz,
            session,
            started_at,
            completed_at: None,
            attempt_id: None,
        })
    }

    #[must_use]
    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    #[must_use]
    pub fn session(&self) -> &QuizSession {
        &self.session
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn attempt_id(&self) -> Option<AttemptId> {
        self.attempt_id
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.session.is_complete()
    }

    #[must_use]
    pub fn progress(&self) -> QuizProgress {
        self.session.progress()
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.session.current_question()
    }

    #[must_use]
    pub fn remaining_seconds(&self) -> u32 {
        self.session.remaining_seconds()
    }

    /// Whether the finished result meets the quiz's passing score.
    ///
    /// `None` until the run is complete.
    #[must_use]
    pub fn passed(&self) -> Option<bool> {
        self.session
            .result()
            .ok()
            .map(|result| self.quiz.passing_score().is_met_by(&result))
    }

    /// # Errors
    ///
    /// Returns `QuizServiceError::Session` unless the run is in progress or an
    /// index is out of range.
    pub fn select_answer(
        &mut self,
        question_index: usize,
        option_index: usize,
    ) -> Result<(), QuizServiceError> {
        Ok(self.session.select_answer(question_index, option_index)?)
    }

    /// Select an option for the question currently shown.
    ///
    /// # Errors
    ///
    /// Same as [`QuizRun::select_answer`].
    pub fn answer_current(&mut self, option_index: usize) -> Result<(), QuizServiceError> {
        let index = self.session.current_index();
        self.select_answer(index, option_index)
    }

    /// # Errors
    ///
    /// Returns `QuizServiceError::Session` unless the run is in progress.
    pub fn go_to_next(&mut self) -> Result<usize, QuizServiceError> {
        Ok(self.session.go_to_next()?)
    }

    /// # Errors
    ///
    /// Returns `QuizServiceError::Session` unless the run is in progress.
    pub fn go_to_previous(&mut self) -> Result<usize, QuizServiceError> {
        Ok(self.session.go_to_previous()?)
    }

    /// # Errors
    ///
    /// Returns `QuizServiceError::Session` until the run is complete.
    pub fn result(&self) -> Result<QuizResult, QuizServiceError> {
        Ok(self.session.result()?)
    }

    pub(crate) fn tick(&mut self, now: DateTime<Utc>) -> Tick {
        let tick = self.session.tick();
        if matches!(tick, Tick::TimedOut(_)) {
            self.completed_at = Some(now.max(self.started_at));
        }
        tick
    }

    pub(crate) fn submit(&mut self, now: DateTime<Utc>) -> Result<QuizResult, QuizServiceError> {
        let result = self.session.submit()?;
        self.completed_at = Some(now.max(self.started_at));
        Ok(result)
    }

    pub(crate) fn build_attempt(&self) -> Result<QuizAttempt, QuizServiceError> {
        let result = self.session.result()?;
        let completed_at = self.completed_at.ok_or(QuizServiceError::NotComplete)?;
        Ok(QuizAttempt::new(
            self.quiz.id().clone(),
            self.started_at,
            completed_at,
            result,
            self.quiz.passing_score().is_met_by(&result),
        )?)
    }

    pub(crate) fn set_attempt_id(&mut self, id: AttemptId) {
        self.attempt_id = Some(id);
    }
}

impl fmt::Debug for QuizRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizRun")
            .field("quiz_id", self.quiz.id())
            .field("state", &self.session.state())
            .field("questions_len", &self.session.total_questions())
            .field("remaining_seconds", &self.session.remaining_seconds())
            .field("started_at", &self.started_at)
            .field("completed_at", &self.completed_at)
            .field("attempt_id", &self.attempt_id)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

//! Timed quiz session state machine.
//!
//! A session walks `NotStarted → InProgress → Completed`. It owns no clock:
//! the caller drives the countdown by invoking [`QuizSession::tick`] once per
//! second from whatever scheduling facility it has (interval task, event loop
//! callback, or a plain loop in tests).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::model::{Completion, Question, QuizResult};

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Programmer-facing configuration problems. These are not recoverable at runtime.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigurationError {
    #[error("a quiz needs at least one question")]
    NoQuestions,

    #[error("too many questions for a single session: {len}")]
    TooManyQuestions { len: usize },

    #[error("time limit must be a positive number of minutes")]
    NonPositiveTimeLimit,

    #[error("time limit of {minutes} minutes is too large")]
    TimeLimitTooLarge { minutes: u32 },

    #[error("question index {index} is out of range for {len} questions")]
    QuestionOutOfRange { index: usize, len: usize },

    #[error("option {option} is out of range for question {question} with {len} options")]
    OptionOutOfRange {
        question: usize,
        option: usize,
        len: usize,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizSessionError {
    #[error("invalid quiz configuration: {0}")]
    InvalidConfiguration(#[from] ConfigurationError),

    #[error("cannot {operation} while the session is {state}")]
    InvalidState {
        operation: Operation,
        state: SessionState,
    },

    #[error("{unanswered} question(s) are still unanswered")]
    IncompleteSubmission { unanswered: usize },
}

//
// ─── STATES & OPERATIONS ──────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    NotStarted,
    InProgress,
    /// Terminal. Only read access to the result remains.
    Completed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::NotStarted => "not started",
            SessionState::InProgress => "in progress",
            SessionState::Completed => "completed",
        })
    }
}

/// Session operations, used to describe rejected calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Start,
    SelectAnswer,
    GoToNext,
    GoToPrevious,
    Submit,
    Result,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Start => "start",
            Operation::SelectAnswer => "select an answer",
            Operation::GoToNext => "go to the next question",
            Operation::GoToPrevious => "go to the previous question",
            Operation::Submit => "submit",
            Operation::Result => "read the result",
        })
    }
}

/// Outcome of a single countdown step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// One second elapsed; the session is still running.
    Running { remaining_seconds: u32 },
    /// The countdown hit zero on this tick and the session auto-submitted.
    TimedOut(QuizResult),
    /// The session is not running; nothing changed.
    Idle,
}

/// Snapshot of session progress, useful for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizProgress {
    pub total: usize,
    pub answered: usize,
    pub current: usize,
    pub remaining_seconds: u32,
    pub is_complete: bool,
}

//
// ─── SESSION ──────────────────────────────────────────────────────────────────
//

/// One attempt at a fixed, ordered list of questions under a single countdown.
///
/// Answers are a sparse map from question index to option index, so "answered
/// with option 0" and "unanswered" are never confused.
#[derive(Debug, Clone)]
pub struct QuizSession {
    questions: Arc<[Question]>,
    current_index: usize,
    answers: BTreeMap<usize, usize>,
    remaining_seconds: u32,
    state: SessionState,
    result: Option<QuizResult>,
}

impl Default for QuizSession {
    fn default() -> Self {
        Self::new()
    }
}

impl QuizSession {
    /// Creates a session in `NotStarted`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            questions: Arc::from(Vec::new()),
            current_index: 0,
            answers: BTreeMap::new(),
            remaining_seconds: 0,
            state: SessionState::NotStarted,
            result: None,
        }
    }

    /// Creates a session and starts it immediately.
    ///
    /// # Errors
    ///
    /// See [`QuizSession::start`].
    pub fn started(
        questions: impl Into<Arc<[Question]>>,
        time_limit_minutes: u32,
    ) -> Result<Self, QuizSessionError> {
        let mut session = Self::new();
        session.start(questions, time_limit_minutes)?;
        Ok(session)
    }

    /// Load the question list and begin the countdown.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the session is `NotStarted`, and
    /// `InvalidConfiguration` for an empty question list or a zero time limit.
    pub fn start(
        &mut self,
        questions: impl Into<Arc<[Question]>>,
        time_limit_minutes: u32,
    ) -> Result<(), QuizSessionError> {
        if self.state != SessionState::NotStarted {
            return Err(self.rejected(Operation::Start));
        }

        let questions = questions.into();
        if questions.is_empty() {
            return Err(ConfigurationError::NoQuestions.into());
        }
        if u32::try_from(questions.len()).is_err() {
            return Err(ConfigurationError::TooManyQuestions {
                len: questions.len(),
            }
            .into());
        }
        if time_limit_minutes == 0 {
            return Err(ConfigurationError::NonPositiveTimeLimit.into());
        }
        let remaining_seconds =
            time_limit_minutes
                .checked_mul(60)
                .ok_or(ConfigurationError::TimeLimitTooLarge {
                    minutes: time_limit_minutes,
                })?;

        self.questions = questions;
        self.current_index = 0;
        self.answers.clear();
        self.remaining_seconds = remaining_seconds;
        self.result = None;
        self.state = SessionState::InProgress;
        Ok(())
    }

    /// Record (or overwrite) the selected option for a question.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless in progress, and `InvalidConfiguration`
    /// when either index is out of range.
    pub fn select_answer(
        &mut self,
        question_index: usize,
        option_index: usize,
    ) -> Result<(), QuizSessionError> {
        self.ensure_in_progress(Operation::SelectAnswer)?;

        let question = self.questions.get(question_index).ok_or(
            ConfigurationError::QuestionOutOfRange {
                index: question_index,
                len: self.questions.len(),
            },
        )?;
        if option_index >= question.option_count() {
            return Err(ConfigurationError::OptionOutOfRange {
                question: question_index,
                option: option_index,
                len: question.option_count(),
            }
            .into());
        }

        self.answers.insert(question_index, option_index);
        Ok(())
    }

    /// Move to the next question; stays put on the last one.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless in progress.
    pub fn go_to_next(&mut self) -> Result<usize, QuizSessionError> {
        self.ensure_in_progress(Operation::GoToNext)?;
        if self.current_index + 1 < self.questions.len() {
            self.current_index += 1;
        }
        Ok(self.current_index)
    }

    /// Move to the previous question; stays put on the first one.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless in progress.
    pub fn go_to_previous(&mut self) -> Result<usize, QuizSessionError> {
        self.ensure_in_progress(Operation::GoToPrevious)?;
        self.current_index = self.current_index.saturating_sub(1);
        Ok(self.current_index)
    }

    /// Advance the countdown by one second.
    ///
    /// Reaching zero submits the session with whatever answers exist; this
    /// happens exactly once. Outside `InProgress` this is a no-op.
    pub fn tick(&mut self) -> Tick {
        if self.state != SessionState::InProgress {
            return Tick::Idle;
        }

        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            Tick::TimedOut(self.complete(Completion::TimedOut))
        } else {
            Tick::Running {
                remaining_seconds: self.remaining_seconds,
            }
        }
    }

    /// Submit explicitly. Every question must have an answer.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless in progress (including a repeated submit),
    /// and `IncompleteSubmission` while any question is unanswered; the session
    /// then stays in progress.
    pub fn submit(&mut self) -> Result<QuizResult, QuizSessionError> {
        self.ensure_in_progress(Operation::Submit)?;

        let unanswered = self.unanswered_count();
        if unanswered > 0 {
            return Err(QuizSessionError::IncompleteSubmission { unanswered });
        }

        Ok(self.complete(Completion::Submitted))
    }

    /// Final score, total and percentage.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` until the session is completed.
    pub fn result(&self) -> Result<QuizResult, QuizSessionError> {
        match (self.state, self.result) {
            (SessionState::Completed, Some(result)) => Ok(result),
            _ => Err(self.rejected(Operation::Result)),
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state == SessionState::Completed
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_index)
    }

    #[must_use]
    pub fn is_last_question(&self) -> bool {
        self.current_index + 1 >= self.questions.len()
    }

    /// The selected option for a question, if any.
    #[must_use]
    pub fn answer_for(&self, question_index: usize) -> Option<usize> {
        self.answers.get(&question_index).copied()
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    #[must_use]
    pub fn unanswered_count(&self) -> usize {
        self.questions.len().saturating_sub(self.answers.len())
    }

    #[must_use]
    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    #[must_use]
    pub fn progress(&self) -> QuizProgress {
        QuizProgress {
            total: self.total_questions(),
            answered: self.answered_count(),
            current: self.current_index,
            remaining_seconds: self.remaining_seconds,
            is_complete: self.is_complete(),
        }
    }

    fn ensure_in_progress(&self, operation: Operation) -> Result<(), QuizSessionError> {
        if self.state == SessionState::InProgress {
            Ok(())
        } else {
            Err(self.rejected(operation))
        }
    }

    fn rejected(&self, operation: Operation) -> QuizSessionError {
        QuizSessionError::InvalidState {
            operation,
            state: self.state,
        }
    }

    // Scores once; callers guarantee the session is in progress.
    fn complete(&mut self, completion: Completion) -> QuizResult {
        let score = self
            .answers
            .iter()
            .filter(|&(&question, &option)| {
                self.questions
                    .get(question)
                    .is_some_and(|q| q.is_correct(option))
            })
            .count();
        let total = self.questions.len();
        let unanswered = total.saturating_sub(self.answers.len());

        let result = QuizResult::tally(
            count_u32(score),
            count_u32(total),
            count_u32(unanswered),
            completion,
        );
        self.result = Some(result);
        self.state = SessionState::Completed;
        result
    }
}

// Question counts were checked against `u32` in `start`.
fn count_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{QuestionDraft, QuestionId};

    fn questions(correct: &[usize]) -> Vec<Question> {
        correct
            .iter()
            .enumerate()
            .map(|(i, &answer)| {
                QuestionDraft::new(
                    QuestionId::new(format!("q{i}")).unwrap(),
                    format!("Question {i}"),
                    ["a", "b", "c", "d"],
                    answer,
                )
                .validate()
                .unwrap()
            })
            .collect()
    }

    fn session(correct: &[usize], minutes: u32) -> QuizSession {
        QuizSession::started(questions(correct), minutes).unwrap()
    }

    #[test]
    fn start_initializes_state() {
        let s = session(&[0, 1], 2);
        assert_eq!(s.state(), SessionState::InProgress);
        assert_eq!(s.current_index(), 0);
        assert_eq!(s.answered_count(), 0);
        assert_eq!(s.remaining_seconds(), 120);
    }

    #[test]
    fn start_rejects_invalid_configuration() {
        let err = QuizSession::started(Vec::new(), 5).unwrap_err();
        assert_eq!(
            err,
            QuizSessionError::InvalidConfiguration(ConfigurationError::NoQuestions)
        );

        let err = QuizSession::started(questions(&[0]), 0).unwrap_err();
        assert_eq!(
            err,
            QuizSessionError::InvalidConfiguration(ConfigurationError::NonPositiveTimeLimit)
        );

        let err = QuizSession::started(questions(&[0]), u32::MAX).unwrap_err();
        assert!(matches!(
            err,
            QuizSessionError::InvalidConfiguration(ConfigurationError::TimeLimitTooLarge { .. })
        ));
    }

    #[test]
    fn start_twice_is_invalid_state() {
        let mut s = session(&[0], 1);
        let err = s.start(questions(&[1]), 1).unwrap_err();
        assert!(matches!(
            err,
            QuizSessionError::InvalidState {
                operation: Operation::Start,
                state: SessionState::InProgress
            }
        ));
    }

    #[test]
    fn operations_before_start_are_rejected() {
        let mut s = QuizSession::new();
        assert!(matches!(
            s.select_answer(0, 0),
            Err(QuizSessionError::InvalidState { .. })
        ));
        assert!(matches!(s.go_to_next(), Err(QuizSessionError::InvalidState { .. })));
        assert!(matches!(s.submit(), Err(QuizSessionError::InvalidState { .. })));
        assert_eq!(s.tick(), Tick::Idle);
    }

    #[test]
    fn scenario_a_explicit_submit_scores_two_of_three() {
        let mut s = session(&[1, 0, 2], 10);
        s.select_answer(0, 1).unwrap();
        s.select_answer(1, 0).unwrap();
        s.select_answer(2, 1).unwrap();

        let result = s.submit().unwrap();
        assert_eq!(result.score(), 2);
        assert_eq!(result.total(), 3);
        assert_eq!(result.percentage(), 67);
        assert_eq!(result.completion(), Completion::Submitted);
        assert_eq!(s.result().unwrap(), result);
    }

    #[test]
    fn scenario_b_timeout_without_answers_scores_zero() {
        let mut s = session(&[0], 1);
        for _ in 0..59 {
            assert!(matches!(s.tick(), Tick::Running { .. }));
        }
        let Tick::TimedOut(result) = s.tick() else {
            panic!("expected timeout on the 60th tick");
        };

        assert!(s.is_complete());
        assert_eq!(s.remaining_seconds(), 0);
        assert_eq!(result.score(), 0);
        assert_eq!(result.unanswered(), 1);
        assert!(result.timed_out());
    }

    #[test]
    fn scenario_c_reselection_overwrites() {
        let mut s = session(&[0], 5);
        s.select_answer(0, 1).unwrap();
        s.select_answer(0, 0).unwrap();
        assert_eq!(s.answer_for(0), Some(0));

        let result = s.submit().unwrap();
        assert_eq!(s.answer_for(0), Some(0));
        assert_eq!(result.score(), 1);
    }

    #[test]
    fn scenario_d_result_before_completion_is_invalid_state() {
        let s = session(&[0], 5);
        assert!(matches!(
            s.result(),
            Err(QuizSessionError::InvalidState {
                operation: Operation::Result,
                state: SessionState::InProgress
            })
        ));
    }

    #[test]
    fn option_zero_is_distinct_from_unanswered() {
        let mut s = session(&[0, 0], 5);
        assert_eq!(s.answer_for(0), None);
        s.select_answer(0, 0).unwrap();
        assert_eq!(s.answer_for(0), Some(0));
        assert_eq!(s.unanswered_count(), 1);
    }

    #[test]
    fn incomplete_submission_keeps_session_running() {
        let mut s = session(&[0, 1, 2], 5);
        s.select_answer(0, 0).unwrap();

        let err = s.submit().unwrap_err();
        assert_eq!(err, QuizSessionError::IncompleteSubmission { unanswered: 2 });
        assert!(!s.is_complete());

        s.select_answer(1, 1).unwrap();
        s.select_answer(2, 2).unwrap();
        assert_eq!(s.submit().unwrap().score(), 3);
    }

    #[test]
    fn navigation_is_clamped() {
        let mut s = session(&[0, 1, 2], 5);
        assert_eq!(s.go_to_previous().unwrap(), 0);
        assert_eq!(s.go_to_next().unwrap(), 1);
        assert_eq!(s.go_to_next().unwrap(), 2);
        assert!(s.is_last_question());
        assert_eq!(s.go_to_next().unwrap(), 2);
        assert_eq!(s.go_to_previous().unwrap(), 1);
    }

    #[test]
    fn out_of_range_indices_fail_fast() {
        let mut s = session(&[0, 1], 5);
        assert_eq!(
            s.select_answer(2, 0).unwrap_err(),
            QuizSessionError::InvalidConfiguration(ConfigurationError::QuestionOutOfRange {
                index: 2,
                len: 2
            })
        );
        assert_eq!(
            s.select_answer(1, 4).unwrap_err(),
            QuizSessionError::InvalidConfiguration(ConfigurationError::OptionOutOfRange {
                question: 1,
                option: 4,
                len: 4
            })
        );
        assert_eq!(s.answered_count(), 0);
    }

    #[test]
    fn completed_session_is_frozen() {
        let mut s = session(&[1, 0], 5);
        s.select_answer(0, 1).unwrap();
        s.select_answer(1, 1).unwrap();
        s.go_to_next().unwrap();
        let result = s.submit().unwrap();
        let remaining = s.remaining_seconds();

        assert!(matches!(s.select_answer(1, 0), Err(QuizSessionError::InvalidState { .. })));
        assert!(matches!(s.go_to_previous(), Err(QuizSessionError::InvalidState { .. })));
        assert!(matches!(s.go_to_next(), Err(QuizSessionError::InvalidState { .. })));
        assert!(matches!(
            s.submit(),
            Err(QuizSessionError::InvalidState {
                operation: Operation::Submit,
                state: SessionState::Completed
            })
        ));
        assert_eq!(s.tick(), Tick::Idle);

        assert_eq!(s.answer_for(1), Some(1));
        assert_eq!(s.current_index(), 1);
        assert_eq!(s.remaining_seconds(), remaining);
        assert_eq!(s.result().unwrap(), result);
    }

    #[test]
    fn timeout_scores_partial_answers_only_once() {
        let mut s = session(&[2, 3, 0], 1);
        s.select_answer(0, 2).unwrap();
        s.select_answer(1, 0).unwrap();

        let mut timeouts = 0;
        for _ in 0..120 {
            if let Tick::TimedOut(result) = s.tick() {
                timeouts += 1;
                assert_eq!(result.score(), 1);
                assert_eq!(result.unanswered(), 1);
                assert_eq!(result.percentage(), 33);
            }
        }
        assert_eq!(timeouts, 1);
    }

    #[test]
    fn index_stays_in_range_through_mixed_operations() {
        let mut s = session(&[0, 1, 2, 3], 1);
        for step in 0..40 {
            match step % 5 {
                0 | 1 => {
                    let _ = s.go_to_next();
                }
                2 => {
                    let _ = s.go_to_previous();
                }
                3 => {
                    let _ = s.select_answer(s.current_index(), step % 4);
                }
                _ => {
                    let _ = s.tick();
                }
            }
            assert!(s.current_index() < s.total_questions());
        }
    }

    #[test]
    fn progress_reflects_state() {
        let mut s = session(&[0, 1], 1);
        s.select_answer(1, 1).unwrap();
        s.go_to_next().unwrap();
        s.tick();

        let progress = s.progress();
        assert_eq!(progress.total, 2);
        assert_eq!(progress.answered, 1);
        assert_eq!(progress.current, 1);
        assert_eq!(progress.remaining_seconds, 59);
        assert!(!progress.is_complete);
    }
}

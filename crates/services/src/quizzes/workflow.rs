use std::sync::Arc;

use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use learn_core::model::{AttemptId, QuizId};
use learn_core::quiz_session::Tick;
use storage::repository::{QuizAttemptRepository, QuizRepository};

use super::service::{QuizOutcome, QuizRun};
use crate::Clock;
use crate::error::QuizServiceError;

/// Orchestrates quiz start, countdown ticks and persisted completion.
#[derive(Clone)]
pub struct QuizLoopService {
    clock: Clock,
    quizzes: Arc<dyn QuizRepository>,
    attempts: Arc<dyn QuizAttemptRepository>,
    shuffle_questions: bool,
    time_limit_minutes: Option<u32>,
}

impl QuizLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        quizzes: Arc<dyn QuizRepository>,
        attempts: Arc<dyn QuizAttemptRepository>,
    ) -> Self {
        Self {
            clock,
            quizzes,
            attempts,
            shuffle_questions: false,
            time_limit_minutes: None,
        }
    }

    #[must_use]
    pub fn with_shuffle_questions(mut self, shuffle_questions: bool) -> Self {
        self.shuffle_questions = shuffle_questions;
        self
    }

    /// Override every quiz's own time limit. `None` keeps the quiz default.
    #[must_use]
    pub fn with_time_limit_minutes(mut self, minutes: Option<u32>) -> Self {
        self.time_limit_minutes = minutes;
        self
    }

    /// Start a new run for the given quiz.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::NotFound` for an unknown quiz,
    /// `QuizServiceError::EmptyBank` when it has no questions, and
    /// `QuizServiceError::Storage` on repository failures.
    pub async fn start_quiz(&self, quiz_id: &QuizId) -> Result<QuizRun, QuizServiceError> {
        let quiz = self
            .quizzes
            .get_quiz(quiz_id)
            .await?
            .ok_or_else(|| QuizServiceError::NotFound(quiz_id.clone()))?;
        let mut questions = self.quizzes.get_questions(quiz_id).await?;

        if self.shuffle_questions {
            questions.shuffle(&mut rand::rng());
        }

        let minutes = self
            .time_limit_minutes
            .unwrap_or_else(|| quiz.time_limit_minutes());
        let run = QuizRun::new(quiz, questions, minutes, self.clock.now())?;

        info!(
            quiz = %quiz_id,
            questions = run.session().total_questions(),
            minutes,
            "quiz started"
        );
        Ok(run)
    }

    /// Advance the run's countdown by one second.
    ///
    /// When this tick expires the countdown the attempt is persisted.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError` when persisting the timed-out attempt fails.
    /// The run is complete regardless; use [`QuizLoopService::finalize_attempt`]
    /// to retry.
    pub async fn tick(&self, run: &mut QuizRun) -> Result<Tick, QuizServiceError> {
        let tick = run.tick(self.clock.now());
        match tick {
            Tick::TimedOut(result) => {
                info!(
                    quiz = %run.quiz().id(),
                    score = result.score(),
                    total = result.total(),
                    unanswered = result.unanswered(),
                    "quiz timed out"
                );
                self.finalize_attempt(run).await?;
            }
            Tick::Running { remaining_seconds } if remaining_seconds % 60 == 0 => {
                debug!(quiz = %run.quiz().id(), remaining_seconds, "countdown");
            }
            Tick::Running { .. } | Tick::Idle => {}
        }
        Ok(tick)
    }

    /// Submit the run explicitly and persist its attempt.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Session` while questions are unanswered or
    /// after the run has completed, and `QuizServiceError::Storage` when the
    /// attempt cannot be stored.
    pub async fn submit(&self, run: &mut QuizRun) -> Result<QuizOutcome, QuizServiceError> {
        let result = run.submit(self.clock.now())?;
        info!(
            quiz = %run.quiz().id(),
            score = result.score(),
            total = result.total(),
            percentage = result.percentage(),
            "quiz submitted"
        );

        let attempt_id = self.finalize_attempt(run).await?;
        Ok(QuizOutcome {
            result,
            passed: run.passed().unwrap_or(false),
            attempt_id,
        })
    }

    /// Persist the attempt of a completed run if it has not been stored yet.
    ///
    /// Useful when the append at completion failed (e.g. transient storage error).
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Session` if the run is not complete and
    /// `QuizServiceError::Storage` if persistence fails.
    pub async fn finalize_attempt(&self, run: &mut QuizRun) -> Result<AttemptId, QuizServiceError> {
        if let Some(id) = run.attempt_id() {
            return Ok(id);
        }

        let attempt = run.build_attempt()?;
        let id = self
            .attempts
            .append_attempt(&attempt)
            .await
            .inspect_err(|e| warn!(quiz = %run.quiz().id(), error = %e, "failed to store attempt"))?;
        run.set_attempt_id(id);
        info!(quiz = %run.quiz().id(), attempt_id = id, passed = attempt.passed(), "attempt stored");
        Ok(id)
    }

    /// Outcome of a completed, persisted run.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Session` until the run is complete and
    /// `QuizServiceError::NotComplete` if its attempt has not been stored.
    pub fn outcome(&self, run: &QuizRun) -> Result<QuizOutcome, QuizServiceError> {
        let result = run.result()?;
        let attempt_id = run.attempt_id().ok_or(QuizServiceError::NotComplete)?;
        Ok(QuizOutcome {
            result,
            passed: run.quiz().passing_score().is_met_by(&result),
            attempt_id,
        })
    }
}

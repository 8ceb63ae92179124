//! Background 1 Hz driver for a run's countdown.
//!
//! The run lives behind a `tokio::sync::Mutex`; every tick and every user
//! action takes the same lock, so the countdown and answers never interleave
//! within a single step.

use std::sync::Arc;

use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant};
use tracing::{debug, warn};

use learn_core::model::QuizResult;
use learn_core::quiz_session::Tick;

use super::service::QuizRun;
use super::workflow::QuizLoopService;
use crate::error::QuizServiceError;

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Why a countdown task stopped.
#[derive(Debug)]
#[non_exhaustive]
pub enum CountdownEnd {
    /// The countdown reached zero and the run auto-submitted.
    TimedOut(QuizResult),
    /// The run was completed by other means (explicit submit).
    Completed,
    /// `CountdownHandle::stop` was called.
    Stopped,
    /// The run timed out but storing its attempt failed.
    Failed(QuizServiceError),
}

/// Handle to a running countdown task.
#[derive(Debug)]
pub struct CountdownHandle {
    stop: Arc<Notify>,
    task: JoinHandle<CountdownEnd>,
}

impl CountdownHandle {
    /// Ask the task to stop before its next tick.
    pub fn stop(&self) {
        self.stop.notify_one();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the task to end.
    ///
    /// Cancel-safe, so it can sit in a `tokio::select!` loop. Once it has
    /// returned it must not be awaited again.
    pub async fn finished(&mut self) -> CountdownEnd {
        match (&mut self.task).await {
            Ok(end) => end,
            Err(err) => {
                warn!(error = %err, "countdown task aborted");
                CountdownEnd::Stopped
            }
        }
    }
}

impl Drop for CountdownHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn a task that ticks `run` once per second through `service`.
///
/// The task ends on timeout, when the run is already complete at a tick, or
/// when stopped.
#[must_use]
pub fn spawn_countdown(service: Arc<QuizLoopService>, run: Arc<Mutex<QuizRun>>) -> CountdownHandle {
    let stop = Arc::new(Notify::new());
    let stop_signal = Arc::clone(&stop);

    let task = tokio::spawn(async move {
        let mut interval = time::interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
        loop {
            tokio::select! {
                () = stop_signal.notified() => {
                    debug!("countdown stopped");
                    return CountdownEnd::Stopped;
                }
                _ = interval.tick() => {
                    let mut guard = run.lock().await;
                    if guard.is_complete() {
                        return CountdownEnd::Completed;
                    }
                    match service.tick(&mut guard).await {
                        Ok(Tick::TimedOut(result)) => return CountdownEnd::TimedOut(result),
                        Ok(Tick::Running { .. }) => {}
                        Ok(Tick::Idle) => return CountdownEnd::Completed,
                        Err(err) => return CountdownEnd::Failed(err),
                    }
                }
            }
        }
    });

    CountdownHandle { stop, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use learn_core::model::{
        Completion, Difficulty, QuestionDraft, QuestionId, Quiz, QuizId,
    };
    use learn_core::time::fixed_now;
    use storage::repository::{InMemoryRepository, QuizAttemptRepository, QuizRepository};

    use crate::Clock;

    async fn setup() -> (InMemoryRepository, Arc<QuizLoopService>, Arc<Mutex<QuizRun>>) {
        let repo = InMemoryRepository::new();
        let quiz_id = QuizId::new("timed").unwrap();
        let quiz = Quiz::new(quiz_id.clone(), "Timed", None, "Rust", Difficulty::Beginner, 1)
            .unwrap();
        repo.upsert_quiz(&quiz).await.unwrap();
        let questions = vec![
            QuestionDraft::new(QuestionId::new("q1").unwrap(), "Q1", ["a", "b"], 0)
                .validate()
                .unwrap(),
            QuestionDraft::new(QuestionId::new("q2").unwrap(), "Q2", ["a", "b"], 1)
                .validate()
                .unwrap(),
        ];
        repo.replace_questions(&quiz_id, &questions).await.unwrap();

        let service = Arc::new(QuizLoopService::new(
            Clock::fixed(fixed_now()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        ));
        let run = service.start_quiz(&quiz_id).await.unwrap();
        (repo, service, Arc::new(Mutex::new(run)))
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_times_out_after_limit() {
        let (repo, service, run) = setup().await;
        run.lock().await.select_answer(0, 0).unwrap();

        let started = Instant::now();
        let mut handle = spawn_countdown(service, Arc::clone(&run));
        let end = handle.finished().await;

        let CountdownEnd::TimedOut(result) = end else {
            panic!("expected timeout, got {end:?}");
        };
        assert_eq!(started.elapsed(), Duration::from_secs(60));
        assert_eq!(result.score(), 1);
        assert_eq!(result.unanswered(), 1);
        assert_eq!(result.completion(), Completion::TimedOut);

        let guard = run.lock().await;
        assert!(guard.is_complete());
        let stored = repo.get_attempt(guard.attempt_id().unwrap()).await.unwrap();
        assert_eq!(stored.result(), &result);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_ends_after_explicit_submit() {
        let (repo, service, run) = setup().await;
        let mut handle = spawn_countdown(Arc::clone(&service), Arc::clone(&run));

        time::sleep(Duration::from_millis(10_500)).await;
        {
            let mut guard = run.lock().await;
            assert_eq!(guard.remaining_seconds(), 50);
            guard.select_answer(0, 0).unwrap();
            guard.select_answer(1, 1).unwrap();
            service.submit(&mut guard).await.unwrap();
        }

        assert!(matches!(handle.finished().await, CountdownEnd::Completed));
        let rows = repo
            .list_attempt_rows(run.lock().await.quiz().id(), 10)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].attempt.result().completion(), Completion::Submitted);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_ticking() {
        let (_repo, service, run) = setup().await;
        let mut handle = spawn_countdown(service, Arc::clone(&run));

        time::sleep(Duration::from_millis(3_500)).await;
        handle.stop();
        assert!(matches!(handle.finished().await, CountdownEnd::Stopped));

        time::sleep(Duration::from_secs(5)).await;
        let guard = run.lock().await;
        assert_eq!(guard.remaining_seconds(), 57);
        assert!(!guard.is_complete());
    }
}

use async_trait::async_trait;
use learn_core::model::{AttemptId, Question, Quiz, QuizAttempt, QuizId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A persisted attempt together with its storage id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizAttemptRow {
    pub id: AttemptId,
    pub attempt: QuizAttempt,
}

impl QuizAttemptRow {
    #[must_use]
    pub fn new(id: AttemptId, attempt: QuizAttempt) -> Self {
        Self { id, attempt }
    }
}

/// Question-bank provider: quiz definitions and their ordered questions.
#[async_trait]
pub trait QuizRepository: Send + Sync {
    /// Persist or update a quiz definition.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the quiz cannot be stored.
    async fn upsert_quiz(&self, quiz: &Quiz) -> Result<(), StorageError>;

    /// Fetch a quiz by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures. A missing quiz is `Ok(None)`.
    async fn get_quiz(&self, id: &QuizId) -> Result<Option<Quiz>, StorageError>;

    /// List every quiz, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_quizzes(&self) -> Result<Vec<Quiz>, StorageError>;

    /// Replace the ordered question list of a quiz.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the quiz does not exist, or
    /// `StorageError::Conflict` if two questions share an id.
    async fn replace_questions(
        &self,
        quiz_id: &QuizId,
        questions: &[Question],
    ) -> Result<(), StorageError>;

    /// Fetch the questions of a quiz in their stored order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures. Unknown quizzes yield an empty list.
    async fn get_questions(&self, quiz_id: &QuizId) -> Result<Vec<Question>, StorageError>;
}

/// Result sink for finished attempts.
#[async_trait]
pub trait QuizAttemptRepository: Send + Sync {
    /// Append a finished attempt and return its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the attempt cannot be stored.
    async fn append_attempt(&self, attempt: &QuizAttempt) -> Result<AttemptId, StorageError>;

    /// Fetch an attempt by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_attempt(&self, id: AttemptId) -> Result<QuizAttempt, StorageError>;

    /// Attempts for a quiz, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_attempt_rows(
        &self,
        quiz_id: &QuizId,
        limit: u32,
    ) -> Result<Vec<QuizAttemptRow>, StorageError>;

    /// The newest attempt of each listed quiz. Quizzes without attempts are skipped.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_latest_attempt_rows(
        &self,
        quiz_ids: &[QuizId],
    ) -> Result<Vec<QuizAttemptRow>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    quizzes: Arc<Mutex<BTreeMap<QuizId, Quiz>>>,
    questions: Arc<Mutex<HashMap<QuizId, Vec<Question>>>>,
    attempts: Arc<Mutex<Vec<QuizAttemptRow>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

// Newest first: completed_at, then id.
fn sort_newest_first(rows: &mut [QuizAttemptRow]) {
    rows.sort_by(|a, b| {
        b.attempt
            .completed_at()
            .cmp(&a.attempt.completed_at())
            .then(b.id.cmp(&a.id))
    });
}

#[async_trait]
impl QuizRepository for InMemoryRepository {
    async fn upsert_quiz(&self, quiz: &Quiz) -> Result<(), StorageError> {
        let mut guard = self.quizzes.lock().map_err(poisoned)?;
        guard.insert(quiz.id().clone(), quiz.clone());
        Ok(())
    }

    async fn get_quiz(&self, id: &QuizId) -> Result<Option<Quiz>, StorageError> {
        let guard = self.quizzes.lock().map_err(poisoned)?;
        Ok(guard.get(id).cloned())
    }

    async fn list_quizzes(&self) -> Result<Vec<Quiz>, StorageError> {
        let guard = self.quizzes.lock().map_err(poisoned)?;
        Ok(guard.values().cloned().collect())
    }

    async fn replace_questions(
        &self,
        quiz_id: &QuizId,
        questions: &[Question],
    ) -> Result<(), StorageError> {
        if !self.quizzes.lock().map_err(poisoned)?.contains_key(quiz_id) {
            return Err(StorageError::NotFound);
        }

        let mut seen = HashSet::new();
        if !questions.iter().all(|q| seen.insert(q.id())) {
            return Err(StorageError::Conflict);
        }

        let mut guard = self.questions.lock().map_err(poisoned)?;
        guard.insert(quiz_id.clone(), questions.to_vec());
        Ok(())
    }

    async fn get_questions(&self, quiz_id: &QuizId) -> Result<Vec<Question>, StorageError> {
        let guard = self.questions.lock().map_err(poisoned)?;
        Ok(guard.get(quiz_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl QuizAttemptRepository for InMemoryRepository {
    async fn append_attempt(&self, attempt: &QuizAttempt) -> Result<AttemptId, StorageError> {
        let mut guard = self.attempts.lock().map_err(poisoned)?;
        let id = guard.last().map_or(1, |row| row.id + 1);
        guard.push(QuizAttemptRow::new(id, attempt.clone()));
        Ok(id)
    }

    async fn get_attempt(&self, id: AttemptId) -> Result<QuizAttempt, StorageError> {
        let guard = self.attempts.lock().map_err(poisoned)?;
        guard
            .iter()
            .find(|row| row.id == id)
            .map(|row| row.attempt.clone())
            .ok_or(StorageError::NotFound)
    }

    async fn list_attempt_rows(
        &self,
        quiz_id: &QuizId,
        limit: u32,
    ) -> Result<Vec<QuizAttemptRow>, StorageError> {
        let guard = self.attempts.lock().map_err(poisoned)?;
        let mut rows: Vec<_> = guard
            .iter()
            .filter(|row| row.attempt.quiz_id() == quiz_id)
            .cloned()
            .collect();
        sort_newest_first(&mut rows);
        rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(rows)
    }

    async fn list_latest_attempt_rows(
        &self,
        quiz_ids: &[QuizId],
    ) -> Result<Vec<QuizAttemptRow>, StorageError> {
        let guard = self.attempts.lock().map_err(poisoned)?;
        let mut rows: Vec<_> = guard
            .iter()
            .filter(|row| quiz_ids.contains(row.attempt.quiz_id()))
            .cloned()
            .collect();
        sort_newest_first(&mut rows);

        let mut seen = HashSet::new();
        rows.retain(|row| seen.insert(row.attempt.quiz_id().clone()));
        rows.sort_by(|a, b| a.attempt.quiz_id().cmp(b.attempt.quiz_id()));
        Ok(rows)
    }
}

/// Aggregates quiz and attempt repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub quizzes: Arc<dyn QuizRepository>,
    pub attempts: Arc<dyn QuizAttemptRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let quizzes: Arc<dyn QuizRepository> = Arc::new(repo.clone());
        let attempts: Arc<dyn QuizAttemptRepository> = Arc::new(repo);
        Self { quizzes, attempts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use learn_core::model::{
        Completion, Difficulty, QuestionDraft, QuestionId, QuizResult,
    };
    use learn_core::time::fixed_now;

    fn build_quiz(id: &str) -> Quiz {
        Quiz::new(
            QuizId::new(id).unwrap(),
            format!("Quiz {id}"),
            None,
            "Rust",
            Difficulty::Beginner,
            10,
        )
        .unwrap()
    }

    fn build_question(id: &str) -> Question {
        QuestionDraft::new(QuestionId::new(id).unwrap(), "Q", ["a", "b"], 1)
            .validate()
            .unwrap()
    }

    fn build_attempt(quiz: &Quiz, minutes_ago: i64, score: u32) -> QuizAttempt {
        let completed_at = fixed_now() - Duration::minutes(minutes_ago);
        QuizAttempt::new(
            quiz.id().clone(),
            completed_at - Duration::minutes(5),
            completed_at,
            QuizResult::tally(score, 2, 0, Completion::Submitted),
            score == 2,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn questions_keep_their_order() {
        let repo = InMemoryRepository::new();
        let quiz = build_quiz("rust-basics");
        repo.upsert_quiz(&quiz).await.unwrap();

        let questions = vec![build_question("b"), build_question("a")];
        repo.replace_questions(quiz.id(), &questions).await.unwrap();

        let fetched = repo.get_questions(quiz.id()).await.unwrap();
        assert_eq!(fetched, questions);
    }

    #[tokio::test]
    async fn questions_require_existing_quiz_and_unique_ids() {
        let repo = InMemoryRepository::new();
        let quiz = build_quiz("rust-basics");
        let err = repo
            .replace_questions(quiz.id(), &[build_question("a")])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));

        repo.upsert_quiz(&quiz).await.unwrap();
        let err = repo
            .replace_questions(quiz.id(), &[build_question("a"), build_question("a")])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn latest_attempt_per_quiz() {
        let repo = InMemoryRepository::new();
        let first = build_quiz("a-quiz");
        let second = build_quiz("b-quiz");

        repo.append_attempt(&build_attempt(&first, 30, 1)).await.unwrap();
        let newest = repo.append_attempt(&build_attempt(&first, 10, 2)).await.unwrap();
        let only = repo.append_attempt(&build_attempt(&second, 20, 0)).await.unwrap();

        let latest = repo
            .list_latest_attempt_rows(&[first.id().clone(), second.id().clone()])
            .await
            .unwrap();
        let ids: Vec<_> = latest.iter().map(|row| row.id).collect();
        assert_eq!(ids, vec![newest, only]);

        let history = repo.list_attempt_rows(first.id(), 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, newest);
    }
}

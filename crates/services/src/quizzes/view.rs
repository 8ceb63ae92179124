use chrono::{DateTime, Utc};
use std::sync::Arc;

use learn_core::model::{AttemptId, Completion, Quiz, QuizAttempt, QuizId};
use storage::repository::{QuizAttemptRepository, QuizAttemptRow, QuizRepository};

use crate::error::QuizServiceError;

/// Presentation-agnostic list item for a stored attempt.
///
/// No pre-formatted strings; callers format timestamps and durations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizAttemptListItem {
    pub id: AttemptId,
    pub quiz_id: QuizId,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,

    pub score: u32,
    pub total: u32,
    pub percentage: u8,
    pub unanswered: u32,
    pub completion: Completion,
    pub passed: bool,
}

impl QuizAttemptListItem {
    #[must_use]
    pub fn from_attempt(id: AttemptId, attempt: &QuizAttempt) -> Self {
        let result = attempt.result();
        Self {
            id,
            quiz_id: attempt.quiz_id().clone(),
            started_at: attempt.started_at(),
            completed_at: attempt.completed_at(),
            score: result.score(),
            total: result.total(),
            percentage: result.percentage(),
            unanswered: result.unanswered(),
            completion: result.completion(),
            passed: attempt.passed(),
        }
    }

    #[must_use]
    pub fn from_row(row: &QuizAttemptRow) -> Self {
        Self::from_attempt(row.id, &row.attempt)
    }

    /// Whole seconds between start and completion.
    #[must_use]
    pub fn duration_seconds(&self) -> i64 {
        (self.completed_at - self.started_at).num_seconds()
    }
}

/// A catalog entry with its question count and most recent attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizCatalogItem {
    pub quiz: Quiz,
    pub question_count: usize,
    pub latest_attempt: Option<QuizAttemptListItem>,
}

/// Read-only facade over quizzes and their attempt history.
#[derive(Clone)]
pub struct QuizAttemptService {
    quizzes: Arc<dyn QuizRepository>,
    attempts: Arc<dyn QuizAttemptRepository>,
}

impl QuizAttemptService {
    #[must_use]
    pub fn new(
        quizzes: Arc<dyn QuizRepository>,
        attempts: Arc<dyn QuizAttemptRepository>,
    ) -> Self {
        Self { quizzes, attempts }
    }

    /// Load the most recent attempts for a quiz, newest first.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Storage` on repository failures.
    pub async fn list_recent_attempts(
        &self,
        quiz_id: &QuizId,
        limit: u32,
    ) -> Result<Vec<QuizAttemptListItem>, QuizServiceError> {
        let rows = self.attempts.list_attempt_rows(quiz_id, limit).await?;
        Ok(rows.iter().map(QuizAttemptListItem::from_row).collect())
    }

    /// Fetch one stored attempt.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Storage` when the attempt is missing or
    /// repository access fails.
    pub async fn get_attempt(&self, id: AttemptId) -> Result<QuizAttempt, QuizServiceError> {
        Ok(self.attempts.get_attempt(id).await?)
    }

    /// Every quiz in id order, with question counts and latest attempts.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Storage` on repository failures.
    pub async fn catalog_overview(&self) -> Result<Vec<QuizCatalogItem>, QuizServiceError> {
        let quizzes = self.quizzes.list_quizzes().await?;
        let ids: Vec<QuizId> = quizzes.iter().map(|quiz| quiz.id().clone()).collect();
        let latest = self.attempts.list_latest_attempt_rows(&ids).await?;

        let mut items = Vec::with_capacity(quizzes.len());
        for quiz in quizzes {
            let question_count = self.quizzes.get_questions(quiz.id()).await?.len();
            let latest_attempt = latest
                .iter()
                .find(|row| row.attempt.quiz_id() == quiz.id())
                .map(QuizAttemptListItem::from_row);
            items.push(QuizCatalogItem {
                quiz,
                question_count,
                latest_attempt,
            });
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;
    use learn_core::model::{Difficulty, QuestionDraft, QuestionId, QuizResult};
    use learn_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    fn build_quiz(id: &str) -> Quiz {
        Quiz::new(
            QuizId::new(id).unwrap(),
            format!("Quiz {id}"),
            None,
            "Rust",
            Difficulty::Advanced,
            10,
        )
        .unwrap()
    }

    fn build_attempt(quiz: &Quiz, completed_at: DateTime<Utc>, score: u32) -> QuizAttempt {
        let result = QuizResult::tally(score, 4, 0, Completion::Submitted);
        QuizAttempt::new(
            quiz.id().clone(),
            completed_at - Duration::seconds(90),
            completed_at,
            result,
            quiz.passing_score().is_met_by(&result),
        )
        .unwrap()
    }

    #[test]
    fn list_item_is_presentation_agnostic() {
        let quiz = build_quiz("quiz-a");
        let attempt = build_attempt(&quiz, fixed_now(), 3);
        let item = QuizAttemptListItem::from_attempt(42, &attempt);

        assert_eq!(item.id, 42);
        assert_eq!(item.completed_at, fixed_now());
        assert_eq!(item.percentage, 75);
        assert!(item.passed);
        assert_eq!(item.duration_seconds(), 90);
    }

    #[tokio::test]
    async fn list_recent_attempts_honors_limit_and_order() {
        let repo = InMemoryRepository::new();
        let quiz = build_quiz("quiz-a");
        repo.upsert_quiz(&quiz).await.unwrap();
        let now = fixed_now();

        let older = repo
            .append_attempt(&build_attempt(&quiz, now - Duration::days(1), 1))
            .await
            .unwrap();
        let newer = repo
            .append_attempt(&build_attempt(&quiz, now, 4))
            .await
            .unwrap();

        let svc = QuizAttemptService::new(Arc::new(repo.clone()), Arc::new(repo));
        let items = svc.list_recent_attempts(quiz.id(), 10).await.unwrap();
        let ids: Vec<_> = items.iter().map(|item| item.id).collect();
        assert_eq!(ids, vec![newer, older]);

        let items = svc.list_recent_attempts(quiz.id(), 1).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, newer);
    }

    #[tokio::test]
    async fn catalog_overview_pairs_quizzes_with_latest_attempts() {
        let repo = InMemoryRepository::new();
        let quiz_a = build_quiz("quiz-a");
        let quiz_b = build_quiz("quiz-b");
        repo.upsert_quiz(&quiz_a).await.unwrap();
        repo.upsert_quiz(&quiz_b).await.unwrap();
        let question = QuestionDraft::new(QuestionId::new("q1").unwrap(), "Q", ["a", "b"], 0)
            .validate()
            .unwrap();
        repo.replace_questions(quiz_a.id(), &[question]).await.unwrap();

        let now = fixed_now();
        let _first = repo
            .append_attempt(&build_attempt(&quiz_a, now - Duration::hours(2), 1))
            .await
            .unwrap();
        let latest = repo
            .append_attempt(&build_attempt(&quiz_a, now, 2))
            .await
            .unwrap();

        let svc = QuizAttemptService::new(Arc::new(repo.clone()), Arc::new(repo));
        let items = svc.catalog_overview().await.unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].quiz.id(), quiz_a.id());
        assert_eq!(items[0].question_count, 1);
        assert_eq!(items[0].latest_attempt.as_ref().map(|a| a.id), Some(latest));
        assert_eq!(items[1].question_count, 0);
        assert!(items[1].latest_attempt.is_none());
    }
}

use learn_core::model::{AttemptId, QuizAttempt, QuizId};

use super::SqliteRepository;
use super::mapping::{conn, map_attempt_row, map_attempt_row_with_id};
use crate::repository::{QuizAttemptRepository, QuizAttemptRow, StorageError};

#[async_trait::async_trait]
impl QuizAttemptRepository for SqliteRepository {
    async fn append_attempt(&self, attempt: &QuizAttempt) -> Result<AttemptId, StorageError> {
        let result = attempt.result();

        let res = sqlx::query(
            r"
                INSERT INTO quiz_attempts (
                    quiz_id, started_at, completed_at, score, total,
                    percentage, unanswered, completion, passed
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
        )
        .bind(attempt.quiz_id().as_str())
        .bind(attempt.started_at())
        .bind(attempt.completed_at())
        .bind(i64::from(result.score()))
        .bind(i64::from(result.total()))
        .bind(i64::from(result.percentage()))
        .bind(i64::from(result.unanswered()))
        .bind(result.completion().as_str())
        .bind(i64::from(attempt.passed()))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.last_insert_rowid())
    }

    async fn get_attempt(&self, id: AttemptId) -> Result<QuizAttempt, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    quiz_id, started_at, completed_at, score, total,
                    percentage, unanswered, completion, passed
                FROM quiz_attempts
                WHERE id = ?1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        map_attempt_row(&row)
    }

    async fn list_attempt_rows(
        &self,
        quiz_id: &QuizId,
        limit: u32,
    ) -> Result<Vec<QuizAttemptRow>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    id, quiz_id, started_at, completed_at, score, total,
                    percentage, unanswered, completion, passed
                FROM quiz_attempts
                WHERE quiz_id = ?1
                ORDER BY completed_at DESC, id DESC
                LIMIT ?2
            ",
        )
        .bind(quiz_id.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_attempt_row_with_id).collect()
    }

    async fn list_latest_attempt_rows(
        &self,
        quiz_ids: &[QuizId],
    ) -> Result<Vec<QuizAttemptRow>, StorageError> {
        if quiz_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = String::from(
            r"
                SELECT
                    id, quiz_id, started_at, completed_at, score, total,
                    percentage, unanswered, completion, passed
                FROM quiz_attempts
                WHERE quiz_id IN (
            ",
        );

        for i in 0..quiz_ids.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('?');
            sql.push_str(&(i + 1).to_string());
        }
        sql.push_str(")\n ORDER BY quiz_id ASC, completed_at DESC, id DESC");

        let mut query = sqlx::query(&sql);
        for quiz_id in quiz_ids {
            query = query.bind(quiz_id.as_str());
        }

        let rows = query.fetch_all(&self.pool).await.map_err(conn)?;

        let mut out: Vec<QuizAttemptRow> = Vec::new();
        for row in &rows {
            let mapped = map_attempt_row_with_id(row)?;
            // Rows arrive grouped by quiz, newest first within each group.
            if out
                .last()
                .is_some_and(|prev| prev.attempt.quiz_id() == mapped.attempt.quiz_id())
            {
                continue;
            }
            out.push(mapped);
        }

        Ok(out)
    }
}

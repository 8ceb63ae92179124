use learn_core::model::{Question, Quiz, QuizId};

use super::SqliteRepository;
use super::mapping::{conn, index_to_i64, map_question_row, map_quiz_row, options_to_json};
use crate::repository::{QuizRepository, StorageError};

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

#[async_trait::async_trait]
impl QuizRepository for SqliteRepository {
    async fn upsert_quiz(&self, quiz: &Quiz) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO quizzes (id, title, description, topic, difficulty, time_limit_minutes, passing_score)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                topic = excluded.topic,
                difficulty = excluded.difficulty,
                time_limit_minutes = excluded.time_limit_minutes,
                passing_score = excluded.passing_score
            ",
        )
        .bind(quiz.id().as_str())
        .bind(quiz.title())
        .bind(quiz.description())
        .bind(quiz.topic())
        .bind(quiz.difficulty().as_str())
        .bind(i64::from(quiz.time_limit_minutes()))
        .bind(i64::from(quiz.passing_score().percent()))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn get_quiz(&self, id: &QuizId) -> Result<Option<Quiz>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT id, title, description, topic, difficulty, time_limit_minutes, passing_score
                FROM quizzes
                WHERE id = ?1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_quiz_row).transpose()
    }

    async fn list_quizzes(&self) -> Result<Vec<Quiz>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, title, description, topic, difficulty, time_limit_minutes, passing_score
                FROM quizzes
                ORDER BY id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_quiz_row).collect()
    }

    async fn replace_questions(
        &self,
        quiz_id: &QuizId,
        questions: &[Question],
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let exists = sqlx::query("SELECT 1 FROM quizzes WHERE id = ?1")
            .bind(quiz_id.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(conn)?;
        if exists.is_none() {
            return Err(StorageError::NotFound);
        }

        sqlx::query("DELETE FROM questions WHERE quiz_id = ?1")
            .bind(quiz_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for (position, question) in questions.iter().enumerate() {
            sqlx::query(
                r"
                    INSERT INTO questions (quiz_id, position, id, prompt, options, correct_option, explanation)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ",
            )
            .bind(quiz_id.as_str())
            .bind(index_to_i64("position", position)?)
            .bind(question.id().as_str())
            .bind(question.prompt())
            .bind(options_to_json(question)?)
            .bind(index_to_i64("correct_option", question.correct_option())?)
            .bind(question.explanation())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StorageError::Conflict
                } else {
                    conn(e)
                }
            })?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn get_questions(&self, quiz_id: &QuizId) -> Result<Vec<Question>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, prompt, options, correct_option, explanation
                FROM questions
                WHERE quiz_id = ?1
                ORDER BY position ASC
            ",
        )
        .bind(quiz_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_question_row).collect()
    }
}

use learn_core::model::{
    Completion, Difficulty, PassingScore, Question, QuestionDraft, QuestionId, Quiz, QuizAttempt,
    QuizId, QuizResult,
};
use sqlx::Row;

use crate::repository::{QuizAttemptRow, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn u8_from_i64(field: &'static str, v: i64) -> Result<u8, StorageError> {
    u8::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn index_to_i64(field: &'static str, v: usize) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn quiz_id_from_row(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<QuizId, StorageError> {
    QuizId::new(row.try_get::<String, _>(column).map_err(ser)?).map_err(ser)
}

pub(crate) fn map_quiz_row(row: &sqlx::sqlite::SqliteRow) -> Result<Quiz, StorageError> {
    let id = quiz_id_from_row(row, "id")?;
    let difficulty: Difficulty = row
        .try_get::<String, _>("difficulty")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    let time_limit = u32_from_i64(
        "time_limit_minutes",
        row.try_get::<i64, _>("time_limit_minutes").map_err(ser)?,
    )?;
    let passing_score = PassingScore::new(u8_from_i64(
        "passing_score",
        row.try_get::<i64, _>("passing_score").map_err(ser)?,
    )?)
    .map_err(ser)?;

    Quiz::new(
        id,
        row.try_get::<String, _>("title").map_err(ser)?,
        row.try_get::<Option<String>, _>("description").map_err(ser)?,
        row.try_get::<String, _>("topic").map_err(ser)?,
        difficulty,
        time_limit,
    )
    .map(|quiz| quiz.with_passing_score(passing_score))
    .map_err(ser)
}

/// Options are stored as a JSON array of strings.
pub(crate) fn options_to_json(question: &Question) -> Result<String, StorageError> {
    serde_json::to_string(question.options()).map_err(ser)
}

pub(crate) fn map_question_row(row: &sqlx::sqlite::SqliteRow) -> Result<Question, StorageError> {
    let id = QuestionId::new(row.try_get::<String, _>("id").map_err(ser)?).map_err(ser)?;
    let options: Vec<String> =
        serde_json::from_str(&row.try_get::<String, _>("options").map_err(ser)?).map_err(ser)?;
    let correct_raw: i64 = row.try_get("correct_option").map_err(ser)?;
    let correct_option = usize::try_from(correct_raw)
        .map_err(|_| StorageError::Serialization(format!("invalid correct_option: {correct_raw}")))?;

    QuestionDraft {
        id: Some(id),
        prompt: row.try_get("prompt").map_err(ser)?,
        options,
        correct_option,
        explanation: row.try_get("explanation").map_err(ser)?,
    }
    .validate()
    .map_err(ser)
}

pub(crate) fn map_attempt_row(row: &sqlx::sqlite::SqliteRow) -> Result<QuizAttempt, StorageError> {
    let quiz_id = quiz_id_from_row(row, "quiz_id")?;
    let completion: Completion = row
        .try_get::<String, _>("completion")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    let result = QuizResult::from_persisted(
        u32_from_i64("score", row.try_get::<i64, _>("score").map_err(ser)?)?,
        u32_from_i64("total", row.try_get::<i64, _>("total").map_err(ser)?)?,
        u8_from_i64("percentage", row.try_get::<i64, _>("percentage").map_err(ser)?)?,
        u32_from_i64("unanswered", row.try_get::<i64, _>("unanswered").map_err(ser)?)?,
        completion,
    )
    .map_err(ser)?;
    let passed: bool = row.try_get::<i64, _>("passed").map_err(ser)? != 0;

    QuizAttempt::new(
        quiz_id,
        row.try_get("started_at").map_err(ser)?,
        row.try_get("completed_at").map_err(ser)?,
        result,
        passed,
    )
    .map_err(ser)
}

pub(crate) fn map_attempt_row_with_id(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<QuizAttemptRow, StorageError> {
    let id: i64 = row.try_get("id").map_err(ser)?;
    Ok(QuizAttemptRow::new(id, map_attempt_row(row)?))
}

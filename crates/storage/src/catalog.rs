//! Built-in question banks shipped with the application.

use serde::Deserialize;
use thiserror::Error;

use learn_core::model::{Difficulty, PassingScore, Question, QuestionDraft, Quiz, QuizId};

use crate::repository::{Storage, StorageError};

const BUILTIN_CATALOG: &str = include_str!("../data/catalog.json");

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("invalid catalog file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid catalog entry {quiz}: {source}")]
    Entry {
        quiz: String,
        #[source]
        source: learn_core::Error,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A quiz definition and its ordered question bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuiz {
    pub quiz: Quiz,
    pub questions: Vec<Question>,
}

#[derive(Debug, Deserialize)]
struct QuizSeed {
    id: QuizId,
    title: String,
    #[serde(default)]
    description: Option<String>,
    topic: String,
    difficulty: Difficulty,
    time_limit_minutes: u32,
    #[serde(default)]
    passing_score: PassingScore,
    questions: Vec<QuestionDraft>,
}

impl QuizSeed {
    fn build(self) -> Result<CatalogQuiz, CatalogError> {
        let entry = |source: learn_core::Error| CatalogError::Entry {
            quiz: self.id.to_string(),
            source,
        };

        let quiz = Quiz::new(
            self.id.clone(),
            self.title.clone(),
            self.description.clone(),
            self.topic.clone(),
            self.difficulty,
            self.time_limit_minutes,
        )
        .map_err(|e| entry(e.into()))?
        .with_passing_score(self.passing_score);

        let questions = self
            .questions
            .iter()
            .cloned()
            .enumerate()
            .map(|(index, draft)| draft.validate_at(index).map_err(|e| entry(e.into())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CatalogQuiz { quiz, questions })
    }
}

/// Parse a catalog document (a JSON array of quizzes with nested questions).
///
/// # Errors
///
/// Returns `CatalogError` if the JSON is malformed or any quiz/question fails validation.
pub fn parse_catalog(json: &str) -> Result<Vec<CatalogQuiz>, CatalogError> {
    let seeds: Vec<QuizSeed> = serde_json::from_str(json)?;
    seeds.into_iter().map(QuizSeed::build).collect()
}

/// The catalog compiled into the binary.
///
/// # Errors
///
/// Returns `CatalogError` if the embedded catalog is invalid.
pub fn builtin_catalog() -> Result<Vec<CatalogQuiz>, CatalogError> {
    parse_catalog(BUILTIN_CATALOG)
}

/// Upsert every catalog quiz and replace its questions. Returns the number of quizzes written.
///
/// # Errors
///
/// Returns `CatalogError` for invalid catalog data or storage failures.
pub async fn seed_catalog(
    storage: &Storage,
    catalog: &[CatalogQuiz],
) -> Result<usize, CatalogError> {
    for entry in catalog {
        storage.quizzes.upsert_quiz(&entry.quiz).await?;
        storage
            .quizzes
            .replace_questions(entry.quiz.id(), &entry.questions)
            .await?;
    }
    Ok(catalog.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_is_valid() {
        let catalog = builtin_catalog().unwrap();
        assert_eq!(catalog.len(), 6);

        let python = catalog
            .iter()
            .find(|entry| entry.quiz.id().as_str() == "python-basics")
            .unwrap();
        assert_eq!(python.quiz.time_limit_minutes(), 30);
        assert_eq!(python.quiz.passing_score().percent(), 70);
        assert_eq!(python.questions.len(), 5);
        assert_eq!(python.questions[4].correct_option(), 0);
    }

    #[test]
    fn invalid_question_names_the_quiz() {
        let json = r#"[{
            "id": "broken",
            "title": "Broken",
            "topic": "Rust",
            "difficulty": "beginner",
            "time_limit_minutes": 5,
            "questions": [{"prompt": "Q", "options": ["a"], "correct_option": 0}]
        }]"#;
        let err = parse_catalog(json).unwrap_err();
        assert!(matches!(err, CatalogError::Entry { ref quiz, .. } if quiz == "broken"));
    }

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let storage = Storage::in_memory();
        let catalog = builtin_catalog().unwrap();

        seed_catalog(&storage, &catalog).await.unwrap();
        seed_catalog(&storage, &catalog).await.unwrap();

        let quizzes = storage.quizzes.list_quizzes().await.unwrap();
        assert_eq!(quizzes.len(), 6);
        let java = QuizId::new("java-oop").unwrap();
        assert_eq!(storage.quizzes.get_questions(&java).await.unwrap().len(), 2);
    }
}

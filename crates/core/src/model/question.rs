use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::QuestionId;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question prompt cannot be empty")]
    EmptyPrompt,

    #[error("a question needs at least two options, got {len}")]
    TooFewOptions { len: usize },

    #[error("option {index} is empty")]
    EmptyOption { index: usize },

    #[error("correct option {index} is out of range for {len} options")]
    CorrectOptionOutOfRange { index: usize, len: usize },

    #[error("question id is missing")]
    MissingId,

    #[error("invalid question id: {raw}")]
    InvalidId { raw: String },
}

//
// ─── QUESTION ─────────────────────────────────────────────────────────────────
//

/// Unvalidated question data as supplied by a question bank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct QuestionDraft {
    pub id: Option<QuestionId>,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_option: usize,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// A multiple-choice question with exactly one correct option.
///
/// Questions are immutable once validated; sessions share them read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "QuestionDraft")]
pub struct Question {
    id: QuestionId,
    prompt: String,
    options: Vec<String>,
    correct_option: usize,
    explanation: Option<String>,
}

impl QuestionDraft {
    #[must_use]
    pub fn new(
        id: QuestionId,
        prompt: impl Into<String>,
        options: impl IntoIterator<Item = impl Into<String>>,
        correct_option: usize,
    ) -> Self {
        Self {
            id: Some(id),
            prompt: prompt.into(),
            options: options.into_iter().map(Into::into).collect(),
            correct_option,
            explanation: None,
        }
    }

    #[must_use]
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    /// Validate the draft into an immutable `Question`.
    ///
    /// A draft without an id is given one derived from `fallback_index`
    /// (`q1`, `q2`, ...), which keeps hand-written banks terse.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` when the prompt or options are empty, fewer than
    /// two options are given, or the correct option is not a valid index.
    pub fn validate_at(self, fallback_index: usize) -> Result<Question, QuestionError> {
        let prompt = self.prompt.trim().to_string();
        if prompt.is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }

        if self.options.len() < 2 {
            return Err(QuestionError::TooFewOptions {
                len: self.options.len(),
            });
        }

        let mut options = Vec::with_capacity(self.options.len());
        for (index, option) in self.options.into_iter().enumerate() {
            let option = option.trim().to_string();
            if option.is_empty() {
                return Err(QuestionError::EmptyOption { index });
            }
            options.push(option);
        }

        if self.correct_option >= options.len() {
            return Err(QuestionError::CorrectOptionOutOfRange {
                index: self.correct_option,
                len: options.len(),
            });
        }

        let id = match self.id {
            Some(id) => id,
            None => {
                let raw = format!("q{}", fallback_index + 1);
                QuestionId::new(raw.clone()).map_err(|_| QuestionError::InvalidId { raw })?
            }
        };

        let explanation = self
            .explanation
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());

        Ok(Question {
            id,
            prompt,
            options,
            correct_option: self.correct_option,
            explanation,
        })
    }

    /// Validate a draft that carries its own id.
    ///
    /// Only [`QuestionDraft::validate_at`] assigns positional ids.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::MissingId` without an id, otherwise see
    /// [`QuestionDraft::validate_at`].
    pub fn validate(self) -> Result<Question, QuestionError> {
        if self.id.is_none() {
            return Err(QuestionError::MissingId);
        }
        self.validate_at(0)
    }
}

impl TryFrom<QuestionDraft> for Question {
    type Error = QuestionError;

    fn try_from(draft: QuestionDraft) -> Result<Self, Self::Error> {
        draft.validate()
    }
}

impl Question {
    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn option_count(&self) -> usize {
        self.options.len()
    }

    #[must_use]
    pub fn correct_option(&self) -> usize {
        self.correct_option
    }

    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    #[must_use]
    pub fn is_correct(&self, option: usize) -> bool {
        option == self.correct_option
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

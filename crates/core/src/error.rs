use thiserror::Error;

use crate::model::{AttemptError, QuestionError, QuizError};
use crate::quiz_session::QuizSessionError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Attempt(#[from] AttemptError),
    #[error(transparent)]
    Session(#[from] QuizSessionError),
}

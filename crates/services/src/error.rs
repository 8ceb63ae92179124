//! Shared error types for the services crate.

use thiserror::Error;

use learn_core::model::{AttemptError, QuizId};
use learn_core::quiz_session::QuizSessionError;
use storage::catalog::CatalogError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ChatAssistantService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChatAssistantError {
    #[error("chat assistant is not configured")]
    Disabled,
    #[error("message must not be empty")]
    EmptyMessage,
    #[error("chat assistant returned an empty response")]
    EmptyResponse,
    #[error("chat assistant request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by quiz runs and the quiz loop.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizServiceError {
    #[error("quiz {0} not found")]
    NotFound(QuizId),
    #[error("quiz {0} has no questions")]
    EmptyBank(QuizId),
    #[error("quiz run is not complete")]
    NotComplete,
    #[error(transparent)]
    Session(#[from] QuizSessionError),
    #[error(transparent)]
    Attempt(#[from] AttemptError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

use std::sync::Arc;

use tracing::info;

use learn_core::model::AppSettings;
use storage::catalog::{builtin_catalog, seed_catalog};
use storage::repository::Storage;

use crate::Clock;
use crate::chat_assistant::ChatAssistantService;
use crate::error::AppServicesError;
use crate::quizzes::{QuizAttemptService, QuizLoopService};

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    settings: AppSettings,
    quiz_loop: Arc<QuizLoopService>,
    attempts: Arc<QuizAttemptService>,
    chat_assistant: Arc<ChatAssistantService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// An empty database is seeded with the built-in quiz catalog.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization or seeding fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        settings: AppSettings,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Self::from_storage(storage, clock, settings).await
    }

    /// Build services over in-memory storage seeded with the built-in catalog.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the catalog cannot be loaded.
    pub async fn in_memory(clock: Clock, settings: AppSettings) -> Result<Self, AppServicesError> {
        Self::from_storage(Storage::in_memory(), clock, settings).await
    }

    async fn from_storage(
        storage: Storage,
        clock: Clock,
        settings: AppSettings,
    ) -> Result<Self, AppServicesError> {
        ensure_catalog(&storage).await?;

        let quiz_loop = Arc::new(QuizLoopService::new(
            clock,
            Arc::clone(&storage.quizzes),
            Arc::clone(&storage.attempts),
        ));
        let attempts = Arc::new(QuizAttemptService::new(
            Arc::clone(&storage.quizzes),
            Arc::clone(&storage.attempts),
        ));
        let chat_assistant = Arc::new(ChatAssistantService::from_settings(&settings));

        Ok(Self {
            settings,
            quiz_loop,
            attempts,
            chat_assistant,
        })
    }

    /// Apply run options to the quiz loop.
    #[must_use]
    pub fn with_quiz_options(
        mut self,
        shuffle_questions: bool,
        time_limit_minutes: Option<u32>,
    ) -> Self {
        let quiz_loop = QuizLoopService::clone(&self.quiz_loop)
            .with_shuffle_questions(shuffle_questions)
            .with_time_limit_minutes(time_limit_minutes);
        self.quiz_loop = Arc::new(quiz_loop);
        self
    }

    #[must_use]
    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    #[must_use]
    pub fn quiz_loop(&self) -> Arc<QuizLoopService> {
        Arc::clone(&self.quiz_loop)
    }

    #[must_use]
    pub fn attempts(&self) -> Arc<QuizAttemptService> {
        Arc::clone(&self.attempts)
    }

    #[must_use]
    pub fn chat_assistant(&self) -> Arc<ChatAssistantService> {
        Arc::clone(&self.chat_assistant)
    }
}

async fn ensure_catalog(storage: &Storage) -> Result<(), AppServicesError> {
    if !storage.quizzes.list_quizzes().await?.is_empty() {
        return Ok(());
    }

    let catalog = builtin_catalog()?;
    let written = seed_catalog(storage, &catalog).await?;
    info!(quizzes = written, "seeded built-in quiz catalog");
    Ok(())
}

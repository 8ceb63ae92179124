#![forbid(unsafe_code)]

pub mod app_services;
pub mod chat_assistant;
pub mod error;
pub mod quizzes;

pub use learn_core::Clock;

pub use app_services::AppServices;
pub use chat_assistant::{
    ChatAssistantConfig, ChatAssistantService, ChatConversation, ChatRole, ChatTurn,
};
pub use error::{AppServicesError, ChatAssistantError, QuizServiceError};
pub use quizzes::{
    CountdownEnd, CountdownHandle, QuizAttemptListItem, QuizAttemptService, QuizCatalogItem,
    QuizLoopService, QuizOutcome, QuizRun, spawn_countdown,
};

mod app_settings;
mod attempt;
mod ids;
mod question;
mod quiz;

pub use ids::{AttemptId, ParseIdError, QuestionId, QuizId};

pub use app_settings::{
    AppSettings, AppSettingsDraft, AppSettingsError, DEFAULT_CHAT_HISTORY_LIMIT,
};
pub use attempt::{AttemptError, Completion, QuizAttempt, QuizResult, percentage_of};
pub use question::{Question, QuestionDraft, QuestionError};
pub use quiz::{Difficulty, PassingScore, Quiz, QuizError};

mod countdown;
mod service;
mod view;
mod workflow;

// Public API of the quiz subsystem.
pub use crate::error::QuizServiceError;
pub use countdown::{CountdownEnd, CountdownHandle, spawn_countdown};
pub use service::{QuizOutcome, QuizRun};
pub use view::{QuizAttemptListItem, QuizAttemptService, QuizCatalogItem};
pub use workflow::QuizLoopService;

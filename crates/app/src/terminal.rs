//! Line-oriented terminal front end for quizzes and the chat assistant.

use std::error::Error;
use std::io::Write;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::Mutex;
use tracing::warn;

use learn_core::model::{Quiz, QuizId};
use learn_core::quiz_session::QuizSessionError;
use learn_core::time::{format_countdown, is_low_time};
use services::{
    AppServices, ChatAssistantError, ChatConversation, CountdownEnd, QuizAttemptListItem,
    QuizCatalogItem, QuizLoopService, QuizOutcome, QuizRun, QuizServiceError, spawn_countdown,
};

const QUIZ_HELP: &str = "Commands: 1-9 select an option, n next, p previous, s submit, \
                         t time left, q abandon, ? help";

//
// ─── QUIZ ──────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuizCommand {
    /// Zero-based option index.
    Select(usize),
    Next,
    Previous,
    Submit,
    Time,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Option<QuizCommand> {
    let line = line.trim();
    if let Ok(number) = line.parse::<usize>() {
        return number.checked_sub(1).map(QuizCommand::Select);
    }
    match line.to_ascii_lowercase().as_str() {
        "n" | "next" => Some(QuizCommand::Next),
        "p" | "prev" | "previous" => Some(QuizCommand::Previous),
        "s" | "submit" => Some(QuizCommand::Submit),
        "t" | "time" => Some(QuizCommand::Time),
        "?" | "h" | "help" => Some(QuizCommand::Help),
        "q" | "quit" => Some(QuizCommand::Quit),
        _ => None,
    }
}

fn render_status(run: &QuizRun) -> String {
    let progress = run.progress();
    let remaining = run.remaining_seconds();
    let urgency = if is_low_time(remaining) { " (hurry!)" } else { "" };
    format!(
        "Question {} of {}  |  {} of {} answered  |  {} left{urgency}",
        progress.current + 1,
        progress.total,
        progress.answered,
        progress.total,
        format_countdown(remaining),
    )
}

fn render_question(run: &QuizRun) -> String {
    let mut out = render_status(run);
    let Some(question) = run.current_question() else {
        return out;
    };
    let selected = run.session().answer_for(run.session().current_index());

    out.push('\n');
    out.push_str(question.prompt());
    for (index, option) in question.options().iter().enumerate() {
        let mark = if selected == Some(index) { 'x' } else { ' ' };
        out.push_str(&format!("\n  [{mark}] {}) {option}", index + 1));
    }
    out
}

fn render_outcome(quiz: &Quiz, outcome: &QuizOutcome) -> String {
    let result = &outcome.result;
    let verdict = if outcome.passed { "passed" } else { "not passed" };
    let mut out = format!(
        "Score: {}/{} ({}%), {verdict} (pass mark {}%)",
        result.score(),
        result.total(),
        result.percentage(),
        quiz.passing_score().percent(),
    );
    if result.timed_out() {
        out.push_str("\nTime ran out; the quiz was submitted automatically.");
    }
    if result.unanswered() > 0 {
        out.push_str(&format!("\nUnanswered: {}", result.unanswered()));
    }
    out
}

fn render_review(run: &QuizRun) -> String {
    let session = run.session();
    let mut lines = Vec::with_capacity(session.total_questions());
    for (index, question) in session.questions().iter().enumerate() {
        let answer = session.answer_for(index);
        let mark = match answer {
            Some(option) if question.is_correct(option) => "correct",
            Some(_) => "wrong",
            None => "unanswered",
        };
        let correct = &question.options()[question.correct_option()];
        let mut line = format!("{}. {} [{mark}] answer: {correct}", index + 1, question.prompt());
        if let Some(explanation) = question.explanation() {
            line.push_str(&format!("\n   {explanation}"));
        }
        lines.push(line);
    }
    lines.join("\n")
}

async fn finish_after_countdown(
    quiz_loop: &QuizLoopService,
    run: &mut QuizRun,
    end: CountdownEnd,
) -> Result<Option<QuizOutcome>, Box<dyn Error>> {
    match end {
        CountdownEnd::TimedOut(_) | CountdownEnd::Completed => {}
        CountdownEnd::Failed(err) => {
            warn!(error = %err, "retrying attempt storage after timeout");
            quiz_loop.finalize_attempt(run).await?;
        }
        _ => return Ok(None),
    }

    let outcome = quiz_loop.outcome(run)?;
    println!("\nTime is up!");
    println!("{}", render_outcome(run.quiz(), &outcome));
    println!("{}", render_review(run));
    Ok(Some(outcome))
}

/// Submit explicitly, retrying the attempt store once if the run completed
/// but its attempt could not be written.
async fn submit_with_retry(
    quiz_loop: &QuizLoopService,
    run: &mut QuizRun,
) -> Result<QuizOutcome, QuizServiceError> {
    match quiz_loop.submit(run).await {
        Err(err) if run.is_complete() => {
            warn!(error = %err, "retrying attempt storage after submit");
            quiz_loop.finalize_attempt(run).await?;
            quiz_loop.outcome(run)
        }
        submitted => submitted,
    }
}

/// Run one quiz interactively, reading commands line by line from `input`.
///
/// Returns `None` when the quiz is abandoned; nothing is stored in that case.
///
/// # Errors
///
/// Returns an error when the quiz cannot be started, input fails, or the
/// attempt cannot be stored.
pub async fn run_quiz<R>(
    app: &AppServices,
    quiz_id: &QuizId,
    input: R,
) -> Result<Option<QuizOutcome>, Box<dyn Error>>
where
    R: AsyncBufRead + Unpin,
{
    let quiz_loop = app.quiz_loop();
    let run = quiz_loop.start_quiz(quiz_id).await?;
    println!("{} ({})", run.quiz().title(), run.quiz().difficulty());
    println!("{QUIZ_HELP}");
    println!("{}", render_question(&run));

    let run = Arc::new(Mutex::new(run));
    let mut countdown = spawn_countdown(Arc::clone(&quiz_loop), Arc::clone(&run));
    let mut lines = input.lines();

    loop {
        tokio::select! {
            end = countdown.finished() => {
                let mut guard = run.lock().await;
                return finish_after_countdown(&quiz_loop, &mut guard, end).await;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    countdown.stop();
                    println!("Input closed; quiz abandoned.");
                    return Ok(None);
                };

                let mut guard = run.lock().await;
                if guard.is_complete() {
                    // The countdown finished first and reports on its next poll.
                    continue;
                }

                match parse_command(&line) {
                    None => println!("Unknown command. {QUIZ_HELP}"),
                    Some(QuizCommand::Help) => println!("{QUIZ_HELP}"),
                    Some(QuizCommand::Time) => println!("{}", render_status(&guard)),
                    Some(QuizCommand::Select(option)) => match guard.answer_current(option) {
                        Ok(()) => println!("{}", render_question(&guard)),
                        Err(err) => println!("{err}"),
                    },
                    Some(QuizCommand::Next) => {
                        guard.go_to_next()?;
                        println!("{}", render_question(&guard));
                    }
                    Some(QuizCommand::Previous) => {
                        guard.go_to_previous()?;
                        println!("{}", render_question(&guard));
                    }
                    Some(QuizCommand::Submit) => match submit_with_retry(&quiz_loop, &mut guard).await {
                        Ok(outcome) => {
                            countdown.stop();
                            println!("{}", render_outcome(guard.quiz(), &outcome));
                            println!("{}", render_review(&guard));
                            return Ok(Some(outcome));
                        }
                        Err(QuizServiceError::Session(QuizSessionError::IncompleteSubmission {
                            unanswered,
                        })) => {
                            println!("{unanswered} question(s) still unanswered.");
                        }
                        Err(err) => return Err(err.into()),
                    },
                    Some(QuizCommand::Quit) => {
                        countdown.stop();
                        println!("Quiz abandoned; no attempt recorded.");
                        return Ok(None);
                    }
                }
            }
        }
    }
}

//
// ─── LISTINGS ──────────────────────────────────────────────────────────────────
//

fn render_attempt(item: &QuizAttemptListItem) -> String {
    let verdict = if item.passed { "passed" } else { "failed" };
    format!(
        "{}  {}/{} ({}%) {verdict}, {} in {}",
        item.completed_at.format("%Y-%m-%d %H:%M"),
        item.score,
        item.total,
        item.percentage,
        item.completion,
        format_countdown(u32::try_from(item.duration_seconds().max(0)).unwrap_or(u32::MAX)),
    )
}

pub fn print_catalog(items: &[QuizCatalogItem]) {
    for item in items {
        let quiz = &item.quiz;
        let latest = item
            .latest_attempt
            .as_ref()
            .map_or_else(|| "not attempted".to_string(), render_attempt);
        println!(
            "{:<22} {} [{}, {}] {} questions, {} min. Last: {latest}",
            quiz.id().as_str(),
            quiz.title(),
            quiz.topic(),
            quiz.difficulty(),
            item.question_count,
            quiz.time_limit_minutes(),
        );
    }
}

pub fn print_history(quiz_id: &QuizId, items: &[QuizAttemptListItem]) {
    if items.is_empty() {
        println!("No attempts for {quiz_id} yet.");
        return;
    }
    for item in items {
        println!("#{:<4} {}", item.id, render_attempt(item));
    }
}

//
// ─── CHAT ──────────────────────────────────────────────────────────────────────
//

/// Interactive chat until `/exit` or end of input.
///
/// # Errors
///
/// Returns `ChatAssistantError::Disabled` without an API key, or an input error.
pub async fn run_chat<R>(
    app: &AppServices,
    topic: Option<String>,
    input: R,
) -> Result<(), Box<dyn Error>>
where
    R: AsyncBufRead + Unpin,
{
    let assistant = app.chat_assistant();
    if !assistant.enabled() {
        return Err(ChatAssistantError::Disabled.into());
    }

    let mut conversation = ChatConversation::new(topic);
    println!(
        "Chatting about {}. /clear resets the conversation, /exit leaves.",
        conversation.topic().unwrap_or("programming")
    );

    let mut lines = input.lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "" => {}
            "/exit" | "/quit" => break,
            "/clear" => {
                conversation.clear();
                println!("Conversation cleared.");
            }
            message => match conversation.send(&assistant, message).await {
                Ok(reply) => println!("{reply}"),
                Err(err) => println!("Assistant unavailable: {err}"),
            },
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use learn_core::model::{AppSettings, AttemptId, QuizAttempt};
    use learn_core::time::fixed_now;
    use services::Clock;
    use storage::catalog::{builtin_catalog, seed_catalog};
    use storage::repository::{
        InMemoryRepository, QuizAttemptRepository, QuizAttemptRow, Storage, StorageError,
    };

    async fn app() -> AppServices {
        AppServices::in_memory(Clock::fixed(fixed_now()), AppSettings::default())
            .await
            .unwrap()
    }

    #[test]
    fn commands_parse() {
        assert_eq!(parse_command(" 2 "), Some(QuizCommand::Select(1)));
        assert_eq!(parse_command("0"), None);
        assert_eq!(parse_command("N"), Some(QuizCommand::Next));
        assert_eq!(parse_command("prev"), Some(QuizCommand::Previous));
        assert_eq!(parse_command("s"), Some(QuizCommand::Submit));
        assert_eq!(parse_command("q"), Some(QuizCommand::Quit));
        assert_eq!(parse_command("bogus"), None);
    }

    #[tokio::test]
    async fn question_render_marks_selection_and_time() {
        let app = app().await;
        let mut run = app
            .quiz_loop()
            .start_quiz(&QuizId::new("cpp-memory").unwrap())
            .await
            .unwrap();
        run.answer_current(2).unwrap();

        let text = render_question(&run);
        assert!(text.starts_with("Question 1 of 1  |  1 of 1 answered  |  35:00 left\n"));
        assert!(text.contains("[x] 3)"));
        assert!(text.contains("[ ] 1)"));
    }

    #[tokio::test]
    async fn scripted_quiz_submits_and_stores_attempt() {
        let app = app().await;
        let quiz_id = QuizId::new("java-oop").unwrap();
        let script: &[u8] = b"s\n1\nn\n2\ns\n";

        let outcome = run_quiz(&app, &quiz_id, script).await.unwrap().unwrap();
        assert_eq!(outcome.result.score(), 2);
        assert!(outcome.passed);

        let history = app
            .attempts()
            .list_recent_attempts(&quiz_id, 10)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn abandoned_quiz_stores_nothing() {
        let app = app().await;
        let quiz_id = QuizId::new("react-hooks").unwrap();
        let script: &[u8] = b"1\nq\n";

        assert!(run_quiz(&app, &quiz_id, script).await.unwrap().is_none());
        assert!(
            app.attempts()
                .list_recent_attempts(&quiz_id, 10)
                .await
                .unwrap()
                .is_empty()
        );
    }

    /// Fails the first append, then delegates.
    struct FlakyAttempts {
        inner: InMemoryRepository,
        fail_next: AtomicBool,
    }

    #[async_trait::async_trait]
    impl QuizAttemptRepository for FlakyAttempts {
        async fn append_attempt(&self, attempt: &QuizAttempt) -> Result<AttemptId, StorageError> {
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(StorageError::Connection("database is locked".into()));
            }
            self.inner.append_attempt(attempt).await
        }

        async fn get_attempt(&self, id: AttemptId) -> Result<QuizAttempt, StorageError> {
            self.inner.get_attempt(id).await
        }

        async fn list_attempt_rows(
            &self,
            quiz_id: &QuizId,
            limit: u32,
        ) -> Result<Vec<QuizAttemptRow>, StorageError> {
            self.inner.list_attempt_rows(quiz_id, limit).await
        }

        async fn list_latest_attempt_rows(
            &self,
            quiz_ids: &[QuizId],
        ) -> Result<Vec<QuizAttemptRow>, StorageError> {
            self.inner.list_latest_attempt_rows(quiz_ids).await
        }
    }

    #[tokio::test]
    async fn submit_retries_a_failed_attempt_store() {
        let repo = InMemoryRepository::new();
        let storage = Storage {
            quizzes: Arc::new(repo.clone()),
            attempts: Arc::new(repo.clone()),
        };
        seed_catalog(&storage, &builtin_catalog().unwrap()).await.unwrap();
        let quiz_loop = QuizLoopService::new(
            Clock::fixed(fixed_now()),
            Arc::new(repo.clone()),
            Arc::new(FlakyAttempts {
                inner: repo.clone(),
                fail_next: AtomicBool::new(true),
            }),
        );
        let quiz_id = QuizId::new("react-hooks").unwrap();
        let mut run = quiz_loop.start_quiz(&quiz_id).await.unwrap();
        run.answer_current(1).unwrap();

        let outcome = submit_with_retry(&quiz_loop, &mut run).await.unwrap();
        assert_eq!(outcome.result.score(), 1);
        assert_eq!(run.attempt_id(), Some(outcome.attempt_id));
        assert_eq!(repo.list_attempt_rows(&quiz_id, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn chat_requires_api_key() {
        let app = app().await;
        let err = run_chat(&app, Some("Rust".into()), &b""[..]).await.unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }
}

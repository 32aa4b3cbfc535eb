//! Tests for logging configuration and the structured events of a crew run
//!
//! Events are captured with a thread-local subscriber so these tests do not
//! depend on (or disturb) global logging setup.

use crewline::crew::{AgentDescriptor, Crew, TaskDescriptor};
use crewline::observability::{parse_level, LogFormat};
use crewline::testing::MockBackend;
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use tracing::Level;

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capture(level: Level) -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(level)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}

fn two_step_crew(backend: Arc<MockBackend>) -> Crew {
    let worker = Arc::new(AgentDescriptor::new(
        "worker",
        "Worker",
        "Work on {topic}",
        "You work.",
    ));
    Crew::new(
        vec![
            TaskDescriptor::new("first step", "", worker.clone()),
            TaskDescriptor::new("second step", "", worker),
        ],
        backend,
    )
    .with_name("logging-crew")
}

#[test]
fn test_log_format_parse() {
    assert_eq!(LogFormat::parse("json"), LogFormat::Json);
    assert_eq!(LogFormat::parse("  PRETTY "), LogFormat::Pretty);
    assert_eq!(LogFormat::parse("compact\n"), LogFormat::Compact);
    assert_eq!(LogFormat::parse("yaml"), LogFormat::Json);
}

#[test]
fn test_parse_level_defaults_to_info() {
    assert_eq!(parse_level("debug"), Level::DEBUG);
    assert_eq!(parse_level(" WARN "), Level::WARN);
    assert_eq!(parse_level("verbose"), Level::INFO);
}

#[tokio::test]
async fn test_run_logs_task_lifecycle_inside_spans() {
    let (logs, _guard) = capture(Level::INFO);
    let backend = Arc::new(MockBackend::new(&["ONE", "TWO"]));
    let crew = two_step_crew(backend);

    let inputs = HashMap::from([("topic".to_string(), "Rust".to_string())]);
    crew.run(&inputs).await.unwrap();

    let output = logs.contents();
    assert!(output.contains("crew_run"), "missing crew span: {output}");
    assert!(output.contains("task_execution"));
    assert!(output.contains("logging-crew"));
    assert!(output.contains("Task started"));
    assert!(output.contains("Task completed"));
    assert!(output.contains("completed 2 task(s)"));
}

#[tokio::test]
async fn test_unused_input_is_logged_as_warning() {
    let (logs, _guard) = capture(Level::WARN);
    let backend = Arc::new(MockBackend::new(&["ONE", "TWO"]));
    let crew = two_step_crew(backend);

    let inputs = HashMap::from([
        ("topic".to_string(), "Rust".to_string()),
        ("tone".to_string(), "playful".to_string()),
    ]);
    crew.run(&inputs).await.unwrap();

    let output = logs.contents();
    assert!(output.contains("WARN"));
    assert!(output.contains("tone"));
    assert!(!output.contains("Task started"));
}

#[tokio::test]
async fn test_failed_run_logs_abort_with_task_index() {
    let (logs, _guard) = capture(Level::ERROR);
    let backend = Arc::new(MockBackend::failing_at(&["ONE", "TWO"], 1));
    let crew = two_step_crew(backend);

    let inputs = HashMap::from([("topic".to_string(), "Rust".to_string())]);
    assert!(crew.run(&inputs).await.is_err());

    let output = logs.contents();
    assert!(output.contains("Crew run aborted"));
    assert!(output.contains("task_index=1"));
}

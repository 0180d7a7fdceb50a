//! End-to-end session runs against a scripted in-process backend.
//!
//! Personas come from a canned JSON reply; each persona's stream is scripted
//! by name so producers can succeed, fail, or hang independently.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use ratatui::backend::TestBackend;
use ratatui::Terminal;
use tempfile::TempDir;

use persona_panels::config::SessionConfig;
use persona_panels::llm::types::ChatRequest;
use persona_panels::llm::{ChatBackend, FragmentStream, LlmError};
use persona_panels::session::{PanelView, ProducerOutcome, Session, CANCELLED_MESSAGE};
use persona_panels::storage::TopicStore;
use persona_panels::tui::{FrameSink, TerminalSurface};

#[derive(Clone)]
enum Script {
    Tokens(Vec<&'static str>),
    Refuse(&'static str),
    Hang,
}

struct ScriptedBackend {
    profiles: String,
    scripts: HashMap<&'static str, Script>,
}

impl ScriptedBackend {
    fn new(names: &[(&'static str, Script)]) -> Self {
        let profiles: Vec<_> = names
            .iter()
            .enumerate()
            .map(|(i, (name, _))| {
                serde_json::json!({
                    "name": name,
                    "age": 20 + i,
                    "occupation": "Tester",
                    "personality": "Thorough",
                })
            })
            .collect();
        Self {
            profiles: serde_json::json!({ "profiles": profiles }).to_string(),
            scripts: names.iter().cloned().collect(),
        }
    }

    fn script_for(&self, request: &ChatRequest) -> Script {
        let system = &request.messages[0].content;
        self.scripts
            .iter()
            .find(|(name, _)| system.contains(&format!("Name: {name}\n")))
            .map(|(_, script)| script.clone())
            .unwrap_or(Script::Tokens(vec![]))
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn complete(&self, _request: ChatRequest) -> Result<String, LlmError> {
        Ok(self.profiles.clone())
    }

    async fn stream(&self, request: ChatRequest) -> Result<FragmentStream, LlmError> {
        match self.script_for(&request) {
            Script::Tokens(tokens) => {
                let stream = futures::stream::iter(tokens).then(|t| async move {
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    Ok::<_, LlmError>(t.to_string())
                });
                Ok(Box::pin(stream))
            }
            Script::Refuse(message) => Err(LlmError::ApiError {
                status: 503,
                message: message.into(),
            }),
            Script::Hang => Ok(Box::pin(futures::stream::pending::<Result<String, LlmError>>())),
        }
    }
}

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<Vec<PanelView>>>>);

impl FrameSink for Recorder {
    fn draw(&mut self, panels: &[PanelView]) -> anyhow::Result<()> {
        self.0.lock().unwrap().push(panels.to_vec());
        Ok(())
    }
}

fn config(cache: &TempDir) -> SessionConfig {
    SessionConfig {
        refresh_hz: 100,
        producer_timeout_secs: Some(5),
        cache_dir: cache.path().to_path_buf(),
        ..SessionConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn all_personas_stream_to_completion() {
    let cache = TempDir::new().unwrap();
    let backend = ScriptedBackend::new(&[
        ("Ana", Script::Tokens(vec!["Cities ", "are ", "loud."])),
        ("Ben", Script::Tokens(vec!["I ", "like ", "trains."])),
        ("Cy", Script::Tokens(vec!["Meh."])),
    ]);
    let session = Session::new(Arc::new(backend), config(&cache));
    let recorder = Recorder::default();

    let (report, _) = session
        .run("City Life", 3, || Ok(recorder.clone()), std::future::pending())
        .await
        .unwrap();

    assert!(!report.cancelled);
    let texts: Vec<&str> = report.panels.iter().map(|p| p.text.as_str()).collect();
    assert_eq!(texts, vec!["Cities are loud.", "I like trains.", "Meh."]);
    assert!(report.panels.iter().all(|p| p.done));
    assert_eq!(report.panels[0].label, "Ana (20, Tester, Thorough)");
    assert_eq!(report.outcomes.len(), 3);

    // The last frame the surface saw is the final state
    let frames = recorder.0.lock().unwrap().clone();
    assert_eq!(frames.last().unwrap(), &report.panels);

    // Every frame is index-ordered and only grows
    for pair in frames.windows(2) {
        for panel in &pair[0] {
            let later = pair[1].iter().find(|p| p.index == panel.index).unwrap();
            assert!(later.text.starts_with(&panel.text));
        }
    }

    let log = TopicStore::new(cache.path()).load("City Life").unwrap();
    assert_eq!(log.messages.len(), 3);
}

#[tokio::test]
async fn one_failure_does_not_stall_the_rest() {
    let cache = TempDir::new().unwrap();
    let backend = ScriptedBackend::new(&[
        ("Dee", Script::Refuse("overloaded")),
        ("Eli", Script::Tokens(vec!["ok"])),
    ]);
    let session = Session::new(Arc::new(backend), config(&cache)).without_persistence();

    let (report, _) = session
        .run("t", 2, || Ok(Recorder::default()), std::future::pending())
        .await
        .unwrap();

    assert!(report.panels[0].done);
    assert!(report.panels[0]
        .text
        .starts_with("[error] stream failed: API error (status 503): overloaded"));
    assert_eq!(report.panels[1].text, "ok");

    let outcome_of = |i: usize| {
        report
            .outcomes
            .iter()
            .find(|(idx, _)| *idx == i)
            .map(|(_, o)| o.clone())
            .unwrap()
    };
    assert!(matches!(outcome_of(0), ProducerOutcome::Failed(_)));
    assert_eq!(outcome_of(1), ProducerOutcome::Completed("ok".into()));
    assert!(!cache.path().join("t.json").exists());
}

#[tokio::test]
async fn hung_producer_is_bounded_by_timeout() {
    let cache = TempDir::new().unwrap();
    let backend = ScriptedBackend::new(&[
        ("Flo", Script::Hang),
        ("Gus", Script::Tokens(vec!["fine"])),
    ]);
    let mut cfg = config(&cache);
    cfg.producer_timeout_secs = Some(1);
    let session = Session::new(Arc::new(backend), cfg).without_persistence();

    let (report, _) = tokio::time::timeout(
        Duration::from_secs(10),
        session.run("t", 2, || Ok(Recorder::default()), std::future::pending()),
    )
    .await
    .expect("session should not hang")
    .unwrap();

    assert!(report.panels[0].text.contains("timed out"));
    assert_eq!(report.panels[1].text, "fine");
}

#[tokio::test]
async fn shutdown_aborts_hung_producers() {
    let cache = TempDir::new().unwrap();
    let backend = ScriptedBackend::new(&[("Hal", Script::Hang), ("Ida", Script::Hang)]);
    let mut cfg = config(&cache);
    cfg.producer_timeout_secs = None;
    let session = Session::new(Arc::new(backend), cfg).without_persistence();

    let shutdown = tokio::time::sleep(Duration::from_millis(100));
    let (report, _) = tokio::time::timeout(
        Duration::from_secs(10),
        session.run("t", 2, || Ok(Recorder::default()), shutdown),
    )
    .await
    .expect("shutdown should end the session")
    .unwrap();

    assert!(report.cancelled);
    assert!(report.panels.iter().all(|p| p.done));
    // Either the producer got to register (empty text) or the sweep did
    assert!(report
        .panels
        .iter()
        .all(|p| p.text.is_empty() || p.text == CANCELLED_MESSAGE));
}

#[tokio::test]
async fn bad_persona_reply_falls_back() {
    struct Garbage;

    #[async_trait]
    impl ChatBackend for Garbage {
        async fn complete(&self, _request: ChatRequest) -> Result<String, LlmError> {
            Ok("not json".into())
        }

        async fn stream(&self, _request: ChatRequest) -> Result<FragmentStream, LlmError> {
            Ok(Box::pin(futures::stream::iter(vec![Ok::<_, LlmError>("hello".to_string())])))
        }
    }

    let cache = TempDir::new().unwrap();
    let session = Session::new(Arc::new(Garbage), config(&cache)).without_persistence();
    let (report, _) = session
        .run("t", 2, || Ok(Recorder::default()), std::future::pending())
        .await
        .unwrap();

    assert_eq!(report.personas[0].name, "Agent 1");
    assert_eq!(report.panels[1].label, "Agent 2 (31, Unemployed, Calm)");
    assert!(report.panels.iter().all(|p| p.text == "hello"));
}

/// Persona generation that never answers.
struct Silent;

#[async_trait]
impl ChatBackend for Silent {
    async fn complete(&self, _request: ChatRequest) -> Result<String, LlmError> {
        std::future::pending().await
    }

    async fn stream(&self, _request: ChatRequest) -> Result<FragmentStream, LlmError> {
        Ok(Box::pin(futures::stream::iter(vec![Ok::<_, LlmError>("hello".to_string())])))
    }
}

#[tokio::test]
async fn shutdown_during_persona_generation_opens_nothing() {
    let cache = TempDir::new().unwrap();
    let mut cfg = config(&cache);
    cfg.producer_timeout_secs = None;
    let session = Session::new(Arc::new(Silent), cfg).without_persistence();
    let opened = Arc::new(AtomicBool::new(false));

    let shutdown = tokio::time::sleep(Duration::from_millis(100));
    let open = {
        let opened = opened.clone();
        move || {
            opened.store(true, Ordering::SeqCst);
            Ok(Recorder::default())
        }
    };
    let (report, surface) = tokio::time::timeout(
        Duration::from_secs(2),
        session.run("t", 2, open, shutdown),
    )
    .await
    .expect("shutdown should end persona generation")
    .unwrap();

    assert!(report.cancelled);
    assert!(report.personas.is_empty());
    assert!(report.panels.is_empty());
    assert!(surface.is_none());
    assert!(!opened.load(Ordering::SeqCst));
}

#[tokio::test]
async fn slow_persona_generation_falls_back() {
    let cache = TempDir::new().unwrap();
    let mut cfg = config(&cache);
    cfg.producer_timeout_secs = Some(1);
    let session = Session::new(Arc::new(Silent), cfg).without_persistence();

    let (report, _) = tokio::time::timeout(
        Duration::from_secs(5),
        session.run("t", 2, || Ok(Recorder::default()), std::future::pending()),
    )
    .await
    .expect("persona generation should be bounded")
    .unwrap();

    assert!(!report.cancelled);
    assert_eq!(report.personas[0].name, "Agent 1");
    assert!(report.panels.iter().all(|p| p.done && p.text == "hello"));
}

#[tokio::test]
async fn renders_to_terminal_surface() {
    let cache = TempDir::new().unwrap();
    let backend = ScriptedBackend::new(&[("Jo", Script::Tokens(vec!["Hi ", "there"]))]);
    let session = Session::new(Arc::new(backend), config(&cache)).without_persistence();
    let surface = TerminalSurface::new(Terminal::new(TestBackend::new(50, 8)).unwrap());

    let (_, surface) = session
        .run("t", 1, move || Ok(surface), std::future::pending())
        .await
        .unwrap();
    let surface = surface.expect("surface opened");

    let content: String = surface
        .backend()
        .buffer()
        .content()
        .iter()
        .map(|cell| cell.symbol().to_string())
        .collect();
    assert!(content.contains("Jo (20, Tester, Thorough)"));
    assert!(content.contains("Hi there"));
    assert!(content.contains("done"));
}

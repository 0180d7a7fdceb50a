//! Session — one topic, N personas streaming side by side.
//!
//! ## Flow
//!
//! 1. Generate personas (one-shot, non-streaming, bounded by the producer
//!    timeout).
//! 2. Open the display surface and spawn the render loop over a fresh
//!    `StreamAggregator`.
//! 3. Spawn one producer per persona; each registers its slot and streams
//!    into it.
//! 4. Join every producer, then join the render loop, which exits once all
//!    slots are finished.
//!
//! Producer failures stay inside their own panel. A shutdown signal during
//! step 1 ends the session before any surface is opened. Later it aborts
//! outstanding producers; their guards finish the slots so the render loop
//! still terminates.

pub mod aggregator;
pub mod error;
pub mod producer;

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::SessionConfig;
use crate::llm::ChatBackend;
use crate::persona::{fallback_personas, generate_personas, Persona};
use crate::storage::TopicStore;
use crate::tui::{FrameSink, RenderLoop};

pub use aggregator::{PanelView, StreamAggregator};
pub use error::{SessionError, SessionResult};
pub use producer::{Producer, ProducerContext, ProducerOutcome};

/// Panel text for slots whose producer never got to run.
pub const CANCELLED_MESSAGE: &str = "[cancelled]";

/// What a finished session leaves behind.
#[derive(Debug)]
pub struct SessionReport {
    pub personas: Vec<Persona>,
    /// Final state of every panel, in slot order.
    pub panels: Vec<PanelView>,
    /// Outcomes of producers that ran to completion (any order).
    pub outcomes: Vec<(usize, ProducerOutcome)>,
    pub cancelled: bool,
}

pub struct Session {
    backend: Arc<dyn ChatBackend>,
    config: SessionConfig,
    store: Option<Arc<TopicStore>>,
}

impl Session {
    /// Session persisting finished responses under `config.cache_dir`.
    pub fn new(backend: Arc<dyn ChatBackend>, config: SessionConfig) -> Self {
        let store = Arc::new(TopicStore::new(config.cache_dir.clone()));
        Self {
            backend,
            config,
            store: Some(store),
        }
    }

    /// Drop persistence (tests, dry runs).
    pub fn without_persistence(mut self) -> Self {
        self.store = None;
        self
    }

    /// Run a full session for `agents` personas on `topic`.
    ///
    /// `open_surface` is called once personas are ready, right before the
    /// first frame. `shutdown` resolving ends the session (Ctrl-C): during
    /// persona generation nothing is opened and the surface comes back as
    /// `None`; afterwards outstanding producers are aborted. Pass
    /// `std::future::pending()` to run to completion.
    pub async fn run<S, F>(
        &self,
        topic: &str,
        agents: usize,
        open_surface: F,
        shutdown: impl Future<Output = ()> + Send,
    ) -> anyhow::Result<(SessionReport, Option<S>)>
    where
        S: FrameSink + Send + 'static,
        F: FnOnce() -> anyhow::Result<S> + Send,
    {
        let period = self.config.refresh_period()?;
        tokio::pin!(shutdown);

        let personas = tokio::select! {
            personas = self.personas(topic, agents) => personas,
            _ = &mut shutdown => {
                info!(topic, "shutdown requested during persona generation");
                let report = SessionReport {
                    personas: Vec::new(),
                    panels: Vec::new(),
                    outcomes: Vec::new(),
                    cancelled: true,
                };
                return Ok((report, None));
            }
        };
        info!(topic, personas = personas.len(), "session starting");

        let surface = open_surface()?;
        let aggregator = Arc::new(StreamAggregator::new(personas.len()));
        let render = tokio::spawn(RenderLoop::new(aggregator.clone(), period, surface).run());

        let ctx = Arc::new(ProducerContext {
            backend: self.backend.clone(),
            aggregator: aggregator.clone(),
            store: self.store.clone(),
            topic: topic.to_string(),
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            timeout: self.config.producer_timeout(),
        });

        let mut producers = JoinSet::new();
        for (index, persona) in personas.iter().enumerate() {
            let producer = Producer::new(index, persona.clone(), ctx.clone());
            producers.spawn(async move { (index, producer.run().await) });
        }

        let (outcomes, cancelled) = join_producers(&mut producers, shutdown.as_mut()).await;
        sweep_unregistered(&aggregator, &personas);

        let surface = render
            .await
            .context("render loop task failed")?
            .context("render loop failed")?;

        info!(
            completed = outcomes
                .iter()
                .filter(|(_, o)| matches!(o, ProducerOutcome::Completed(_)))
                .count(),
            total = personas.len(),
            cancelled,
            "session finished"
        );

        let report = SessionReport {
            personas,
            panels: aggregator.snapshot(),
            outcomes,
            cancelled,
        };
        Ok((report, Some(surface)))
    }

    /// Generate personas, falling back to placeholders if the model does not
    /// answer within the producer timeout.
    async fn personas(&self, topic: &str, agents: usize) -> Vec<Persona> {
        let generate = generate_personas(self.backend.as_ref(), &self.config.model, topic, agents);
        let Some(limit) = self.config.producer_timeout() else {
            return generate.await;
        };
        match tokio::time::timeout(limit, generate).await {
            Ok(personas) => personas,
            Err(_) => {
                warn!(?limit, "persona generation timed out, using fallback personas");
                fallback_personas(agents)
            }
        }
    }
}

/// Collect producer results; on shutdown abort whatever is still running.
async fn join_producers(
    producers: &mut JoinSet<(usize, ProducerOutcome)>,
    shutdown: impl Future<Output = ()> + Send,
) -> (Vec<(usize, ProducerOutcome)>, bool) {
    let mut outcomes = Vec::new();
    let mut cancelled = false;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            joined = producers.join_next() => match joined {
                Some(Ok(outcome)) => outcomes.push(outcome),
                Some(Err(e)) if e.is_cancelled() => {}
                Some(Err(e)) => warn!("producer task panicked: {e}"),
                None => break,
            },
            _ = &mut shutdown, if !cancelled => {
                info!("shutdown requested, aborting {} producers", producers.len());
                producers.abort_all();
                cancelled = true;
            }
        }
    }
    (outcomes, cancelled)
}

/// Any slot whose producer was aborted before registering would keep the
/// render loop alive forever; register and finish it here.
fn sweep_unregistered(aggregator: &StreamAggregator, personas: &[Persona]) {
    for (index, persona) in personas.iter().enumerate() {
        if aggregator.register(index, persona.label()).is_ok() {
            if let Err(e) = aggregator.fail(index, CANCELLED_MESSAGE) {
                warn!(slot = index, "failed to close unregistered slot: {e}");
            }
        }
    }
}

//! Producer — one persona's streamed response, written into its slot.
//!
//! Every exit path finishes the slot exactly once: natural end, setup error,
//! mid-stream error, timeout, task abort, or panic. The last two are covered
//! by `FinishGuard`'s `Drop`.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tracing::{debug, warn};

use crate::llm::types::{ChatMessage, ChatRequest};
use crate::llm::{ChatBackend, LlmError};
use crate::persona::{prompts, Persona};
use crate::storage::TopicStore;

use super::aggregator::StreamAggregator;
use super::error::SessionResult;

/// How a producer's stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProducerOutcome {
    /// Stream ended naturally with this (trimmed, non-empty) text.
    Completed(String),
    /// Stream ended naturally without any text.
    Empty,
    /// Stream could not be opened or broke; the message is in the panel.
    Failed(String),
}

/// Shared by every producer in a session.
pub struct ProducerContext {
    pub backend: Arc<dyn ChatBackend>,
    pub aggregator: Arc<StreamAggregator>,
    /// `None` disables persistence.
    pub store: Option<Arc<TopicStore>>,
    pub topic: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Option<Duration>,
}

/// One persona bound to one slot.
pub struct Producer {
    pub index: usize,
    pub persona: Persona,
    pub ctx: Arc<ProducerContext>,
}

/// Finishes the slot on drop unless already consumed.
struct FinishGuard<'a> {
    aggregator: &'a StreamAggregator,
    index: usize,
    armed: bool,
}

impl<'a> FinishGuard<'a> {
    fn new(aggregator: &'a StreamAggregator, index: usize) -> Self {
        Self {
            aggregator,
            index,
            armed: true,
        }
    }

    fn finish(mut self) {
        self.armed = false;
        report(self.index, self.aggregator.finish(self.index));
    }

    fn fail(mut self, message: &str) {
        self.armed = false;
        report(self.index, self.aggregator.fail(self.index, message));
    }
}

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            debug!(slot = self.index, "producer dropped before finishing");
            report(self.index, self.aggregator.finish(self.index));
        }
    }
}

/// Slot errors are a producer-discipline bug; log and keep going.
fn report(index: usize, result: SessionResult<()>) {
    if let Err(e) = result {
        warn!(slot = index, "ignoring aggregator error: {e}");
    }
}

enum StreamFailure {
    /// Nothing was received.
    Setup(LlmError),
    /// Some fragments were received first.
    Interrupted(LlmError),
}

impl StreamFailure {
    fn panel_message(&self) -> String {
        match self {
            StreamFailure::Setup(e) => format!("[error] stream failed: {e}"),
            StreamFailure::Interrupted(e) => format!("\n[error] stream interrupted: {e}"),
        }
    }
}

impl Producer {
    pub fn new(index: usize, persona: Persona, ctx: Arc<ProducerContext>) -> Self {
        Self {
            index,
            persona,
            ctx,
        }
    }

    fn request(&self) -> ChatRequest {
        ChatRequest::new(
            self.ctx.model.clone(),
            vec![
                ChatMessage::system(prompts::persona_system_prompt(&self.persona)),
                ChatMessage::user(prompts::persona_user_prompt(&self.ctx.topic)),
            ],
        )
        .max_tokens(self.ctx.max_tokens)
        .streaming()
    }

    /// Register, stream, finish, persist.
    pub async fn run(self) -> ProducerOutcome {
        let aggregator = self.ctx.aggregator.clone();
        report(
            self.index,
            aggregator.register(self.index, self.persona.label()),
        );
        let guard = FinishGuard::new(&aggregator, self.index);

        let mut collected = String::new();
        let result = match self.ctx.timeout {
            Some(limit) => {
                let timed = tokio::time::timeout(limit, self.pump(&aggregator, &mut collected)).await;
                match timed {
                    Ok(result) => result,
                    Err(_) if collected.is_empty() => {
                        Err(StreamFailure::Setup(LlmError::Timeout(limit)))
                    }
                    Err(_) => Err(StreamFailure::Interrupted(LlmError::Timeout(limit))),
                }
            }
            None => self.pump(&aggregator, &mut collected).await,
        };

        match result {
            Ok(()) => {
                guard.finish();
                let text = collected.trim().to_string();
                if text.is_empty() {
                    debug!(slot = self.index, "stream ended without text");
                    return ProducerOutcome::Empty;
                }
                debug!(slot = self.index, chars = text.len(), "stream complete");
                self.persist(&text).await;
                ProducerOutcome::Completed(text)
            }
            Err(failure) => {
                let message = failure.panel_message();
                debug!(slot = self.index, persona = %self.persona.name, "{}", message.trim());
                guard.fail(&message);
                ProducerOutcome::Failed(message.trim().to_string())
            }
        }
    }

    /// Open the stream and append fragments in arrival order.
    async fn pump(
        &self,
        aggregator: &StreamAggregator,
        collected: &mut String,
    ) -> Result<(), StreamFailure> {
        let mut stream = self
            .ctx
            .backend
            .stream(self.request())
            .await
            .map_err(StreamFailure::Setup)?;

        while let Some(item) = stream.next().await {
            match item {
                Ok(fragment) => {
                    if fragment.is_empty() {
                        continue;
                    }
                    collected.push_str(&fragment);
                    report(self.index, aggregator.append(self.index, &fragment));
                }
                Err(e) if collected.is_empty() => return Err(StreamFailure::Setup(e)),
                Err(e) => return Err(StreamFailure::Interrupted(e)),
            }
        }
        Ok(())
    }

    /// Hand the finished text to the topic store off the async threads.
    async fn persist(&self, text: &str) {
        let Some(store) = self.ctx.store.clone() else {
            return;
        };
        let topic = self.ctx.topic.clone();
        let persona = self.persona.clone();
        let text = text.to_string();
        let index = self.index;
        let joined =
            tokio::task::spawn_blocking(move || store.append(&topic, &persona, &text)).await;
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(slot = index, "failed to persist response: {e}"),
            Err(e) => warn!(slot = index, "persistence task failed: {e}"),
        }
    }
}

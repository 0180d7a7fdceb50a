//! Personas — who is speaking in each panel.
//!
//! Generated once per session by a non-streaming call, then validated into
//! fixed `Persona` records. Malformed entries are dropped or defaulted; an
//! unusable reply falls back to generic personas. The result always has
//! exactly the requested length so every slot gets a producer.

pub mod prompts;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::llm::types::{ChatMessage, ChatRequest};
use crate::llm::ChatBackend;

/// Age used when the model omits one or sends garbage.
pub const DEFAULT_AGE: u32 = 30;

/// A validated persona.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub age: u32,
    pub occupation: String,
    pub personality: String,
}

impl Persona {
    /// Panel title: `Name (Age, Occupation, Personality)`.
    pub fn label(&self) -> String {
        format!(
            "{} ({}, {}, {})",
            self.name, self.age, self.occupation, self.personality
        )
    }

    /// Generic stand-in for slot `i`.
    pub fn fallback(i: usize) -> Self {
        Self {
            name: format!("Agent {}", i + 1),
            age: DEFAULT_AGE + i as u32,
            occupation: "Unemployed".into(),
            personality: "Calm".into(),
        }
    }
}

/// `n` fallback personas.
pub fn fallback_personas(n: usize) -> Vec<Persona> {
    (0..n).map(Persona::fallback).collect()
}

/// Validate a generation reply into at most `n` personas.
///
/// Returns `None` when the reply is not a JSON object, so the caller can
/// fall back wholesale.
pub fn parse_personas(content: &str, n: usize) -> Option<Vec<Persona>> {
    let data: Value = serde_json::from_str(content).ok()?;
    let data = data.as_object()?;
    let profiles = data
        .get("profiles")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut names = HashSet::new();
    let mut personas = Vec::new();
    for entry in &profiles {
        let Some(entry) = entry.as_object() else {
            continue;
        };
        let name = string_field(entry.get("name"));
        if name.is_empty() || !names.insert(name.clone()) {
            continue;
        }
        personas.push(Persona {
            name,
            age: age_field(entry.get("age")),
            occupation: string_field(entry.get("occupation")),
            personality: string_field(entry.get("personality")),
        });
    }
    personas.truncate(n);
    Some(personas)
}

fn string_field(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string().trim().to_string(),
    }
}

fn age_field(value: Option<&Value>) -> u32 {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(DEFAULT_AGE),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(DEFAULT_AGE),
        _ => DEFAULT_AGE,
    }
}

/// Top up a short persona list to exactly `n`, keeping names unique.
pub fn pad_personas(mut personas: Vec<Persona>, n: usize) -> Vec<Persona> {
    let mut i = 0;
    while personas.len() < n {
        let candidate = Persona::fallback(i);
        if !personas.iter().any(|p| p.name == candidate.name) {
            personas.push(candidate);
        }
        i += 1;
    }
    personas.truncate(n);
    personas
}

/// Ask the model for `n` personas on `topic`. Never fails: any error
/// degrades to fallback personas.
pub async fn generate_personas(
    backend: &dyn ChatBackend,
    model: &str,
    topic: &str,
    n: usize,
) -> Vec<Persona> {
    let request = ChatRequest::new(
        model,
        vec![
            ChatMessage::system(prompts::PROFILE_SYSTEM_PROMPT),
            ChatMessage::user(prompts::profile_user_prompt(n, topic)),
        ],
    )
    .json_response();

    let content = match backend.complete(request).await {
        Ok(content) => content,
        Err(e) => {
            warn!("persona generation failed, using fallbacks: {e}");
            return fallback_personas(n);
        }
    };

    let content = if content.trim().is_empty() { "{}" } else { &content };
    match parse_personas(content, n) {
        Some(personas) => {
            if personas.len() < n {
                warn!("model returned {} of {n} personas, padding", personas.len());
            }
            let personas = pad_personas(personas, n);
            info!("generated {} personas", personas.len());
            personas
        }
        None => {
            warn!("persona reply was not a JSON object, using fallbacks");
            fallback_personas(n)
        }
    }
}

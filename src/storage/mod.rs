//! Topic store — append-only JSON transcript per topic.
//!
//! One pretty-printed file per topic under the cache dir:
//! `{"topic": "...", "messages": [{name, age, occupation, personality, response}]}`.
//! Only finished responses are written; the session never reads back.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::persona::Persona;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialize error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One persisted persona response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub name: String,
    pub age: u32,
    pub occupation: String,
    pub personality: String,
    pub response: String,
}

/// The on-disk document for one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicLog {
    pub topic: String,
    #[serde(default)]
    pub messages: Vec<StoredMessage>,
}

/// Map a topic to its file stem: trimmed, lowercased, `/` and spaces → `_`.
pub fn topic_file_stem(topic: &str) -> String {
    topic.trim().to_lowercase().replace(['/', ' '], "_")
}

/// Append-only store rooted at a cache directory.
#[derive(Debug)]
pub struct TopicStore {
    root: PathBuf,
    // Serializes load→push→save across concurrent producers
    write_lock: Mutex<()>,
}

impl TopicStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path_for(&self, topic: &str) -> PathBuf {
        self.root.join(format!("{}.json", topic_file_stem(topic)))
    }

    /// Load the topic document. Missing or corrupt files are (re)initialized.
    pub fn load(&self, topic: &str) -> Result<TopicLog, StorageError> {
        let path = self.path_for(topic);
        let existing = std::fs::read_to_string(&path)
            .ok()
            .and_then(|content| serde_json::from_str::<TopicLog>(&content).ok());
        match existing {
            Some(log) => Ok(log),
            None => {
                let log = TopicLog {
                    topic: topic.to_string(),
                    messages: Vec::new(),
                };
                self.save(&path, &log)?;
                Ok(log)
            }
        }
    }

    /// Append a finished response for `persona` under `topic`.
    pub fn append(
        &self,
        topic: &str,
        persona: &Persona,
        response: &str,
    ) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut log = self.load(topic)?;
        log.messages.push(StoredMessage {
            name: persona.name.clone(),
            age: persona.age,
            occupation: persona.occupation.clone(),
            personality: persona.personality.clone(),
            response: response.to_string(),
        });
        self.save(&self.path_for(topic), &log)
    }

    fn save(&self, path: &Path, log: &TopicLog) -> Result<(), StorageError> {
        let io_err = |source: std::io::Error| StorageError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(log)?;
        std::fs::write(path, json).map_err(io_err)
    }
}

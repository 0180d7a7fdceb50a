//! persona-panels — N personas stream their take on a topic, side by side.
//!
//! The core is `session::StreamAggregator` (shared per-persona buffers plus a
//! coalescing change signal) and `tui::RenderLoop` (fixed-rate repaint until
//! every persona is done). Everything else feeds them: an OpenAI-compatible
//! streaming client, persona generation, and a per-topic transcript store.

pub mod config;
pub mod llm;
pub mod persona;
pub mod session;
pub mod storage;
pub mod tui;

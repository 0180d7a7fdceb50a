//! Live panels — ratatui presentation of a streaming session.
//!
//! Read-only: the render loop never mutates session state. Each frame is
//! built from an aggregator snapshot (lightweight copies, no references into
//! slot buffers held across frames) and fully replaces the previous one.

pub mod layout;
pub mod render_loop;
pub mod terminal;

use crate::session::aggregator::PanelView;

pub use render_loop::RenderLoop;
pub use terminal::TerminalSurface;

/// A display surface that accepts whole-frame replacements.
pub trait FrameSink {
    /// Replace whatever is on screen with `panels`.
    fn draw(&mut self, panels: &[PanelView]) -> anyhow::Result<()>;
}

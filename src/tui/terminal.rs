//! Terminal surface — ratatui `Terminal` behind the `FrameSink` seam.
//!
//! `stdout()` takes over the alternate screen and restores it on drop, so an
//! early return or panic in the session never leaves the shell garbled.

use std::io::{self, Stdout};

use anyhow::anyhow;
use crossterm::cursor::{Hide, Show};
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::Terminal;

use crate::session::aggregator::PanelView;

use super::layout;
use super::FrameSink;

pub struct TerminalSurface<B: Backend> {
    terminal: Terminal<B>,
    restore_on_drop: bool,
}

impl TerminalSurface<CrosstermBackend<Stdout>> {
    /// Full-screen surface on stdout.
    pub fn stdout() -> anyhow::Result<Self> {
        let mut out = io::stdout();
        out.execute(EnterAlternateScreen)?;
        out.execute(Hide)?;
        let terminal = Terminal::new(CrosstermBackend::new(io::stdout()))
            .map_err(|e| anyhow!("failed to initialize terminal: {e}"))?;
        Ok(Self {
            terminal,
            restore_on_drop: true,
        })
    }
}

impl<B: Backend> TerminalSurface<B> {
    /// Wrap an existing terminal (e.g. a `TestBackend`). Nothing to restore.
    pub fn new(terminal: Terminal<B>) -> Self {
        Self {
            terminal,
            restore_on_drop: false,
        }
    }

    pub fn backend(&self) -> &B {
        self.terminal.backend()
    }
}

impl<B: Backend> FrameSink for TerminalSurface<B> {
    fn draw(&mut self, panels: &[PanelView]) -> anyhow::Result<()> {
        self.terminal
            .draw(|f| layout::draw_panels(f, panels))
            .map_err(|e| anyhow!("terminal draw failed: {e}"))?;
        Ok(())
    }
}

impl<B: Backend> Drop for TerminalSurface<B> {
    fn drop(&mut self) {
        if self.restore_on_drop {
            let mut out = io::stdout();
            let _ = out.execute(Show);
            let _ = out.execute(LeaveAlternateScreen);
        }
    }
}

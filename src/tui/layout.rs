//! Equal-width panel row.
//!
//! ```text
//! ┌─ Ana (28, Chemist, Curious) ─┐┌─ Ben (61, Pilot, Stoic) ─────┐
//! │                              ││                              │
//! │  streamed text, wrapped…     ││  streamed text, wrapped…     │
//! │                              ││                              │
//! └─ streaming… ─────────────────┘└─ done ───────────────────────┘
//! ```

use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Padding, Paragraph, Wrap};
use ratatui::Frame;

use crate::session::aggregator::PanelView;

pub const STATUS_STREAMING: &str = "streaming…";
pub const STATUS_DONE: &str = "done";
pub const PLACEHOLDER: &str = "waiting for personas…";

/// Footer text for a panel.
pub fn status_label(done: bool) -> &'static str {
    if done {
        STATUS_DONE
    } else {
        STATUS_STREAMING
    }
}

/// Draw every panel side by side, each with the same width.
pub fn draw_panels(f: &mut Frame, panels: &[PanelView]) {
    let area = f.area();
    if panels.is_empty() {
        let placeholder = Paragraph::new(Line::from(Span::styled(
            PLACEHOLDER,
            Style::default().fg(Color::DarkGray),
        )));
        f.render_widget(placeholder, area);
        return;
    }

    for (panel, cell) in panels.iter().zip(columns(area, panels.len()).iter()) {
        f.render_widget(panel_widget(panel), *cell);
    }
}

/// Split `area` into `n` equal columns.
pub fn columns(area: Rect, n: usize) -> Vec<Rect> {
    let n = u32::try_from(n).unwrap_or(u32::MAX).max(1);
    Layout::horizontal((0..n).map(|_| Constraint::Ratio(1, n)))
        .split(area)
        .to_vec()
}

/// One bordered panel: bold label on top, status underneath, body as-is.
pub fn panel_widget(panel: &PanelView) -> Paragraph<'_> {
    let accent = Style::default().fg(panel.color);
    let block = Block::bordered()
        .border_style(accent)
        .title(Line::from(Span::styled(
            format!(" {} ", panel.label),
            accent.add_modifier(Modifier::BOLD),
        )))
        .title_bottom(Line::from(format!(" {} ", status_label(panel.done))))
        .padding(Padding::uniform(1));

    Paragraph::new(Text::raw(panel.text.as_str()))
        .block(block)
        .wrap(Wrap { trim: false })
}

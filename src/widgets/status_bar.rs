use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::*;

use crate::ui::{AppState, ToastLevel};

fn toast_tag(level: ToastLevel) -> &'static str {
    match level {
        ToastLevel::Success => "[OK]",
        ToastLevel::Error => "[ERROR]",
        ToastLevel::Info => "[INFO]",
    }
}

/// One-line footer: active toast, current screen, then key help.
pub fn draw_footer(f: &mut Frame, area: Rect, state: &AppState, help_text: &str) {
    let mut spans: Vec<Span> = Vec::new();
    if let Some(t) = &state.toast {
        let color = state.theme.toast_color(t.level);
        spans.push(Span::styled(
            format!("{} ", toast_tag(t.level)),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::styled(
            format!("{}  |  ", t.text),
            Style::default().fg(color),
        ));
    }
    spans.push(Span::styled(
        format!("{}  |  ", state.screen.name()),
        Style::default().fg(state.theme.accent),
    ));
    spans.push(Span::styled(
        help_text.to_string(),
        Style::default().fg(Color::DarkGray),
    ));
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

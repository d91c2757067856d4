use crate::theme::Theme;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders};

pub fn panel_block<'a>(title: &'a str, focused: bool, theme: &Theme) -> Block<'a> {
    let b = Block::default().borders(Borders::ALL).title(title);
    if focused {
        b.border_style(theme.border_focused())
    } else {
        b.border_style(theme.border_unfocused())
    }
}

pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let v = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(v[1])[1]
}

/// First visible row so that `selected` stays inside a window of `height` rows.
pub fn scroll_start(total: usize, selected: usize, height: usize) -> usize {
    if height == 0 || total <= height {
        return 0;
    }
    let sel = selected.min(total - 1);
    sel.saturating_sub(height - 1).min(total - height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_keeps_selection_visible() {
        assert_eq!(scroll_start(5, 4, 10), 0);
        assert_eq!(scroll_start(20, 3, 5), 0);
        assert_eq!(scroll_start(20, 7, 5), 3);
        assert_eq!(scroll_start(20, 19, 5), 15);
        assert_eq!(scroll_start(20, 99, 5), 15);
    }
}

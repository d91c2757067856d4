use crate::forms_core::registry::InputFilter;
use crate::forms_core::renderer::FieldSlot;
use crate::theme::Theme;
use crate::widgets::chrome::panel_block;
use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::*;

/// Focus inside a record form: which field, which sub-input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotCursor {
    pub field: usize,
    pub part: usize,
}

pub struct FormView<'a> {
    pub title: &'a str,
    pub slots: &'a [FieldSlot],
    pub cursor: SlotCursor,
    pub message: Option<&'a str>,
    /// A multi-line overlay editor is open on top of the form.
    pub editing: bool,
}

fn part_spans<'a>(
    slot: &FieldSlot,
    selected: bool,
    cursor: SlotCursor,
    cursor_on: bool,
    theme: &Theme,
) -> Vec<Span<'a>> {
    let mut spans = Vec::new();
    if slot.disabled {
        let raw = slot.parts.first().map(|p| p.value.as_str()).unwrap_or("");
        let text = if raw.is_empty() {
            "(option set missing)".to_string()
        } else {
            format!("{raw} (option set missing)")
        };
        spans.push(Span::styled(text, theme.text_muted()));
        return spans;
    }
    for (i, part) in slot.parts.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled("-", theme.text_muted()));
        }
        let focused = selected && cursor.part == i;
        let style = if focused {
            theme.text_editing_bold()
        } else if selected {
            theme.text_active_bold()
        } else {
            Style::default()
        };
        let text = match part.spec.filter {
            InputFilter::Fixed(v) => {
                spans.push(Span::styled(v.to_string(), theme.text_muted()));
                continue;
            }
            InputFilter::Choice(_) => {
                let v = if part.value.is_empty() { "—" } else { part.value.as_str() };
                if focused {
                    format!("‹{v}›")
                } else {
                    format!("[{v}]")
                }
            }
            InputFilter::Multiline => {
                let first = part.value.lines().next().unwrap_or("");
                let more = part.value.lines().count().saturating_sub(1);
                if more > 0 {
                    format!("{first} … (+{more} lines)")
                } else {
                    first.to_string()
                }
            }
            _ => {
                let mut v = format!("[{}", part.value);
                if focused && cursor_on {
                    v.push('▏');
                }
                v.push(']');
                v
            }
        };
        spans.push(Span::styled(text, style));
    }
    spans
}

pub fn draw_record_form(
    f: &mut Frame,
    area: Rect,
    view: &FormView<'_>,
    highlight: bool,
    cursor_on: bool,
    theme: &Theme,
) {
    let mut lines: Vec<Line> = Vec::new();
    let mut selected_line = 0usize;
    for (i, slot) in view.slots.iter().enumerate() {
        let selected = i == view.cursor.field;
        if selected {
            selected_line = lines.len();
        }
        let sel = if selected { '›' } else { ' ' };
        let mut spans = vec![Span::raw(format!(
            "{sel} {} ({}): ",
            slot.name,
            slot.field_type.label()
        ))];
        spans.extend(part_spans(slot, selected, view.cursor, cursor_on, theme));
        lines.push(Line::from(spans));
        if let Some(err) = &slot.error {
            lines.push(Line::from(Span::styled(format!("  ! {err}"), theme.text_error())));
        }
    }
    if view.slots.is_empty() {
        lines.push(Line::from(Span::styled("This form has no fields.", theme.text_muted())));
    }
    lines.push(Line::from(""));
    if let Some(msg) = view.message {
        lines.push(Line::from(Span::styled(msg.to_string(), theme.text_muted())));
    }
    let title = if view.editing {
        format!("{} — editing", view.title)
    } else {
        view.title.to_string()
    };
    let inner_h = area.height.saturating_sub(2) as usize;
    let scroll = selected_line.saturating_sub(inner_h.saturating_sub(2)) as u16;
    let p = Paragraph::new(lines)
        .block(panel_block(&title, highlight, theme))
        .scroll((scroll, 0))
        .wrap(Wrap { trim: false });
    f.render_widget(p, area);
}

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::*;

use crate::app::Effect;
use crate::forms_core::editor::OptionSetEditor;
use crate::theme::Theme;
use crate::widgets::chrome::panel_block;
use crate::widgets::{ctrl, edit_text};

/// Row 0 is the set name, rows 1.. the labels.
pub struct OptionSetWidget {
    pub editor: OptionSetEditor,
    pub row: usize,
    pub message: Option<String>,
}

impl OptionSetWidget {
    pub fn new() -> Self {
        Self {
            editor: OptionSetEditor::new(),
            row: 0,
            message: None,
        }
    }

    pub fn saved(&mut self) {
        self.row = 0;
        self.message = None;
    }
}

impl crate::widgets::Widget for OptionSetWidget {
    fn render(&mut self, f: &mut Frame, area: Rect, focused: bool, _tick: u64, theme: &Theme) {
        let row_style = |selected: bool| {
            if selected {
                theme.text_editing_bold()
            } else {
                Style::default()
            }
        };
        let mut lines = vec![
            Line::from(vec![
                Span::raw(format!("{} Name: ", if self.row == 0 { '›' } else { ' ' })),
                Span::styled(self.editor.name.clone(), row_style(self.row == 0)),
            ]),
            Line::from(""),
        ];
        for (i, label) in self.editor.labels.iter().enumerate() {
            let selected = self.row == i + 1;
            let mut spans = vec![
                Span::raw(format!("{} {:>2}. ", if selected { '›' } else { ' ' }, i + 1)),
                Span::styled(label.clone(), row_style(selected)),
            ];
            if self.editor.invalid == Some(i) {
                spans.push(Span::styled("  !", theme.text_error()));
            }
            lines.push(Line::from(spans));
        }
        lines.push(Line::from(""));
        if let Some(msg) = &self.message {
            lines.push(Line::from(Span::styled(format!("! {msg}"), theme.text_error())));
        }
        let inner_h = area.height.saturating_sub(2) as usize;
        let scroll = (self.row + 2).saturating_sub(inner_h) as u16;
        let p = Paragraph::new(lines)
            .block(panel_block("Create option set", focused, theme))
            .scroll((scroll, 0));
        f.render_widget(p, area);
    }

    fn on_key(&mut self, key: KeyEvent) -> Vec<Effect> {
        if ctrl(&key, 's') {
            return vec![Effect::SaveOptionSet];
        }
        if ctrl(&key, 'n') {
            return match self.editor.add_option() {
                Ok(i) => {
                    self.row = i + 1;
                    self.message = None;
                    Vec::new()
                }
                Err(e) => {
                    self.message = Some(e.to_string());
                    vec![Effect::Rejected(e)]
                }
            };
        }
        if ctrl(&key, 'd') {
            if let Some(i) = self.row.checked_sub(1) {
                if self.editor.remove_option(i).is_ok() {
                    self.row = self.row.min(self.editor.labels.len());
                }
            }
            return Vec::new();
        }
        match key.code {
            KeyCode::Esc => return vec![Effect::Back],
            KeyCode::Up => self.row = self.row.saturating_sub(1),
            KeyCode::Down => self.row = (self.row + 1).min(self.editor.labels.len()),
            _ => match self.row.checked_sub(1) {
                None => {
                    let mut name = self.editor.name.clone();
                    if edit_text(&mut name, key) {
                        self.editor.set_name(name);
                    }
                }
                Some(i) => {
                    let mut label = self.editor.labels.get(i).cloned().unwrap_or_default();
                    if edit_text(&mut label, key) && self.editor.set_label(i, label).is_ok() {
                        self.message = None;
                    }
                }
            },
        }
        Vec::new()
    }

    fn help(&self) -> &'static str {
        "↑/↓ row  Ctrl+N add  Ctrl+D remove  Ctrl+S save  Esc back"
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

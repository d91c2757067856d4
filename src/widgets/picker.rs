use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::*;

use crate::app::{Effect, PickPurpose};
use crate::model::FormId;
use crate::theme::Theme;
use crate::widgets::chrome::{centered_rect, panel_block, scroll_start};

/// List of forms to act on.
pub struct FormPickerWidget {
    pub purpose: PickPurpose,
    pub items: Vec<(FormId, String)>,
    pub selected: usize,
    pub confirm: bool,
}

impl FormPickerWidget {
    pub fn new(purpose: PickPurpose, items: Vec<(FormId, String)>) -> Self {
        Self {
            purpose,
            items,
            selected: 0,
            confirm: false,
        }
    }

    pub fn current(&self) -> Option<FormId> {
        self.items.get(self.selected).map(|(id, _)| *id)
    }
}

impl crate::widgets::Widget for FormPickerWidget {
    fn render(&mut self, f: &mut Frame, area: Rect, focused: bool, _tick: u64, theme: &Theme) {
        let block = panel_block(self.purpose.title(), focused, theme);
        if self.items.is_empty() {
            let p = Paragraph::new(Span::styled("No forms yet.", theme.text_muted())).block(block);
            f.render_widget(p, area);
            return;
        }
        let h = area.height.saturating_sub(2) as usize;
        let start = scroll_start(self.items.len(), self.selected, h);
        let items: Vec<ListItem> = self
            .items
            .iter()
            .enumerate()
            .skip(start)
            .take(h)
            .map(|(i, (id, name))| {
                let text = format!("{} #{id}  {name}", if i == self.selected { '›' } else { ' ' });
                if i == self.selected {
                    ListItem::new(text).style(theme.list_cursor_style())
                } else {
                    ListItem::new(text)
                }
            })
            .collect();
        f.render_widget(List::new(items).block(block), area);
        if self.confirm {
            let name = self
                .items
                .get(self.selected)
                .map(|(_, n)| n.as_str())
                .unwrap_or_default();
            let rect = centered_rect(60, 30, area);
            let p = Paragraph::new(vec![
                Line::from(format!("Delete form '{name}'?")),
                Line::from(Span::styled(
                    "Stored rows are kept on disk.",
                    theme.text_muted(),
                )),
                Line::from(""),
                Line::from("y confirm  n cancel"),
            ])
            .block(panel_block("Confirm", true, theme))
            .wrap(Wrap { trim: false });
            f.render_widget(Clear, rect);
            f.render_widget(p, rect);
        }
    }

    fn on_key(&mut self, key: KeyEvent) -> Vec<Effect> {
        if self.confirm {
            return match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => {
                    self.confirm = false;
                    self.current()
                        .map(|form_id| vec![Effect::DeleteForm { form_id }])
                        .unwrap_or_default()
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    self.confirm = false;
                    Vec::new()
                }
                _ => Vec::new(),
            };
        }
        match key.code {
            KeyCode::Up => {
                self.selected = self.selected.saturating_sub(1);
                Vec::new()
            }
            KeyCode::Down => {
                if self.selected + 1 < self.items.len() {
                    self.selected += 1;
                }
                Vec::new()
            }
            KeyCode::Enter => {
                let Some(form_id) = self.current() else {
                    return Vec::new();
                };
                match self.purpose.target(form_id) {
                    Some(screen) => vec![Effect::Open(screen)],
                    None => {
                        self.confirm = true;
                        Vec::new()
                    }
                }
            }
            KeyCode::Esc => vec![Effect::Back],
            _ => Vec::new(),
        }
    }

    fn help(&self) -> &'static str {
        if self.confirm {
            "y confirm  n cancel"
        } else {
            "↑/↓ select  Enter choose  Esc back"
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

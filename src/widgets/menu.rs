use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::*;

use crate::app::{Effect, PickPurpose, Screen};
use crate::theme::Theme;
use crate::widgets::chrome::panel_block;

pub enum MenuAction {
    Open(Screen),
    Quit,
}

pub const ENTRIES: [(&str, MenuAction); 7] = [
    ("Create form", MenuAction::Open(Screen::CreateForm)),
    ("Edit form", MenuAction::Open(Screen::PickForm(PickPurpose::Edit))),
    ("Delete form", MenuAction::Open(Screen::PickForm(PickPurpose::Delete))),
    ("Create option set", MenuAction::Open(Screen::CreateOptionSet)),
    ("Insert record", MenuAction::Open(Screen::PickForm(PickPurpose::Insert))),
    ("Browse records", MenuAction::Open(Screen::PickForm(PickPurpose::Browse))),
    ("Quit", MenuAction::Quit),
];

#[derive(Default)]
pub struct MainMenuWidget {
    pub selected: usize,
    pub title: String,
}

impl MainMenuWidget {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            selected: 0,
            title: title.into(),
        }
    }
}

impl crate::widgets::Widget for MainMenuWidget {
    fn render(&mut self, f: &mut Frame, area: Rect, focused: bool, _tick: u64, theme: &Theme) {
        let items: Vec<ListItem> = ENTRIES
            .iter()
            .enumerate()
            .map(|(i, (label, _))| {
                if i == self.selected {
                    ListItem::new(format!("> {label}")).style(theme.list_cursor_style())
                } else {
                    ListItem::new(format!("  {label}"))
                }
            })
            .collect();
        let list = List::new(items).block(panel_block(&self.title, focused, theme));
        f.render_widget(list, area);
    }

    fn on_key(&mut self, key: KeyEvent) -> Vec<Effect> {
        match key.code {
            KeyCode::Up => {
                self.selected = self.selected.saturating_sub(1);
                Vec::new()
            }
            KeyCode::Down => {
                self.selected = (self.selected + 1).min(ENTRIES.len() - 1);
                Vec::new()
            }
            KeyCode::Enter => match ENTRIES[self.selected].1 {
                MenuAction::Open(screen) => vec![Effect::Open(screen)],
                MenuAction::Quit => vec![Effect::Quit],
            },
            KeyCode::Char('q') | KeyCode::Esc => vec![Effect::Quit],
            _ => Vec::new(),
        }
    }

    fn help(&self) -> &'static str {
        "↑/↓ select  Enter open  q quit"
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

pub mod chrome;
pub mod form;
pub mod form_widget;
pub mod menu;
pub mod option_set;
pub mod picker;
pub mod record_table;
pub mod schema_editor;
pub mod status_bar;

use crate::app::Effect;
use crate::theme::Theme;
use crossterm::event::KeyEvent;
use ratatui::prelude::*;
use std::any::Any;

pub trait Widget {
    fn render(&mut self, f: &mut Frame, area: Rect, focused: bool, tick: u64, theme: &Theme);
    fn on_key(&mut self, key: KeyEvent) -> Vec<Effect> {
        let _ = key;
        Vec::new()
    }
    /// Key hints shown in the footer.
    fn help(&self) -> &'static str {
        ""
    }
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Append a typed character or drop the last one; shared by the text inputs.
pub(crate) fn edit_text(buf: &mut String, key: KeyEvent) -> bool {
    use crossterm::event::{KeyCode, KeyModifiers};
    match key.code {
        KeyCode::Char(c) if !key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) => {
            buf.push(c);
            true
        }
        KeyCode::Backspace => buf.pop().is_some(),
        _ => false,
    }
}

pub(crate) fn ctrl(key: &KeyEvent, c: char) -> bool {
    key.code == crossterm::event::KeyCode::Char(c)
        && key.modifiers.contains(crossterm::event::KeyModifiers::CONTROL)
}

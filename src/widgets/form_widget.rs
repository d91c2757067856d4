use crate::app::Effect;
use crate::forms_core::registry::InputFilter;
use crate::forms_core::renderer::{self, FieldSlot};
use crate::forms_core::table::RowEdit;
use crate::model::FormSchema;
use crate::theme::Theme;
use crate::widgets::chrome::centered_rect;
use crate::widgets::form::{draw_record_form, FormView, SlotCursor};
use crate::widgets::ctrl;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::crossterm::event as rt_event;
use ratatui::prelude::*;
use tui_textarea::TextArea;

/// Where a filled record goes.
pub enum RecordTarget {
    /// Appended as a new row of this form.
    Insert(FormSchema),
    /// Replaces the row at `index` of the open table.
    Update { index: usize, legacy: bool },
}

pub struct RecordFormWidget {
    pub title: String,
    pub target: RecordTarget,
    pub slots: Vec<FieldSlot>,
    pub cursor: SlotCursor,
    pub message: Option<String>,
    textarea: Option<TextArea<'static>>,
}

impl RecordFormWidget {
    pub fn for_insert(schema: FormSchema, slots: Vec<FieldSlot>) -> Self {
        let mut w = Self {
            title: format!("Insert: {}", schema.name),
            target: RecordTarget::Insert(schema),
            slots,
            cursor: SlotCursor::default(),
            message: None,
            textarea: None,
        };
        w.cursor.part = w.first_part(0);
        w
    }

    pub fn for_edit(table_title: &str, edit: RowEdit) -> Self {
        let legacy_note = if edit.legacy { " (types guessed)" } else { "" };
        let mut w = Self {
            title: format!("Edit row {} of {table_title}{legacy_note}", edit.index + 1),
            target: RecordTarget::Update {
                index: edit.index,
                legacy: edit.legacy,
            },
            slots: edit.slots,
            cursor: SlotCursor::default(),
            message: None,
            textarea: None,
        };
        w.cursor.part = w.first_part(0);
        w
    }

    /// Take the slots out as a row edit for committing.
    pub fn take_edit(&mut self) -> Option<RowEdit> {
        match self.target {
            RecordTarget::Update { index, legacy } => Some(RowEdit {
                index,
                slots: std::mem::take(&mut self.slots),
                warnings: Vec::new(),
                legacy,
            }),
            RecordTarget::Insert(_) => None,
        }
    }

    /// Reset every slot after a successful insert.
    pub fn clear(&mut self) {
        for s in &mut self.slots {
            s.clear();
        }
        self.cursor = SlotCursor {
            field: 0,
            part: self.first_part(0),
        };
        self.message = None;
    }

    pub fn is_editing_text(&self) -> bool {
        self.textarea.is_some()
    }

    fn first_part(&self, field: usize) -> usize {
        self.slots
            .get(field)
            .and_then(|s| s.parts.iter().position(|p| !p.spec.filter.is_fixed()))
            .unwrap_or(0)
    }

    fn current(&self) -> Option<&FieldSlot> {
        self.slots.get(self.cursor.field)
    }

    fn current_filter(&self) -> Option<InputFilter> {
        self.current()
            .filter(|s| !s.disabled)
            .and_then(|s| s.parts.get(self.cursor.part))
            .map(|p| p.spec.filter)
    }

    fn move_field(&mut self, delta: i32) {
        if self.slots.is_empty() {
            return;
        }
        let last = self.slots.len() as i32 - 1;
        let next = (self.cursor.field as i32 + delta).clamp(0, last) as usize;
        if next == self.cursor.field {
            return;
        }
        self.cursor = SlotCursor {
            field: next,
            part: self.first_part(next),
        };
    }

    fn move_part(&mut self, delta: i32) {
        let Some(slot) = self.current() else {
            return;
        };
        let n = slot.parts.len() as i32;
        let mut p = self.cursor.part as i32 + delta;
        let mut target = None;
        while delta != 0 && (0..n).contains(&p) {
            if !slot.parts[p as usize].spec.filter.is_fixed() {
                target = Some(p as usize);
                break;
            }
            p += delta;
        }
        match target {
            Some(t) => self.cursor.part = t,
            // crossed the field boundary
            None => self.move_field(delta.signum()),
        }
    }

    fn open_textarea(&mut self) {
        let Some(slot) = self.current() else {
            return;
        };
        let Some(part) = slot.parts.get(self.cursor.part) else {
            return;
        };
        let mut ta = TextArea::from(part.value.lines().map(str::to_string).collect::<Vec<_>>());
        ta.set_block(
            ratatui::widgets::Block::default()
                .borders(ratatui::widgets::Borders::ALL)
                .title(format!("Editing: {} — Ctrl+S Save • Esc Cancel", slot.name)),
        );
        self.textarea = Some(ta);
    }

    fn commit_textarea(&mut self) {
        if let Some(ta) = self.textarea.take() {
            let text = ta.lines().join("\n");
            let part = self.cursor.part;
            if let Some(slot) = self.slots.get_mut(self.cursor.field) {
                slot.set_text(part, &text);
            }
        }
    }

    fn textarea_key(&mut self, key: KeyEvent) -> Vec<Effect> {
        if ctrl(&key, 's') {
            self.commit_textarea();
            return Vec::new();
        }
        if key.code == KeyCode::Esc {
            self.textarea = None;
            return Vec::new();
        }
        if let Some(ta) = self.textarea.as_mut() {
            if let Some(ev) = to_textarea_event(key) {
                ta.input(ev);
            }
        }
        Vec::new()
    }

    fn submit(&mut self) -> Vec<Effect> {
        match renderer::validate(&mut self.slots) {
            Ok(()) => {
                self.message = None;
                vec![Effect::SaveRecord]
            }
            Err(e) => {
                self.message = Some("Please fix the highlighted errors".into());
                if let crate::error::FormError::EmptyFieldValue { index, part, .. } = &e {
                    self.cursor = SlotCursor {
                        field: *index,
                        part: *part,
                    };
                }
                vec![Effect::Rejected(e)]
            }
        }
    }
}

/// Map a crossterm key to the event type tui-textarea consumes.
fn to_textarea_event(key: KeyEvent) -> Option<rt_event::KeyEvent> {
    let code = match key.code {
        KeyCode::Char(c) => rt_event::KeyCode::Char(c),
        KeyCode::Enter => rt_event::KeyCode::Enter,
        KeyCode::Backspace => rt_event::KeyCode::Backspace,
        KeyCode::Delete => rt_event::KeyCode::Delete,
        KeyCode::Left => rt_event::KeyCode::Left,
        KeyCode::Right => rt_event::KeyCode::Right,
        KeyCode::Up => rt_event::KeyCode::Up,
        KeyCode::Down => rt_event::KeyCode::Down,
        KeyCode::Home => rt_event::KeyCode::Home,
        KeyCode::End => rt_event::KeyCode::End,
        KeyCode::Tab => rt_event::KeyCode::Tab,
        _ => return None,
    };
    let mut mods = rt_event::KeyModifiers::NONE;
    if key.modifiers.contains(crossterm::event::KeyModifiers::SHIFT) {
        mods |= rt_event::KeyModifiers::SHIFT;
    }
    Some(rt_event::KeyEvent::new(code, mods))
}

impl crate::widgets::Widget for RecordFormWidget {
    fn render(&mut self, f: &mut Frame, area: Rect, focused: bool, tick: u64, theme: &Theme) {
        let view = FormView {
            title: &self.title,
            slots: &self.slots,
            cursor: self.cursor,
            message: self.message.as_deref(),
            editing: self.textarea.is_some(),
        };
        draw_record_form(f, area, &view, focused, tick % 2 == 0 && self.textarea.is_none(), theme);
        if let Some(ta) = &self.textarea {
            let rect = centered_rect(80, 70, area);
            f.render_widget(ratatui::widgets::Clear, rect);
            f.render_widget(ta, rect);
        }
    }

    fn on_key(&mut self, key: KeyEvent) -> Vec<Effect> {
        if self.textarea.is_some() {
            return self.textarea_key(key);
        }
        if ctrl(&key, 's') {
            return self.submit();
        }
        if ctrl(&key, 'r') {
            self.clear();
            return Vec::new();
        }
        let part = self.cursor.part;
        let field = self.cursor.field;
        match key.code {
            KeyCode::Esc => return vec![Effect::Back],
            KeyCode::Up => self.move_field(-1),
            KeyCode::Down => self.move_field(1),
            KeyCode::Tab => self.move_part(1),
            KeyCode::BackTab => self.move_part(-1),
            KeyCode::Left | KeyCode::Right => {
                let delta = if key.code == KeyCode::Left { -1 } else { 1 };
                if let Some(InputFilter::Choice(_)) = self.current_filter() {
                    if let Some(slot) = self.slots.get_mut(field) {
                        slot.cycle_choice(part, delta);
                    }
                } else {
                    self.move_part(delta);
                }
            }
            KeyCode::Enter => {
                if let Some(InputFilter::Multiline) = self.current_filter() {
                    self.open_textarea();
                } else {
                    self.move_part(1);
                }
            }
            KeyCode::Backspace => {
                if let Some(slot) = self.slots.get_mut(field) {
                    slot.backspace(part);
                }
            }
            KeyCode::Char(c) => {
                let typed = self
                    .slots
                    .get_mut(field)
                    .map(|slot| slot.insert_char(part, c))
                    .unwrap_or(false);
                // full groups hand over to the next one
                if typed {
                    let full = self
                        .current()
                        .and_then(|s| s.parts.get(part))
                        .and_then(|p| p.spec.max_len.map(|m| p.value.chars().count() >= m))
                        .unwrap_or(false);
                    let composite = self.current().map(|s| s.arity() > 1).unwrap_or(false);
                    if full && composite {
                        self.move_part(1);
                    }
                }
            }
            _ => {}
        }
        Vec::new()
    }

    fn help(&self) -> &'static str {
        if self.textarea.is_some() {
            "Ctrl+S keep  Esc cancel"
        } else {
            "↑/↓ field  Tab part  ←/→ choose  Enter edit text  Ctrl+S save  Ctrl+R clear  Esc back"
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms_core::registry::FieldType;
    use crate::forms_core::renderer::materialize;
    use crate::model::FieldDef;
    use crate::services::memory::MemorySchemaStore;
    use crate::widgets::Widget;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn typed(w: &mut RecordFormWidget, text: &str) {
        for c in text.chars() {
            w.on_key(key(KeyCode::Char(c)));
        }
    }

    fn widget(fields: Vec<FieldDef>) -> RecordFormWidget {
        let store = MemorySchemaStore::default();
        let schema = FormSchema {
            form_id: 1,
            name: "F".into(),
            fields,
        };
        let m = materialize(&schema, &store);
        RecordFormWidget::for_insert(schema, m.slots)
    }

    #[test]
    fn typing_fills_groups_and_advances() {
        let mut w = widget(vec![FieldDef::new("Card", FieldType::CardNumber)]);
        typed(&mut w, "1111222233334444");
        assert_eq!(w.slots[0].values(), vec!["1111", "2222", "3333", "4444"]);
    }

    #[test]
    fn iban_cursor_skips_fixed_prefix() {
        let mut w = widget(vec![FieldDef::new("Sheba", FieldType::Iban)]);
        assert_eq!(w.cursor.part, 1);
        w.on_key(key(KeyCode::BackTab));
        assert_ne!(w.cursor.part, 0);
    }

    #[test]
    fn arrows_cycle_date_parts() {
        let mut w = widget(vec![FieldDef::new("Born", FieldType::ShamsiDate)]);
        w.on_key(key(KeyCode::Right));
        assert_eq!(w.slots[0].parts[0].value, "1405");
        w.on_key(key(KeyCode::Tab));
        w.on_key(key(KeyCode::Left));
        assert_eq!(w.slots[0].parts[1].value, "اسفند");
    }

    #[test]
    fn submit_marks_errors_and_focuses_first() {
        let mut w = widget(vec![
            FieldDef::new("Name", FieldType::Text),
            FieldDef::new("Phone", FieldType::Phone),
        ]);
        typed(&mut w, "Ali");
        let effs = w.on_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL));
        assert!(matches!(effs.as_slice(), [Effect::Rejected(_)]));
        assert_eq!(w.cursor.field, 1);
        assert!(w.slots[1].error.is_some());
        w.on_key(key(KeyCode::Down));
        typed(&mut w, "0912");
        let effs = w.on_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL));
        assert!(matches!(effs.as_slice(), [Effect::SaveRecord]));
    }

    #[test]
    fn detail_text_goes_through_overlay() {
        let mut w = widget(vec![FieldDef::new("Note", FieldType::Detail)]);
        w.on_key(key(KeyCode::Enter));
        assert!(w.is_editing_text());
        typed(&mut w, "one");
        w.on_key(key(KeyCode::Enter));
        typed(&mut w, "two");
        w.on_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL));
        assert!(!w.is_editing_text());
        assert_eq!(w.slots[0].parts[0].value, "one\ntwo");
    }
}

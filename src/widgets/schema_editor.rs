use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::*;

use crate::app::Effect;
use crate::forms_core::editor::{FormSchemaEditor, MoveDir};
use crate::forms_core::registry::FieldType;
use crate::theme::Theme;
use crate::widgets::chrome::panel_block;
use crate::widgets::{ctrl, edit_text};

/// Create or edit a form schema. Row 0 is the form name, rows 1.. the fields.
pub struct SchemaEditorWidget {
    pub editor: FormSchemaEditor,
    pub row: usize,
    pub message: Option<String>,
}

impl SchemaEditorWidget {
    pub fn new(editor: FormSchemaEditor) -> Self {
        Self {
            editor,
            row: 0,
            message: None,
        }
    }

    pub fn title(&self) -> String {
        match self.editor.form_id {
            Some(id) => format!("Edit form #{id}"),
            None => "Create form".to_string(),
        }
    }

    fn field_index(&self) -> Option<usize> {
        self.row.checked_sub(1)
    }

    fn report(&mut self, result: crate::error::FormResult<()>) -> Vec<Effect> {
        match result {
            Ok(()) => {
                self.message = None;
                Vec::new()
            }
            Err(e) => {
                self.message = Some(e.to_string());
                vec![Effect::Rejected(e)]
            }
        }
    }

    /// Called after a successful save; the editor was reset or reloaded.
    pub fn saved(&mut self) {
        self.row = self.row.min(self.editor.fields.len());
        if self.editor.form_id.is_none() {
            self.row = 0;
        }
        self.message = None;
    }

    fn field_line(&self, i: usize, theme: &Theme) -> Line<'static> {
        let f = &self.editor.fields[i];
        let selected = self.row == i + 1;
        let sel = if selected { '›' } else { ' ' };
        let mark = if f.marked { "[x]" } else { "[ ]" };
        let mut spans = vec![
            Span::raw(format!("{sel} {mark} {:>2}. ", i + 1)),
            Span::styled(
                if f.name.is_empty() { "…".to_string() } else { f.name.clone() },
                if selected {
                    theme.text_editing_bold()
                } else {
                    Style::default()
                },
            ),
            Span::raw("  "),
            Span::styled(
                format!("‹{}›", f.field_type.label()),
                theme.text_active_bold(),
            ),
        ];
        if f.field_type == FieldType::MultiChoice {
            let set = self
                .editor
                .option_set_name(f.option_set_id)
                .map(|s| format!(" set: {s}"))
                .unwrap_or_else(|| " set: (none available)".to_string());
            spans.push(Span::styled(set, theme.text_muted()));
        }
        if f.invalid {
            spans.push(Span::styled("  !", theme.text_error()));
        }
        Line::from(spans)
    }
}

impl crate::widgets::Widget for SchemaEditorWidget {
    fn render(&mut self, f: &mut Frame, area: Rect, focused: bool, tick: u64, theme: &Theme) {
        let mut lines: Vec<Line> = Vec::new();
        let cursor = if tick % 2 == 0 && self.row == 0 { "▏" } else { "" };
        let name_style = if self.editor.name_invalid {
            theme.text_error()
        } else if self.row == 0 {
            theme.text_editing_bold()
        } else {
            Style::default()
        };
        lines.push(Line::from(vec![
            Span::raw(format!("{} Name: ", if self.row == 0 { '›' } else { ' ' })),
            Span::styled(format!("{}{cursor}", self.editor.name), name_style),
        ]));
        lines.push(Line::from(""));
        for i in 0..self.editor.fields.len() {
            lines.push(self.field_line(i, theme));
        }
        lines.push(Line::from(""));
        if let Some(msg) = &self.message {
            lines.push(Line::from(Span::styled(format!("! {msg}"), theme.text_error())));
        }
        let inner_h = area.height.saturating_sub(2) as usize;
        let scroll = (self.row + 2).saturating_sub(inner_h) as u16;
        let title = self.title();
        let p = Paragraph::new(lines)
            .block(panel_block(&title, focused, theme))
            .scroll((scroll, 0));
        f.render_widget(p, area);
    }

    fn on_key(&mut self, key: KeyEvent) -> Vec<Effect> {
        if ctrl(&key, 's') {
            return vec![Effect::SaveSchema];
        }
        if ctrl(&key, 'n') {
            let r = self.editor.add_field().map(|i| self.row = i + 1);
            return self.report(r);
        }
        if ctrl(&key, 'x') {
            if let Some(i) = self.field_index() {
                let r = self.editor.toggle_mark(i);
                return self.report(r);
            }
            return Vec::new();
        }
        if ctrl(&key, 'a') {
            let all = self.editor.marked_count() < self.editor.fields.len();
            self.editor.mark_all(all);
            return Vec::new();
        }
        if ctrl(&key, 'd') {
            self.editor.remove_marked();
            self.row = self.row.min(self.editor.fields.len());
            return Vec::new();
        }
        let alt = key.modifiers.contains(KeyModifiers::ALT);
        match (key.code, self.field_index()) {
            (KeyCode::Esc, _) => return vec![Effect::Back],
            (KeyCode::Up, Some(i)) if alt => {
                let r = self.editor.move_field(i, MoveDir::Up).map(|n| self.row = n + 1);
                return self.report(r);
            }
            (KeyCode::Down, Some(i)) if alt => {
                let r = self.editor.move_field(i, MoveDir::Down).map(|n| self.row = n + 1);
                return self.report(r);
            }
            (KeyCode::Up, _) => self.row = self.row.saturating_sub(1),
            (KeyCode::Down, _) => self.row = (self.row + 1).min(self.editor.fields.len()),
            (KeyCode::Left, Some(i)) => {
                let r = self.editor.cycle_field_type(i, -1);
                return self.report(r);
            }
            (KeyCode::Right, Some(i)) => {
                let r = self.editor.cycle_field_type(i, 1);
                return self.report(r);
            }
            (KeyCode::PageUp, Some(i)) => {
                let r = self.editor.cycle_option_set(i, -1);
                return self.report(r);
            }
            (KeyCode::PageDown, Some(i)) => {
                let r = self.editor.cycle_option_set(i, 1);
                return self.report(r);
            }
            (_, None) => {
                let mut name = self.editor.name.clone();
                if edit_text(&mut name, key) {
                    self.editor.set_name(name);
                }
            }
            (_, Some(i)) => {
                let mut name = self.editor.fields[i].name.clone();
                if edit_text(&mut name, key) {
                    let r = self.editor.set_field_name(i, name);
                    return self.report(r);
                }
            }
        }
        Vec::new()
    }

    fn help(&self) -> &'static str {
        "↑/↓ row  ←/→ type  PgUp/PgDn set  Alt+↑/↓ move  Ctrl+N add  Ctrl+X mark  Ctrl+A all  Ctrl+D remove  Ctrl+S save  Esc back"
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OptionSetSummary;
    use crate::widgets::Widget;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl_key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn typed(w: &mut SchemaEditorWidget, s: &str) {
        for c in s.chars() {
            w.on_key(key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn keys_build_a_schema() {
        let sets = vec![OptionSetSummary {
            option_set_id: 4,
            display_name: "Colors".into(),
        }];
        let mut w = SchemaEditorWidget::new(FormSchemaEditor::new(sets));
        typed(&mut w, "Shop");
        w.on_key(key(KeyCode::Down));
        typed(&mut w, "color");
        w.on_key(key(KeyCode::Left));
        assert_eq!(w.editor.fields[0].field_type, FieldType::MultiChoice);
        assert_eq!(w.editor.fields[0].option_set_id, Some(4));
        w.on_key(ctrl_key('n'));
        assert_eq!(w.row, 2);
        typed(&mut w, "price");
        w.on_key(KeyEvent::new(KeyCode::Up, KeyModifiers::ALT));
        assert_eq!(w.row, 1);
        assert_eq!(w.editor.name, "Shop");
        let names: Vec<_> = w.editor.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["price", "color"]);
        assert!(matches!(w.on_key(ctrl_key('s')).as_slice(), [Effect::SaveSchema]));
    }

    #[test]
    fn add_on_blank_field_reports_inline() {
        let mut w = SchemaEditorWidget::new(FormSchemaEditor::new(vec![]));
        let effs = w.on_key(ctrl_key('n'));
        assert!(matches!(effs.as_slice(), [Effect::Rejected(_)]));
        assert!(w.message.is_some());
        assert!(w.editor.fields[0].invalid);
    }

    #[test]
    fn mark_and_remove() {
        let mut w = SchemaEditorWidget::new(FormSchemaEditor::new(vec![]));
        w.on_key(key(KeyCode::Down));
        typed(&mut w, "a");
        w.on_key(ctrl_key('n'));
        typed(&mut w, "b");
        w.on_key(ctrl_key('x'));
        w.on_key(ctrl_key('d'));
        assert_eq!(w.editor.fields.len(), 1);
        assert_eq!(w.editor.fields[0].name, "a");
        assert_eq!(w.row, 1);
    }
}

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::*;

use crate::app::Effect;
use crate::forms_core::table::RecordTable;
use crate::theme::Theme;
use crate::widgets::chrome::{centered_rect, panel_block};
use crate::widgets::form_widget::RecordFormWidget;
use crate::widgets::{edit_text, Widget};

pub struct RecordTableWidget {
    pub table: RecordTable,
    /// Open row editor, drawn over the table.
    pub editor: Option<RecordFormWidget>,
    pub confirm_delete: bool,
    /// File name being typed for an export; `None` when no prompt is open.
    pub export_name: Option<String>,
    state: TableState,
}

impl RecordTableWidget {
    pub fn new(table: RecordTable) -> Self {
        let mut state = TableState::default();
        state.select(table.selected);
        Self {
            table,
            editor: None,
            confirm_delete: false,
            export_name: None,
            state,
        }
    }

    /// Re-sync the highlighted row after the table changed underneath.
    pub fn refresh(&mut self) {
        self.state.select(self.table.selected);
    }
}

fn cell_text(value: &str) -> String {
    let mut lines = value.lines();
    let first = lines.next().unwrap_or("");
    if lines.next().is_some() {
        format!("{first} …")
    } else {
        first.to_string()
    }
}

impl Widget for RecordTableWidget {
    fn render(&mut self, f: &mut Frame, area: Rect, focused: bool, tick: u64, theme: &Theme) {
        let title = format!("{} — {} rows", self.table.title(), self.table.rows.len());
        let block = panel_block(&title, focused && self.editor.is_none(), theme);
        if self.table.rows.is_empty() {
            let p = Paragraph::new(Span::styled("No rows stored for this form.", theme.text_muted()))
                .block(block);
            f.render_widget(p, area);
        } else {
            let cols = self
                .table
                .header
                .len()
                .max(self.table.rows.iter().map(|r| r.values.len()).max().unwrap_or(0))
                .max(1);
            let widths = vec![Constraint::Ratio(1, cols as u32); cols];
            let header = Row::new(self.table.header.iter().map(|h| Cell::from(h.clone())))
                .style(theme.text_active_bold());
            let rows = self
                .table
                .rows
                .iter()
                .map(|r| Row::new(r.values.iter().map(|v| Cell::from(cell_text(v)))));
            let t = Table::new(rows, widths)
                .header(header)
                .block(block)
                .row_highlight_style(theme.list_cursor_style())
                .highlight_symbol("› ");
            self.state.select(self.table.selected);
            f.render_stateful_widget(t, area, &mut self.state);
        }
        if self.confirm_delete {
            let n = self.table.selected.map(|i| i + 1).unwrap_or(0);
            let rect = centered_rect(50, 30, area);
            let p = Paragraph::new(vec![
                Line::from(format!("Delete row {n}?")),
                Line::from(""),
                Line::from("y confirm  n cancel"),
            ])
            .block(panel_block("Confirm", true, theme));
            f.render_widget(Clear, rect);
            f.render_widget(p, rect);
        }
        if let Some(name) = &self.export_name {
            let rect = centered_rect(60, 30, area);
            let p = Paragraph::new(vec![
                Line::from("Export rows as CSV to:"),
                Line::from(Span::styled(format!("{name}▏"), theme.text_active_bold())),
                Line::from(""),
                Line::from(Span::styled("Enter export  Esc cancel", theme.text_muted())),
            ])
            .block(panel_block("Export", true, theme));
            f.render_widget(Clear, rect);
            f.render_widget(p, rect);
        }
        if let Some(editor) = self.editor.as_mut() {
            let rect = centered_rect(90, 80, area);
            f.render_widget(Clear, rect);
            editor.render(f, rect, focused, tick, theme);
        }
    }

    fn on_key(&mut self, key: KeyEvent) -> Vec<Effect> {
        if let Some(editor) = self.editor.as_mut() {
            if key.code == KeyCode::Esc && !editor.is_editing_text() {
                self.editor = None;
                return Vec::new();
            }
            return editor.on_key(key);
        }
        if let Some(name) = self.export_name.as_mut() {
            match key.code {
                KeyCode::Esc => self.export_name = None,
                KeyCode::Enter => {
                    let path = name.trim().to_string();
                    if path.is_empty() {
                        return Vec::new();
                    }
                    self.export_name = None;
                    return vec![Effect::ExportRows { path }];
                }
                _ => {
                    edit_text(name, key);
                }
            }
            return Vec::new();
        }
        if self.confirm_delete {
            self.confirm_delete = false;
            return match (key.code, self.table.selected) {
                (KeyCode::Char('y') | KeyCode::Char('Y'), Some(index)) => {
                    vec![Effect::DeleteRow { index }]
                }
                _ => Vec::new(),
            };
        }
        match key.code {
            KeyCode::Up => self.table.move_selection(-1),
            KeyCode::Down => self.table.move_selection(1),
            KeyCode::PageUp => self.table.move_selection(-10),
            KeyCode::PageDown => self.table.move_selection(10),
            KeyCode::Enter | KeyCode::Char('e') => {
                if let Some(index) = self.table.selected {
                    return vec![Effect::BeginEdit { index }];
                }
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                self.confirm_delete = self.table.selected.is_some();
            }
            KeyCode::Char('x') => {
                self.export_name = Some(self.table.export_file_name());
                return Vec::new();
            }
            KeyCode::Esc => return vec![Effect::Back],
            _ => {}
        }
        self.refresh();
        Vec::new()
    }

    fn help(&self) -> &'static str {
        if let Some(editor) = &self.editor {
            return editor.help();
        }
        if self.export_name.is_some() {
            "type file name  Enter export  Esc cancel"
        } else if self.confirm_delete {
            "y confirm  n cancel"
        } else {
            "↑/↓ select  Enter/e edit  d delete  x export  Esc back"
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DataRecord;
    use crossterm::event::KeyModifiers;

    fn table() -> RecordTable {
        RecordTable {
            form_id: 3,
            header: vec!["Name".into(), "Note".into()],
            rows: vec![
                DataRecord::new(["a", "line one\nline two"]),
                DataRecord::new(["b", "x"]),
            ],
            selected: Some(0),
            schema: None,
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn delete_needs_confirmation() {
        let mut w = RecordTableWidget::new(table());
        w.on_key(key(KeyCode::Down));
        assert!(w.on_key(key(KeyCode::Char('d'))).is_empty());
        assert!(w.confirm_delete);
        let effs = w.on_key(key(KeyCode::Char('y')));
        assert!(matches!(effs.as_slice(), [Effect::DeleteRow { index: 1 }]));
        w.on_key(key(KeyCode::Char('d')));
        assert!(w.on_key(key(KeyCode::Char('n'))).is_empty());
        assert!(!w.confirm_delete);
    }

    #[test]
    fn export_prompts_for_a_file_name() {
        let mut w = RecordTableWidget::new(table());
        assert!(w.on_key(key(KeyCode::Char('x'))).is_empty());
        assert_eq!(w.export_name.as_deref(), Some("form-3.csv"));
        for _ in 0.."form-3.csv".len() {
            w.on_key(key(KeyCode::Backspace));
        }
        assert!(w.on_key(key(KeyCode::Enter)).is_empty());
        for c in "out/a.csv".chars() {
            w.on_key(key(KeyCode::Char(c)));
        }
        let effs = w.on_key(key(KeyCode::Enter));
        assert!(matches!(effs.as_slice(), [Effect::ExportRows { path }] if path == "out/a.csv"));
        assert!(w.export_name.is_none());

        w.on_key(key(KeyCode::Char('x')));
        assert!(w.on_key(key(KeyCode::Esc)).is_empty());
        assert!(w.export_name.is_none());
    }

    #[test]
    fn renders_rows_with_folded_multiline_cells() {
        let mut w = RecordTableWidget::new(table());
        let mut term = Terminal::new(ratatui::backend::TestBackend::new(60, 8)).unwrap();
        term.draw(|f| w.render(f, f.area(), true, 0, &Theme::default()))
            .unwrap();
        let buf = term.backend().buffer();
        let text: String = (0..buf.area.height)
            .map(|y| {
                (0..buf.area.width)
                    .map(|x| buf[(x, y)].symbol().to_string())
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n");
        assert!(text.contains("#3 (form deleted) — 2 rows"));
        assert!(text.contains("line one …"));
        assert!(!text.contains("line two"));
    }
}

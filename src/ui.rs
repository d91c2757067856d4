use crate::app::{update, AppMsg, Effect, PickPurpose, Screen};
use crate::error::{FormError, FormResult};
use crate::forms_core::editor::FormSchemaEditor;
use crate::forms_core::renderer::materialize;
use crate::forms_core::table::{append_record, migrate_rows, RecordTable};
use crate::services::config::{load_config, resolve_path, LoadedConfig};
use crate::services::row_store::{FileRowStore, RowStore};
use crate::services::schema_store::{SchemaStore, SqliteSchemaStore};
use crate::theme::Theme;
use crate::widgets::form_widget::{RecordFormWidget, RecordTarget};
use crate::widgets::menu::MainMenuWidget;
use crate::widgets::option_set::OptionSetWidget;
use crate::widgets::picker::FormPickerWidget;
use crate::widgets::record_table::RecordTableWidget;
use crate::widgets::schema_editor::SchemaEditorWidget;
use crate::widgets::status_bar::draw_footer;
use crate::widgets::Widget;
use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::prelude::*;
use ratatui::widgets::*;
use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_ENV: &str = "FORMS_TUI_LOG";
const TICK_MS: u64 = 200;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Error,
}

pub struct Toast {
    pub text: String,
    pub level: ToastLevel,
    pub expires_at_tick: u64,
}

pub(crate) struct AppState {
    pub(crate) config: LoadedConfig,
    pub(crate) theme: Theme,
    pub(crate) schemas: Box<dyn SchemaStore>,
    pub(crate) rows: Box<dyn RowStore>,
    pub(crate) screen: Screen,
    pub(crate) widget: Box<dyn Widget>,
    pub(crate) toast: Option<Toast>,
    pub(crate) last_error: Option<String>,
    pub(crate) tick: u64,
    pub(crate) should_quit: bool,
    // Debug log (rendered in bottom debug pane)
    pub(crate) debug_log: VecDeque<String>,
}

impl AppState {
    pub(crate) fn new(
        config: LoadedConfig,
        schemas: Box<dyn SchemaStore>,
        rows: Box<dyn RowStore>,
    ) -> Self {
        let theme = Theme::from_name(&config.config.theme);
        let widget = Box::new(MainMenuWidget::new(config.config.title.clone()));
        Self {
            config,
            theme,
            schemas,
            rows,
            screen: Screen::MainMenu,
            widget,
            toast: None,
            last_error: None,
            tick: 0,
            should_quit: false,
            debug_log: VecDeque::new(),
        }
    }

    pub fn dbg(&mut self, msg: impl Into<String>) {
        const MAX_LOG_LINES: usize = 200;
        let msg = msg.into();
        tracing::debug!("{msg}");
        if self.debug_log.len() >= MAX_LOG_LINES {
            self.debug_log.pop_front();
        }
        self.debug_log.push_back(msg);
    }
}

/// Forms that have stored rows, named after their schema when it still exists.
fn browse_items(state: &AppState) -> FormResult<Vec<(i64, String)>> {
    let names: BTreeMap<i64, String> = state.schemas.schemas()?.into_iter().collect();
    Ok(state
        .rows
        .form_ids()?
        .into_iter()
        .map(|id| {
            let name = names
                .get(&id)
                .cloned()
                .unwrap_or_else(|| "(form deleted)".to_string());
            (id, name)
        })
        .collect())
}

/// Build the widget for `screen` and whatever non-fatal warnings came with it.
fn build_screen(state: &AppState, screen: Screen) -> FormResult<(Box<dyn Widget>, Vec<FormError>)> {
    let schemas = state.schemas.as_ref();
    let built: Box<dyn Widget> = match screen {
        Screen::MainMenu => Box::new(MainMenuWidget::new(state.config.config.title.clone())),
        Screen::CreateForm => Box::new(SchemaEditorWidget::new(FormSchemaEditor::new(
            schemas.option_sets()?,
        ))),
        Screen::EditForm { form_id } => Box::new(SchemaEditorWidget::new(FormSchemaEditor::load(
            form_id, schemas,
        )?)),
        Screen::PickForm(purpose) => {
            let items = match purpose {
                PickPurpose::Browse => browse_items(state)?,
                _ => schemas.schemas()?,
            };
            Box::new(FormPickerWidget::new(purpose, items))
        }
        Screen::CreateOptionSet => Box::new(OptionSetWidget::new()),
        Screen::InsertRecord { form_id } => {
            let schema = schemas.get_schema(form_id)?;
            let m = materialize(&schema, schemas);
            let w = RecordFormWidget::for_insert(schema, m.slots);
            return Ok((Box::new(w), m.warnings));
        }
        Screen::BrowseRecords { form_id } => Box::new(RecordTableWidget::new(RecordTable::load(
            form_id,
            schemas,
            state.rows.as_ref(),
        )?)),
    };
    Ok((built, Vec::new()))
}

fn open_screen(state: &mut AppState, screen: Screen, queue: &mut VecDeque<Effect>) {
    match build_screen(state, screen) {
        Ok((widget, warnings)) => {
            state.widget = widget;
            dispatch(state, AppMsg::Entered(screen), queue);
            dispatch(state, AppMsg::Warned(warnings), queue);
        }
        Err(error) => dispatch(
            state,
            AppMsg::Failed {
                context: format!("open {}", screen.name()),
                error,
            },
            queue,
        ),
    }
}

fn dispatch(state: &mut AppState, msg: AppMsg, queue: &mut VecDeque<Effect>) {
    queue.extend(update(state, msg));
}

/// Validation failures stay inline; anything else is a failure to surface.
fn outcome(context: &str, result: FormResult<String>) -> AppMsg {
    match result {
        Ok(text) => AppMsg::Completed { text },
        Err(e) if e.is_validation() => AppMsg::Rejected(e),
        Err(error) => AppMsg::Failed {
            context: context.to_string(),
            error,
        },
    }
}

fn save_schema(state: &mut AppState) -> Option<AppMsg> {
    let w = state
        .widget
        .as_any_mut()
        .downcast_mut::<SchemaEditorWidget>()?;
    let before = w
        .editor
        .form_id
        .and_then(|id| state.schemas.get_schema(id).ok());
    let result = w.editor.save(state.schemas.as_mut());
    match &result {
        Ok(_) => w.saved(),
        Err(e) => w.message = Some(e.to_string()),
    }
    let id = match result {
        Ok(id) => id,
        Err(e) => return Some(outcome("save form", Err(e))),
    };
    // Stored rows follow the edited field layout.
    if let Some(before) = before {
        let migrated = state
            .schemas
            .get_schema(id)
            .and_then(|after| migrate_rows(&before, &after, state.rows.as_mut()));
        if let Err(e) = migrated {
            return Some(outcome("migrate stored rows", Err(e)));
        }
    }
    Some(AppMsg::Completed {
        text: format!("Form #{id} saved"),
    })
}

fn save_option_set(state: &mut AppState) -> Option<AppMsg> {
    let w = state
        .widget
        .as_any_mut()
        .downcast_mut::<OptionSetWidget>()?;
    let name = w.editor.name.trim().to_string();
    let result = w.editor.save(state.schemas.as_mut());
    match &result {
        Ok(_) => w.saved(),
        Err(e) => w.message = Some(e.to_string()),
    }
    Some(outcome(
        "save option set",
        result.map(|id| format!("Option set '{name}' saved as #{id}")),
    ))
}

fn save_record(state: &mut AppState) -> Option<AppMsg> {
    let rows = state.rows.as_mut();
    if let Some(w) = state
        .widget
        .as_any_mut()
        .downcast_mut::<RecordFormWidget>()
    {
        let RecordTarget::Insert(schema) = &w.target else {
            return None;
        };
        let name = schema.name.clone();
        let result = append_record(schema, &mut w.slots, rows);
        match &result {
            Ok(_) => w.clear(),
            Err(e) => w.message = Some(e.to_string()),
        }
        return Some(outcome(
            "insert record",
            result.map(|_| format!("Record added to '{name}'")),
        ));
    }
    let w = state
        .widget
        .as_any_mut()
        .downcast_mut::<RecordTableWidget>()?;
    let editor = w.editor.as_mut()?;
    let mut edit = editor.take_edit()?;
    let index = edit.index;
    match w.table.commit_edit(&mut edit, rows) {
        Ok(()) => {
            w.editor = None;
            w.refresh();
            Some(AppMsg::Completed {
                text: format!("Row {} updated", index + 1),
            })
        }
        Err(e) => {
            // Give the slots back so the user keeps their input.
            editor.slots = edit.slots;
            editor.message = Some(e.to_string());
            Some(outcome("update record", Err(e)))
        }
    }
}

/// Resolve a typed export name; a missing `.csv` extension is appended.
fn export_target(base_dir: &Path, raw: &str) -> Result<PathBuf> {
    let path = resolve_path(base_dir, raw)?;
    if path.extension().and_then(|e| e.to_str()) == Some("csv") {
        return Ok(path);
    }
    let mut name = path.into_os_string();
    name.push(".csv");
    Ok(PathBuf::from(name))
}

fn with_table<T>(
    state: &mut AppState,
    f: impl FnOnce(&mut RecordTableWidget, &mut dyn RowStore, &dyn SchemaStore) -> T,
) -> Option<T> {
    let w = state
        .widget
        .as_any_mut()
        .downcast_mut::<RecordTableWidget>()?;
    Some(f(w, state.rows.as_mut(), state.schemas.as_ref()))
}

pub(crate) fn run_effects(state: &mut AppState, effects: Vec<Effect>) {
    let mut queue: VecDeque<Effect> = effects.into();
    while let Some(eff) = queue.pop_front() {
        match eff {
            Effect::Open(screen) => open_screen(state, screen, &mut queue),
            Effect::Back => {
                if state.screen == Screen::MainMenu {
                    continue;
                }
                let parent = state.screen.parent();
                open_screen(state, parent, &mut queue);
            }
            Effect::Quit => {
                state.dbg("quit");
                state.should_quit = true;
            }
            Effect::SaveSchema => {
                if let Some(msg) = save_schema(state) {
                    dispatch(state, msg, &mut queue);
                }
            }
            Effect::SaveOptionSet => {
                if let Some(msg) = save_option_set(state) {
                    dispatch(state, msg, &mut queue);
                }
            }
            Effect::DeleteForm { form_id } => {
                let result = state.schemas.delete_schema(form_id);
                let ok = result.is_ok();
                let msg = outcome(
                    "delete form",
                    result.map(|()| format!("Form #{form_id} deleted; stored rows kept")),
                );
                dispatch(state, msg, &mut queue);
                if ok {
                    tracing::info!(form_id, "deleted form");
                    open_screen(state, Screen::PickForm(PickPurpose::Delete), &mut queue);
                }
            }
            Effect::SaveRecord => {
                if let Some(msg) = save_record(state) {
                    dispatch(state, msg, &mut queue);
                }
            }
            Effect::BeginEdit { index } => {
                let begun = with_table(state, |w, _, schemas| {
                    let edit = w.table.begin_edit(index, schemas)?;
                    let warnings = edit.warnings.clone();
                    let legacy = edit.legacy;
                    w.editor = Some(RecordFormWidget::for_edit(&w.table.title(), edit));
                    Ok::<_, FormError>((warnings, legacy))
                });
                match begun {
                    Some(Ok((warnings, legacy))) => {
                        if legacy {
                            state.dbg(format!("row {} edited with guessed types", index + 1));
                        }
                        dispatch(state, AppMsg::Warned(warnings), &mut queue);
                    }
                    Some(Err(error)) => dispatch(
                        state,
                        AppMsg::Failed {
                            context: "edit record".into(),
                            error,
                        },
                        &mut queue,
                    ),
                    None => {}
                }
            }
            Effect::DeleteRow { index } => {
                let deleted = with_table(state, |w, rows, _| {
                    let r = w.table.delete(index, rows);
                    w.refresh();
                    r
                });
                if let Some(result) = deleted {
                    let msg = outcome(
                        "delete record",
                        result.map(|()| format!("Row {} deleted", index + 1)),
                    );
                    dispatch(state, msg, &mut queue);
                }
            }
            Effect::ExportRows { path } => {
                let target = export_target(&state.config.base_dir, &path)
                    .map_err(|e| FormError::StoreUnavailable(e.to_string()));
                let exported = with_table(state, |w, _, _| {
                    let path = target?;
                    w.table.export(&path)?;
                    Ok::<_, FormError>(path)
                });
                if let Some(result) = exported {
                    let msg = outcome(
                        "export records",
                        result.map(|p| format!("Exported to {}", p.display())),
                    );
                    dispatch(state, msg, &mut queue);
                }
            }
            Effect::Rejected(e) => dispatch(state, AppMsg::Rejected(e), &mut queue),
            Effect::ShowToast {
                text,
                level,
                seconds,
            } => {
                let ticks = seconds.saturating_mul(1000 / TICK_MS);
                state.toast = Some(Toast {
                    text,
                    level,
                    expires_at_tick: state.tick.saturating_add(ticks),
                });
            }
        }
    }
}

/// File logging when `log_file` is configured; the terminal belongs to the UI.
fn init_tracing(loaded: &LoadedConfig) -> Result<()> {
    let Some(path) = loaded.log_path()? else {
        return Ok(());
    };
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("creating {dir:?}"))?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {path:?}"))?;
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .try_init()
        .context("installing tracing subscriber")?;
    Ok(())
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes"))
        .unwrap_or(false)
}

pub fn run() -> Result<()> {
    let loaded = load_config()?;
    init_tracing(&loaded)?;
    let db = loaded.database_path()?;
    let schemas = SqliteSchemaStore::open(&db).with_context(|| format!("opening {db:?}"))?;
    let rows = FileRowStore::new(loaded.data_dir()?);
    tracing::info!(source = ?loaded.source, "starting");
    let mut state = AppState::new(loaded, Box::new(schemas), Box::new(rows));
    if let Some(src) = state.config.source.clone() {
        state.dbg(format!("config: {}", src.display()));
    } else {
        state.dbg("config: defaults");
    }
    // Headless smoke mode
    if env_flag("FORMS_TUI_HEADLESS") {
        return run_headless(&mut state);
    }
    // Setup terminal (interactive)
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    let tick_rate = Duration::from_millis(TICK_MS);
    let mut last_tick = Instant::now();
    let res = loop {
        terminal.draw(|f| ui(f, &mut state))?;
        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_millis(0));
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)
                    {
                        break Ok(());
                    }
                    let effects = state.widget.on_key(key);
                    run_effects(&mut state, effects);
                }
            }
        }
        if state.should_quit {
            break Ok(());
        }
        if last_tick.elapsed() >= tick_rate {
            state.tick = state.tick.wrapping_add(1);
            last_tick = Instant::now();
        }
    };
    // Restore
    disable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;
    res
}

fn run_headless(state: &mut AppState) -> Result<()> {
    let ticks: u64 = std::env::var("FORMS_TUI_TICKS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(10);
    if let Ok(s) = std::env::var("FORMS_TUI_HEADLESS_OPEN") {
        match Screen::parse(&s) {
            Some(screen) => run_effects(state, vec![Effect::Open(screen)]),
            None => state.dbg(format!("unknown screen '{s}'")),
        }
    }
    let backend = ratatui::backend::TestBackend::new(80, 24);
    let mut terminal = Terminal::new(backend)?;
    for _ in 0..ticks {
        terminal.draw(|f| ui(f, state))?;
        state.tick = state.tick.wrapping_add(1);
    }
    if env_flag("FORMS_TUI_SMOKE_SUMMARY") {
        let forms = state.schemas.schemas().map(|s| s.len()).unwrap_or(0);
        let option_sets = state.schemas.option_sets().map(|s| s.len()).unwrap_or(0);
        let summary = serde_json::json!({
            "ok": state.last_error.is_none(),
            "screen": state.screen.name(),
            "forms": forms,
            "option_sets": option_sets,
            "error": state.last_error,
        });
        println!("{summary}");
    }
    Ok(())
}

fn ui(f: &mut Frame, state: &mut AppState) {
    // Clear expired toast
    if let Some(t) = &state.toast {
        if state.tick >= t.expires_at_tick {
            state.toast = None;
        }
    }
    let screen = f.area();
    f.render_widget(Block::default().style(state.theme.base_style()), screen);

    const DEBUG_H: u16 = 4;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(DEBUG_H),
            Constraint::Length(1),
        ])
        .split(screen);

    draw_title(f, chunks[0], state);
    state
        .widget
        .render(f, chunks[1], true, state.tick, &state.theme);
    draw_debug(f, chunks[2], state);
    let help = state.widget.help();
    draw_footer(f, chunks[3], state, help);
}

fn draw_title(f: &mut Frame, area: Rect, state: &AppState) {
    let mut spans = vec![Span::styled(
        format!(" {} ", state.config.config.title),
        state.theme.text_active_bold(),
    )];
    if let Some(src) = &state.config.source {
        spans.push(Span::styled(
            format!(" {}", src.display()),
            state.theme.text_muted(),
        ));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_debug(f: &mut Frame, area: Rect, state: &AppState) {
    let b = Block::default()
        .borders(Borders::TOP)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            "Debug",
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        ));
    // Take last `area.height` lines
    let h = area.height as usize;
    let start = state.debug_log.len().saturating_sub(h);
    let lines: Vec<Line> = state
        .debug_log
        .iter()
        .skip(start)
        .map(|s| Line::raw(s.clone()))
        .collect();
    let p = Paragraph::new(lines)
        .style(Style::default().fg(Color::Gray))
        .block(b)
        .wrap(Wrap { trim: true });
    f.render_widget(p, area);
}

use super::*;
use crate::forms_core::editor::MoveDir;
use crate::forms_core::registry::FieldType;
use crate::model::{AppConfig, DataRecord, FieldDef};
use crate::services::config::LoadedConfig;
use crate::services::memory::{MemoryRowStore, MemorySchemaStore};
use crate::ui::run_effects;
use crate::widgets::form_widget::RecordFormWidget;
use crate::widgets::option_set::OptionSetWidget;
use crate::widgets::picker::FormPickerWidget;
use crate::widgets::record_table::RecordTableWidget;
use crate::widgets::schema_editor::SchemaEditorWidget;
use std::path::PathBuf;

fn state_at(base_dir: PathBuf) -> AppState {
    let config = LoadedConfig {
        config: AppConfig::default(),
        base_dir,
        source: None,
    };
    AppState::new(
        config,
        Box::new(MemorySchemaStore::default()),
        Box::new(MemoryRowStore::default()),
    )
}

fn state() -> AppState {
    state_at(PathBuf::from("."))
}

fn people(st: &mut AppState) -> FormId {
    st.schemas
        .create_schema(
            "People",
            &[
                FieldDef::new("Name", FieldType::Text),
                FieldDef::new("Age", FieldType::Number),
            ],
        )
        .unwrap()
}

fn widget<T: 'static>(st: &mut AppState) -> &mut T {
    st.widget.as_any_mut().downcast_mut::<T>().unwrap()
}

fn toast_level(st: &AppState) -> Option<ToastLevel> {
    st.toast.as_ref().map(|t| t.level)
}

#[test]
fn failure_logs_and_shows_longer_error_toast() {
    let mut st = state();
    let effs = update(
        &mut st,
        AppMsg::Failed {
            context: "save form".into(),
            error: FormError::StoreUnavailable("locked".into()),
        },
    );
    assert_eq!(st.last_error.as_deref(), Some("save form: store unavailable: locked"));
    assert!(st.debug_log.back().unwrap().starts_with("error: save form"));
    match effs.as_slice() {
        [Effect::ShowToast { level, seconds, .. }] => {
            assert_eq!(*level, ToastLevel::Error);
            assert_eq!(*seconds, 6);
        }
        other => panic!("unexpected effects: {other:?}"),
    }
    run_effects(&mut st, effs);
    assert_eq!(st.toast.as_ref().unwrap().expires_at_tick, 30);
}

#[test]
fn rejection_only_reaches_debug_log() {
    let mut st = state();
    let effs = update(&mut st, AppMsg::Rejected(FormError::EmptySchemaName));
    assert!(effs.is_empty());
    assert!(st.last_error.is_none());
    assert_eq!(st.debug_log.back().unwrap(), "invalid: form name is empty");
}

#[test]
fn warnings_summarize_into_one_info_toast() {
    let mut st = state();
    assert!(update(&mut st, AppMsg::Warned(Vec::new())).is_empty());
    let effs = update(
        &mut st,
        AppMsg::Warned(vec![
            FormError::OptionSetNotFound(Some(4)),
            FormError::OptionSetNotFound(Some(5)),
        ]),
    );
    match effs.as_slice() {
        [Effect::ShowToast { text, level, .. }] => {
            assert_eq!(*level, ToastLevel::Info);
            assert_eq!(text, "2 fields disabled: option sets missing");
        }
        other => panic!("unexpected effects: {other:?}"),
    }
}

#[test]
fn create_form_saves_and_resets_editor() {
    let mut st = state();
    run_effects(&mut st, vec![Effect::Open(Screen::CreateForm)]);
    assert_eq!(st.screen, Screen::CreateForm);
    {
        let w = widget::<SchemaEditorWidget>(&mut st);
        w.editor.set_name("People");
        w.editor.set_field_name(0, "Name").unwrap();
    }
    run_effects(&mut st, vec![Effect::SaveSchema]);
    let forms = st.schemas.schemas().unwrap();
    assert_eq!(forms.len(), 1);
    assert_eq!(forms[0].1, "People");
    assert_eq!(toast_level(&st), Some(ToastLevel::Success));
    let w = widget::<SchemaEditorWidget>(&mut st);
    assert!(w.editor.name.is_empty());
    assert!(w.message.is_none());
}

#[test]
fn invalid_schema_writes_nothing() {
    let mut st = state();
    run_effects(&mut st, vec![Effect::Open(Screen::CreateForm)]);
    run_effects(&mut st, vec![Effect::SaveSchema]);
    assert!(st.schemas.schemas().unwrap().is_empty());
    assert!(st.toast.is_none());
    assert!(st.last_error.is_none());
    let w = widget::<SchemaEditorWidget>(&mut st);
    assert_eq!(w.message.as_deref(), Some("form name is empty"));
    assert!(w.editor.name_invalid);
}

#[test]
fn option_set_save_lists_it_for_new_forms() {
    let mut st = state();
    run_effects(&mut st, vec![Effect::Open(Screen::CreateOptionSet)]);
    {
        let w = widget::<OptionSetWidget>(&mut st);
        w.editor.set_name("Sizes");
        w.editor.set_label(0, "S").unwrap();
    }
    run_effects(&mut st, vec![Effect::SaveOptionSet]);
    let sets = st.schemas.option_sets().unwrap();
    assert_eq!(sets.len(), 1);
    assert_eq!(st.schemas.get_options(sets[0].option_set_id).unwrap(), vec!["S"]);
    run_effects(&mut st, vec![Effect::Open(Screen::CreateForm)]);
    let w = widget::<SchemaEditorWidget>(&mut st);
    assert_eq!(w.editor.option_sets.len(), 1);
}

#[test]
fn insert_appends_row_and_clears_form() {
    let mut st = state();
    let id = people(&mut st);
    run_effects(&mut st, vec![Effect::Open(Screen::InsertRecord { form_id: id })]);
    {
        let w = widget::<RecordFormWidget>(&mut st);
        w.slots[0].set_text(0, "Ada");
        w.slots[1].set_text(0, "36");
    }
    run_effects(&mut st, vec![Effect::SaveRecord]);
    let stored = st.rows.read_all(id).unwrap();
    assert_eq!(stored.header, vec!["Name", "Age"]);
    assert_eq!(stored.rows, vec![DataRecord::new(["Ada", "36"])]);
    assert_eq!(toast_level(&st), Some(ToastLevel::Success));
    let w = widget::<RecordFormWidget>(&mut st);
    assert!(w.slots.iter().all(|s| s.values() == vec![String::new()]));
}

#[test]
fn insert_with_missing_option_set_warns_and_disables() {
    let mut st = state();
    let id = st
        .schemas
        .create_schema("Shirts", &[FieldDef::multi_choice("Size", 99)])
        .unwrap();
    run_effects(&mut st, vec![Effect::Open(Screen::InsertRecord { form_id: id })]);
    assert_eq!(st.screen, Screen::InsertRecord { form_id: id });
    assert_eq!(toast_level(&st), Some(ToastLevel::Info));
    let w = widget::<RecordFormWidget>(&mut st);
    assert!(w.slots[0].disabled);
}

#[test]
fn browse_edit_then_delete_rows() {
    let mut st = state();
    let id = people(&mut st);
    let header = vec!["Name".to_string(), "Age".to_string()];
    st.rows.append(id, &header, &DataRecord::new(["Ada", "36"])).unwrap();
    st.rows.append(id, &header, &DataRecord::new(["Lin", "41"])).unwrap();
    run_effects(&mut st, vec![Effect::Open(Screen::BrowseRecords { form_id: id })]);
    run_effects(&mut st, vec![Effect::BeginEdit { index: 0 }]);
    {
        let w = widget::<RecordTableWidget>(&mut st);
        let editor = w.editor.as_mut().unwrap();
        editor.slots[0].set_text(0, "Bob");
    }
    run_effects(&mut st, vec![Effect::SaveRecord]);
    assert!(widget::<RecordTableWidget>(&mut st).editor.is_none());
    assert_eq!(st.rows.read_all(id).unwrap().rows[0], DataRecord::new(["Bob", "36"]));

    run_effects(&mut st, vec![Effect::DeleteRow { index: 1 }]);
    let stored = st.rows.read_all(id).unwrap();
    assert_eq!(stored.rows, vec![DataRecord::new(["Bob", "36"])]);
    let w = widget::<RecordTableWidget>(&mut st);
    assert_eq!(w.table.rows.len(), 1);
    assert_eq!(w.table.selected, Some(0));
}

#[test]
fn blank_edit_keeps_editor_open_with_input() {
    let mut st = state();
    let id = people(&mut st);
    let header = vec!["Name".to_string(), "Age".to_string()];
    st.rows.append(id, &header, &DataRecord::new(["Ada", "36"])).unwrap();
    run_effects(&mut st, vec![Effect::Open(Screen::BrowseRecords { form_id: id })]);
    run_effects(&mut st, vec![Effect::BeginEdit { index: 0 }]);
    {
        let w = widget::<RecordTableWidget>(&mut st);
        w.editor.as_mut().unwrap().slots[0].set_text(0, "");
    }
    run_effects(&mut st, vec![Effect::SaveRecord]);
    assert_eq!(st.rows.read_all(id).unwrap().rows[0], DataRecord::new(["Ada", "36"]));
    let w = widget::<RecordTableWidget>(&mut st);
    let editor = w.editor.as_ref().unwrap();
    assert_eq!(editor.slots.len(), 2);
    assert!(editor.message.is_some());
}

#[test]
fn deleting_a_form_keeps_its_rows_browsable() {
    let mut st = state();
    let id = people(&mut st);
    st.rows
        .append(id, &["Name".into(), "Age".into()], &DataRecord::new(["Ada", "36"]))
        .unwrap();
    run_effects(&mut st, vec![Effect::Open(Screen::PickForm(PickPurpose::Delete))]);
    run_effects(&mut st, vec![Effect::DeleteForm { form_id: id }]);
    assert!(st.schemas.schemas().unwrap().is_empty());
    assert_eq!(st.rows.form_ids().unwrap(), vec![id]);
    assert_eq!(st.screen, Screen::PickForm(PickPurpose::Delete));
    assert!(widget::<FormPickerWidget>(&mut st).items.is_empty());

    run_effects(&mut st, vec![Effect::Open(Screen::PickForm(PickPurpose::Browse))]);
    let items = widget::<FormPickerWidget>(&mut st).items.clone();
    assert_eq!(items, vec![(id, "(form deleted)".to_string())]);

    run_effects(&mut st, vec![Effect::Open(Screen::BrowseRecords { form_id: id })]);
    run_effects(&mut st, vec![Effect::BeginEdit { index: 0 }]);
    let w = widget::<RecordTableWidget>(&mut st);
    assert!(w.editor.as_ref().unwrap().title.contains("(types guessed)"));
}

#[test]
fn export_writes_named_csv_under_config_dir() {
    let tmp = tempfile::tempdir().unwrap();
    let mut st = state_at(tmp.path().to_path_buf());
    let id = people(&mut st);
    st.rows
        .append(id, &["Name".into(), "Age".into()], &DataRecord::new(["Ada, Countess", "36"]))
        .unwrap();
    run_effects(&mut st, vec![Effect::Open(Screen::BrowseRecords { form_id: id })]);
    run_effects(&mut st, vec![Effect::ExportRows { path: "out/people".into() }]);
    let path = tmp.path().join("out").join("people.csv");
    let content = std::fs::read_to_string(path).unwrap();
    assert_eq!(content, "Name,Age\n\"Ada, Countess\",36\n");
    assert_eq!(toast_level(&st), Some(ToastLevel::Success));
}

#[test]
fn reordering_fields_keeps_rows_editable() {
    let mut st = state();
    let id = st
        .schemas
        .create_schema(
            "Cards",
            &[
                FieldDef::new("Name", FieldType::Text),
                FieldDef::new("Card", FieldType::CardNumber),
            ],
        )
        .unwrap();
    st.rows
        .append(
            id,
            &["Name".into(), "Card".into()],
            &DataRecord::new(["Ali", "1111-2222-3333-4444"]),
        )
        .unwrap();

    run_effects(&mut st, vec![Effect::Open(Screen::EditForm { form_id: id })]);
    widget::<SchemaEditorWidget>(&mut st)
        .editor
        .move_field(1, MoveDir::Up)
        .unwrap();
    run_effects(&mut st, vec![Effect::SaveSchema]);
    assert_eq!(toast_level(&st), Some(ToastLevel::Success));
    let stored = st.rows.read_all(id).unwrap();
    assert_eq!(stored.header, vec!["Card", "Name"]);
    assert_eq!(stored.rows, vec![DataRecord::new(["1111-2222-3333-4444", "Ali"])]);

    run_effects(&mut st, vec![Effect::Open(Screen::BrowseRecords { form_id: id })]);
    run_effects(&mut st, vec![Effect::BeginEdit { index: 0 }]);
    let w = widget::<RecordTableWidget>(&mut st);
    assert_eq!(w.table.header, vec!["Card", "Name"]);
    let editor = w.editor.as_ref().unwrap();
    assert!(!editor.title.contains("(types guessed)"));
    assert_eq!(editor.slots[0].values(), vec!["1111", "2222", "3333", "4444"]);
    assert_eq!(editor.slots[1].values(), vec!["Ali"]);
}

#[test]
fn open_failure_stays_on_current_screen() {
    let mut st = state();
    run_effects(&mut st, vec![Effect::Open(Screen::EditForm { form_id: 42 })]);
    assert_eq!(st.screen, Screen::MainMenu);
    assert_eq!(toast_level(&st), Some(ToastLevel::Error));
    assert!(st.last_error.as_deref().unwrap().contains("form 42 not found"));
}

#[test]
fn back_walks_up_to_the_menu() {
    let mut st = state();
    let id = people(&mut st);
    run_effects(&mut st, vec![Effect::Open(Screen::InsertRecord { form_id: id })]);
    run_effects(&mut st, vec![Effect::Back]);
    assert_eq!(st.screen, Screen::PickForm(PickPurpose::Insert));
    run_effects(&mut st, vec![Effect::Back]);
    assert_eq!(st.screen, Screen::MainMenu);
    run_effects(&mut st, vec![Effect::Back]);
    assert_eq!(st.screen, Screen::MainMenu);
    assert!(!st.should_quit);
    run_effects(&mut st, vec![Effect::Quit]);
    assert!(st.should_quit);
}

#[test]
fn screen_names_parse() {
    assert_eq!(Screen::parse("menu"), Some(Screen::MainMenu));
    assert_eq!(Screen::parse("browse:3"), Some(Screen::BrowseRecords { form_id: 3 }));
    assert_eq!(
        Screen::parse("pick:delete"),
        Some(Screen::PickForm(PickPurpose::Delete))
    );
    assert_eq!(Screen::parse("insert:x"), None);
    assert_eq!(Screen::parse("settings"), None);
}

use crate::error::FormError;
use crate::model::FormId;
use crate::ui::{AppState, ToastLevel};

/// What a form picker leads to once a form is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickPurpose {
    Edit,
    Delete,
    Insert,
    Browse,
}

impl PickPurpose {
    pub fn title(self) -> &'static str {
        match self {
            PickPurpose::Edit => "Edit form",
            PickPurpose::Delete => "Delete form",
            PickPurpose::Insert => "Insert record",
            PickPurpose::Browse => "Browse records",
        }
    }

    /// Screen opened for the picked form; `None` when the pick itself acts.
    pub fn target(self, form_id: FormId) -> Option<Screen> {
        match self {
            PickPurpose::Edit => Some(Screen::EditForm { form_id }),
            PickPurpose::Insert => Some(Screen::InsertRecord { form_id }),
            PickPurpose::Browse => Some(Screen::BrowseRecords { form_id }),
            PickPurpose::Delete => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Screen {
    #[default]
    MainMenu,
    CreateForm,
    EditForm {
        form_id: FormId,
    },
    PickForm(PickPurpose),
    CreateOptionSet,
    InsertRecord {
        form_id: FormId,
    },
    BrowseRecords {
        form_id: FormId,
    },
}

impl Screen {
    pub fn name(self) -> &'static str {
        match self {
            Screen::MainMenu => "MainMenu",
            Screen::CreateForm => "CreateForm",
            Screen::EditForm { .. } => "EditForm",
            Screen::PickForm(_) => "PickForm",
            Screen::CreateOptionSet => "CreateOptionSet",
            Screen::InsertRecord { .. } => "InsertRecord",
            Screen::BrowseRecords { .. } => "BrowseRecords",
        }
    }

    /// Where Esc leads.
    pub fn parent(self) -> Screen {
        match self {
            Screen::EditForm { .. } => Screen::PickForm(PickPurpose::Edit),
            Screen::InsertRecord { .. } => Screen::PickForm(PickPurpose::Insert),
            Screen::BrowseRecords { .. } => Screen::PickForm(PickPurpose::Browse),
            _ => Screen::MainMenu,
        }
    }

    /// Parse `menu`, `create`, `option-set`, `pick:<purpose>`, `edit:<id>`,
    /// `insert:<id>` or `browse:<id>`.
    pub fn parse(s: &str) -> Option<Screen> {
        let (head, arg) = match s.split_once(':') {
            Some((h, a)) => (h, Some(a)),
            None => (s, None),
        };
        let id = || arg.and_then(|a| a.trim().parse::<FormId>().ok());
        match head.trim() {
            "menu" => Some(Screen::MainMenu),
            "create" => Some(Screen::CreateForm),
            "option-set" => Some(Screen::CreateOptionSet),
            "edit" => id().map(|form_id| Screen::EditForm { form_id }),
            "insert" => id().map(|form_id| Screen::InsertRecord { form_id }),
            "browse" => id().map(|form_id| Screen::BrowseRecords { form_id }),
            "pick" => match arg.map(str::trim) {
                Some("edit") => Some(Screen::PickForm(PickPurpose::Edit)),
                Some("delete") => Some(Screen::PickForm(PickPurpose::Delete)),
                Some("insert") => Some(Screen::PickForm(PickPurpose::Insert)),
                Some("browse") => Some(Screen::PickForm(PickPurpose::Browse)),
                _ => None,
            },
            _ => None,
        }
    }
}

pub enum AppMsg {
    /// A screen finished building and is now current.
    Entered(Screen),
    /// A store write went through.
    Completed { text: String },
    /// A store, decode or lookup failure.
    Failed { context: String, error: FormError },
    /// Inline validation failure; the widget already marked its inputs.
    Rejected(FormError),
    /// Non-fatal problems found while materializing a form.
    Warned(Vec<FormError>),
}

#[derive(Debug)]
pub enum Effect {
    Open(Screen),
    Back,
    Quit,
    SaveSchema,
    SaveOptionSet,
    DeleteForm { form_id: FormId },
    SaveRecord,
    BeginEdit { index: usize },
    DeleteRow { index: usize },
    /// Write the browsed rows to a CSV file; relative paths resolve against the config dir.
    ExportRows { path: String },
    Rejected(FormError),
    ShowToast {
        text: String,
        level: ToastLevel,
        seconds: u64,
    },
}

pub fn update(state: &mut AppState, msg: AppMsg) -> Vec<Effect> {
    use AppMsg::*;
    let mut effects: Vec<Effect> = Vec::new();
    let seconds = state.config.config.toast_seconds;
    match msg {
        Entered(screen) => {
            state.screen = screen;
            state.dbg(format!("screen -> {}", screen.name()));
        }
        Completed { text } => {
            state.dbg(format!("ok: {text}"));
            effects.push(Effect::ShowToast {
                text,
                level: ToastLevel::Success,
                seconds,
            });
        }
        Failed { context, error } => {
            tracing::error!("{context}: {error}");
            let text = format!("{context}: {error}");
            state.dbg(format!("error: {text}"));
            state.last_error = Some(text.clone());
            effects.push(Effect::ShowToast {
                text,
                level: ToastLevel::Error,
                seconds: seconds.max(1) * 2,
            });
        }
        Rejected(error) => {
            state.dbg(format!("invalid: {error}"));
        }
        Warned(warnings) => {
            if warnings.is_empty() {
                return effects;
            }
            for w in &warnings {
                tracing::warn!("{w}");
                state.dbg(format!("warn: {w}"));
            }
            let text = match warnings.len() {
                1 => format!("{} (field disabled)", warnings[0]),
                n => format!("{n} fields disabled: option sets missing"),
            };
            effects.push(Effect::ShowToast {
                text,
                level: ToastLevel::Info,
                seconds,
            });
        }
    }
    effects
}

#[cfg(test)]
mod tests;

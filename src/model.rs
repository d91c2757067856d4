use crate::forms_core::registry::FieldType;
use serde::{Deserialize, Serialize};

pub type FormId = i64;
pub type FieldId = i64;
pub type OptionSetId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    #[serde(default)]
    pub field_id: Option<FieldId>,
    pub name: String,
    pub field_type: FieldType,
    // Only meaningful for multi_choice fields
    #[serde(default)]
    pub option_set_id: Option<OptionSetId>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            field_id: None,
            name: name.into(),
            field_type,
            option_set_id: None,
        }
    }

    pub fn multi_choice(name: impl Into<String>, option_set_id: OptionSetId) -> Self {
        Self {
            field_id: None,
            name: name.into(),
            field_type: FieldType::MultiChoice,
            option_set_id: Some(option_set_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSchema {
    pub form_id: FormId,
    pub name: String,
    pub fields: Vec<FieldDef>,
}

impl FormSchema {
    /// Column labels in field order.
    pub fn labels(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSetSummary {
    pub option_set_id: OptionSetId,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSet {
    pub option_set_id: OptionSetId,
    pub display_name: String,
    pub labels: Vec<String>,
}

/// One stored row: raw values in schema field order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRecord {
    pub values: Vec<String>,
}

impl DataRecord {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSet {
    pub header: Vec<String>,
    pub rows: Vec<DataRecord>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_title")]
    pub title: String,
    // SQLite file holding forms, fields and option sets
    #[serde(default = "default_database")]
    pub database: String,
    // Directory with one row file per form
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub log_file: Option<String>,
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_toast_seconds")]
    pub toast_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            database: default_database(),
            data_dir: default_data_dir(),
            log_file: None,
            theme: default_theme(),
            toast_seconds: default_toast_seconds(),
        }
    }
}

fn default_title() -> String {
    "Forms".to_string()
}

fn default_database() -> String {
    "forms.db".to_string()
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_theme() -> String {
    "dark".to_string()
}

fn default_toast_seconds() -> u64 {
    3
}

pub(crate) fn validate_app_config(cfg: &AppConfig) -> Result<(), String> {
    if cfg.database.trim().is_empty() {
        return Err("'database' must not be empty".to_string());
    }
    if cfg.data_dir.trim().is_empty() {
        return Err("'data_dir' must not be empty".to_string());
    }
    if let Some(p) = &cfg.log_file {
        if p.trim().is_empty() {
            return Err("'log_file' must not be empty when set".to_string());
        }
    }
    match cfg.theme.as_str() {
        "dark" | "light" => {}
        other => return Err(format!("unknown theme '{other}' (expected dark|light)")),
    }
    if cfg.toast_seconds > 60 {
        return Err("'toast_seconds' too large".to_string());
    }
    Ok(())
}

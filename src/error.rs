use thiserror::Error;

/// Errors raised by the form engine and its stores.
///
/// The `Empty*` variants are validation failures: the caller marks the
/// offending input and returns control to the user. Everything else is
/// surfaced (toast + debug log) by the hosting screen.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormError {
    #[error("field '{field}' (#{index}) is empty at part {part}")]
    EmptyFieldValue {
        field: String,
        index: usize,
        part: usize,
    },
    #[error("field #{index} has no name")]
    EmptyFieldName { index: usize },
    #[error("form name is empty")]
    EmptySchemaName,
    #[error("unknown field type '{0}'")]
    UnknownFieldType(String),
    #[error("option set {} not found", set_label(.0))]
    OptionSetNotFound(Option<i64>),
    #[error("form {0} not found")]
    SchemaNotFound(i64),
    #[error("row index {index} out of range (rows: {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("cannot decode field '{field}': {detail}")]
    AmbiguousDecode { field: String, detail: String },
    #[error("option set name is empty")]
    EmptyOptionSetName,
    #[error("option #{index} has no label")]
    EmptyOptionLabel { index: usize },
}

impl FormError {
    /// Validation failures are recovered inline; the rest need explicit surfacing.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            FormError::EmptyFieldValue { .. }
                | FormError::EmptyFieldName { .. }
                | FormError::EmptySchemaName
                | FormError::EmptyOptionSetName
                | FormError::EmptyOptionLabel { .. }
        )
    }
}

impl From<rusqlite::Error> for FormError {
    fn from(e: rusqlite::Error) -> Self {
        FormError::StoreUnavailable(e.to_string())
    }
}

impl From<std::io::Error> for FormError {
    fn from(e: std::io::Error) -> Self {
        FormError::StoreUnavailable(e.to_string())
    }
}

impl From<csv::Error> for FormError {
    fn from(e: csv::Error) -> Self {
        if e.is_io_error() {
            return FormError::StoreUnavailable(e.to_string());
        }
        let field = match e.position() {
            Some(pos) => format!("line {}", pos.line()),
            None => "row file".to_string(),
        };
        FormError::AmbiguousDecode {
            field,
            detail: e.to_string(),
        }
    }
}

fn set_label(id: &Option<i64>) -> String {
    match id {
        Some(id) => id.to_string(),
        None => "(none bound)".to_string(),
    }
}

pub type FormResult<T> = Result<T, FormError>;

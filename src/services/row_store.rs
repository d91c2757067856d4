use crate::error::FormResult;
use crate::forms_core::codec::{read_row_set, write_row_set};
use crate::model::{DataRecord, FormId, RowSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Per-form record storage. Writes are whole-file except `append`.
pub trait RowStore {
    fn record_exists(&self, form_id: FormId) -> FormResult<bool>;
    /// Header and rows; an empty set when nothing was stored yet.
    fn read_all(&self, form_id: FormId) -> FormResult<RowSet>;
    fn write_all(&mut self, form_id: FormId, header: &[String], rows: &[DataRecord]) -> FormResult<()>;
    /// Append one row. The header is written only when the file is created.
    fn append(&mut self, form_id: FormId, header: &[String], row: &DataRecord) -> FormResult<()>;
    /// Forms that have stored rows, ascending.
    fn form_ids(&self) -> FormResult<Vec<FormId>>;
}

const EXT: &str = "csv";

pub struct FileRowStore {
    data_dir: PathBuf,
}

impl FileRowStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn path_for(&self, form_id: FormId) -> PathBuf {
        self.data_dir.join(format!("{form_id}.{EXT}"))
    }

    fn ensure_dir(&self) -> FormResult<()> {
        fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}

/// Write a row set to an arbitrary CSV file, header first.
pub fn export_rows(path: &Path, set: &RowSet) -> FormResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, write_row_set(&set.header, &set.rows)?)?;
    Ok(())
}

impl RowStore for FileRowStore {
    fn record_exists(&self, form_id: FormId) -> FormResult<bool> {
        Ok(self.path_for(form_id).is_file())
    }

    fn read_all(&self, form_id: FormId) -> FormResult<RowSet> {
        let path = self.path_for(form_id);
        if !path.exists() {
            return Ok(RowSet::default());
        }
        let content = fs::read_to_string(&path)?;
        read_row_set(&content)
    }

    fn write_all(&mut self, form_id: FormId, header: &[String], rows: &[DataRecord]) -> FormResult<()> {
        self.ensure_dir()?;
        let path = self.path_for(form_id);
        let tmp = path.with_extension(format!("{EXT}.tmp"));
        fs::write(&tmp, write_row_set(header, rows)?)?;
        fs::rename(&tmp, &path)?;
        tracing::debug!(form_id, rows = rows.len(), "rewrote {}", path.display());
        Ok(())
    }

    fn append(&mut self, form_id: FormId, header: &[String], row: &DataRecord) -> FormResult<()> {
        self.ensure_dir()?;
        let path = self.path_for(form_id);
        let fresh = !path.exists();
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        let out = if fresh {
            write_row_set(header, std::slice::from_ref(row))?
        } else {
            row.to_line()?
        };
        file.write_all(out.as_bytes())?;
        tracing::debug!(form_id, fresh, "appended row to {}", path.display());
        Ok(())
    }

    fn form_ids(&self) -> FormResult<Vec<FormId>> {
        if !self.data_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.data_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXT) {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<FormId>().ok())
            {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }
}

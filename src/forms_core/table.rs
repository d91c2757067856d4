//! Tabular view over the stored rows of one form.

use crate::error::{FormError, FormResult};
use crate::forms_core::renderer::{self, FieldSlot};
use crate::model::{DataRecord, FormId, FormSchema, RowSet};
use crate::services::row_store::{export_rows, RowStore};
use crate::services::schema_store::SchemaStore;
use std::path::Path;

/// A row pulled out of the table for editing.
#[derive(Debug, Clone)]
pub struct RowEdit {
    pub index: usize,
    pub slots: Vec<FieldSlot>,
    pub warnings: Vec<FormError>,
    /// Slots were built from the value-shape heuristic, not the live schema.
    pub legacy: bool,
}

#[derive(Debug, Clone)]
pub struct RecordTable {
    pub form_id: FormId,
    pub header: Vec<String>,
    pub rows: Vec<DataRecord>,
    pub selected: Option<usize>,
    /// Live schema; `None` once the form was deleted but its rows remain.
    pub schema: Option<FormSchema>,
}

impl RecordTable {
    pub fn load(form_id: FormId, schemas: &dyn SchemaStore, rows: &dyn RowStore) -> FormResult<Self> {
        let stored = rows.read_all(form_id)?;
        let schema = match schemas.get_schema(form_id) {
            Ok(s) => Some(s),
            Err(FormError::SchemaNotFound(_)) => None,
            Err(e) => return Err(e),
        };
        // Rows stay paired with the header they were written under.
        let header = match &schema {
            Some(s) if stored.header.is_empty() => s.labels(),
            _ => stored.header,
        };
        let selected = if stored.rows.is_empty() { None } else { Some(0) };
        Ok(Self {
            form_id,
            header,
            rows: stored.rows,
            selected,
            schema,
        })
    }

    pub fn title(&self) -> String {
        match &self.schema {
            Some(s) => s.name.clone(),
            None => format!("#{} (form deleted)", self.form_id),
        }
    }

    fn check_index(&self, index: usize) -> FormResult<()> {
        if index >= self.rows.len() {
            return Err(FormError::IndexOutOfRange {
                index,
                len: self.rows.len(),
            });
        }
        Ok(())
    }

    pub fn select(&mut self, index: usize) -> FormResult<()> {
        self.check_index(index)?;
        self.selected = Some(index);
        Ok(())
    }

    pub fn move_selection(&mut self, delta: i32) {
        if self.rows.is_empty() {
            self.selected = None;
            return;
        }
        let last = self.rows.len() as i64 - 1;
        let cur = self.selected.map(|i| i as i64).unwrap_or(0);
        self.selected = Some((cur + delta as i64).clamp(0, last) as usize);
    }

    /// Remove one row. The new row set is written first; memory follows only
    /// when the write succeeded.
    pub fn delete(&mut self, index: usize, store: &mut dyn RowStore) -> FormResult<()> {
        self.check_index(index)?;
        let mut next = self.rows.clone();
        next.remove(index);
        store.write_all(self.form_id, &self.header, &next)?;
        self.rows = next;
        self.selected = match self.rows.len() {
            0 => None,
            n => Some(index.min(n - 1)),
        };
        tracing::info!(form_id = self.form_id, index, "deleted row");
        Ok(())
    }

    /// Decode one row for editing, with the live schema when the stored
    /// header still matches it column for column.
    pub fn begin_edit(&self, index: usize, schemas: &dyn SchemaStore) -> FormResult<RowEdit> {
        self.check_index(index)?;
        let record = &self.rows[index];
        let live = self
            .schema
            .as_ref()
            .filter(|s| s.fields.len() == record.values.len() && s.labels() == self.header);
        if let Some(schema) = live {
            match renderer::decode(schema, record, schemas) {
                Ok(m) => {
                    return Ok(RowEdit {
                        index,
                        slots: m.slots,
                        warnings: m.warnings,
                        legacy: false,
                    })
                }
                Err(e) => tracing::warn!(form_id = self.form_id, index, "live schema decode failed: {e}"),
            }
        }
        let guessed = renderer::legacy_schema_from_row(self.form_id, &self.header, record);
        let m = renderer::decode(&guessed, record, schemas)?;
        tracing::debug!(form_id = self.form_id, index, "row decoded with legacy heuristic");
        Ok(RowEdit {
            index,
            slots: m.slots,
            warnings: m.warnings,
            legacy: true,
        })
    }

    /// Re-encode an edited row and persist the whole set.
    pub fn commit_edit(&mut self, edit: &mut RowEdit, store: &mut dyn RowStore) -> FormResult<()> {
        self.check_index(edit.index)?;
        let record = renderer::encode(&mut edit.slots)?;
        let mut next = self.rows.clone();
        next[edit.index] = record;
        store.write_all(self.form_id, &self.header, &next)?;
        self.rows = next;
        self.selected = Some(edit.index);
        tracing::info!(form_id = self.form_id, index = edit.index, "updated row");
        Ok(())
    }

    pub fn as_row_set(&self) -> RowSet {
        RowSet {
            header: self.header.clone(),
            rows: self.rows.clone(),
        }
    }

    /// Suggested export file name, derived from the form name.
    pub fn export_file_name(&self) -> String {
        let stem: String = match &self.schema {
            Some(s) => s
                .name
                .trim()
                .chars()
                .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
                .collect(),
            None => String::new(),
        };
        if stem.trim_matches('_').is_empty() {
            format!("form-{}.csv", self.form_id)
        } else {
            format!("{stem}.csv")
        }
    }

    pub fn export(&self, path: &Path) -> FormResult<()> {
        export_rows(path, &self.as_row_set())?;
        tracing::info!(form_id = self.form_id, path = %path.display(), "exported rows");
        Ok(())
    }
}

/// Encode a freshly filled form and append it to the form's row file.
///
/// A file still carrying an older header is rewritten under the current
/// labels first, so the new row never lands under mismatched columns.
pub fn append_record(
    schema: &FormSchema,
    slots: &mut [FieldSlot],
    rows: &mut dyn RowStore,
) -> FormResult<DataRecord> {
    let record = renderer::encode(slots)?;
    let labels = schema.labels();
    let stored = rows.read_all(schema.form_id)?;
    if stored.header.is_empty() || stored.header == labels {
        rows.append(schema.form_id, &labels, &record)?;
    } else {
        tracing::warn!(
            form_id = schema.form_id,
            stored = ?stored.header,
            "row file header is stale, realigning by column name"
        );
        let sources = by_name(&stored.header, schema);
        let mut next: Vec<DataRecord> = stored.rows.iter().map(|r| remap(r, &sources)).collect();
        next.push(record.clone());
        rows.write_all(schema.form_id, &labels, &next)?;
    }
    tracing::info!(form_id = schema.form_id, "inserted row");
    Ok(record)
}

/// Realign a form's stored rows after its schema was edited.
///
/// Columns follow their field across reorders and renames (matched by
/// `field_id`), dropped fields lose their column and new fields start
/// empty. When the file header no longer matches `before`, columns are
/// matched by name instead. Returns whether the file was rewritten.
pub fn migrate_rows(
    before: &FormSchema,
    after: &FormSchema,
    rows: &mut dyn RowStore,
) -> FormResult<bool> {
    let stored = rows.read_all(after.form_id)?;
    if stored.header.is_empty() {
        return Ok(false);
    }
    let labels = after.labels();
    let sources: Vec<Option<usize>> = if stored.header == before.labels() {
        after
            .fields
            .iter()
            .map(|f| {
                let id = f.field_id?;
                before.fields.iter().position(|b| b.field_id == Some(id))
            })
            .collect()
    } else {
        by_name(&stored.header, after)
    };
    let identity = sources.len() == stored.header.len()
        && sources.iter().enumerate().all(|(i, s)| *s == Some(i));
    if identity && stored.header == labels {
        return Ok(false);
    }
    let next: Vec<DataRecord> = stored.rows.iter().map(|r| remap(r, &sources)).collect();
    rows.write_all(after.form_id, &labels, &next)?;
    tracing::info!(
        form_id = after.form_id,
        rows = next.len(),
        "migrated stored rows to edited form"
    );
    Ok(true)
}

fn by_name(header: &[String], schema: &FormSchema) -> Vec<Option<usize>> {
    schema
        .fields
        .iter()
        .map(|f| header.iter().position(|h| *h == f.name))
        .collect()
}

fn remap(record: &DataRecord, sources: &[Option<usize>]) -> DataRecord {
    DataRecord::new(sources.iter().map(|s| {
        s.and_then(|i| record.values.get(i))
            .cloned()
            .unwrap_or_default()
    }))
}

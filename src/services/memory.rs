//! In-memory stores for tests. Every mutating call bumps `writes`.

use crate::error::{FormError, FormResult};
use crate::forms_core::registry::FieldType;
use crate::model::{
    DataRecord, FieldDef, FormId, FormSchema, OptionSet, OptionSetId, OptionSetSummary, RowSet,
};
use crate::services::row_store::RowStore;
use crate::services::schema_store::SchemaStore;
use std::collections::BTreeMap;

#[derive(Default)]
pub struct MemorySchemaStore {
    forms: BTreeMap<FormId, FormSchema>,
    sets: BTreeMap<OptionSetId, (String, Vec<String>)>,
    next_id: i64,
    pub writes: usize,
    pub fail_add_options: bool,
}

impl MemorySchemaStore {
    fn next(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Create a populated option set without counting writes.
    pub fn seed_options(&mut self, name: &str, labels: &[&str]) -> OptionSetId {
        let id = self.next();
        self.sets.insert(
            id,
            (name.to_string(), labels.iter().map(|l| l.to_string()).collect()),
        );
        id
    }

    fn assign_ids(&mut self, fields: &[FieldDef]) -> Vec<FieldDef> {
        fields
            .iter()
            .map(|f| {
                let mut f = f.clone();
                if f.field_id.is_none() {
                    f.field_id = Some(self.next());
                }
                f
            })
            .collect()
    }
}

impl SchemaStore for MemorySchemaStore {
    fn create_schema(&mut self, name: &str, fields: &[FieldDef]) -> FormResult<FormId> {
        self.writes += 1;
        let form_id = self.next();
        let fields = self.assign_ids(fields);
        self.forms.insert(
            form_id,
            FormSchema {
                form_id,
                name: name.to_string(),
                fields,
            },
        );
        Ok(form_id)
    }

    fn schema_names(&self) -> FormResult<Vec<String>> {
        Ok(self.forms.values().map(|f| f.name.clone()).collect())
    }

    fn schemas(&self) -> FormResult<Vec<(FormId, String)>> {
        Ok(self.forms.values().map(|f| (f.form_id, f.name.clone())).collect())
    }

    fn get_schema(&self, form_id: FormId) -> FormResult<FormSchema> {
        self.forms
            .get(&form_id)
            .cloned()
            .ok_or(FormError::SchemaNotFound(form_id))
    }

    fn update_schema_name(&mut self, form_id: FormId, name: &str) -> FormResult<()> {
        self.writes += 1;
        let form = self
            .forms
            .get_mut(&form_id)
            .ok_or(FormError::SchemaNotFound(form_id))?;
        form.name = name.to_string();
        Ok(())
    }

    fn update_fields(&mut self, form_id: FormId, fields: &[FieldDef]) -> FormResult<()> {
        self.writes += 1;
        if !self.forms.contains_key(&form_id) {
            return Err(FormError::SchemaNotFound(form_id));
        }
        let fields = self.assign_ids(fields);
        if let Some(form) = self.forms.get_mut(&form_id) {
            form.fields = fields;
        }
        Ok(())
    }

    fn delete_schema(&mut self, form_id: FormId) -> FormResult<()> {
        self.writes += 1;
        self.forms
            .remove(&form_id)
            .map(|_| ())
            .ok_or(FormError::SchemaNotFound(form_id))
    }

    fn field_type_tags(&self) -> FormResult<Vec<String>> {
        Ok(FieldType::ALL.iter().map(|t| t.tag().to_string()).collect())
    }

    fn create_option_set(&mut self, name: &str) -> FormResult<OptionSetId> {
        self.writes += 1;
        let id = self.next();
        self.sets.insert(id, (name.to_string(), Vec::new()));
        Ok(id)
    }

    fn add_options(&mut self, option_set_id: OptionSetId, labels: &[String]) -> FormResult<()> {
        self.writes += 1;
        if self.fail_add_options {
            return Err(FormError::StoreUnavailable("disk full".into()));
        }
        let (_, existing) = self
            .sets
            .get_mut(&option_set_id)
            .ok_or(FormError::OptionSetNotFound(Some(option_set_id)))?;
        existing.extend(labels.iter().cloned());
        Ok(())
    }

    fn get_option_set(&self, option_set_id: OptionSetId) -> FormResult<OptionSet> {
        self.sets
            .get(&option_set_id)
            .map(|(name, labels)| OptionSet {
                option_set_id,
                display_name: name.clone(),
                labels: labels.clone(),
            })
            .ok_or(FormError::OptionSetNotFound(Some(option_set_id)))
    }

    fn option_sets(&self) -> FormResult<Vec<OptionSetSummary>> {
        Ok(self
            .sets
            .iter()
            .map(|(id, (name, _))| OptionSetSummary {
                option_set_id: *id,
                display_name: name.clone(),
            })
            .collect())
    }

    fn delete_option_set(&mut self, option_set_id: OptionSetId) -> FormResult<()> {
        self.writes += 1;
        self.sets
            .remove(&option_set_id)
            .map(|_| ())
            .ok_or(FormError::OptionSetNotFound(Some(option_set_id)))
    }
}

#[derive(Default)]
pub struct MemoryRowStore {
    files: BTreeMap<FormId, RowSet>,
    pub writes: usize,
    pub fail_writes: bool,
}

impl MemoryRowStore {
    fn check(&mut self) -> FormResult<()> {
        self.writes += 1;
        if self.fail_writes {
            return Err(FormError::StoreUnavailable("read-only file system".into()));
        }
        Ok(())
    }
}

impl RowStore for MemoryRowStore {
    fn record_exists(&self, form_id: FormId) -> FormResult<bool> {
        Ok(self.files.contains_key(&form_id))
    }

    fn read_all(&self, form_id: FormId) -> FormResult<RowSet> {
        Ok(self.files.get(&form_id).cloned().unwrap_or_default())
    }

    fn write_all(&mut self, form_id: FormId, header: &[String], rows: &[DataRecord]) -> FormResult<()> {
        self.check()?;
        self.files.insert(
            form_id,
            RowSet {
                header: header.to_vec(),
                rows: rows.to_vec(),
            },
        );
        Ok(())
    }

    fn append(&mut self, form_id: FormId, header: &[String], row: &DataRecord) -> FormResult<()> {
        self.check()?;
        let set = self.files.entry(form_id).or_insert_with(|| RowSet {
            header: header.to_vec(),
            rows: Vec::new(),
        });
        set.rows.push(row.clone());
        Ok(())
    }

    fn form_ids(&self) -> FormResult<Vec<FormId>> {
        Ok(self.files.keys().copied().collect())
    }
}

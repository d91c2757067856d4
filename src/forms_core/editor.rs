//! Form schema building and the option set creation flow.

use crate::error::{FormError, FormResult};
use crate::forms_core::registry::FieldType;
use crate::model::{FieldDef, FieldId, FormId, OptionSetId, OptionSetSummary};
use crate::services::schema_store::SchemaStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorPhase {
    Editing,
    Validating,
    Persisted { form_id: FormId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDir {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDraft {
    pub field_id: Option<FieldId>,
    pub name: String,
    pub field_type: FieldType,
    pub option_set_id: Option<OptionSetId>,
    pub marked: bool,
    pub invalid: bool,
}

impl FieldDraft {
    fn blank() -> Self {
        Self {
            field_id: None,
            name: String::new(),
            field_type: FieldType::Text,
            option_set_id: None,
            marked: false,
            invalid: false,
        }
    }

    fn from_def(def: FieldDef) -> Self {
        Self {
            field_id: def.field_id,
            name: def.name,
            field_type: def.field_type,
            option_set_id: def.option_set_id,
            marked: false,
            invalid: false,
        }
    }

    fn to_def(&self) -> FieldDef {
        FieldDef {
            field_id: self.field_id,
            name: self.name.trim().to_string(),
            field_type: self.field_type,
            option_set_id: match self.field_type {
                FieldType::MultiChoice => self.option_set_id,
                _ => None,
            },
        }
    }

    fn name_is_blank(&self) -> bool {
        self.name.trim().is_empty()
    }
}

/// Editing session over one form schema.
///
/// A session without `form_id` creates a new form on save; one loaded from
/// the store edits it in place.
#[derive(Debug, Clone)]
pub struct FormSchemaEditor {
    pub form_id: Option<FormId>,
    pub name: String,
    pub name_invalid: bool,
    pub fields: Vec<FieldDraft>,
    pub phase: EditorPhase,
    /// Sets available for multi-choice binding, in store order.
    pub option_sets: Vec<OptionSetSummary>,
}

impl FormSchemaEditor {
    pub fn new(option_sets: Vec<OptionSetSummary>) -> Self {
        Self {
            form_id: None,
            name: String::new(),
            name_invalid: false,
            fields: vec![FieldDraft::blank()],
            phase: EditorPhase::Editing,
            option_sets,
        }
    }

    pub fn load(form_id: FormId, store: &dyn SchemaStore) -> FormResult<Self> {
        let schema = store.get_schema(form_id)?;
        let mut fields: Vec<FieldDraft> = schema.fields.into_iter().map(FieldDraft::from_def).collect();
        if fields.is_empty() {
            fields.push(FieldDraft::blank());
        }
        Ok(Self {
            form_id: Some(form_id),
            name: schema.name,
            name_invalid: false,
            fields,
            phase: EditorPhase::Editing,
            option_sets: store.option_sets()?,
        })
    }

    pub fn is_edit_session(&self) -> bool {
        self.form_id.is_some()
    }

    fn check_index(&self, index: usize) -> FormResult<()> {
        if index >= self.fields.len() {
            return Err(FormError::IndexOutOfRange {
                index,
                len: self.fields.len(),
            });
        }
        Ok(())
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.name_invalid = false;
    }

    pub fn set_field_name(&mut self, index: usize, name: impl Into<String>) -> FormResult<()> {
        self.check_index(index)?;
        let f = &mut self.fields[index];
        f.name = name.into();
        f.invalid = false;
        Ok(())
    }

    /// Append a blank text field. Refused while the last field has no name.
    pub fn add_field(&mut self) -> FormResult<usize> {
        if let Some(last) = self.fields.last_mut() {
            if last.name_is_blank() {
                last.invalid = true;
                return Err(FormError::EmptyFieldName {
                    index: self.fields.len() - 1,
                });
            }
        }
        self.fields.push(FieldDraft::blank());
        Ok(self.fields.len() - 1)
    }

    pub fn toggle_mark(&mut self, index: usize) -> FormResult<()> {
        self.check_index(index)?;
        self.fields[index].marked = !self.fields[index].marked;
        Ok(())
    }

    pub fn mark_all(&mut self, marked: bool) {
        for f in &mut self.fields {
            f.marked = marked;
        }
    }

    pub fn marked_count(&self) -> usize {
        self.fields.iter().filter(|f| f.marked).count()
    }

    /// Drop every marked field. A session always keeps at least one field.
    pub fn remove_marked(&mut self) -> usize {
        let before = self.fields.len();
        self.fields.retain(|f| !f.marked);
        let removed = before - self.fields.len();
        if self.fields.is_empty() {
            self.fields.push(FieldDraft::blank());
        }
        removed
    }

    /// Swap with the neighbour. Returns the new index.
    pub fn move_field(&mut self, index: usize, dir: MoveDir) -> FormResult<usize> {
        self.check_index(index)?;
        let target = match dir {
            MoveDir::Up if index > 0 => index - 1,
            MoveDir::Down if index + 1 < self.fields.len() => index + 1,
            _ => return Ok(index),
        };
        self.fields.swap(index, target);
        Ok(target)
    }

    pub fn set_field_type(&mut self, index: usize, field_type: FieldType) -> FormResult<()> {
        self.check_index(index)?;
        let first_set = self.option_sets.first().map(|s| s.option_set_id);
        let f = &mut self.fields[index];
        f.field_type = field_type;
        f.option_set_id = match field_type {
            FieldType::MultiChoice => f.option_set_id.or(first_set),
            _ => None,
        };
        f.invalid = false;
        Ok(())
    }

    pub fn cycle_field_type(&mut self, index: usize, delta: i32) -> FormResult<()> {
        self.check_index(index)?;
        let next = self.fields[index].field_type.cycle(delta);
        self.set_field_type(index, next)
    }

    /// Pick the next or previous option set for a multi-choice field.
    pub fn cycle_option_set(&mut self, index: usize, delta: i32) -> FormResult<()> {
        self.check_index(index)?;
        if self.fields[index].field_type != FieldType::MultiChoice || self.option_sets.is_empty() {
            return Ok(());
        }
        let n = self.option_sets.len() as i32;
        let current = self.fields[index]
            .option_set_id
            .and_then(|id| self.option_sets.iter().position(|s| s.option_set_id == id));
        let next = match current {
            Some(i) => (i as i32 + delta).rem_euclid(n),
            None => 0,
        };
        self.fields[index].option_set_id = Some(self.option_sets[next as usize].option_set_id);
        Ok(())
    }

    pub fn option_set_name(&self, id: Option<OptionSetId>) -> Option<&str> {
        let id = id?;
        self.option_sets
            .iter()
            .find(|s| s.option_set_id == id)
            .map(|s| s.display_name.as_str())
    }

    fn validate(&mut self) -> FormResult<()> {
        self.name_invalid = self.name.trim().is_empty();
        let mut first_blank = None;
        let mut first_unbound = None;
        for (i, f) in self.fields.iter_mut().enumerate() {
            let blank = f.name_is_blank();
            let unbound = f.field_type == FieldType::MultiChoice && f.option_set_id.is_none();
            f.invalid = blank || unbound;
            if blank && first_blank.is_none() {
                first_blank = Some(i);
            }
            if unbound && first_unbound.is_none() {
                first_unbound = Some(i);
            }
        }
        if self.name_invalid {
            return Err(FormError::EmptySchemaName);
        }
        if let Some(index) = first_blank {
            return Err(FormError::EmptyFieldName { index });
        }
        if first_unbound.is_some() {
            return Err(FormError::OptionSetNotFound(None));
        }
        Ok(())
    }

    /// Validate, then write name and fields in one store call.
    ///
    /// Nothing reaches the store when validation fails. After a successful
    /// save a create session starts over and an edit session reloads.
    pub fn save(&mut self, store: &mut dyn SchemaStore) -> FormResult<FormId> {
        self.phase = EditorPhase::Validating;
        if let Err(e) = self.validate() {
            self.phase = EditorPhase::Editing;
            return Err(e);
        }
        let name = self.name.trim().to_string();
        let defs: Vec<FieldDef> = self.fields.iter().map(FieldDraft::to_def).collect();
        let result = match self.form_id {
            Some(id) => store.replace_schema(id, &name, &defs).map(|_| id),
            None => store.create_schema(&name, &defs),
        };
        let form_id = match result {
            Ok(id) => id,
            Err(e) => {
                self.phase = EditorPhase::Editing;
                return Err(e);
            }
        };
        tracing::info!(form_id, fields = defs.len(), "saved form '{name}'");
        if self.is_edit_session() {
            let option_sets = std::mem::take(&mut self.option_sets);
            match Self::load(form_id, &*store) {
                Ok(reloaded) => *self = reloaded,
                Err(e) => {
                    tracing::warn!(form_id, "reload after save failed: {e}");
                    self.option_sets = option_sets;
                }
            }
        } else {
            *self = Self::new(std::mem::take(&mut self.option_sets));
        }
        self.phase = EditorPhase::Persisted { form_id };
        Ok(form_id)
    }
}

/// Creation flow for a named, ordered list of choice labels.
#[derive(Debug, Clone, Default)]
pub struct OptionSetEditor {
    pub name: String,
    pub labels: Vec<String>,
    pub invalid: Option<usize>,
}

impl OptionSetEditor {
    pub fn new() -> Self {
        Self {
            name: String::new(),
            labels: vec![String::new()],
            invalid: None,
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_label(&mut self, index: usize, label: impl Into<String>) -> FormResult<()> {
        let len = self.labels.len();
        let slot = self
            .labels
            .get_mut(index)
            .ok_or(FormError::IndexOutOfRange { index, len })?;
        *slot = label.into();
        if self.invalid == Some(index) {
            self.invalid = None;
        }
        Ok(())
    }

    pub fn add_option(&mut self) -> FormResult<usize> {
        if let Some(last) = self.labels.last() {
            if last.trim().is_empty() {
                let index = self.labels.len() - 1;
                self.invalid = Some(index);
                return Err(FormError::EmptyOptionLabel { index });
            }
        }
        self.labels.push(String::new());
        Ok(self.labels.len() - 1)
    }

    pub fn remove_option(&mut self, index: usize) -> FormResult<()> {
        if index >= self.labels.len() {
            return Err(FormError::IndexOutOfRange {
                index,
                len: self.labels.len(),
            });
        }
        self.labels.remove(index);
        if self.labels.is_empty() {
            self.labels.push(String::new());
        }
        self.invalid = None;
        Ok(())
    }

    pub fn save(&mut self, store: &mut dyn SchemaStore) -> FormResult<OptionSetId> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(FormError::EmptyOptionSetName);
        }
        if let Some(index) = self.labels.iter().position(|l| l.trim().is_empty()) {
            self.invalid = Some(index);
            return Err(FormError::EmptyOptionLabel { index });
        }
        let labels: Vec<String> = self.labels.iter().map(|l| l.trim().to_string()).collect();
        let id = store.create_option_set(&name)?;
        if let Err(e) = store.add_options(id, &labels) {
            if let Err(cleanup) = store.delete_option_set(id) {
                tracing::warn!(option_set_id = id, "cleanup after failed insert: {cleanup}");
            }
            return Err(e);
        }
        tracing::info!(option_set_id = id, labels = labels.len(), "saved option set '{name}'");
        *self = Self::new();
        Ok(id)
    }
}

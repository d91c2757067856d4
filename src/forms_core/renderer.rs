//! Schema → slots → record, and back.
//!
//! A [`FieldSlot`] is the live editable state of one field: one [`SubSlot`]
//! per raw sub-input of the field's type. Slots are plain data; widgets
//! drive them through the editing methods and never inspect each other.

use crate::error::{FormError, FormResult};
use crate::forms_core::registry::{
    descriptor, format_amount, ChoiceSet, DisplayFormat, FieldType, FieldTypeDescriptor,
    InputFilter, SubInput, GROUP_DELIM, IBAN_COUNTRY,
};
use crate::model::{DataRecord, FieldDef, FieldId, FormId, FormSchema};
use crate::services::schema_store::SchemaStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubSlot {
    pub spec: SubInput,
    /// Current text. Amount inputs hold the grouped display form.
    pub value: String,
    /// Selectable labels for closed-choice inputs.
    pub choices: Option<Vec<String>>,
}

impl SubSlot {
    fn new(spec: SubInput, choices: Option<Vec<String>>) -> Self {
        let mut s = Self {
            spec,
            value: String::new(),
            choices,
        };
        s.reset();
        s
    }

    fn reset(&mut self) {
        self.value = match self.spec.filter {
            InputFilter::Fixed(v) => v.to_string(),
            InputFilter::Choice(set) => self
                .choices
                .as_ref()
                .and_then(|c| c.get(set.default_index()).cloned())
                .unwrap_or_default(),
            _ => String::new(),
        };
    }

    /// Position of the current value; first occurrence wins for duplicates.
    pub fn selected_index(&self) -> Option<usize> {
        self.choices
            .as_ref()
            .and_then(|c| c.iter().position(|x| *x == self.value))
    }

    pub fn is_required(&self) -> bool {
        !self.spec.filter.is_fixed()
    }

    pub fn is_blank(&self) -> bool {
        self.value.trim().is_empty()
    }

    fn char_len(&self) -> usize {
        self.value.chars().filter(|c| *c != ',').count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSlot {
    pub field_id: Option<FieldId>,
    pub name: String,
    pub field_type: FieldType,
    pub descriptor: FieldTypeDescriptor,
    pub parts: Vec<SubSlot>,
    /// Set when the backing option set is gone or empty.
    pub disabled: bool,
    pub error: Option<String>,
}

impl FieldSlot {
    pub fn new(field: &FieldDef, options: Option<Vec<String>>) -> Self {
        let d = descriptor(field.field_type);
        let parts = d
            .parts
            .iter()
            .map(|spec| {
                let choices = match spec.filter {
                    InputFilter::Choice(ChoiceSet::OptionSet) => options.clone(),
                    InputFilter::Choice(set) => set.static_choices(),
                    _ => None,
                };
                SubSlot::new(*spec, choices)
            })
            .collect();
        Self {
            field_id: field.field_id,
            name: field.name.clone(),
            field_type: field.field_type,
            descriptor: d,
            parts,
            disabled: false,
            error: None,
        }
    }

    fn disabled(field: &FieldDef) -> Self {
        let mut slot = Self::new(field, Some(Vec::new()));
        slot.disabled = true;
        slot
    }

    pub fn arity(&self) -> usize {
        self.parts.len()
    }

    pub fn values(&self) -> Vec<String> {
        self.parts.iter().map(|p| p.value.clone()).collect()
    }

    /// Stored value for this slot.
    pub fn encoded(&self) -> String {
        if self.disabled {
            return self.parts.first().map(|p| p.value.clone()).unwrap_or_default();
        }
        self.descriptor.encode(&self.values())
    }

    pub fn is_typed(&self, part: usize) -> bool {
        !self.disabled
            && self
                .parts
                .get(part)
                .map(|p| p.spec.filter.is_typed())
                .unwrap_or(false)
    }

    pub fn is_choice(&self, part: usize) -> bool {
        !self.disabled
            && matches!(
                self.parts.get(part).map(|p| p.spec.filter),
                Some(InputFilter::Choice(_))
            )
    }

    fn regroup(&mut self, part: usize) {
        if self.descriptor.display == DisplayFormat::Thousands {
            if let Some(p) = self.parts.get_mut(part) {
                p.value = format_amount(&p.value);
            }
        }
    }

    /// Type one character. Returns false when the filter or length rejects it.
    pub fn insert_char(&mut self, part: usize, ch: char) -> bool {
        if !self.is_typed(part) || !self.descriptor.accepts(part, ch) {
            return false;
        }
        let Some(p) = self.parts.get_mut(part) else {
            return false;
        };
        if let Some(max) = p.spec.max_len {
            if p.char_len() >= max {
                return false;
            }
        }
        p.value.push(ch);
        self.error = None;
        self.regroup(part);
        true
    }

    pub fn backspace(&mut self, part: usize) -> bool {
        if !self.is_typed(part) {
            return false;
        }
        let Some(p) = self.parts.get_mut(part) else {
            return false;
        };
        if p.value.pop().is_none() {
            return false;
        }
        self.regroup(part);
        true
    }

    /// Replace a typed sub-input, dropping rejected characters and
    /// truncating to the max length.
    pub fn set_text(&mut self, part: usize, text: &str) {
        if !self.is_typed(part) {
            return;
        }
        let d = self.descriptor;
        if let Some(p) = self.parts.get_mut(part) {
            let mut v: String = text.chars().filter(|c| d.accepts(part, *c)).collect();
            if let Some(max) = p.spec.max_len {
                v = v.chars().take(max).collect();
            }
            p.value = v;
        }
        self.error = None;
        self.regroup(part);
    }

    /// Step through a choice list, wrapping. An unselected input starts at
    /// the first (or last, going back) choice.
    pub fn cycle_choice(&mut self, part: usize, delta: i32) -> bool {
        if !self.is_choice(part) {
            return false;
        }
        let Some(p) = self.parts.get_mut(part) else {
            return false;
        };
        let Some(choices) = p.choices.as_ref().filter(|c| !c.is_empty()) else {
            return false;
        };
        let n = choices.len() as i32;
        let next = match p.selected_index() {
            Some(i) => (i as i32 + delta).rem_euclid(n),
            None if delta < 0 => n - 1,
            None => 0,
        };
        p.value = choices[next as usize].clone();
        self.error = None;
        true
    }

    /// Select by label. Unknown labels leave the input unselected.
    pub fn select_choice(&mut self, part: usize, label: &str) -> bool {
        let Some(p) = self.parts.get_mut(part) else {
            return false;
        };
        let known = p
            .choices
            .as_ref()
            .map(|c| c.iter().any(|x| x == label))
            .unwrap_or(false);
        p.value = if known { label.to_string() } else { String::new() };
        known
    }

    /// Back to the freshly materialized state.
    pub fn clear(&mut self) {
        for p in &mut self.parts {
            p.reset();
        }
        self.error = None;
    }

    pub fn missing_parts(&self) -> Vec<usize> {
        if self.disabled {
            return Vec::new();
        }
        self.parts
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_required() && p.is_blank())
            .map(|(i, _)| i)
            .collect()
    }

    /// Fill from a stored field value.
    fn fill(&mut self, value: &str) -> FormResult<()> {
        if self.disabled {
            if let Some(p) = self.parts.first_mut() {
                p.value = value.to_string();
            }
            return Ok(());
        }
        let decoded = self.descriptor.decode(&self.name, value)?;
        for (i, v) in decoded.into_iter().enumerate() {
            match self.parts.get(i).map(|p| p.spec.filter) {
                Some(InputFilter::Choice(_)) => {
                    self.select_choice(i, &v);
                }
                Some(_) => {
                    if let Some(p) = self.parts.get_mut(i) {
                        p.value = self.descriptor.display_value(&v);
                    }
                }
                None => {}
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Materialized {
    pub slots: Vec<FieldSlot>,
    /// Non-fatal problems, e.g. a multi-choice field whose option set is gone.
    pub warnings: Vec<FormError>,
}

/// One slot per field in schema order. Option-set lookups that fail leave
/// that field disabled and are reported in `warnings`.
pub fn materialize(schema: &FormSchema, store: &dyn SchemaStore) -> Materialized {
    let mut out = Materialized::default();
    for field in &schema.fields {
        if field.field_type != FieldType::MultiChoice {
            out.slots.push(FieldSlot::new(field, None));
            continue;
        }
        let lookup = match field.option_set_id {
            Some(id) => store.get_option_set(id),
            None => Err(FormError::OptionSetNotFound(None)),
        };
        match lookup {
            Ok(set) if !set.labels.is_empty() => {
                out.slots.push(FieldSlot::new(field, Some(set.labels)))
            }
            Ok(set) => {
                tracing::warn!(field = %field.name, set = %set.display_name, "option set is empty");
                out.slots.push(FieldSlot::disabled(field));
            }
            Err(e) => {
                tracing::warn!(field = %field.name, "option lookup failed: {e}");
                out.warnings.push(e);
                out.slots.push(FieldSlot::disabled(field));
            }
        }
    }
    out
}

/// Check every required sub-input. All offending slots are marked; the
/// first one is reported.
pub fn validate(slots: &mut [FieldSlot]) -> FormResult<()> {
    let mut first: Option<FormError> = None;
    for (index, slot) in slots.iter_mut().enumerate() {
        slot.error = None;
        let missing = slot.missing_parts();
        if let Some(&part) = missing.first() {
            slot.error = Some(if slot.arity() > 1 {
                format!("part {} of {} is required", part + 1, slot.arity())
            } else {
                "This field is required".to_string()
            });
            if first.is_none() {
                first = Some(FormError::EmptyFieldValue {
                    field: slot.name.clone(),
                    index,
                    part,
                });
            }
        }
    }
    match first {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

pub fn encode(slots: &mut [FieldSlot]) -> FormResult<DataRecord> {
    validate(slots)?;
    Ok(DataRecord {
        values: slots.iter().map(FieldSlot::encoded).collect(),
    })
}

/// Rebuild pre-filled slots for a stored record.
pub fn decode(
    schema: &FormSchema,
    record: &DataRecord,
    store: &dyn SchemaStore,
) -> FormResult<Materialized> {
    if record.values.len() != schema.fields.len() {
        return Err(FormError::AmbiguousDecode {
            field: schema.name.clone(),
            detail: format!(
                "record has {} values, form has {} fields",
                record.values.len(),
                schema.fields.len()
            ),
        });
    }
    let mut m = materialize(schema, store);
    for (slot, value) in m.slots.iter_mut().zip(&record.values) {
        slot.fill(value)?;
    }
    Ok(m)
}

/// Guess field types from the shape of stored values.
///
/// Unreliable fallback for rows whose live schema is missing or no longer
/// matches: 3 dash groups read as a date, 4 as a card number, 8 starting
/// with the IBAN country code as an IBAN, anything else as text. Free text
/// that happens to contain dashes is misclassified.
pub fn legacy_schema_from_row(form_id: FormId, header: &[String], record: &DataRecord) -> FormSchema {
    let fields = record
        .values
        .iter()
        .enumerate()
        .map(|(i, value)| {
            let name = header
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("Field {}", i + 1));
            let groups: Vec<&str> = value.split(GROUP_DELIM).collect();
            let field_type = match groups.len() {
                3 => FieldType::ShamsiDate,
                4 => FieldType::CardNumber,
                8 if groups[0] == IBAN_COUNTRY => FieldType::Iban,
                _ => FieldType::Text,
            };
            FieldDef::new(name, field_type)
        })
        .collect();
    FormSchema {
        form_id,
        name: format!("#{form_id}"),
        fields,
    }
}

use crate::error::{FormError, FormResult};
use crate::forms_core::registry::FieldType;
use crate::model::{FieldDef, FormId, FormSchema, OptionSet, OptionSetId, OptionSetSummary};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Transaction};
use std::path::Path;

/// Persistence for form schemas and option sets.
///
/// Reads take `&self`; writes take `&mut self` so implementations can run
/// them inside a single transaction.
pub trait SchemaStore {
    /// Create a form with its ordered fields, all or nothing.
    fn create_schema(&mut self, name: &str, fields: &[FieldDef]) -> FormResult<FormId>;
    fn schema_names(&self) -> FormResult<Vec<String>>;
    /// `(form_id, name)` pairs in creation order.
    fn schemas(&self) -> FormResult<Vec<(FormId, String)>>;
    fn get_schema(&self, form_id: FormId) -> FormResult<FormSchema>;
    fn update_schema_name(&mut self, form_id: FormId, name: &str) -> FormResult<()>;
    /// Replace the ordered field list. Fields with a known `field_id` are
    /// updated in place, new ones inserted, missing ones deleted.
    fn update_fields(&mut self, form_id: FormId, fields: &[FieldDef]) -> FormResult<()>;
    fn replace_schema(&mut self, form_id: FormId, name: &str, fields: &[FieldDef]) -> FormResult<()> {
        self.update_schema_name(form_id, name)?;
        self.update_fields(form_id, fields)
    }
    fn delete_schema(&mut self, form_id: FormId) -> FormResult<()>;
    fn field_type_tags(&self) -> FormResult<Vec<String>>;
    fn create_option_set(&mut self, name: &str) -> FormResult<OptionSetId>;
    fn add_options(&mut self, option_set_id: OptionSetId, labels: &[String]) -> FormResult<()>;
    /// Name and ordered labels of one set.
    fn get_option_set(&self, option_set_id: OptionSetId) -> FormResult<OptionSet>;
    fn get_options(&self, option_set_id: OptionSetId) -> FormResult<Vec<String>> {
        Ok(self.get_option_set(option_set_id)?.labels)
    }
    fn option_sets(&self) -> FormResult<Vec<OptionSetSummary>>;
    fn delete_option_set(&mut self, option_set_id: OptionSetId) -> FormResult<()>;
}

pub struct SqliteSchemaStore {
    conn: Connection,
}

impl SqliteSchemaStore {
    pub fn open(path: &Path) -> FormResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
        let conn = Connection::open_with_flags(path, flags)?;
        tracing::info!(path = %path.display(), "opened schema store");
        Self::init(conn)
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn open_in_memory() -> FormResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> FormResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let tx = conn.transaction()?;
        // option_set_id is a loose reference: a deleted set is reported when
        // the form is materialized instead of silently unbinding the field.
        tx.execute_batch(
            "CREATE TABLE IF NOT EXISTS types (
                tag TEXT PRIMARY KEY,
                label TEXT NOT NULL,
                position INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS forms (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS option_sets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS options (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                option_set_id INTEGER NOT NULL REFERENCES option_sets(id) ON DELETE CASCADE,
                position INTEGER NOT NULL,
                label TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS fields (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                form_id INTEGER NOT NULL REFERENCES forms(id) ON DELETE CASCADE,
                position INTEGER NOT NULL,
                name TEXT NOT NULL,
                type_tag TEXT NOT NULL REFERENCES types(tag),
                option_set_id INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_fields_form ON fields (form_id, position);
            CREATE INDEX IF NOT EXISTS idx_options_set ON options (option_set_id, position);",
        )?;
        for (pos, t) in FieldType::ALL.iter().enumerate() {
            tx.execute(
                "INSERT OR IGNORE INTO types (tag, label, position) VALUES (?1, ?2, ?3)",
                params![t.tag(), t.label(), pos as i64],
            )?;
        }
        tx.commit()?;
        Ok(Self { conn })
    }
}

fn ensure_form(tx: &Transaction<'_>, form_id: FormId) -> FormResult<()> {
    let found: Option<i64> = tx
        .query_row("SELECT id FROM forms WHERE id = ?1", params![form_id], |r| r.get(0))
        .optional()?;
    found.map(|_| ()).ok_or(FormError::SchemaNotFound(form_id))
}

fn write_fields(tx: &Transaction<'_>, form_id: FormId, fields: &[FieldDef]) -> FormResult<()> {
    let existing: Vec<i64> = {
        let mut stmt = tx.prepare("SELECT id FROM fields WHERE form_id = ?1")?;
        let rows = stmt.query_map(params![form_id], |r| r.get(0))?;
        rows.collect::<Result<_, _>>()?
    };
    let mut kept: Vec<i64> = Vec::with_capacity(fields.len());
    for (pos, f) in fields.iter().enumerate() {
        let option_set_id = match f.field_type {
            FieldType::MultiChoice => f.option_set_id,
            _ => None,
        };
        match f.field_id.filter(|id| existing.contains(id)) {
            Some(id) => {
                tx.execute(
                    "UPDATE fields SET position = ?1, name = ?2, type_tag = ?3, option_set_id = ?4
                     WHERE id = ?5",
                    params![pos as i64, f.name, f.field_type.tag(), option_set_id, id],
                )?;
                kept.push(id);
            }
            None => {
                tx.execute(
                    "INSERT INTO fields (form_id, position, name, type_tag, option_set_id)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![form_id, pos as i64, f.name, f.field_type.tag(), option_set_id],
                )?;
                kept.push(tx.last_insert_rowid());
            }
        }
    }
    for id in existing.into_iter().filter(|id| !kept.contains(id)) {
        tx.execute("DELETE FROM fields WHERE id = ?1", params![id])?;
    }
    Ok(())
}

impl SchemaStore for SqliteSchemaStore {
    fn create_schema(&mut self, name: &str, fields: &[FieldDef]) -> FormResult<FormId> {
        let tx = self.conn.transaction()?;
        tx.execute("INSERT INTO forms (name) VALUES (?1)", params![name])?;
        let form_id = tx.last_insert_rowid();
        write_fields(&tx, form_id, fields)?;
        tx.commit()?;
        tracing::debug!(form_id, fields = fields.len(), "created form '{name}'");
        Ok(form_id)
    }

    fn schema_names(&self) -> FormResult<Vec<String>> {
        Ok(self.schemas()?.into_iter().map(|(_, n)| n).collect())
    }

    fn schemas(&self) -> FormResult<Vec<(FormId, String)>> {
        let mut stmt = self.conn.prepare("SELECT id, name FROM forms ORDER BY id")?;
        let rows = stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    fn get_schema(&self, form_id: FormId) -> FormResult<FormSchema> {
        let name: String = self
            .conn
            .query_row("SELECT name FROM forms WHERE id = ?1", params![form_id], |r| r.get(0))
            .optional()?
            .ok_or(FormError::SchemaNotFound(form_id))?;
        let mut stmt = self.conn.prepare(
            "SELECT id, name, type_tag, option_set_id FROM fields
             WHERE form_id = ?1 ORDER BY position, id",
        )?;
        let raw: Vec<(i64, String, String, Option<i64>)> = stmt
            .query_map(params![form_id], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?))
            })?
            .collect::<Result<_, _>>()?;
        let mut fields = Vec::with_capacity(raw.len());
        for (id, fname, tag, option_set_id) in raw {
            fields.push(FieldDef {
                field_id: Some(id),
                name: fname,
                field_type: FieldType::from_tag(&tag)?,
                option_set_id,
            });
        }
        Ok(FormSchema {
            form_id,
            name,
            fields,
        })
    }

    fn update_schema_name(&mut self, form_id: FormId, name: &str) -> FormResult<()> {
        let n = self
            .conn
            .execute("UPDATE forms SET name = ?1 WHERE id = ?2", params![name, form_id])?;
        if n == 0 {
            return Err(FormError::SchemaNotFound(form_id));
        }
        Ok(())
    }

    fn update_fields(&mut self, form_id: FormId, fields: &[FieldDef]) -> FormResult<()> {
        let tx = self.conn.transaction()?;
        ensure_form(&tx, form_id)?;
        write_fields(&tx, form_id, fields)?;
        tx.commit()?;
        Ok(())
    }

    fn replace_schema(&mut self, form_id: FormId, name: &str, fields: &[FieldDef]) -> FormResult<()> {
        let tx = self.conn.transaction()?;
        ensure_form(&tx, form_id)?;
        tx.execute("UPDATE forms SET name = ?1 WHERE id = ?2", params![name, form_id])?;
        write_fields(&tx, form_id, fields)?;
        tx.commit()?;
        tracing::debug!(form_id, fields = fields.len(), "replaced form '{name}'");
        Ok(())
    }

    fn delete_schema(&mut self, form_id: FormId) -> FormResult<()> {
        let n = self
            .conn
            .execute("DELETE FROM forms WHERE id = ?1", params![form_id])?;
        if n == 0 {
            return Err(FormError::SchemaNotFound(form_id));
        }
        tracing::debug!(form_id, "deleted form");
        Ok(())
    }

    fn field_type_tags(&self) -> FormResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT tag FROM types ORDER BY position")?;
        let rows = stmt.query_map([], |r| r.get(0))?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    fn create_option_set(&mut self, name: &str) -> FormResult<OptionSetId> {
        self.conn
            .execute("INSERT INTO option_sets (name) VALUES (?1)", params![name])?;
        Ok(self.conn.last_insert_rowid())
    }

    fn add_options(&mut self, option_set_id: OptionSetId, labels: &[String]) -> FormResult<()> {
        let tx = self.conn.transaction()?;
        let start: Option<i64> = tx
            .query_row(
                "SELECT (SELECT COALESCE(MAX(position) + 1, 0) FROM options WHERE option_set_id = ?1)
                 FROM option_sets WHERE id = ?1",
                params![option_set_id],
                |r| r.get(0),
            )
            .optional()?;
        let start = start.ok_or(FormError::OptionSetNotFound(Some(option_set_id)))?;
        for (i, label) in labels.iter().enumerate() {
            tx.execute(
                "INSERT INTO options (option_set_id, position, label) VALUES (?1, ?2, ?3)",
                params![option_set_id, start + i as i64, label],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get_option_set(&self, option_set_id: OptionSetId) -> FormResult<OptionSet> {
        let display_name: String = self
            .conn
            .query_row(
                "SELECT name FROM option_sets WHERE id = ?1",
                params![option_set_id],
                |r| r.get(0),
            )
            .optional()?
            .ok_or(FormError::OptionSetNotFound(Some(option_set_id)))?;
        let mut stmt = self.conn.prepare(
            "SELECT label FROM options WHERE option_set_id = ?1 ORDER BY position, id",
        )?;
        let rows = stmt.query_map(params![option_set_id], |r| r.get(0))?;
        Ok(OptionSet {
            option_set_id,
            display_name,
            labels: rows.collect::<Result<_, _>>()?,
        })
    }

    fn option_sets(&self) -> FormResult<Vec<OptionSetSummary>> {
        let mut stmt = self.conn.prepare("SELECT id, name FROM option_sets ORDER BY id")?;
        let rows = stmt.query_map([], |r| {
            Ok(OptionSetSummary {
                option_set_id: r.get(0)?,
                display_name: r.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    fn delete_option_set(&mut self, option_set_id: OptionSetId) -> FormResult<()> {
        let n = self
            .conn
            .execute("DELETE FROM option_sets WHERE id = ?1", params![option_set_id])?;
        if n == 0 {
            return Err(FormError::OptionSetNotFound(Some(option_set_id)));
        }
        Ok(())
    }
}

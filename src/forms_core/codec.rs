//! Row-level encoding: RFC 4180 CSV, one header record then one record per row.
//!
//! Values containing `,`, `"` or line breaks are quoted by the writer, so a
//! multi-line detail value spans several physical lines inside quotes. The
//! intra-field `-` join of composite types is applied before this layer and
//! never collides with the CSV delimiter.

use crate::error::{FormError, FormResult};
use crate::model::{DataRecord, RowSet};

fn writer() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .flexible(true)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new())
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> FormResult<String> {
    let bytes = wtr
        .into_inner()
        .map_err(|e| FormError::StoreUnavailable(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| FormError::StoreUnavailable(e.to_string()))
}

fn reader(content: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes())
}

/// Encode records, each terminated by `\n`.
pub fn write_records<'a, I>(records: I) -> FormResult<String>
where
    I: IntoIterator<Item = &'a [String]>,
{
    let mut wtr = writer();
    for values in records {
        wtr.write_record(values)?;
    }
    finish(wtr)
}

/// Header plus rows, as stored in a row file.
pub fn write_row_set(header: &[String], rows: &[DataRecord]) -> FormResult<String> {
    write_records(std::iter::once(header).chain(rows.iter().map(|r| r.values.as_slice())))
}

/// Parse a whole row file. Empty input is an empty set.
pub fn read_row_set(content: &str) -> FormResult<RowSet> {
    let mut records = reader(content).into_records();
    let header = match records.next() {
        Some(rec) => rec?.iter().map(str::to_string).collect(),
        None => return Ok(RowSet::default()),
    };
    let mut rows = Vec::new();
    for rec in records {
        rows.push(DataRecord::new(rec?.iter()));
    }
    Ok(RowSet { header, rows })
}

impl DataRecord {
    pub fn to_line(&self) -> FormResult<String> {
        write_records([self.values.as_slice()])
    }

    pub fn from_line(line: &str) -> FormResult<Self> {
        let mut records = reader(line).into_records();
        match records.next() {
            Some(rec) => Ok(DataRecord::new(rec?.iter())),
            None => Ok(DataRecord::new([""])),
        }
    }
}

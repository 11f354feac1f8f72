//! CSV row edits, CSV-to-script conversion and CSV export
//!
//! A row-edit CSV has the header `ID,Name,<field>,<field>...` and one row per
//! record to add or overwrite. Cells left out of a short row keep their
//! current value. Exports use the same layout, so an exported param can be
//! edited and applied back.

use crate::diff::{diff_rows, RowDiff};
use crate::error::{Error, Result};
use crate::param::{FieldValue, Param, ParamBank};
use std::fs;
use std::path::Path;
use tracing::warn;

/// Counts from applying a row-edit CSV
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CsvApply {
    pub added: usize,
    pub updated: usize,
}

/// Upsert the rows of a CSV document into `param`
///
/// New rows start from the param's default row for their id. The param is
/// re-sorted by id when rows were added.
pub fn apply_csv_rows(param: &mut Param, content: &str, source: &Path) -> Result<CsvApply> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = csv_reader.headers().map_err(|e| Error::Csv {
        path: source.to_path_buf(),
        source: e,
    })?;

    if headers.len() < 2 {
        return Err(Error::CsvParse {
            path: source.to_path_buf(),
            message: "expected at least ID and Name columns".to_string(),
        });
    }

    // Columns after ID and Name map onto field indices
    let columns: Vec<usize> = headers
        .iter()
        .skip(2)
        .map(|name| {
            param.field_index(name.trim()).ok_or_else(|| Error::FieldNotFound {
                param: param.name.clone(),
                field: name.trim().to_string(),
            })
        })
        .collect::<Result<_>>()?;
    let width = columns.len() + 2;

    let mut result = CsvApply::default();
    for (row_idx, record) in csv_reader.records().enumerate() {
        let record = record.map_err(|e| Error::Csv {
            path: source.to_path_buf(),
            source: e,
        })?;

        let id_cell = record.get(0).unwrap_or("").trim();
        let id = id_cell.parse::<i32>().map_err(|_| Error::CsvParse {
            path: source.to_path_buf(),
            message: format!("row {} has non-integer ID '{}'", row_idx + 1, id_cell),
        })?;

        if record.len() > width {
            warn!(
                row = row_idx + 1,
                path = %source.display(),
                "row has more cells than columns, truncating"
            );
        }

        let mut row = match param.row(id) {
            Some(existing) => existing.clone(),
            None => param.default_row(id),
        };
        if let Some(name) = record.get(1) {
            row.name = name.to_string();
        }
        for (cell, &field_idx) in record.iter().skip(2).zip(&columns) {
            let Some(current) = row.values.get_mut(field_idx) else {
                continue;
            };
            let field = &param.fields[field_idx];
            *current = current
                .parse_like(field.display_type, cell)
                .ok_or_else(|| Error::InvalidValue {
                    field: field.name.clone(),
                    value: cell.to_string(),
                })?;
        }

        match param.row_mut(id) {
            Some(existing) => {
                *existing = row;
                result.updated += 1;
            }
            None => {
                param.rows.push(row);
                result.added += 1;
            }
        }
    }

    if result.added > 0 {
        param.sort_rows();
    }
    Ok(result)
}

/// Convert a row-edit CSV file into an edit script against `bank`
///
/// The target param is the longest param name the file stem starts with.
/// `bank` is not modified: the edits are applied to a copy and the copy is
/// diffed against the original.
pub fn csv_to_script<P: AsRef<Path>>(bank: &ParamBank, path: P) -> Result<(String, RowDiff)> {
    let path = path.as_ref();
    let (name, content) = read_row_edits(bank, path)?;
    let original = &bank.params[&name];

    let mut edited = original.clone();
    apply_csv_rows(&mut edited, &content, path)?;

    Ok((name.clone(), diff_rows(original, &edited, &name)))
}

/// Apply a row-edit CSV file to the param its file stem names
///
/// The param is only replaced once every row was applied.
pub fn apply_csv_file<P: AsRef<Path>>(
    bank: &mut ParamBank,
    path: P,
) -> Result<(String, CsvApply)> {
    let path = path.as_ref();
    let (name, content) = read_row_edits(bank, path)?;
    let param = bank
        .get_mut(&name)
        .ok_or_else(|| Error::ParamNotFound(name.clone()))?;

    let mut edited = param.clone();
    let applied = apply_csv_rows(&mut edited, &content, path)?;
    *param = edited;

    Ok((name, applied))
}

/// Render `param` as a row-edit CSV
pub fn export_csv(param: &Param) -> Result<Vec<u8>> {
    let write_err = |e: csv::Error| Error::CsvWrite {
        param: param.name.clone(),
        source: e,
    };

    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());

    let mut header = vec!["ID".to_string(), "Name".to_string()];
    header.extend(param.fields.iter().map(|f| f.name.clone()));
    writer.write_record(&header).map_err(write_err)?;

    for row in &param.rows {
        let mut record = vec![row.id.to_string(), row.name.clone()];
        record.extend(row.values.iter().map(FieldValue::canonical));
        writer.write_record(&record).map_err(write_err)?;
    }

    writer.into_inner().map_err(|e| Error::Io(e.into_error()))
}

/// Read a row-edit CSV and resolve the param its file stem names
fn read_row_edits(bank: &ParamBank, path: &Path) -> Result<(String, String)> {
    let content = fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::InvalidPath(path.to_path_buf()))?;

    let name = bank
        .resolve_prefix(stem)
        .ok_or_else(|| Error::ParamNotFound(stem.to_string()))?
        .to_string();
    Ok((name, content))
}

//! Generic column-shaping operations shared by every dataset pipeline.
//!
//! All three operations are pure: they return a new [`Table`] and leave the
//! input untouched. A drop or rename that references a column absent from the
//! input is an error, never a silent no-op — a missing column means the
//! upstream source schema changed and the run must stop.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{
    data::{self, Value},
    error::EtlError,
    table::Table,
};

/// One `old -> new` column rename.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rename {
    pub from: String,
    pub to: String,
}

pub fn drop_columns(table: &Table, names: &[String]) -> Result<Table> {
    let mut dropped = Vec::with_capacity(names.len());
    for name in names {
        dropped.push(table.column_position(name)?);
    }

    let kept: Vec<usize> = (0..table.column_count())
        .filter(|idx| !dropped.contains(idx))
        .collect();
    let columns = kept
        .iter()
        .map(|&idx| table.columns()[idx].clone())
        .collect();
    let rows = table
        .rows()
        .iter()
        .map(|row| kept.iter().map(|&idx| row[idx].clone()).collect())
        .collect();
    Ok(Table::with_rows(columns, rows))
}

/// Renames columns per `old -> new` pairs; unmapped columns pass through and
/// column order is preserved.
pub fn rename_columns(table: &Table, renames: &[Rename]) -> Result<Table> {
    let mut columns = table.columns().to_vec();
    for rename in renames {
        let idx = table.column_position(&rename.from)?;
        columns[idx] = rename.to.clone();
    }
    Ok(Table::with_rows(columns, table.rows().to_vec()))
}

/// Re-serializes every value of the listed date columns from `source_format`
/// to `target_format`. Nulls pass through; a non-conforming value fails the
/// run rather than coercing to null. Cells already parsed as dates are
/// re-serialized directly.
pub fn reformat_dates(
    table: &Table,
    names: &[String],
    source_format: &str,
    target_format: &str,
) -> Result<Table> {
    let mut positions = Vec::with_capacity(names.len());
    for name in names {
        positions.push((table.column_position(name)?, name.as_str()));
    }

    let mut rows = table.rows().to_vec();
    for row in &mut rows {
        for &(idx, name) in &positions {
            row[idx] = match row[idx].take() {
                None => None,
                Some(Value::Date(date)) => {
                    Some(Value::String(date.format(target_format).to_string()))
                }
                Some(Value::String(raw)) => {
                    let date = data::parse_date_with_format(&raw, source_format).map_err(|_| {
                        EtlError::DateParse {
                            column: name.to_string(),
                            value: raw.clone(),
                            format: source_format.to_string(),
                        }
                    })?;
                    Some(Value::String(date.format(target_format).to_string()))
                }
                Some(other) => {
                    return Err(EtlError::DateParse {
                        column: name.to_string(),
                        value: other.as_display(),
                        format: source_format.to_string(),
                    }
                    .into());
                }
            };
        }
    }
    Ok(Table::with_rows(table.columns().to_vec(), rows))
}

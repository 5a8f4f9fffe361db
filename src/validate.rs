//! Post-load validation.
//!
//! Re-reads every persisted table and asserts structural and data-quality
//! invariants: exact column count, exact ordered column names, canonical
//! date serialization, and zero nulls in required columns. The date
//! dimension is additionally rebuilt from the same configured range that
//! drove the load and compared cell for cell against the persisted copy.
//! Failures are collected as diagnostics, never repaired.

use std::{fs::File, path::Path};

use anyhow::{Context, Result};
use itertools::Itertools;
use log::{info, warn};
use serde::Serialize;

use crate::{
    calendar,
    config::PipelineConfig,
    data::{self, CANONICAL_DATE_FORMAT, Value},
    error::EtlError,
    store::Store,
    table::Table,
};

#[derive(Debug, Serialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

#[derive(Debug, Serialize)]
pub struct ValidationIssue {
    pub table: String,
    pub check: String,
    pub detail: String,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("Creating report file {path:?}"))?;
        serde_json::to_writer_pretty(file, self).context("Writing validation report JSON")
    }
}

/// Structural and quality expectations for one persisted table.
pub struct TableExpectation {
    pub table: String,
    pub columns: Vec<String>,
    pub date_columns: Vec<String>,
    pub not_null: Vec<String>,
}

const COVID_COLUMNS: [&str; 9] = [
    "Date",
    "Cases_LA",
    "Deaths_LA",
    "Cases_California",
    "Deaths_California",
    "New_Cases_LA",
    "New_Deaths_LA",
    "New_Cases_California",
    "New_Deaths_California",
];

const CRIME_COLUMNS: [&str; 17] = [
    "DR_NO",
    "Date_Reported",
    "Date_Occured",
    "AREA",
    "AREA NAME",
    "Crime_Code",
    "Crime_Code_Description",
    "Victim_Age",
    "Victim_Sex",
    "Victim_Descent",
    "Weapon_Code",
    "Weapon_Description",
    "Location",
    "Cross_Street",
    "Latitute",
    "Longitude",
    "Victim_Descent_Desc",
];

fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

/// Built-in expectation for a dataset name, if one ships with the binary.
pub fn builtin_expectation(name: &str, target_table: &str) -> Option<TableExpectation> {
    match name {
        "covid" => Some(TableExpectation {
            table: target_table.to_string(),
            columns: strings(&COVID_COLUMNS),
            date_columns: strings(&["Date"]),
            not_null: strings(&["Date"]),
        }),
        "crime" => Some(TableExpectation {
            table: target_table.to_string(),
            columns: strings(&CRIME_COLUMNS),
            date_columns: strings(&["Date_Reported", "Date_Occured"]),
            not_null: strings(&[
                "Date_Reported",
                "Date_Occured",
                "Weapon_Code",
                "Cross_Street",
            ]),
        }),
        _ => None,
    }
}

fn calendar_expectation(target_table: &str) -> TableExpectation {
    TableExpectation {
        table: target_table.to_string(),
        columns: calendar::DATE_DIMENSION_COLUMNS
            .iter()
            .map(|n| n.to_string())
            .collect(),
        date_columns: strings(&["Date"]),
        not_null: strings(&["Date"]),
    }
}

pub fn validate(store: &Store, config: &PipelineConfig) -> Result<ValidationReport> {
    let mut report = ValidationReport { issues: Vec::new() };

    for dataset in &config.datasets {
        let Some(expectation) = builtin_expectation(&dataset.name, &dataset.target_table) else {
            warn!(
                "No built-in expectation for dataset '{}'; skipping its checks",
                dataset.name
            );
            continue;
        };
        check_persisted_table(store, &expectation, &mut report);
    }

    let date_table = &config.date_table;
    let expectation = calendar_expectation(&date_table.target_table);
    check_persisted_table(store, &expectation, &mut report);

    // Round-trip determinism: rebuild the dimension from the same range the
    // load used and demand cell-for-cell equality.
    let rebuilt = calendar::build_date_dimension(date_table.start, date_table.end)
        .context("Rebuilding the date dimension for comparison")?;
    match store.read_table(&date_table.target_table) {
        Ok(persisted) => {
            if let Some(difference) = first_difference(&rebuilt, &persisted) {
                report.issues.push(ValidationIssue {
                    table: date_table.target_table.clone(),
                    check: "date_dimension_roundtrip".to_string(),
                    detail: difference,
                });
            }
        }
        Err(err) => report.issues.push(ValidationIssue {
            table: date_table.target_table.clone(),
            check: "read".to_string(),
            detail: format!("{err:#}"),
        }),
    }

    if report.passed() {
        info!("Validation passed for {} table(s)", config.datasets.len() + 1);
    } else {
        for issue in &report.issues {
            warn!(
                "Validation issue: table '{}', check '{}': {}",
                issue.table, issue.check, issue.detail
            );
        }
    }
    Ok(report)
}

fn check_persisted_table(
    store: &Store,
    expectation: &TableExpectation,
    report: &mut ValidationReport,
) {
    let table = match store.read_table(&expectation.table) {
        Ok(table) => table,
        Err(err) => {
            report.issues.push(ValidationIssue {
                table: expectation.table.clone(),
                check: "read".to_string(),
                detail: format!("{err:#}"),
            });
            return;
        }
    };
    check_table(&table, expectation, report);
}

/// Runs every structural and quality check against an in-memory copy of a
/// persisted table, appending one issue per failed check.
pub fn check_table(
    table: &Table,
    expectation: &TableExpectation,
    report: &mut ValidationReport,
) {
    let mut issue = |check: &str, detail: String| {
        report.issues.push(ValidationIssue {
            table: expectation.table.clone(),
            check: check.to_string(),
            detail,
        });
    };

    if table.column_count() != expectation.columns.len() {
        issue(
            "column_count",
            format!(
                "Expected {} column(s), found {}",
                expectation.columns.len(),
                table.column_count()
            ),
        );
    }

    for (idx, (expected, actual)) in expectation
        .columns
        .iter()
        .zip(table.columns())
        .enumerate()
    {
        if expected != actual {
            issue(
                "column_names",
                format!("Column {}: expected '{expected}', found '{actual}'", idx + 1),
            );
        }
    }

    for name in &expectation.date_columns {
        let Some(idx) = table.column_index(name) else {
            // Already reported by the column checks above.
            continue;
        };
        for (row, cell) in table.column_values(idx).enumerate() {
            let conforms = match cell {
                None => true,
                Some(Value::String(raw)) => {
                    data::parse_date_with_format(raw, CANONICAL_DATE_FORMAT).is_ok()
                }
                Some(_) => false,
            };
            if !conforms {
                let parse_error = EtlError::DateParse {
                    column: name.clone(),
                    value: cell.as_ref().map(|v| v.as_display()).unwrap_or_default(),
                    format: CANONICAL_DATE_FORMAT.to_string(),
                };
                issue("date_format", format!("{parse_error} (row {})", row + 1));
                break;
            }
        }
    }

    for name in &expectation.not_null {
        let Some(idx) = table.column_index(name) else {
            continue;
        };
        let nulls = table.column_values(idx).filter(|cell| cell.is_none()).count();
        if nulls > 0 {
            issue(
                "not_null",
                EtlError::NullConstraint {
                    table: expectation.table.clone(),
                    column: name.clone(),
                    count: nulls,
                }
                .to_string(),
            );
        }
    }
}

/// First cell-level difference between two tables, if any.
fn first_difference(expected: &Table, actual: &Table) -> Option<String> {
    if expected.columns() != actual.columns() {
        return Some(format!(
            "Column names differ: expected [{}], found [{}]",
            expected.columns().iter().join(", "),
            actual.columns().iter().join(", ")
        ));
    }
    if expected.row_count() != actual.row_count() {
        return Some(format!(
            "Row counts differ: expected {}, found {}",
            expected.row_count(),
            actual.row_count()
        ));
    }
    for (row_idx, (left, right)) in expected.rows().iter().zip(actual.rows()).enumerate() {
        for (col_idx, (a, b)) in left.iter().zip(right).enumerate() {
            if a != b {
                let display = |cell: &Option<Value>| {
                    cell.as_ref()
                        .map(|v| v.as_display())
                        .unwrap_or_else(|| "<null>".to_string())
                };
                return Some(format!(
                    "Row {}, column '{}': expected '{}', found '{}'",
                    row_idx + 1,
                    expected.columns()[col_idx],
                    display(a),
                    display(b)
                ));
            }
        }
    }
    None
}

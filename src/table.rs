//! In-memory tabular data: an ordered set of named columns and typed rows.
//!
//! Tables are never mutated in place by the shaping layer; every transform
//! step produces a new [`Table`], so a failed step leaves its input intact.

use itertools::Itertools;

use crate::{data::Value, error::EtlError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Option<Value>>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn with_rows(columns: Vec<String>, rows: Vec<Vec<Option<Value>>>) -> Self {
        debug_assert!(rows.iter().all(|row| row.len() == columns.len()));
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Option<Value>>] {
        &self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn push_row(&mut self, row: Vec<Option<Value>>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Like [`Table::column_index`], but a missing column is a schema error
    /// that names what *is* available.
    pub fn column_position(&self, name: &str) -> Result<usize, EtlError> {
        self.column_index(name).ok_or_else(|| EtlError::SchemaMismatch {
            column: name.to_string(),
            available: self.columns.iter().join(", "),
        })
    }

    /// Values of one column, in row order.
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &Option<Value>> {
        self.rows.iter().map(move |row| &row[index])
    }
}

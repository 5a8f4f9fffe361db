//! SQLite store collaborator.
//!
//! One connection per pipeline run, opened once and used sequentially.
//! Loads are full-replace: drop and recreate, never append, so a rerun
//! leaves no residue from the previous run. Column types are defined solely
//! by the in-memory table's values at write time.

use std::path::Path;

use anyhow::{Context, Result};
use itertools::Itertools;
use log::debug;
use rusqlite::{Connection, types::ValueRef};

use crate::{data::Value, error::EtlError, table::Table};

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Opening SQLite database {path:?}"))?;
        Ok(Self { conn })
    }

    /// Persists `table` under `name`, replacing any prior table of that name.
    /// The whole write is one transaction: either the new table lands in full
    /// or the old one survives untouched.
    pub fn replace_table(&mut self, table: &Table, name: &str) -> Result<()> {
        let columns_sql = table
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                format!("{} {}", quote_identifier(column), column_sql_type(table, idx))
            })
            .join(", ");

        let tx = self
            .conn
            .transaction()
            .map_err(|err| store_write(name, err))?;
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {ident}; CREATE TABLE {ident} ({columns_sql});",
            ident = quote_identifier(name)
        ))
        .map_err(|err| store_write(name, err))?;
        {
            let placeholders = (1..=table.column_count()).map(|i| format!("?{i}")).join(", ");
            let mut insert = tx
                .prepare(&format!(
                    "INSERT INTO {} VALUES ({placeholders})",
                    quote_identifier(name)
                ))
                .map_err(|err| store_write(name, err))?;
            for row in table.rows() {
                insert
                    .execute(rusqlite::params_from_iter(row.iter().map(sql_value)))
                    .map_err(|err| store_write(name, err))?;
            }
        }
        tx.commit().map_err(|err| store_write(name, err))?;
        debug!("Replaced table '{name}' with {} row(s)", table.row_count());
        Ok(())
    }

    /// Reads a whole persisted table back, preserving column order.
    pub fn read_table(&self, name: &str) -> Result<Table> {
        self.query(&format!("SELECT * FROM {}", quote_identifier(name)))
    }

    /// Runs an arbitrary `SELECT` and materializes the result.
    pub fn query(&self, sql: &str) -> Result<Table> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .with_context(|| format!("Preparing query '{sql}'"))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let column_count = columns.len();
        let mut table = Table::new(columns);
        let mut rows = stmt.query([]).with_context(|| format!("Running query '{sql}'"))?;
        while let Some(row) = rows.next().context("Reading query results")? {
            let mut cells = Vec::with_capacity(column_count);
            for idx in 0..column_count {
                let cell = match row.get_ref(idx).context("Reading query cell")? {
                    ValueRef::Null => None,
                    ValueRef::Integer(i) => Some(Value::Integer(i)),
                    ValueRef::Real(f) => Some(Value::Float(f)),
                    ValueRef::Text(bytes) => Some(Value::String(
                        String::from_utf8(bytes.to_vec()).context("Decoding text cell")?,
                    )),
                    ValueRef::Blob(_) => {
                        anyhow::bail!("Query '{sql}' returned a BLOB cell; tables hold only text and numbers")
                    }
                };
                cells.push(cell);
            }
            table.push_row(cells);
        }
        Ok(table)
    }

    /// Releases the connection. Dropping a `Store` also releases it, so
    /// error paths cannot leak the handle; this just surfaces close errors.
    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, err)| err)
            .context("Closing SQLite database")
    }
}

fn store_write(table: &str, source: rusqlite::Error) -> EtlError {
    EtlError::StoreWrite {
        table: table.to_string(),
        source,
    }
}

fn sql_value(cell: &Option<Value>) -> rusqlite::types::Value {
    match cell {
        None => rusqlite::types::Value::Null,
        Some(Value::Integer(i)) => rusqlite::types::Value::Integer(*i),
        Some(Value::Float(f)) => rusqlite::types::Value::Real(*f),
        Some(Value::String(s)) => rusqlite::types::Value::Text(s.clone()),
        Some(Value::Date(d)) => rusqlite::types::Value::Text(Value::Date(*d).as_display()),
    }
}

/// Column affinity from the values present at write time: all-integer
/// columns get INTEGER, numeric columns with any float get REAL, everything
/// else (including all-null) gets TEXT.
fn column_sql_type(table: &Table, idx: usize) -> &'static str {
    let mut saw_integer = false;
    let mut saw_float = false;
    for cell in table.column_values(idx) {
        match cell {
            None => {}
            Some(Value::Integer(_)) => saw_integer = true,
            Some(Value::Float(_)) => saw_float = true,
            Some(Value::String(_)) | Some(Value::Date(_)) => return "TEXT",
        }
    }
    if saw_float {
        "REAL"
    } else if saw_integer {
        "INTEGER"
    } else {
        "TEXT"
    }
}

/// Table and column names here include spaces and hyphens (`AREA NAME`,
/// `Month-Year`), so every identifier is double-quoted.
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::with_rows(
            vec![
                "id".to_string(),
                "AREA NAME".to_string(),
                "ratio".to_string(),
            ],
            vec![
                vec![
                    Some(Value::Integer(1)),
                    Some(Value::String("Central".into())),
                    Some(Value::Float(0.5)),
                ],
                vec![Some(Value::Integer(2)), None, None],
            ],
        )
    }

    #[test]
    fn replace_and_read_back_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::open(&dir.path().join("t.db")).unwrap();
        let table = sample();
        store.replace_table(&table, "incidents").unwrap();
        let read = store.read_table("incidents").unwrap();
        assert_eq!(read, table);
        store.close().unwrap();
    }

    #[test]
    fn replace_drops_prior_contents() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::open(&dir.path().join("t.db")).unwrap();
        store.replace_table(&sample(), "incidents").unwrap();

        let smaller = Table::with_rows(
            vec!["only".to_string()],
            vec![vec![Some(Value::String("row".into()))]],
        );
        store.replace_table(&smaller, "incidents").unwrap();
        let read = store.read_table("incidents").unwrap();
        assert_eq!(read.columns(), &["only".to_string()]);
        assert_eq!(read.row_count(), 1);
        store.close().unwrap();
    }

    #[test]
    fn quoted_identifiers_accept_spaces_and_hyphens() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::open(&dir.path().join("t.db")).unwrap();
        let table = Table::with_rows(
            vec!["Month-Year".to_string(), "AREA NAME".to_string()],
            vec![vec![
                Some(Value::String("January-2020".into())),
                Some(Value::String("Central".into())),
            ]],
        );
        store.replace_table(&table, "Calender_data").unwrap();
        let read = store.read_table("Calender_data").unwrap();
        assert_eq!(
            read.columns(),
            &["Month-Year".to_string(), "AREA NAME".to_string()]
        );
        store.close().unwrap();
    }

    #[test]
    fn dates_persist_as_canonical_text() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::open(&dir.path().join("t.db")).unwrap();
        let day = chrono::NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
        let table = Table::with_rows(
            vec!["Date".to_string()],
            vec![vec![Some(Value::Date(day))]],
        );
        store.replace_table(&table, "dates").unwrap();
        let read = store.read_table("dates").unwrap();
        assert_eq!(read.rows()[0][0], Some(Value::String("2020-01-02".into())));
        store.close().unwrap();
    }
}

//! Synthetic calendar (date dimension) generation.
//!
//! One row per day over an inclusive range, with derived reporting
//! attributes. The weekday index follows chrono's Monday-first convention
//! (0 = Monday).

use anyhow::{Result, bail};
use chrono::{Datelike, NaiveDate};

use crate::{
    data::{CANONICAL_DATE_FORMAT, Value},
    shape,
    table::Table,
};

/// Column order of the persisted date dimension.
pub const DATE_DIMENSION_COLUMNS: [&str; 10] = [
    "Date",
    "Day",
    "Month",
    "Year",
    "Month_Name",
    "Weekday",
    "Weekday_Name",
    "Quarter",
    "Month-Year",
    "Year-Quarter",
];

/// Builds the date dimension for `[start, end]` inclusive, in ascending
/// order. The `Date` column goes through the same canonicalization step as
/// any other date column, so the builder and the dataset pipelines cannot
/// drift apart on serialization.
pub fn build_date_dimension(start: NaiveDate, end: NaiveDate) -> Result<Table> {
    if start > end {
        bail!("Date range start {start} is after end {end}");
    }

    let columns = DATE_DIMENSION_COLUMNS
        .iter()
        .map(|name| name.to_string())
        .collect();
    let mut table = Table::new(columns);

    let mut day = start;
    loop {
        table.push_row(dimension_row(day));
        if day == end {
            break;
        }
        day = day
            .succ_opt()
            .unwrap_or_else(|| unreachable!("date range bounded by {end}"));
    }

    shape::reformat_dates(
        &table,
        &["Date".to_string()],
        CANONICAL_DATE_FORMAT,
        CANONICAL_DATE_FORMAT,
    )
}

fn dimension_row(day: NaiveDate) -> Vec<Option<Value>> {
    let month_name = day.format("%B").to_string();
    let year = i64::from(day.year());
    let quarter = i64::from((day.month() - 1) / 3 + 1);
    vec![
        Some(Value::Date(day)),
        Some(Value::String(day.format("%d").to_string())),
        Some(Value::String(day.format("%m").to_string())),
        Some(Value::Integer(year)),
        Some(Value::String(month_name.clone())),
        Some(Value::Integer(i64::from(
            day.weekday().num_days_from_monday(),
        ))),
        Some(Value::String(day.format("%A").to_string())),
        Some(Value::Integer(quarter)),
        Some(Value::String(format!("{month_name}-{year}"))),
        Some(Value::String(format!("{year}-Q{quarter}"))),
    ]
}

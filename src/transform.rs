//! Declarative dataset pipelines.
//!
//! A [`Recipe`] is pure configuration: drop-list, rename-map, date columns,
//! and a list of small cleaning [`Rule`]s, executed by one generic runner.
//! Adding a dataset means writing a new recipe (inline in the pipeline YAML
//! or as a built-in), not new control flow. The built-in covid and crime
//! recipes reproduce the shapes of the two LA open-data feeds.

use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::{
    data::{CANONICAL_DATE_FORMAT, Value},
    shape::{self, Rename},
    table::Table,
};

/// Source serialization of civic date columns (12-hour clock with AM/PM).
pub const CIVIC_DATE_FORMAT: &str = "%m/%d/%Y %I:%M:%S %p";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(default)]
    pub drops: Vec<String>,
    #[serde(default)]
    pub renames: Vec<Rename>,
    #[serde(default)]
    pub date_columns: Vec<String>,
    #[serde(default = "default_date_source_format")]
    pub date_source_format: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

fn default_date_source_format() -> String {
    CIVIC_DATE_FORMAT.to_string()
}

/// Dataset-specific cleaning rules, applied after drop/rename/date shaping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rule {
    /// Replace negative numeric entries with their absolute value.
    AbsNumeric { columns: Vec<String> },
    /// Replace nulls with a literal sentinel.
    FillNull { column: String, value: Value },
    /// Narrow a numeric column to integers (floats truncate).
    CastInteger { column: String },
    /// Translate short codes to labels via a closed dictionary.
    MapCodes {
        column: String,
        codes: BTreeMap<String, String>,
        #[serde(default)]
        target: MapTarget,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapTarget {
    /// Rewrite mapped codes in place; unmapped codes pass through unchanged.
    #[default]
    InPlace,
    /// Append a derived label column; unmapped or null codes get a null label.
    NewColumn(String),
}

/// Runs a recipe start to finish: drops, renames, date canonicalization,
/// then each rule in declaration order. Every step returns a fresh table.
pub fn apply_recipe(table: &Table, recipe: &Recipe) -> Result<Table> {
    let mut table = shape::drop_columns(table, &recipe.drops)?;
    table = shape::rename_columns(&table, &recipe.renames)?;
    table = shape::reformat_dates(
        &table,
        &recipe.date_columns,
        &recipe.date_source_format,
        CANONICAL_DATE_FORMAT,
    )?;
    for rule in &recipe.rules {
        table = apply_rule(&table, rule)?;
    }
    Ok(table)
}

fn apply_rule(table: &Table, rule: &Rule) -> Result<Table> {
    match rule {
        Rule::AbsNumeric { columns } => {
            let mut positions = Vec::with_capacity(columns.len());
            for name in columns {
                positions.push((table.column_position(name)?, name.as_str()));
            }
            let mut rows = table.rows().to_vec();
            for row in &mut rows {
                for &(idx, name) in &positions {
                    row[idx] = match row[idx].take() {
                        None => None,
                        Some(Value::Integer(i)) => Some(Value::Integer(i.abs())),
                        Some(Value::Float(f)) => Some(Value::Float(f.abs())),
                        Some(other) => {
                            return Err(anyhow!(
                                "Column '{name}': expected a numeric value, found '{other}'"
                            ));
                        }
                    };
                }
            }
            Ok(Table::with_rows(table.columns().to_vec(), rows))
        }
        Rule::FillNull { column, value } => {
            let idx = table.column_position(column)?;
            let mut rows = table.rows().to_vec();
            for row in &mut rows {
                if row[idx].is_none() {
                    row[idx] = Some(value.clone());
                }
            }
            Ok(Table::with_rows(table.columns().to_vec(), rows))
        }
        Rule::CastInteger { column } => {
            let idx = table.column_position(column)?;
            let mut rows = table.rows().to_vec();
            for row in &mut rows {
                row[idx] = match row[idx].take() {
                    None => None,
                    Some(Value::Integer(i)) => Some(Value::Integer(i)),
                    Some(Value::Float(f)) => Some(Value::Integer(f as i64)),
                    Some(Value::String(s)) => {
                        let parsed = s
                            .parse::<i64>()
                            .or_else(|_| s.parse::<f64>().map(|f| f as i64))
                            .with_context(|| {
                                format!("Column '{column}': cannot cast '{s}' to integer")
                            })?;
                        Some(Value::Integer(parsed))
                    }
                    Some(other) => {
                        return Err(anyhow!(
                            "Column '{column}': cannot cast '{other}' to integer"
                        ));
                    }
                };
            }
            Ok(Table::with_rows(table.columns().to_vec(), rows))
        }
        Rule::MapCodes {
            column,
            codes,
            target,
        } => {
            let idx = table.column_position(column)?;
            match target {
                MapTarget::InPlace => {
                    let mut rows = table.rows().to_vec();
                    for row in &mut rows {
                        if let Some(Value::String(code)) = &row[idx]
                            && let Some(label) = codes.get(code)
                        {
                            row[idx] = Some(Value::String(label.clone()));
                        }
                    }
                    Ok(Table::with_rows(table.columns().to_vec(), rows))
                }
                MapTarget::NewColumn(name) => {
                    let mut columns = table.columns().to_vec();
                    columns.push(name.clone());
                    let rows = table
                        .rows()
                        .iter()
                        .map(|row| {
                            let label = match &row[idx] {
                                Some(Value::String(code)) => {
                                    codes.get(code).map(|l| Value::String(l.clone()))
                                }
                                _ => None,
                            };
                            let mut out = row.clone();
                            out.push(label);
                            out
                        })
                        .collect();
                    Ok(Table::with_rows(columns, rows))
                }
            }
        }
    }
}

/// Built-in recipe for a dataset name, if one ships with the binary.
pub fn builtin_recipe(name: &str) -> Option<Recipe> {
    match name {
        "covid" => Some(covid_recipe()),
        "crime" => Some(crime_recipe()),
        _ => None,
    }
}

fn renames(pairs: &[(&str, &str)]) -> Vec<Rename> {
    pairs
        .iter()
        .map(|(from, to)| Rename {
            from: from.to_string(),
            to: to.to_string(),
        })
        .collect()
}

fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn codes(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(code, label)| (code.to_string(), label.to_string()))
        .collect()
}

/// LA County COVID case counts: prune geography, canonicalize names and the
/// report date, and clip erroneous negative daily deltas.
pub fn covid_recipe() -> Recipe {
    Recipe {
        drops: strings(&["county", "state", "Lat", "Lon", "fips", "people_tested"]),
        renames: renames(&[
            ("date", "Date"),
            ("cases", "Cases_LA"),
            ("deaths", "Deaths_LA"),
            ("state_cases", "Cases_California"),
            ("state_deaths", "Deaths_California"),
            ("new_cases", "New_Cases_LA"),
            ("new_deaths", "New_Deaths_LA"),
            ("new_state_cases", "New_Cases_California"),
            ("new_state_deaths", "New_Deaths_California"),
        ]),
        date_columns: strings(&["Date"]),
        date_source_format: CIVIC_DATE_FORMAT.to_string(),
        rules: vec![Rule::AbsNumeric {
            columns: strings(&[
                "New_Cases_LA",
                "New_Deaths_LA",
                "New_Cases_California",
                "New_Deaths_California",
            ]),
        }],
    }
}

/// LAPD crime incidents: prune investigative columns, canonicalize names and
/// both report dates, backfill weapon/cross-street gaps, and expand the
/// one-letter victim code columns.
pub fn crime_recipe() -> Recipe {
    Recipe {
        drops: strings(&[
            "TIME OCC",
            "Rpt Dist No",
            "Part 1-2",
            "Mocodes",
            "Premis Cd",
            "Premis Desc",
            "Status",
            "Status Desc",
            "Crm Cd 1",
            "Crm Cd 2",
            "Crm Cd 3",
            "Crm Cd 4",
        ]),
        renames: renames(&[
            ("Date Rptd", "Date_Reported"),
            ("DATE OCC", "Date_Occured"),
            ("Crm Cd", "Crime_Code"),
            ("Crm Cd Desc", "Crime_Code_Description"),
            ("Vict Age", "Victim_Age"),
            ("Vict Sex", "Victim_Sex"),
            ("Vict Descent", "Victim_Descent"),
            ("Weapon Used Cd", "Weapon_Code"),
            ("Weapon Desc", "Weapon_Description"),
            ("LOCATION", "Location"),
            ("Cross Street", "Cross_Street"),
            ("LAT", "Latitute"),
            ("LON", "Longitude"),
        ]),
        date_columns: strings(&["Date_Reported", "Date_Occured"]),
        date_source_format: CIVIC_DATE_FORMAT.to_string(),
        rules: vec![
            Rule::FillNull {
                column: "Weapon_Code".to_string(),
                value: Value::Integer(-1),
            },
            Rule::CastInteger {
                column: "Weapon_Code".to_string(),
            },
            Rule::FillNull {
                column: "Cross_Street".to_string(),
                value: Value::String("UNKNOWN".to_string()),
            },
            Rule::MapCodes {
                column: "Victim_Sex".to_string(),
                codes: codes(&[("F", "FEMALE"), ("M", "MALE"), ("X", "UNKNOWN")]),
                target: MapTarget::InPlace,
            },
            Rule::MapCodes {
                column: "Victim_Descent".to_string(),
                codes: codes(&[
                    ("A", "Other_Asian"),
                    ("B", "Black"),
                    ("C", "Chinese"),
                    ("D", "Cambodian"),
                    ("F", "Filipino"),
                    ("G", "Guamanian"),
                    ("H", "Hispanic/Latin/Mexican"),
                    ("I", "American_Indian/Alaskan_Native"),
                    ("J", "Japanese"),
                    ("K", "Korean"),
                    ("L", "Laotian"),
                    ("O", "Other"),
                    ("P", "Pacific_Islander"),
                    ("S", "Samoan"),
                    ("U", "Hawaiian"),
                    ("V", "Vietnamese"),
                    ("W", "White"),
                    ("X", "Unknown"),
                    ("Z", "Asian_Indian"),
                ]),
                target: MapTarget::NewColumn("Victim_Descent_Desc".to_string()),
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str], rows: Vec<Vec<Option<Value>>>) -> Table {
        Table::with_rows(strings(columns), rows)
    }

    #[test]
    fn abs_numeric_clips_negative_deltas() {
        let input = table(
            &["New_Cases_LA"],
            vec![
                vec![Some(Value::Integer(-5))],
                vec![Some(Value::Integer(7))],
                vec![Some(Value::Float(-1.5))],
                vec![None],
            ],
        );
        let rule = Rule::AbsNumeric {
            columns: strings(&["New_Cases_LA"]),
        };
        let out = apply_rule(&input, &rule).unwrap();
        assert_eq!(out.rows()[0][0], Some(Value::Integer(5)));
        assert_eq!(out.rows()[1][0], Some(Value::Integer(7)));
        assert_eq!(out.rows()[2][0], Some(Value::Float(1.5)));
        assert_eq!(out.rows()[3][0], None);
    }

    #[test]
    fn abs_numeric_rejects_non_numeric_cells() {
        let input = table(&["n"], vec![vec![Some(Value::String("x".into()))]]);
        let rule = Rule::AbsNumeric {
            columns: strings(&["n"]),
        };
        assert!(apply_rule(&input, &rule).is_err());
    }

    #[test]
    fn fill_and_cast_produce_integer_sentinels() {
        let input = table(
            &["Weapon_Code"],
            vec![
                vec![None],
                vec![Some(Value::Float(400.0))],
                vec![Some(Value::Integer(101))],
            ],
        );
        let filled = apply_rule(
            &input,
            &Rule::FillNull {
                column: "Weapon_Code".into(),
                value: Value::Integer(-1),
            },
        )
        .unwrap();
        let cast = apply_rule(
            &filled,
            &Rule::CastInteger {
                column: "Weapon_Code".into(),
            },
        )
        .unwrap();
        assert_eq!(cast.rows()[0][0], Some(Value::Integer(-1)));
        assert_eq!(cast.rows()[1][0], Some(Value::Integer(400)));
        assert_eq!(cast.rows()[2][0], Some(Value::Integer(101)));
    }

    #[test]
    fn map_codes_in_place_passes_unmapped_through() {
        let input = table(
            &["Victim_Sex"],
            vec![
                vec![Some(Value::String("F".into()))],
                vec![Some(Value::String("H".into()))],
                vec![None],
            ],
        );
        let rule = Rule::MapCodes {
            column: "Victim_Sex".into(),
            codes: codes(&[("F", "FEMALE"), ("M", "MALE"), ("X", "UNKNOWN")]),
            target: MapTarget::InPlace,
        };
        let out = apply_rule(&input, &rule).unwrap();
        assert_eq!(out.rows()[0][0], Some(Value::String("FEMALE".into())));
        assert_eq!(out.rows()[1][0], Some(Value::String("H".into())));
        assert_eq!(out.rows()[2][0], None);
    }

    #[test]
    fn map_codes_into_new_column_nulls_unmapped() {
        let input = table(
            &["Victim_Descent"],
            vec![
                vec![Some(Value::String("W".into()))],
                vec![Some(Value::String("Q".into()))],
            ],
        );
        let rule = Rule::MapCodes {
            column: "Victim_Descent".into(),
            codes: codes(&[("W", "White")]),
            target: MapTarget::NewColumn("Victim_Descent_Desc".into()),
        };
        let out = apply_rule(&input, &rule).unwrap();
        assert_eq!(
            out.columns(),
            &["Victim_Descent".to_string(), "Victim_Descent_Desc".to_string()]
        );
        assert_eq!(out.rows()[0][1], Some(Value::String("White".into())));
        assert_eq!(out.rows()[1][0], Some(Value::String("Q".into())));
        assert_eq!(out.rows()[1][1], None);
    }

    #[test]
    fn covid_recipe_end_to_end() {
        let input = table(
            &[
                "date",
                "county",
                "state",
                "fips",
                "cases",
                "deaths",
                "state_cases",
                "state_deaths",
                "new_cases",
                "new_deaths",
                "new_state_cases",
                "new_state_deaths",
                "people_tested",
                "Lat",
                "Lon",
            ],
            vec![vec![
                Some(Value::String("03/01/2020 12:00:00 AM".into())),
                Some(Value::String("Los Angeles".into())),
                Some(Value::String("CA".into())),
                Some(Value::Integer(6037)),
                Some(Value::Integer(20)),
                Some(Value::Integer(1)),
                Some(Value::Integer(40)),
                Some(Value::Integer(2)),
                Some(Value::Integer(-5)),
                Some(Value::Integer(0)),
                Some(Value::Integer(6)),
                Some(Value::Integer(1)),
                None,
                Some(Value::Float(34.05)),
                Some(Value::Float(-118.24)),
            ]],
        );
        let out = apply_recipe(&input, &covid_recipe()).unwrap();
        assert_eq!(
            out.columns(),
            &[
                "Date",
                "Cases_LA",
                "Deaths_LA",
                "Cases_California",
                "Deaths_California",
                "New_Cases_LA",
                "New_Deaths_LA",
                "New_Cases_California",
                "New_Deaths_California",
            ]
            .map(String::from)
        );
        assert_eq!(out.rows()[0][0], Some(Value::String("2020-03-01".into())));
        assert_eq!(out.rows()[0][5], Some(Value::Integer(5)));
    }

    #[test]
    fn recipe_fails_fast_when_source_schema_drifts() {
        // A feed that stopped publishing `people_tested` must abort the run.
        let input = table(&["date", "cases"], vec![]);
        let err = apply_recipe(&input, &covid_recipe()).unwrap_err();
        assert!(err.to_string().contains("people_tested") || err.to_string().contains("county"));
    }

    #[test]
    fn recipes_deserialize_from_yaml() {
        let yaml = r#"
drops: ["zone_id"]
renames:
  - { from: "stop_name", to: "Stop_Name" }
date_columns: []
rules:
  - kind: fill_null
    column: Stop_Name
    value: !String UNKNOWN
"#;
        let recipe: Recipe = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(recipe.drops, vec!["zone_id".to_string()]);
        assert_eq!(recipe.date_source_format, CIVIC_DATE_FORMAT);
        assert!(matches!(recipe.rules[0], Rule::FillNull { .. }));
    }
}

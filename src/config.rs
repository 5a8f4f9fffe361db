//! Pipeline configuration.
//!
//! Everything a run needs — source locators, delimiters, target table names,
//! the calendar range, the store location — travels through one explicit
//! [`PipelineConfig`] value loaded from YAML. There is no ambient state, so a
//! run is reproducible from its config file alone, and `run` and `validate`
//! invoked with the same file cannot disagree about the calendar range.

use std::{
    fs::File,
    io::{BufReader, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{cli, transform::Recipe};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub datasets: Vec<DatasetConfig>,
    pub date_table: DateTableConfig,
    pub target_db_path: PathBuf,
    pub target_db_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Dataset key; selects the built-in recipe when no inline one is given.
    pub name: String,
    /// CSV source: an `http(s)` URL or a filesystem path.
    pub source: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    pub target_table: String,
    /// Member file to extract when `source` is a zip archive.
    #[serde(default)]
    pub archive_member: Option<String>,
    /// Inline recipe override; takes precedence over the built-in.
    #[serde(default)]
    pub recipe: Option<Recipe>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateTableConfig {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub target_table: String,
}

fn default_delimiter() -> String {
    ",".to_string()
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Opening pipeline config {path:?}"))?;
        let config: PipelineConfig = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing pipeline config {path:?}"))?;
        if config.date_table.start > config.date_table.end {
            return Err(anyhow!(
                "Pipeline config {path:?}: date_table start {} is after end {}",
                config.date_table.start,
                config.date_table.end
            ));
        }
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = serde_yaml::to_string(self).context("Serializing pipeline config")?;
        let mut file =
            File::create(path).with_context(|| format!("Creating pipeline config {path:?}"))?;
        file.write_all(serialized.as_bytes())
            .with_context(|| format!("Writing pipeline config {path:?}"))?;
        Ok(())
    }

    /// Full path of the target SQLite database file.
    pub fn db_path(&self) -> PathBuf {
        self.target_db_path
            .join(format!("{}.db", self.target_db_name))
    }
}

impl DatasetConfig {
    pub fn delimiter_byte(&self) -> Result<u8> {
        cli::parse_delimiter(&self.delimiter)
            .map_err(|reason| anyhow!("Dataset '{}': {reason}", self.name))
    }
}

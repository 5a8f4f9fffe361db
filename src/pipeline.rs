//! Pipeline orchestration: extraction, dataset shaping, calendar generation,
//! and loading into the target store.
//!
//! Stages run strictly in sequence on one thread. Any failure aborts the run
//! before the failing dataset's table is loaded; tables already loaded in the
//! same run stay in place (there is no cross-table transaction). Because
//! every load is full-replace, simply rerunning the pipeline heals a partial
//! run.

use std::fs;

use anyhow::{Context, Result, anyhow};
use log::info;

use crate::{
    calendar,
    config::{DatasetConfig, PipelineConfig},
    fetch,
    store::Store,
    table::Table,
    transform,
};

/// What a completed run loaded, table by table.
#[derive(Debug)]
pub struct RunSummary {
    pub tables: Vec<(String, usize)>,
}

pub fn run(config: &PipelineConfig) -> Result<RunSummary> {
    let mut staged: Vec<(String, Table)> = Vec::with_capacity(config.datasets.len() + 1);

    for dataset in &config.datasets {
        let raw = acquire(dataset)?;
        info!(
            "Fetched {} row(s) x {} column(s) for dataset '{}'",
            raw.row_count(),
            raw.column_count(),
            dataset.name
        );
        let recipe = dataset
            .recipe
            .clone()
            .or_else(|| transform::builtin_recipe(&dataset.name))
            .ok_or_else(|| {
                anyhow!(
                    "Dataset '{}' has no inline recipe and no built-in recipe",
                    dataset.name
                )
            })?;
        let shaped = transform::apply_recipe(&raw, &recipe)
            .with_context(|| format!("Transforming dataset '{}'", dataset.name))?;
        info!(
            "Shaped dataset '{}' into {} column(s)",
            dataset.name,
            shaped.column_count()
        );
        staged.push((dataset.target_table.clone(), shaped));
    }

    let date_table = &config.date_table;
    let dimension = calendar::build_date_dimension(date_table.start, date_table.end)
        .context("Building the date dimension")?;
    info!(
        "Built date dimension with {} row(s) for {}..={}",
        dimension.row_count(),
        date_table.start,
        date_table.end
    );
    staged.push((date_table.target_table.clone(), dimension));

    fs::create_dir_all(&config.target_db_path)
        .with_context(|| format!("Creating target directory {:?}", config.target_db_path))?;
    let db_path = config.db_path();
    let mut store = Store::open(&db_path)?;
    let mut summary = RunSummary { tables: Vec::new() };
    for (name, table) in &staged {
        store
            .replace_table(table, name)
            .with_context(|| format!("Loading table '{name}'"))?;
        info!("Loaded {} row(s) into table '{name}'", table.row_count());
        summary.tables.push((name.clone(), table.row_count()));
    }
    store.close()?;
    info!("Run complete: {} table(s) in {db_path:?}", summary.tables.len());
    Ok(summary)
}

/// Pulls one dataset's raw table, unpacking and cleaning up archive scratch
/// files when the source is zipped.
fn acquire(dataset: &DatasetConfig) -> Result<Table> {
    let delimiter = dataset.delimiter_byte()?;
    let Some(member) = &dataset.archive_member else {
        return fetch::read_table(&dataset.source, delimiter)
            .with_context(|| format!("Fetching dataset '{}'", dataset.name));
    };

    let scratch = tempfile::tempdir().context("Creating scratch directory")?;
    let mut scratch_files = Vec::new();
    let archive_path = if fetch::is_url(&dataset.source) {
        let downloaded = fetch::download(&dataset.source, scratch.path())
            .with_context(|| format!("Downloading archive for dataset '{}'", dataset.name))?;
        scratch_files.push(downloaded.clone());
        downloaded
    } else {
        dataset.source.clone().into()
    };
    let extracted = fetch::extract_zip_member(&archive_path, member, scratch.path())
        .with_context(|| format!("Unpacking dataset '{}'", dataset.name))?;
    scratch_files.push(extracted.clone());

    let table = fetch::read_table_from_path(&extracted, delimiter)
        .with_context(|| format!("Fetching dataset '{}'", dataset.name))?;
    fetch::remove_files(&scratch_files)?;
    Ok(table)
}

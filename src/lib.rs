pub mod calendar;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod shape;
pub mod store;
pub mod table;
pub mod transform;
pub mod validate;

use std::{env, sync::OnceLock};

use anyhow::{Result, anyhow};
use clap::Parser;
use log::{LevelFilter, info};

use crate::{
    cli::{CalendarArgs, Cli, Commands, RunArgs, ValidateArgs},
    config::PipelineConfig,
    store::Store,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("civic_etl", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => handle_run(&args),
        Commands::Validate(args) => handle_validate(&args),
        Commands::Calendar(args) => handle_calendar(&args),
    }
}

fn handle_run(args: &RunArgs) -> Result<()> {
    let config = PipelineConfig::load(&args.config)?;
    let summary = pipeline::run(&config)?;
    info!(
        "Pipeline complete: {} table(s) loaded into {:?}",
        summary.tables.len(),
        config.db_path()
    );
    Ok(())
}

fn handle_validate(args: &ValidateArgs) -> Result<()> {
    let config = PipelineConfig::load(&args.config)?;
    let store = Store::open(&config.db_path())?;
    let report = validate::validate(&store, &config)?;
    store.close()?;
    if let Some(path) = &args.report {
        report.save(path)?;
        info!("Validation report written to {path:?}");
    }
    if report.passed() {
        info!("All validation checks passed");
        Ok(())
    } else {
        Err(anyhow!(
            "Validation failed with {} issue(s)",
            report.issues.len()
        ))
    }
}

fn handle_calendar(args: &CalendarArgs) -> Result<()> {
    let dimension = calendar::build_date_dimension(args.start, args.end)?;
    fetch::write_csv(&dimension, args.output.as_deref())?;
    info!(
        "Emitted {} calendar row(s) for {}..={}",
        dimension.row_count(),
        args.start,
        args.end
    );
    Ok(())
}

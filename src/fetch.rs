//! Source collaborators: CSV acquisition and emission.
//!
//! Raw tables arrive over HTTP or from the filesystem, optionally packed in a
//! zip archive. Failures here are [`EtlError::SourceFetch`] — the run aborts,
//! nothing is retried. Scratch files created while unpacking are removed by
//! the caller through [`remove_files`].

use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use csv::QuoteStyle;
use log::debug;
use zip::ZipArchive;

use crate::{data, error::EtlError, table::Table};

pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Reads a raw table from a URL or a filesystem path.
pub fn read_table(source: &str, delimiter: u8) -> Result<Table> {
    if is_url(source) {
        let body = http_get(source)?;
        parse_csv(body.as_slice(), delimiter)
            .with_context(|| format!("Parsing CSV fetched from {source}"))
    } else {
        read_table_from_path(Path::new(source), delimiter)
    }
}

pub fn read_table_from_path(path: &Path, delimiter: u8) -> Result<Table> {
    let file = File::open(path).map_err(|err| EtlError::SourceFetch {
        dataset: path.display().to_string(),
        reason: err.to_string(),
    })?;
    parse_csv(BufReader::new(file), delimiter).with_context(|| format!("Parsing CSV {path:?}"))
}

fn http_get(url: &str) -> Result<Vec<u8>> {
    let fetch_error = |err: reqwest::Error| EtlError::SourceFetch {
        dataset: url.to_string(),
        reason: err.to_string(),
    };
    let response = reqwest::blocking::get(url)
        .and_then(|response| response.error_for_status())
        .map_err(fetch_error)?;
    let bytes = response.bytes().map_err(fetch_error)?;
    debug!("Fetched {} byte(s) from {url}", bytes.len());
    Ok(bytes.to_vec())
}

fn parse_csv<R: Read>(reader: R, delimiter: u8) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(false)
        .from_reader(reader);
    let headers = reader
        .headers()
        .context("Reading CSV headers")?
        .iter()
        .map(|name| name.to_string())
        .collect();
    let mut table = Table::new(headers);
    for (idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Reading CSV row {}", idx + 2))?;
        table.push_row(record.iter().map(data::infer_cell).collect());
    }
    Ok(table)
}

/// Downloads `url` into `dest_dir`, keeping the URL's file name.
pub fn download(url: &str, dest_dir: &Path) -> Result<PathBuf> {
    let filename = url
        .split('/')
        .next_back()
        .and_then(|name| name.split('?').next())
        .filter(|name| !name.is_empty())
        .unwrap_or("download.bin");
    let dest = dest_dir.join(filename);
    fs::create_dir_all(dest_dir).with_context(|| format!("Creating directory {dest_dir:?}"))?;
    let body = http_get(url)?;
    fs::write(&dest, &body).with_context(|| format!("Writing download to {dest:?}"))?;
    Ok(dest)
}

/// Extracts a single named member from a zip archive into `dest_dir`.
pub fn extract_zip_member(archive: &Path, member: &str, dest_dir: &Path) -> Result<PathBuf> {
    let file = File::open(archive).map_err(|err| EtlError::SourceFetch {
        dataset: archive.display().to_string(),
        reason: err.to_string(),
    })?;
    let mut zip =
        ZipArchive::new(file).with_context(|| format!("Opening zip archive {archive:?}"))?;
    let mut entry = zip.by_name(member).map_err(|err| EtlError::SourceFetch {
        dataset: format!("{}!{member}", archive.display()),
        reason: err.to_string(),
    })?;
    let dest = dest_dir.join(member);
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).with_context(|| format!("Creating directory {parent:?}"))?;
    }
    let mut out =
        File::create(&dest).with_context(|| format!("Creating extracted file {dest:?}"))?;
    io::copy(&mut entry, &mut out)
        .with_context(|| format!("Extracting '{member}' from {archive:?}"))?;
    Ok(dest)
}

/// Removes scratch files left behind by download/extraction. Missing files
/// are fine; anything else must surface.
pub fn remove_files(paths: &[PathBuf]) -> Result<()> {
    for path in paths {
        if path.exists() {
            fs::remove_file(path).with_context(|| format!("Removing scratch file {path:?}"))?;
            debug!("Removed scratch file {path:?}");
        }
    }
    Ok(())
}

/// Writes a table as CSV to a file, or stdout when `path` is `None`.
pub fn write_csv(table: &Table, path: Option<&Path>) -> Result<()> {
    let sink: Box<dyn Write> = match path {
        Some(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        None => Box::new(io::stdout()),
    };
    let mut writer = csv::WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .from_writer(sink);
    writer
        .write_record(table.columns())
        .context("Writing CSV headers")?;
    for row in table.rows() {
        writer
            .write_record(row.iter().map(|cell| {
                cell.as_ref()
                    .map(|value| value.as_display())
                    .unwrap_or_default()
            }))
            .context("Writing CSV row")?;
    }
    writer.flush().context("Flushing CSV output")?;
    Ok(())
}

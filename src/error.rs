use thiserror::Error;

/// Failure classes surfaced by the pipeline and the validator.
///
/// Everything here is fatal for the stage that raises it; nothing is retried
/// or repaired automatically. Callers add table/dataset context via
/// `anyhow::Context` when they propagate.
#[derive(Debug, Error)]
pub enum EtlError {
    #[error("Fetching source '{dataset}' failed: {reason}")]
    SourceFetch { dataset: String, reason: String },

    #[error("Column '{column}' not found (available: {available})")]
    SchemaMismatch { column: String, available: String },

    #[error("Column '{column}': value '{value}' does not match date format '{format}'")]
    DateParse {
        column: String,
        value: String,
        format: String,
    },

    #[error("Table '{table}': column '{column}' contains {count} null value(s)")]
    NullConstraint {
        table: String,
        column: String,
        count: usize,
    },

    #[error("Writing table '{table}' failed")]
    StoreWrite {
        table: String,
        #[source]
        source: rusqlite::Error,
    },
}

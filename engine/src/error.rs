//! Error types for the payroll tabs engine.
//!
//! One enum per concern:
//!
//! - [`SourceError`] - reading the source table
//! - [`DefinitionError`] - reading the recipe (definition) file
//! - [`UnsatisfiableReport`] - a report whose rules cannot be met by the source headers
//! - [`EngineError`] - plan/table mismatches during materialization
//! - [`SinkError`] - writing the generated tabs
//! - [`RunError`] - top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// Source Table Errors
// =============================================================================

/// Errors while reading the source table.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Failed to read file.
    #[error("Failed to read source table: {0}")]
    Io(#[from] std::io::Error),

    /// Content could not be decoded.
    #[error("Failed to decode source table: {0}")]
    Encoding(String),

    /// Invalid delimited format.
    #[error("Invalid source table at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Empty file.
    #[error("Source table is empty")]
    EmptyFile,

    /// No headers found.
    #[error("No column headers found in source table")]
    NoHeaders,

    /// A data row carries more non-blank cells than there are headers.
    #[error("Row {row} has {found} cells but the header has {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
}

// =============================================================================
// Definition Errors
// =============================================================================

/// Errors while reading a definition (recipe) file.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// The file could not be opened or read.
    #[error("Unable to read definition file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No content at all.
    #[error("Definition is empty")]
    Empty,

    /// Strict mode: a line that is neither a section, a rule, nor a comment.
    #[error("Line {line}: expected `[Section]` or `key = value`, found '{text}'")]
    Malformed { line: usize, text: String },

    /// Strict mode: a rule before the first section header.
    #[error("Line {line}: rule '{key}' appears before any section")]
    OrphanRule { line: usize, key: String },

    /// Strict mode: a rule whose key is blank.
    #[error("Line {line}: rule has an empty column name")]
    EmptyKey { line: usize },
}

// =============================================================================
// Report Resolution
// =============================================================================

/// Why a report cannot be produced from the current source headers.
///
/// Never fails a run: the orchestrator turns it into a per-report diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum UnsatisfiableReport {
    /// A `_NZ_` column is not present in the source header.
    #[error("required non-zero column '{column}' is missing from the source table")]
    MissingRequiredColumn { column: String },

    /// Rules ask for `_ANZ_` filtering but none of those columns exist.
    #[error("no _ANZ_ columns found in the source table")]
    NoAnyNonZeroColumns,
}

// =============================================================================
// Engine Errors
// =============================================================================

/// Errors while materializing a report.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The plan points at a source column the table does not have.
    #[error("Report '{report}' refers to source column #{index}, table has {width} columns")]
    ColumnOutOfRange {
        report: String,
        index: usize,
        width: usize,
    },
}

// =============================================================================
// Sink Errors
// =============================================================================

/// Errors while writing or reading generated output.
#[derive(Debug, Error)]
pub enum SinkError {
    /// IO error.
    #[error("Output IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("Output JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error.
    #[error("Output CSV error: {0}")]
    Csv(#[from] csv::Error),
}

// =============================================================================
// Run Errors (top-level)
// =============================================================================

/// Top-level run errors.
///
/// This is the error returned by [`crate::engine::pipeline::process_files`].
/// Any of these fails the whole run.
#[derive(Debug, Error)]
pub enum RunError {
    /// An input file is missing or unreadable.
    #[error("Unable to open file: {}", path.display())]
    InputNotFound { path: PathBuf },

    /// Definition error.
    #[error("Definition error: {0}")]
    Definition(#[from] DefinitionError),

    /// Source table error.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Engine error.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Output error.
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for source table operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Result type for definition operations.
pub type DefinitionResult<T> = Result<T, DefinitionError>;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Result type for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;

/// Result type for run operations.
pub type RunResult<T> = Result<T, RunError>;

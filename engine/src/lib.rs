//! # Payroll Tabs - declarative report tabs from a payroll export
//!
//! Payroll Tabs reads a payroll export and a recipe of `[Report]` sections,
//! and cuts one filtered, totalled tab per report.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Recipe    │────▶│  Directive  │────▶│ Materialize │────▶│  Aggregate  │
//! │  (.ini)     │     │  (plan)     │     │  (filter)   │     │  + layout   │
//! └─────────────┘     └──────▲──────┘     └──────▲──────┘     └──────┬──────┘
//!                            │                   │                   │
//!                     ┌──────┴───────────────────┴──┐         ┌──────▼──────┐
//!                     │   Source table (CSV, auto)  │         │  JSON / CSV │
//!                     └─────────────────────────────┘         └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use payroll_tabs::{process_files, RunOptions, RunStatus};
//!
//! let options = RunOptions::new("recipe.ini", "March.csv");
//! let result = process_files(&options);
//! println!("{}", RunStatus::from(&result));
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`logs`] - Run log stream
//! - [`config`] - Run options and title context
//! - [`models`] - Cell values and the source table
//! - [`parser`] - Source table reading with auto-detection
//! - [`definition`] - Recipe parsing
//! - [`engine`] - Directive resolution, filtering, totals, layout, orchestration
//! - [`sink`] - JSON and CSV output
//! - [`compare`] - Output comparison

// Core modules
pub mod error;
pub mod logs;
pub mod config;
pub mod models;

// Inputs
pub mod parser;
pub mod definition;

// Processing
pub mod engine;

// Outputs
pub mod sink;
pub mod compare;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    DefinitionError,
    EngineError,
    RunError,
    SinkError,
    SourceError,
    UnsatisfiableReport,
};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{OutputOptions, ParseMode, ReportContext, RunOptions};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{CellValue, HeaderIndex, SourceTable};

// =============================================================================
// Re-exports - Inputs
// =============================================================================

pub use definition::{ColumnRule, Definition, Section, RESERVED_SECTION};

pub use parser::{
    decode_content,
    detect_delimiter,
    detect_encoding,
    parse_bytes_auto,
    parse_table,
    parse_table_file_auto,
    ParseResult,
};

// =============================================================================
// Re-exports - Engine
// =============================================================================

pub use engine::{
    build_report,
    process,
    process_files,
    ColumnPlan,
    DerivedTable,
    ReportDiagnostic,
    ReportOutcome,
    RunReport,
    RunStatus,
    RunSummary,
};

// =============================================================================
// Re-exports - Outputs
// =============================================================================

pub use sink::{load_output, write_csv_dir, write_json, OutputDocument};

pub use compare::{compare_documents, Comparison, Difference};

//! Report engine.
//!
//! Stages, in the order a report flows through them:
//!
//! 1. [`directive`] - rules + source headers -> [`ColumnPlan`]
//! 2. [`materialize`] - plan + source table -> filtered [`MaterializedTable`]
//! 3. [`aggregate`] - column, row, grand and derived [`Totals`]
//! 4. [`layout`] - everything above -> [`DerivedTable`] on a [`Grid`]
//!
//! [`pipeline`] drives the stages per report and decides what is emitted.

pub mod aggregate;
pub mod directive;
pub mod grid;
pub mod layout;
pub mod materialize;
pub mod pipeline;

pub use aggregate::{compute_totals, Totals};
pub use directive::{resolve, ColumnFilter, ColumnPlan, DerivedAggregate, PlannedColumn};
pub use grid::{CellRange, CellRef, CellStyle, Content, Expr, Grid};
pub use layout::{build_table, DerivedTable, TableLayout};
pub use materialize::{materialize, MaterializedTable};
pub use pipeline::{
    build_report, process, process_files, reports, ReportDiagnostic, ReportOutcome, ReportState,
    RunReport, RunStatus, RunSummary,
};

//! Report orchestration.
//!
//! Every report section goes through the same states:
//!
//! ```text
//! PENDING -> RESOLVED -> MATERIALIZED -> EMITTED
//!        \-> UNSELECTABLE            \-> DISCARDED (headcount 0)
//! ```
//!
//! An unselectable or discarded report never stops the run; it becomes a
//! [`ReportDiagnostic`]. Any [`EngineError`](crate::error::EngineError)
//! does, and tables built before it are not kept.
//!
//! # Example
//!
//! ```rust,ignore
//! use payroll_tabs::config::RunOptions;
//! use payroll_tabs::engine::pipeline::{process_files, RunStatus};
//!
//! let options = RunOptions::new("recipe.ini", "March.csv");
//! let status = RunStatus::from(&process_files(&options));
//! println!("{}", status);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use super::aggregate::compute_totals;
use super::directive::resolve;
use super::layout::{build_table, DerivedTable};
use super::materialize::materialize;
use crate::config::{ReportContext, RunOptions};
use crate::definition::{ColumnRule, Definition, Section, RESERVED_SECTION};
use crate::error::{EngineResult, RunError, RunResult, UnsatisfiableReport};
use crate::logs::{
    log_debug, log_error, log_info, log_report_debug, log_report_info, log_report_warning,
    log_success,
};
use crate::models::SourceTable;
use crate::parser::parse_table_file_auto;
use crate::sink::{write_csv_dir, write_json, OutputDocument};

/// Lifecycle of one report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReportState {
    Pending,
    Resolved,
    Unselectable,
    Materialized,
    Emitted,
    Discarded,
}

impl fmt::Display for ReportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReportState::Pending => "PENDING",
            ReportState::Resolved => "RESOLVED",
            ReportState::Unselectable => "UNSELECTABLE",
            ReportState::Materialized => "MATERIALIZED",
            ReportState::Emitted => "EMITTED",
            ReportState::Discarded => "DISCARDED",
        };
        f.write_str(name)
    }
}

/// Terminal state of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ReportOutcome {
    Emitted { headcount: usize },
    Unselectable { reason: UnsatisfiableReport },
    /// Every row was filtered out
    Discarded { removed: usize },
}

impl ReportOutcome {
    pub fn state(&self) -> ReportState {
        match self {
            ReportOutcome::Emitted { .. } => ReportState::Emitted,
            ReportOutcome::Unselectable { .. } => ReportState::Unselectable,
            ReportOutcome::Discarded { .. } => ReportState::Discarded,
        }
    }
}

/// Per-report line of a run summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDiagnostic {
    pub report: String,
    pub outcome: ReportOutcome,
}

impl fmt::Display for ReportDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            ReportOutcome::Emitted { headcount } => {
                write!(f, "{}: emitted, headcount {}", self.report, headcount)
            }
            ReportOutcome::Unselectable { reason } => {
                write!(f, "{}: unselectable, {}", self.report, reason)
            }
            ReportOutcome::Discarded { removed } => {
                write!(f, "{}: discarded, all {} rows filtered out", self.report, removed)
            }
        }
    }
}

/// One processed report: its outcome and, when emitted, its tab.
#[derive(Debug, Clone)]
pub struct ReportResult {
    pub diagnostic: ReportDiagnostic,
    pub table: Option<DerivedTable>,
}

/// All reports of a run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Emitted tabs, in definition order
    pub tables: Vec<DerivedTable>,
    /// Unselectable and discarded reports
    pub diagnostics: Vec<ReportDiagnostic>,
    /// Every report's outcome, in definition order
    pub outcomes: Vec<ReportDiagnostic>,
}

impl RunReport {
    pub fn table(&self, name: &str) -> Option<&DerivedTable> {
        self.tables.iter().find(|t| t.name == name)
    }

    fn push(&mut self, result: ReportResult) {
        self.outcomes.push(result.diagnostic.clone());
        match result.table {
            Some(table) => self.tables.push(table),
            None => self.diagnostics.push(result.diagnostic),
        }
    }
}

/// Run one report through every state.
pub fn build_report(
    name: &str,
    rules: &[ColumnRule],
    source: &SourceTable,
    context: &ReportContext,
) -> EngineResult<ReportResult> {
    log_report_debug(name, format!("{} ({} rules)", ReportState::Pending, rules.len()));

    let plan = match resolve(name, rules, source.header_index()) {
        Ok(plan) => plan,
        Err(reason) => {
            log_report_warning(name, format!("Report not selectable: {}", reason));
            return Ok(ReportResult {
                diagnostic: ReportDiagnostic {
                    report: name.to_string(),
                    outcome: ReportOutcome::Unselectable { reason },
                },
                table: None,
            });
        }
    };
    log_report_debug(
        name,
        format!(
            "{}: {} columns, {} summed, {} derived",
            ReportState::Resolved,
            plan.columns.len(),
            plan.sum_columns().len(),
            plan.derived.len()
        ),
    );

    let table = materialize(source, &plan)?;
    log_report_debug(
        name,
        format!("{}: {} kept, {} removed", ReportState::Materialized, table.headcount(), table.removed),
    );

    if table.is_empty() {
        log_report_info(name, "No rows left after filtering, report discarded");
        return Ok(ReportResult {
            diagnostic: ReportDiagnostic {
                report: name.to_string(),
                outcome: ReportOutcome::Discarded { removed: table.removed },
            },
            table: None,
        });
    }

    let totals = compute_totals(&table, &plan);
    let derived = build_table(context.title(name), &plan, &table, &totals);
    log_report_info(name, format!("Headcount {}", derived.headcount));

    Ok(ReportResult {
        diagnostic: ReportDiagnostic {
            report: name.to_string(),
            outcome: ReportOutcome::Emitted { headcount: derived.headcount },
        },
        table: Some(derived),
    })
}

/// Lazily processes reports one at a time.
///
/// Dropping the iterator between two items stops the run cleanly.
pub struct Reports<'a> {
    sections: std::slice::Iter<'a, Section>,
    source: &'a SourceTable,
    context: &'a ReportContext,
}

impl<'a> Iterator for Reports<'a> {
    type Item = EngineResult<ReportResult>;

    fn next(&mut self) -> Option<Self::Item> {
        let section = self.sections.find(|s| s.name != RESERVED_SECTION)?;
        Some(build_report(&section.name, &section.rules, self.source, self.context))
    }
}

/// Iterate the definition's reports against `source`.
pub fn reports<'a>(
    definition: &'a Definition,
    source: &'a SourceTable,
    context: &'a ReportContext,
) -> Reports<'a> {
    Reports {
        sections: definition.sections().iter(),
        source,
        context,
    }
}

/// Process every report of a definition.
pub fn process(
    definition: &Definition,
    source: &SourceTable,
    context: &ReportContext,
) -> EngineResult<RunReport> {
    let mut run = RunReport::default();
    for result in reports(definition, source, context) {
        run.push(result?);
    }
    Ok(run)
}

// =============================================================================
// File-level run
// =============================================================================

/// What a file-level run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub json_path: PathBuf,
    pub csv_files: Vec<PathBuf>,
    pub report: RunReport,
}

/// Overall run status shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Success,
    Failed(String),
}

impl<T> From<&RunResult<T>> for RunStatus {
    fn from(result: &RunResult<T>) -> Self {
        match result {
            Ok(_) => RunStatus::Success,
            Err(e) => RunStatus::Failed(e.to_string()),
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => f.write_str("Success"),
            RunStatus::Failed(cause) => write!(f, "Failed: {}", cause),
        }
    }
}

/// Read both inputs, process every report, write the output.
pub fn process_files(options: &RunOptions) -> RunResult<RunSummary> {
    let json_path = options.json_output_path();

    log_info(format!("Business unit: {}", options.context.business_unit));
    log_info(format!(
        "Period: {} {}",
        crate::config::month_label(options.context.month),
        options.context.year
    ));
    log_info(format!("Definition file: {}", options.definition_path.display()));
    log_info(format!("Source file: {}", options.source_path.display()));
    log_info(format!("Output file: {}", json_path.display()));

    // Both inputs must exist before any report runs
    for path in [&options.definition_path, &options.source_path] {
        if !path.is_file() {
            log_error(format!("Unable to open file: {}", path.display()));
            return Err(RunError::InputNotFound { path: path.clone() });
        }
    }

    let definition = Definition::from_file(&options.definition_path, options.parse_mode)?;
    let parsed = parse_table_file_auto(&options.source_path)?;
    log_debug(format!(
        "Source: {} columns, {} rows, encoding {}, delimiter '{}'",
        parsed.table.width(),
        parsed.table.row_count(),
        parsed.encoding,
        parsed.delimiter
    ));

    let report = process(&definition, &parsed.table, &options.context)?;

    let document = OutputDocument::new(
        &options.source_path,
        &options.definition_path,
        options.context.clone(),
        report.tables.clone(),
        report.diagnostics.clone(),
    );
    write_json(&document, &json_path)?;

    let csv_files = match &options.output.csv_dir {
        Some(dir) => write_csv_dir(&document, dir)?,
        None => Vec::new(),
    };

    log_success(format!(
        "{} tabs written, {} skipped",
        report.tables.len(),
        report.diagnostics.len()
    ));

    Ok(RunSummary { json_path, csv_files, report })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OutputOptions, ParseMode};
    use crate::engine::grid::CellRef;
    use crate::sink::load_output;
    use chrono::Month;
    use std::fs;
    use tempfile::TempDir;

    fn context() -> ReportContext {
        ReportContext::new("Acme", Month::March, 2025)
    }

    fn staff() -> SourceTable {
        SourceTable::new(
            vec!["Name".into(), "Dept".into(), "Pay".into()],
            vec![
                vec!["Alice".into(), "Eng".into(), 100.0.into()],
                vec!["Bob".into(), "Eng".into(), 0.0.into()],
            ],
        )
        .unwrap()
    }

    fn definition(text: &str) -> Definition {
        Definition::parse(text, ParseMode::Permissive).unwrap()
    }

    #[test]
    fn test_non_zero_scenario() {
        let run = process(&definition("[Pay]\nPay = _NZ__SUM_Pay\n"), &staff(), &context()).unwrap();

        let table = run.table("Pay").unwrap();
        assert_eq!(table.headcount, 1);
        assert_eq!(table.title, "Acme - Pay - Mar 2025");

        let bottom = table.bottom_total_cell(0).unwrap();
        assert_eq!(table.grid.content(bottom).numeric(), Some(100.0));
        assert!(table.checks_hold());
        assert_eq!(table.grid.checks().count(), 1);
    }

    #[test]
    fn test_missing_required_column_scenario() {
        let run = process(&definition("[Bad]\nMissing = _NZ_Foo\n"), &staff(), &context()).unwrap();

        assert!(run.tables.is_empty());
        assert_eq!(
            run.diagnostics,
            vec![ReportDiagnostic {
                report: "Bad".into(),
                outcome: ReportOutcome::Unselectable {
                    reason: UnsatisfiableReport::MissingRequiredColumn { column: "Missing".into() },
                },
            }]
        );
    }

    #[test]
    fn test_row_total_scenario() {
        let source = SourceTable::new(
            vec!["Name".into(), "Pay".into(), "Bonus".into()],
            vec![
                vec!["Alice".into(), 100.0.into(), 10.0.into()],
                vec!["Bob".into(), 50.0.into(), 5.0.into()],
            ],
        )
        .unwrap();
        let run = process(
            &definition("[Both]\nName = Name\nPay = _SUM_Pay\nBonus = _SUM_Bonus\n"),
            &source,
            &context(),
        )
        .unwrap();

        let table = run.table("Both").unwrap();
        let col = table.layout.row_total_column.unwrap();
        let first = table.layout.first_data_row;
        assert_eq!(table.grid.content(CellRef::new(first, col)).numeric(), Some(110.0));
        assert_eq!(table.grid.content(CellRef::new(first + 1, col)).numeric(), Some(55.0));

        let top = table.grid.content(CellRef::new(2, col));
        let bottom = table.grid.content(CellRef::new(table.layout.total_row.unwrap(), col));
        assert_eq!(top.numeric(), Some(165.0));
        assert_eq!(bottom.numeric(), Some(165.0));
        assert!(table.checks_hold());
    }

    #[test]
    fn test_zero_headcount_discarded() {
        let run = process(
            &definition("[Nobody]\nDept = Dept\nPay = _NZ_Pay\n[Everyone]\nName = Name\n"),
            &SourceTable::new(
                vec!["Name".into(), "Dept".into(), "Pay".into()],
                vec![vec!["Bob".into(), "Eng".into(), 0.0.into()]],
            )
            .unwrap(),
            &context(),
        )
        .unwrap();

        assert_eq!(run.tables.len(), 1);
        assert_eq!(run.tables[0].name, "Everyone");
        assert_eq!(run.diagnostics[0].outcome, ReportOutcome::Discarded { removed: 1 });
        assert_eq!(
            run.outcomes.iter().map(|o| o.outcome.state()).collect::<Vec<_>>(),
            vec![ReportState::Discarded, ReportState::Emitted]
        );
    }

    #[test]
    fn test_reserved_section_never_processed() {
        let defn = definition("[COMPANIES]\n1 = Acme\n[Staff]\nName = Name\n");
        let run = process(&defn, &staff(), &context()).unwrap();

        assert_eq!(run.outcomes.len(), 1);
        assert_eq!(run.outcomes[0].report, "Staff");
    }

    #[test]
    fn test_caller_can_stop_between_reports() {
        let defn = definition("[A]\nName = Name\n[B]\nName = Name\n[C]\nName = Name\n");
        let source = staff();
        let ctx = context();

        let first: Vec<String> = reports(&defn, &source, &ctx)
            .take(2)
            .map(|r| r.unwrap().diagnostic.report)
            .collect();
        assert_eq!(first, vec!["A", "B"]);
    }

    #[test]
    fn test_diagnostic_display() {
        let diag = ReportDiagnostic {
            report: "Overtime".into(),
            outcome: ReportOutcome::Discarded { removed: 4 },
        };
        assert_eq!(diag.to_string(), "Overtime: discarded, all 4 rows filtered out");
    }

    #[test]
    fn test_process_files_end_to_end() {
        let dir = TempDir::new().unwrap();
        let defn_path = dir.path().join("recipe.ini");
        let source_path = dir.path().join("March.csv");
        fs::write(
            &defn_path,
            "[COMPANIES]\n1 = Acme\n\n[Pay]\nName = Employee\nPay = _NZ__SUM_Pay\n\n[Bad]\nMissing = _NZ_Foo\n",
        )
        .unwrap();
        fs::write(&source_path, "Name,Dept,Pay\nAlice,Eng,100\nBob,Eng,0\n").unwrap();

        let mut options = RunOptions::new(&defn_path, &source_path);
        options.context = context();
        options.parse_mode = ParseMode::Permissive;
        options.output = OutputOptions {
            json_path: None,
            csv_dir: Some(dir.path().join("tabs")),
        };

        let result = process_files(&options);
        assert_eq!(RunStatus::from(&result), RunStatus::Success);

        let summary = result.unwrap();
        assert_eq!(summary.json_path, dir.path().join("March Tabs.json"));
        assert_eq!(summary.csv_files, vec![dir.path().join("tabs").join("Pay.csv")]);

        let doc = load_output(&summary.json_path).unwrap();
        assert_eq!(doc.report_names(), vec!["Pay"]);
        assert_eq!(doc.diagnostics.len(), 1);
        assert_eq!(doc.reports[0].headcount, 1);
    }

    #[test]
    fn test_missing_input_fails_run() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.ini");
        let source_path = dir.path().join("March.csv");
        fs::write(&source_path, "Name\nAlice\n").unwrap();

        let result = process_files(&RunOptions::new(&missing, &source_path));
        assert!(matches!(result, Err(RunError::InputNotFound { ref path }) if *path == missing));
        assert_eq!(
            RunStatus::from(&result),
            RunStatus::Failed(format!("Unable to open file: {}", missing.display()))
        );
        assert!(!dir.path().join("March Tabs.json").exists());
    }
}

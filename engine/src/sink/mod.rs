//! Output sink - persist generated tabs.
//!
//! A run produces one JSON document holding every emitted tab (grid,
//! merges, totals) and the diagnostics of skipped reports. Each tab can
//! also be exported as a flat CSV file for a quick look in a spreadsheet.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ReportContext;
use crate::engine::grid::{Cell, Content};
use crate::engine::layout::DerivedTable;
use crate::engine::pipeline::ReportDiagnostic;
use crate::error::SinkResult;

/// Everything a run hands over to a front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputDocument {
    /// Source table the tabs were cut from
    pub source: String,
    pub definition: String,
    pub context: ReportContext,
    pub generated_at: String,
    pub reports: Vec<DerivedTable>,
    #[serde(default)]
    pub diagnostics: Vec<ReportDiagnostic>,
}

impl OutputDocument {
    pub fn new(
        source: &Path,
        definition: &Path,
        context: ReportContext,
        reports: Vec<DerivedTable>,
        diagnostics: Vec<ReportDiagnostic>,
    ) -> Self {
        Self {
            source: source.display().to_string(),
            definition: definition.display().to_string(),
            context,
            generated_at: chrono::Utc::now().to_rfc3339(),
            reports,
            diagnostics,
        }
    }

    pub fn report(&self, name: &str) -> Option<&DerivedTable> {
        self.reports.iter().find(|r| r.name == name)
    }

    pub fn report_names(&self) -> Vec<&str> {
        self.reports.iter().map(|r| r.name.as_str()).collect()
    }
}

/// Write the document as pretty JSON, creating parent directories.
pub fn write_json(document: &OutputDocument, path: &Path) -> SinkResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(document)?;
    fs::write(path, content)?;
    Ok(())
}

/// Read a document written by [`write_json`].
pub fn load_output(path: &Path) -> SinkResult<OutputDocument> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Export each tab as `<dir>/<report>.csv`. Returns the files written.
pub fn write_csv_dir(document: &OutputDocument, dir: &Path) -> SinkResult<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(document.reports.len());
    for table in &document.reports {
        let path = dir.join(format!("{}.csv", file_stem_for(&table.name)));
        write_csv(table, &path)?;
        written.push(path);
    }
    Ok(written)
}

/// One tab as CSV, every row padded to the grid width.
pub fn write_csv(table: &DerivedTable, path: &Path) -> SinkResult<()> {
    let (_, width) = table.grid.dimensions();
    let mut writer = csv::Writer::from_path(path)?;

    for row in table.grid.rows() {
        let mut record: Vec<String> = row.iter().map(render_cell).collect();
        record.resize(width as usize, String::new());
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Text shown for a cell; numbers in number-formatted styles get two decimals.
pub fn render_cell(cell: &Cell) -> String {
    match (&cell.content, cell.style.number_format()) {
        (Content::Number { value } | Content::Aggregate { value, .. }, Some(_)) => {
            format!("{:.2}", value)
        }
        (content, _) => content.to_string(),
    }
}

/// Report names become file names; path separators and reserved
/// characters are replaced.
fn file_stem_for(report: &str) -> String {
    let stem: String = report
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let stem = stem.trim().trim_matches('.');
    if stem.is_empty() {
        "report".to_string()
    } else {
        stem.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::grid::CellStyle;
    use crate::engine::pipeline::{process, ReportOutcome};
    use crate::config::{ParseMode, ReportContext};
    use crate::definition::Definition;
    use crate::models::SourceTable;
    use chrono::Month;
    use tempfile::TempDir;

    fn document() -> OutputDocument {
        let source = SourceTable::new(
            vec!["Name".into(), "Pay".into()],
            vec![
                vec!["Alice".into(), 100.0.into()],
                vec!["Bob".into(), 0.0.into()],
            ],
        )
        .unwrap();
        let definition = Definition::parse(
            "[Pay/Run]\nName = Name\nPay = _NZ__SUM_Pay\n[Gone]\nX = _NZ_X\n",
            ParseMode::Permissive,
        )
        .unwrap();
        let context = ReportContext::new("Acme", Month::March, 2025);
        let run = process(&definition, &source, &context).unwrap();

        OutputDocument::new(
            Path::new("March.csv"),
            Path::new("recipe.ini"),
            context,
            run.tables,
            run.diagnostics,
        )
    }

    #[test]
    fn test_json_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("March Tabs.json");
        let doc = document();

        write_json(&doc, &path).unwrap();
        let loaded = load_output(&path).unwrap();

        assert_eq!(loaded, doc);
        assert_eq!(loaded.report_names(), vec!["Pay/Run"]);
        assert!(matches!(
            loaded.diagnostics[0].outcome,
            ReportOutcome::Unselectable { .. }
        ));
    }

    #[test]
    fn test_csv_export() {
        let dir = TempDir::new().unwrap();
        let doc = document();

        let files = write_csv_dir(&doc, dir.path()).unwrap();
        assert_eq!(files, vec![dir.path().join("Pay_Run.csv")]);

        let content = fs::read_to_string(&files[0]).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "Acme - Pay/Run - Mar 2025,Pay");
        assert_eq!(lines[1], "Total Headcount: 1,100.00");
        assert_eq!(lines[2], ",TRUE");
        assert_eq!(lines[6], "Name,Pay");
        assert_eq!(lines[7], "Alice,100.00");
        assert_eq!(lines[8], "Grand Total,100.00");
    }

    #[test]
    fn test_render_cell() {
        let cell = Cell::new(Content::number(1234.5), CellStyle::Numeric);
        assert_eq!(render_cell(&cell), "1234.50");

        let cell = Cell::new(Content::number(7.0), CellStyle::Body);
        assert_eq!(render_cell(&cell), "7");

        let cell = Cell::new(Content::text("Eng"), CellStyle::Body);
        assert_eq!(render_cell(&cell), "Eng");
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem_for("Overtime"), "Overtime");
        assert_eq!(file_stem_for("A/B:C"), "A_B_C");
        assert_eq!(file_stem_for(".."), "report");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(load_output(&dir.path().join("nope.json")).is_err());
    }
}

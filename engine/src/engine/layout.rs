//! Lays a filtered, totalled report out as a tab.
//!
//! ```text
//! row 1    title (merged) ............ SUM labels ........ Total
//! row 2    Total Headcount: N   Total  top totals ........ grand total
//! row 3                                checks ............ check
//! row 5..  (derived aggregates, label/value pairs, then their Total)
//! row H    column headers ....................................... Total
//! row H+1  data rows ........................................... row totals
//! row H+n+1 Grand Total ........ bottom totals ............... grand total
//! ```
//!
//! `H` is 7 plus the number of derived aggregates.

use serde::{Deserialize, Serialize};

use super::aggregate::Totals;
use super::directive::ColumnPlan;
use super::grid::{CellRange, CellRef, CellStyle, Content, Expr, Grid};
use super::materialize::MaterializedTable;
use crate::models::CellValue;

/// First row of the derived-aggregate block.
const DERIVED_FIRST_ROW: u32 = 5;
/// Title merge end when no column is summed.
const DEFAULT_TITLE_SPAN: u32 = 5;

/// Where things landed in the grid (1-based).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableLayout {
    pub header_row: u32,
    pub first_data_row: u32,
    pub last_data_row: u32,
    /// Bottom total row, when any column is summed
    pub total_row: Option<u32>,
    /// Row-total column, when two or more columns are summed
    pub row_total_column: Option<u32>,
    /// Cell holding the headcount annotation
    pub headcount_cell: CellRef,
}

/// One finished report tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedTable {
    pub name: String,
    pub title: String,
    pub headcount: usize,
    pub totals: Totals,
    pub layout: TableLayout,
    pub grid: Grid,
    pub merges: Vec<CellRange>,
}

impl DerivedTable {
    /// Re-evaluate every aggregate from the grid.
    pub fn recalculate(&mut self) {
        self.grid.recalculate();
    }

    /// All consistency checks hold.
    pub fn checks_hold(&self) -> bool {
        self.grid.checks().all(|(_, holds)| holds)
    }

    /// Top total cell of a planned column (0-based position).
    pub fn top_total_cell(&self, position: usize) -> CellRef {
        CellRef::new(2, position as u32 + 1)
    }

    /// Bottom total cell of a planned column (0-based position).
    pub fn bottom_total_cell(&self, position: usize) -> Option<CellRef> {
        self.layout
            .total_row
            .map(|row| CellRef::new(row, position as u32 + 1))
    }
}

/// Build the grid for a report with at least one retained row.
pub fn build_table(
    title: String,
    plan: &ColumnPlan,
    table: &MaterializedTable,
    totals: &Totals,
) -> DerivedTable {
    let mut grid = Grid::new();
    let headcount = table.headcount();
    let width = plan.columns.len() as u32;
    let sum_cols: Vec<u32> = plan.sum_columns().iter().map(|&p| p as u32 + 1).collect();

    let header_row = DERIVED_FIRST_ROW + 2 + totals.derived.len() as u32;
    let first_data_row = header_row + 1;
    let last_data_row = header_row + headcount as u32;
    let total_row = (!sum_cols.is_empty()).then_some(last_data_row + 1);
    let row_total_column = (sum_cols.len() > 1).then_some(width + 1);

    grid.set(CellRef::new(1, 1), Content::text(&title), CellStyle::Title);

    // Column headers and data block
    for (i, column) in plan.columns.iter().enumerate() {
        let col = i as u32 + 1;
        grid.set(
            CellRef::new(header_row, col),
            Content::text(&column.label),
            CellStyle::ColumnHeader,
        );
        // Repeat SUM labels above their totals, leaving the title in A1
        if column.summed && col > 1 {
            grid.set(CellRef::new(1, col), Content::text(&column.label), CellStyle::ColumnHeader);
        }

        let style = if column.summed { CellStyle::Numeric } else { CellStyle::Body };
        for (r, row) in table.rows.iter().enumerate() {
            let value = row.get(i).cloned().unwrap_or(CellValue::Blank);
            grid.set(CellRef::new(first_data_row + r as u32, col), value.into(), style);
        }
    }

    // Column totals, top and bottom, with checks
    if let Some(total_row) = total_row {
        let filled_width = row_total_column.unwrap_or(width);
        for col in 1..=filled_width {
            grid.set_style(CellRef::new(total_row, col), CellStyle::Fill);
        }
        if !sum_cols.contains(&1) {
            grid.set(CellRef::new(total_row, 1), Content::text("Grand Total"), CellStyle::ColumnHeader);
        }

        for total in &totals.columns {
            let col = total.position as u32 + 1;
            let expr = numeric_range(table, total.position, col, first_data_row);
            write_totals(&mut grid, col, total_row, expr, total.value);
        }

        let first_sum = sum_cols[0];
        if first_sum > 2 {
            grid.set(CellRef::new(2, first_sum - 1), Content::text("Total"), CellStyle::Label);
        }
    }

    // Row totals on the right
    if let (Some(col), Some(row_totals), Some(total_row)) =
        (row_total_column, totals.row_totals.as_ref(), total_row)
    {
        grid.set(CellRef::new(header_row, col), Content::text("Total"), CellStyle::ColumnHeader);
        grid.set(CellRef::new(1, col), Content::text("Total"), CellStyle::ColumnHeader);

        for (r, value) in row_totals.iter().enumerate() {
            let row = first_data_row + r as u32;
            let cells = sum_cols.iter().map(|&c| CellRef::new(row, c)).collect();
            grid.set(
                CellRef::new(row, col),
                Content::Aggregate { expr: Expr::sum_cells(cells), value: *value },
                CellStyle::RowTotal,
            );
        }

        let expr = Expr::sum_range(CellRef::new(first_data_row, col), CellRef::new(last_data_row, col));
        write_totals(&mut grid, col, total_row, expr, totals.grand_total.unwrap_or(0.0));
    }

    // Derived aggregates
    if let Some(derived_total) = totals.derived_total {
        let value_col = row_total_column.unwrap_or(width).max(2);
        let label_col = value_col - 1;
        let mut value_cells = Vec::with_capacity(totals.derived.len());

        for (k, derived) in totals.derived.iter().enumerate() {
            let row = DERIVED_FIRST_ROW + k as u32;
            grid.set(CellRef::new(row, label_col), Content::text(&derived.label), CellStyle::FilledLabel);
            let tops = derived
                .columns
                .iter()
                .map(|&p| CellRef::new(2, p as u32 + 1))
                .collect();
            grid.set(
                CellRef::new(row, value_col),
                Content::Aggregate { expr: Expr::sum_cells(tops), value: derived.value },
                CellStyle::RowTotal,
            );
            value_cells.push(CellRef::new(row, value_col));
        }

        let row = DERIVED_FIRST_ROW + totals.derived.len() as u32;
        grid.set(CellRef::new(row, label_col), Content::text("Total"), CellStyle::FilledLabel);
        grid.set(
            CellRef::new(row, value_col),
            Content::Aggregate { expr: Expr::sum_cells(value_cells), value: derived_total },
            CellStyle::TotalValue,
        );
    }

    // Headcount goes below the title unless a top total sits there
    let headcount_cell = if sum_cols.contains(&1) {
        CellRef::new(4, 1)
    } else {
        CellRef::new(2, 1)
    };
    grid.set(
        headcount_cell,
        Content::text(format!("Total Headcount: {}", headcount)),
        CellStyle::Label,
    );

    let title_span = sum_cols.first().map(|c| c - 1).unwrap_or(DEFAULT_TITLE_SPAN);
    let merges = if title_span > 1 {
        vec![CellRange::new(CellRef::new(1, 1), CellRef::new(1, title_span))]
    } else {
        Vec::new()
    };

    DerivedTable {
        name: plan.report.clone(),
        title,
        headcount,
        totals: totals.clone(),
        layout: TableLayout {
            header_row,
            first_data_row,
            last_data_row,
            total_row,
            row_total_column,
            headcount_cell,
        },
        grid,
        merges,
    }
}

/// Range from the first to the last numeric cell of a column.
fn numeric_range(table: &MaterializedTable, position: usize, col: u32, first_data_row: u32) -> Expr {
    let numeric_rows: Vec<u32> = table
        .column(position)
        .enumerate()
        .filter(|(_, c)| c.as_number().is_some())
        .map(|(r, _)| first_data_row + r as u32)
        .collect();

    let (first, last) = match (numeric_rows.first(), numeric_rows.last()) {
        (Some(&first), Some(&last)) => (first, last),
        _ => (first_data_row, first_data_row + table.headcount().saturating_sub(1) as u32),
    };
    Expr::sum_range(CellRef::new(first, col), CellRef::new(last, col))
}

/// Bottom total, matching top total and the check comparing them.
fn write_totals(grid: &mut Grid, col: u32, total_row: u32, expr: Expr, value: f64) {
    let top = CellRef::new(2, col);
    let bottom = CellRef::new(total_row, col);

    grid.set(bottom, Content::Aggregate { expr: expr.clone(), value }, CellStyle::TotalValue);
    grid.set(top, Content::Aggregate { expr, value }, CellStyle::TotalValue);
    grid.set(
        CellRef::new(3, col),
        Content::Check { left: bottom, right: top, holds: true },
        CellStyle::Body,
    );
}

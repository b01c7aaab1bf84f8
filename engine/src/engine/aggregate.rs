//! Aggregation over a materialized table.
//!
//! Only numeric cells count; text inside a summed column is skipped the
//! same way a spreadsheet `SUM` skips it.

use serde::{Deserialize, Serialize};

use super::directive::ColumnPlan;
use super::materialize::MaterializedTable;

/// Total of one `_SUM_` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnTotal {
    /// 0-based output position
    pub position: usize,
    pub label: String,
    pub value: f64,
}

/// Named sum of column totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedTotal {
    pub name: String,
    pub label: String,
    /// 0-based output positions summed
    pub columns: Vec<usize>,
    pub value: f64,
}

/// Every computed figure of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub columns: Vec<ColumnTotal>,
    /// Per retained row, sum across the `_SUM_` columns (two or more only)
    pub row_totals: Option<Vec<f64>>,
    /// Sum of the row totals
    pub grand_total: Option<f64>,
    pub derived: Vec<DerivedTotal>,
    /// Sum of the derived values
    pub derived_total: Option<f64>,
}

impl Totals {
    pub fn column(&self, position: usize) -> Option<&ColumnTotal> {
        self.columns.iter().find(|c| c.position == position)
    }
}

/// Sum of the numeric cells at `position`.
pub fn column_total(table: &MaterializedTable, position: usize) -> f64 {
    table.column(position).filter_map(|c| c.as_number()).sum()
}

/// Compute all totals for a filtered table.
pub fn compute_totals(table: &MaterializedTable, plan: &ColumnPlan) -> Totals {
    let sum_columns = plan.sum_columns();

    let columns: Vec<ColumnTotal> = sum_columns
        .iter()
        .map(|&position| ColumnTotal {
            position,
            label: plan.columns[position].label.clone(),
            value: column_total(table, position),
        })
        .collect();

    let row_totals = (sum_columns.len() > 1).then(|| {
        table
            .rows
            .iter()
            .map(|row| {
                sum_columns
                    .iter()
                    .filter_map(|&p| row.get(p).and_then(|c| c.as_number()))
                    .sum()
            })
            .collect::<Vec<f64>>()
    });
    let grand_total = row_totals.as_ref().map(|t| t.iter().sum());

    let derived: Vec<DerivedTotal> = plan
        .derived
        .iter()
        .map(|d| DerivedTotal {
            name: d.name.clone(),
            label: d.label().to_string(),
            columns: d.columns.clone(),
            value: d
                .columns
                .iter()
                .filter_map(|&p| columns.iter().find(|c| c.position == p))
                .map(|c| c.value)
                .sum(),
        })
        .collect();
    let derived_total = (!derived.is_empty()).then(|| derived.iter().map(|d| d.value).sum());

    Totals {
        columns,
        row_totals,
        grand_total,
        derived,
        derived_total,
    }
}

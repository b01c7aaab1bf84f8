//! Table materialization: copy planned columns out of the source table and
//! drop filtered rows.
//!
//! Runs in two passes. Pass 1 copies every cell and records, per row,
//! whether a `_NZ_` column rejected it and the running `_ANZ_` magnitude.
//! Pass 2 removes the rejected rows, highest row first, so lower row
//! positions stay valid while deleting.

use serde::Serialize;

use super::directive::{ColumnFilter, ColumnPlan};
use crate::error::{EngineError, EngineResult};
use crate::models::{CellValue, SourceTable};

/// Planned columns with filtered rows removed; no totals yet.
#[derive(Debug, Clone, Serialize)]
pub struct MaterializedTable {
    pub report: String,
    pub labels: Vec<String>,
    /// Retained rows, one cell per planned column
    pub rows: Vec<Vec<CellValue>>,
    /// 0-based source data row each retained row came from
    pub source_rows: Vec<usize>,
    /// Rows dropped by `_NZ_` and `_ANZ_` together
    pub removed: usize,
}

impl MaterializedTable {
    /// Rows surviving all filters.
    pub fn headcount(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, position: usize) -> impl Iterator<Item = &CellValue> + '_ {
        self.rows.iter().filter_map(move |r| r.get(position))
    }
}

/// Per-row filter state gathered while copying.
#[derive(Debug, Default)]
struct RowFilters {
    non_zero_rejected: Vec<bool>,
    any_non_zero_sum: Vec<f64>,
}

impl RowFilters {
    fn new(rows: usize) -> Self {
        Self {
            non_zero_rejected: vec![false; rows],
            any_non_zero_sum: vec![0.0; rows],
        }
    }

    /// Rows to delete, sorted descending.
    fn rejected_rows(&self, any_non_zero_active: bool) -> Vec<usize> {
        let mut rows: Vec<usize> = (0..self.non_zero_rejected.len())
            .filter(|&r| {
                self.non_zero_rejected[r]
                    || (any_non_zero_active && self.any_non_zero_sum[r] == 0.0)
            })
            .collect();
        rows.sort_unstable_by(|a, b| b.cmp(a));
        rows
    }
}

/// Build the filtered table for one plan.
pub fn materialize(source: &SourceTable, plan: &ColumnPlan) -> EngineResult<MaterializedTable> {
    let row_count = source.row_count();
    let mut rows: Vec<Vec<CellValue>> = vec![Vec::with_capacity(plan.columns.len()); row_count];
    let mut filters = RowFilters::new(row_count);

    // Pass 1: copy cells, gather filter decisions
    for column in &plan.columns {
        if column.source_index >= source.width() {
            return Err(EngineError::ColumnOutOfRange {
                report: plan.report.clone(),
                index: column.source_index,
                width: source.width(),
            });
        }

        for (r, source_row) in source.rows().iter().enumerate() {
            let value = &source_row[column.source_index];

            match column.filter {
                ColumnFilter::NonZero if value.is_zero_or_blank() => {
                    filters.non_zero_rejected[r] = true;
                }
                ColumnFilter::AnyNonZero => {
                    filters.any_non_zero_sum[r] += value.magnitude();
                }
                _ => {}
            }

            // Summed columns need a number in every row
            let value = if column.summed && value.is_blank() {
                CellValue::Number(0.0)
            } else {
                value.clone()
            };
            rows[r].push(value);
        }
    }

    // Pass 2: delete rejected rows from the bottom up
    let any_non_zero_active = plan
        .columns
        .iter()
        .any(|c| c.filter == ColumnFilter::AnyNonZero);
    let rejected = filters.rejected_rows(any_non_zero_active);

    let mut source_rows: Vec<usize> = (0..row_count).collect();
    for &r in &rejected {
        rows.remove(r);
        source_rows.remove(r);
    }

    Ok(MaterializedTable {
        report: plan.report.clone(),
        labels: plan.columns.iter().map(|c| c.label.clone()).collect(),
        rows,
        source_rows,
        removed: rejected.len(),
    })
}

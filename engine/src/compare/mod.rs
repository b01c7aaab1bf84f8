//! Compare two output documents tab by tab.
//!
//! Cells are compared by what a reader sees: the evaluated value (a total
//! and a literal of the same amount are equal) and the cell style.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

use crate::engine::grid::{approx_eq, Cell, CellRef, CellStyle, Content};
use crate::engine::layout::DerivedTable;
use crate::sink::OutputDocument;

/// First thing found to differ.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Difference {
    /// The two documents do not hold the same reports
    ReportSets {
        only_left: Vec<String>,
        only_right: Vec<String>,
    },
    Dimensions {
        report: String,
        left: (u32, u32),
        right: (u32, u32),
    },
    Value {
        report: String,
        at: CellRef,
        left: String,
        right: String,
    },
    Style {
        report: String,
        at: CellRef,
        left: CellStyle,
        right: CellStyle,
    },
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difference::ReportSets { only_left, only_right } => write!(
                f,
                "Report names differ. Only in left: [{}]. Only in right: [{}]",
                only_left.join(", "),
                only_right.join(", ")
            ),
            Difference::Dimensions { report, left, right } => write!(
                f,
                "'{}': size {}x{} != {}x{}",
                report, left.0, left.1, right.0, right.1
            ),
            Difference::Value { report, at, left, right } => {
                write!(f, "'{}': difference at {}: {} != {}", report, at, left, right)
            }
            Difference::Style { report, at, left, right } => {
                write!(f, "'{}': style at {}: {:?} != {:?}", report, at, left, right)
            }
        }
    }
}

/// Outcome of comparing two documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Comparison {
    /// At most one entry per report, or a single report-set entry
    pub differences: Vec<Difference>,
}

impl Comparison {
    pub fn is_identical(&self) -> bool {
        self.differences.is_empty()
    }
}

/// Compare report sets, then each common report.
pub fn compare_documents(left: &OutputDocument, right: &OutputDocument) -> Comparison {
    let left_names: BTreeSet<&str> = left.reports.iter().map(|r| r.name.as_str()).collect();
    let right_names: BTreeSet<&str> = right.reports.iter().map(|r| r.name.as_str()).collect();

    if left_names != right_names {
        return Comparison {
            differences: vec![Difference::ReportSets {
                only_left: left_names.difference(&right_names).map(|s| s.to_string()).collect(),
                only_right: right_names.difference(&left_names).map(|s| s.to_string()).collect(),
            }],
        };
    }

    let differences = left
        .reports
        .iter()
        .filter_map(|l| {
            let r = right.report(&l.name)?;
            compare_tables(l, r)
        })
        .collect();

    Comparison { differences }
}

/// First difference between two tabs, scanning row by row.
pub fn compare_tables(left: &DerivedTable, right: &DerivedTable) -> Option<Difference> {
    let (rows, cols) = left.grid.dimensions();
    if (rows, cols) != right.grid.dimensions() {
        return Some(Difference::Dimensions {
            report: left.name.clone(),
            left: (rows, cols),
            right: right.grid.dimensions(),
        });
    }

    let blank = Cell::default();
    for row in 1..=rows {
        for col in 1..=cols {
            let at = CellRef::new(row, col);
            let l = left.grid.get(at).unwrap_or(&blank);
            let r = right.grid.get(at).unwrap_or(&blank);

            if !same_value(&l.content, &r.content) {
                return Some(Difference::Value {
                    report: left.name.clone(),
                    at,
                    left: l.content.to_string(),
                    right: r.content.to_string(),
                });
            }
            if l.style != r.style {
                return Some(Difference::Style {
                    report: left.name.clone(),
                    at,
                    left: l.style,
                    right: r.style,
                });
            }
        }
    }
    None
}

fn same_value(left: &Content, right: &Content) -> bool {
    match (left.numeric(), right.numeric()) {
        (Some(a), Some(b)) => approx_eq(a, b),
        (None, None) => left.to_string() == right.to_string(),
        _ => false,
    }
}

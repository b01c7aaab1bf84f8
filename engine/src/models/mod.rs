//! Domain models shared by every stage of the engine.
//!
//! - [`CellValue`] - a typed cell (number, text, boolean or blank)
//! - [`SourceTable`] - the payroll sheet: named columns over rectangular rows
//! - [`HeaderIndex`] - exact-match lookup from column name to column position

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{SourceError, SourceResult};

/// Values below this magnitude count as zero.
pub const ZERO_EPSILON: f64 = 1e-12;

// =============================================================================
// Cells
// =============================================================================

/// A single source cell.
///
/// Booleans are kept apart from numbers: they never count as numeric when
/// filtering or summing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum CellValue {
    #[default]
    Blank,
    Number(f64),
    Text(String),
    Bool(bool),
}

impl CellValue {
    /// Infer a typed value from raw delimited text.
    ///
    /// Empty stays blank, a finite number becomes numeric, everything else
    /// is kept verbatim as text.
    pub fn infer(raw: &str) -> Self {
        if raw.is_empty() {
            return CellValue::Blank;
        }
        match raw.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => CellValue::Number(n),
            _ => CellValue::Text(raw.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, CellValue::Blank)
    }

    /// Zero, blank, or whitespace-only text.
    ///
    /// Booleans are never "zero".
    pub fn is_zero_or_blank(&self) -> bool {
        match self {
            CellValue::Blank => true,
            CellValue::Number(n) => n.abs() < ZERO_EPSILON,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Bool(_) => false,
        }
    }

    /// Contribution to an any-non-zero accumulator.
    pub fn magnitude(&self) -> f64 {
        self.as_number().map(f64::abs).unwrap_or(0.0)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(CellValue::Blank)
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Blank => Ok(()),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Bool(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
        }
    }
}

// =============================================================================
// Source Table
// =============================================================================

/// Column name to 0-based column position.
///
/// Names are compared exactly (case and whitespace included). When a name
/// occurs twice the later column wins.
#[derive(Debug, Clone, Default)]
pub struct HeaderIndex {
    positions: HashMap<String, usize>,
}

impl HeaderIndex {
    pub fn new(headers: &[String]) -> Self {
        let positions = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), i))
            .collect();
        Self { positions }
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// The payroll sheet the reports are cut from.
///
/// Row 1 of the original sheet is [`SourceTable::headers`]; every data row
/// has exactly one cell per header.
#[derive(Debug, Clone)]
pub struct SourceTable {
    headers: Vec<String>,
    rows: Vec<Vec<CellValue>>,
    index: HeaderIndex,
}

impl SourceTable {
    /// Build a table, rejecting rows whose width differs from the header.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> SourceResult<Self> {
        if headers.is_empty() {
            return Err(SourceError::NoHeaders);
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != headers.len() {
                return Err(SourceError::RaggedRow {
                    row: i + 2,
                    expected: headers.len(),
                    found: row.len(),
                });
            }
        }
        let index = HeaderIndex::new(&headers);
        Ok(Self { headers, rows, index })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn header_index(&self) -> &HeaderIndex {
        &self.index
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    /// Number of data rows (header excluded).
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Cell at a 0-based data row and column.
    pub fn cell(&self, row: usize, column: usize) -> Option<&CellValue> {
        self.rows.get(row).and_then(|r| r.get(column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_types() {
        assert_eq!(CellValue::infer(""), CellValue::Blank);
        assert_eq!(CellValue::infer("100"), CellValue::Number(100.0));
        assert_eq!(CellValue::infer(" -12.5 "), CellValue::Number(-12.5));
        assert_eq!(CellValue::infer("Alice"), CellValue::Text("Alice".into()));
        assert_eq!(CellValue::infer("  "), CellValue::Text("  ".into()));
        assert_eq!(CellValue::infer("NaN"), CellValue::Text("NaN".into()));
    }

    #[test]
    fn test_zero_or_blank() {
        assert!(CellValue::Blank.is_zero_or_blank());
        assert!(CellValue::Number(0.0).is_zero_or_blank());
        assert!(CellValue::Number(1e-13).is_zero_or_blank());
        assert!(CellValue::Text("   ".into()).is_zero_or_blank());
        assert!(!CellValue::Number(0.01).is_zero_or_blank());
        assert!(!CellValue::Text("x".into()).is_zero_or_blank());
        assert!(!CellValue::Bool(false).is_zero_or_blank());
    }

    #[test]
    fn test_magnitude_ignores_non_numeric() {
        assert_eq!(CellValue::Number(-3.0).magnitude(), 3.0);
        assert_eq!(CellValue::Text("5".into()).magnitude(), 0.0);
        assert_eq!(CellValue::Bool(true).magnitude(), 0.0);
    }

    #[test]
    fn test_header_index_later_duplicate_wins() {
        let headers = vec!["Name".to_string(), "Pay".to_string(), "Pay".to_string()];
        let index = HeaderIndex::new(&headers);
        assert_eq!(index.get("Pay"), Some(2));
        assert_eq!(index.get("pay"), None);
        assert_eq!(index.get("Name "), None);
    }

    #[test]
    fn test_ragged_row_rejected() {
        let result = SourceTable::new(
            vec!["A".into(), "B".into()],
            vec![vec![CellValue::Blank]],
        );
        assert!(matches!(
            result,
            Err(SourceError::RaggedRow { row: 2, expected: 2, found: 1 })
        ));
    }

    #[test]
    fn test_empty_header_rejected() {
        assert!(matches!(
            SourceTable::new(Vec::new(), Vec::new()),
            Err(SourceError::NoHeaders)
        ));
    }
}

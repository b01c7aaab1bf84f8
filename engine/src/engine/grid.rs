//! Output grid: cells, coordinates, styles and recomputable aggregates.
//!
//! Coordinates are 1-based like a spreadsheet (`A1` is row 1, column 1).
//! Aggregate cells keep their expression next to the evaluated value so a
//! sink may write either a live formula or the literal; [`Grid::evaluate`]
//! recomputes any expression from the current cell contents.

use serde::{Deserialize, Serialize};

use crate::models::{CellValue, ZERO_EPSILON};

/// Display format for numeric output cells.
pub const NUMBER_FORMAT: &str = "### ### ### ##0.00";

/// Aggregates nested deeper than this are read from their stored value.
const MAX_EVAL_DEPTH: usize = 64;

// =============================================================================
// Coordinates
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

impl std::fmt::Display for CellRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", column_letter(self.col), self.row)
    }
}

/// `1` -> `A`, `27` -> `AA`.
pub fn column_letter(mut col: u32) -> String {
    let mut letters = Vec::new();
    while col > 0 {
        let rem = ((col - 1) % 26) as u8;
        letters.push((b'A' + rem) as char);
        col = (col - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Inclusive rectangle of cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRange {
    pub start: CellRef,
    pub end: CellRef,
}

impl CellRange {
    pub fn new(start: CellRef, end: CellRef) -> Self {
        Self { start, end }
    }

    pub fn cells(&self) -> impl Iterator<Item = CellRef> {
        let (r0, r1) = (self.start.row.min(self.end.row), self.start.row.max(self.end.row));
        let (c0, c1) = (self.start.col.min(self.end.col), self.start.col.max(self.end.col));
        (r0..=r1).flat_map(move |r| (c0..=c1).map(move |c| CellRef::new(r, c)))
    }
}

impl std::fmt::Display for CellRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

// =============================================================================
// Expressions
// =============================================================================

/// A recomputable aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Expr {
    /// Sum of every numeric cell in a range
    SumRange { range: CellRange },
    /// Sum of a list of cells
    SumCells { cells: Vec<CellRef> },
}

impl Expr {
    pub fn sum_range(start: CellRef, end: CellRef) -> Self {
        Expr::SumRange { range: CellRange::new(start, end) }
    }

    pub fn sum_cells(cells: Vec<CellRef>) -> Self {
        Expr::SumCells { cells }
    }

    /// Spreadsheet formula text.
    pub fn formula(&self) -> String {
        match self {
            Expr::SumRange { range } => format!("=SUM({})", range),
            Expr::SumCells { cells } => {
                let refs: Vec<String> = cells.iter().map(CellRef::to_string).collect();
                format!("=SUM({})", refs.join(","))
            }
        }
    }
}

// =============================================================================
// Cells
// =============================================================================

/// Output cell content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Content {
    #[default]
    Blank,
    Number { value: f64 },
    Text { value: String },
    Bool { value: bool },
    /// Aggregate with its last evaluated value
    Aggregate { expr: Expr, value: f64 },
    /// Asserts two cells hold the same number
    Check { left: CellRef, right: CellRef, holds: bool },
}

impl Content {
    pub fn text(value: impl Into<String>) -> Self {
        Content::Text { value: value.into() }
    }

    pub fn number(value: f64) -> Self {
        Content::Number { value }
    }

    /// Numeric value as a spreadsheet SUM would see it.
    pub fn numeric(&self) -> Option<f64> {
        match self {
            Content::Number { value } | Content::Aggregate { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Content::Blank)
    }

    /// Spreadsheet formula, when the cell holds one.
    pub fn formula(&self) -> Option<String> {
        match self {
            Content::Aggregate { expr, .. } => Some(expr.formula()),
            Content::Check { left, right, .. } => {
                Some(format!("=IF({}={},TRUE,FALSE)", left, right))
            }
            _ => None,
        }
    }
}

impl From<CellValue> for Content {
    fn from(value: CellValue) -> Self {
        match value {
            CellValue::Blank => Content::Blank,
            CellValue::Number(value) => Content::Number { value },
            CellValue::Text(value) => Content::Text { value },
            CellValue::Bool(value) => Content::Bool { value },
        }
    }
}

impl std::fmt::Display for Content {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Content::Blank => Ok(()),
            Content::Number { value } | Content::Aggregate { value, .. } => write!(f, "{}", value),
            Content::Text { value } => f.write_str(value),
            Content::Bool { value } | Content::Check { holds: value, .. } => {
                f.write_str(if *value { "TRUE" } else { "FALSE" })
            }
        }
    }
}

/// Presentation role of a cell, applied by the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum CellStyle {
    /// Large bold report title
    Title,
    /// Bold, filled, wrapped column heading
    ColumnHeader,
    #[default]
    Body,
    /// Body with the number format
    Numeric,
    /// Bold total with a thick bottom border and the number format
    TotalValue,
    /// Bold text
    Label,
    /// Bold text on the fill colour
    FilledLabel,
    /// Fill colour only (the grand total line)
    Fill,
    /// Bold number (row totals, derived values)
    RowTotal,
}

impl CellStyle {
    pub fn is_bold(&self) -> bool {
        !matches!(self, CellStyle::Body | CellStyle::Numeric | CellStyle::Fill)
    }

    pub fn is_filled(&self) -> bool {
        matches!(self, CellStyle::ColumnHeader | CellStyle::FilledLabel | CellStyle::Fill)
    }

    pub fn number_format(&self) -> Option<&'static str> {
        match self {
            CellStyle::Numeric | CellStyle::TotalValue | CellStyle::RowTotal => Some(NUMBER_FORMAT),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Cell {
    pub content: Content,
    pub style: CellStyle,
}

impl Cell {
    pub fn new(content: Content, style: CellStyle) -> Self {
        Self { content, style }
    }
}

// =============================================================================
// Grid
// =============================================================================

/// Row-major grid that grows as cells are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Grid {
    rows: Vec<Vec<Cell>>,
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    /// (rows, columns) actually used.
    pub fn dimensions(&self) -> (u32, u32) {
        let cols = self.rows.iter().map(Vec::len).max().unwrap_or(0);
        (self.rows.len() as u32, cols as u32)
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn get(&self, at: CellRef) -> Option<&Cell> {
        if at.row == 0 || at.col == 0 {
            return None;
        }
        self.rows
            .get(at.row as usize - 1)
            .and_then(|r| r.get(at.col as usize - 1))
    }

    pub fn content(&self, at: CellRef) -> &Content {
        const BLANK: &Content = &Content::Blank;
        self.get(at).map(|c| &c.content).unwrap_or(BLANK)
    }

    /// Write a cell. Row and column are 1-based; zero is ignored.
    pub fn set(&mut self, at: CellRef, content: Content, style: CellStyle) {
        if at.row == 0 || at.col == 0 {
            return;
        }
        let (r, c) = (at.row as usize - 1, at.col as usize - 1);
        if self.rows.len() <= r {
            self.rows.resize_with(r + 1, Vec::new);
        }
        let row = &mut self.rows[r];
        if row.len() <= c {
            row.resize_with(c + 1, Cell::default);
        }
        row[c] = Cell::new(content, style);
    }

    /// Restyle a cell, creating a blank one if needed.
    pub fn set_style(&mut self, at: CellRef, style: CellStyle) {
        let content = self.content(at).clone();
        self.set(at, content, style);
    }

    /// Evaluate an expression against the current contents.
    pub fn evaluate(&self, expr: &Expr) -> f64 {
        self.evaluate_at_depth(expr, 0)
    }

    /// Numeric value of a cell, recomputing aggregates.
    pub fn value_of(&self, at: CellRef) -> Option<f64> {
        self.value_at_depth(at, 0)
    }

    fn evaluate_at_depth(&self, expr: &Expr, depth: usize) -> f64 {
        match expr {
            Expr::SumRange { range } => range
                .cells()
                .filter_map(|at| self.value_at_depth(at, depth + 1))
                .sum(),
            Expr::SumCells { cells } => cells
                .iter()
                .filter_map(|&at| self.value_at_depth(at, depth + 1))
                .sum(),
        }
    }

    fn value_at_depth(&self, at: CellRef, depth: usize) -> Option<f64> {
        match self.content(at) {
            Content::Number { value } => Some(*value),
            Content::Aggregate { value, .. } if depth >= MAX_EVAL_DEPTH => Some(*value),
            Content::Aggregate { expr, .. } => Some(self.evaluate_at_depth(expr, depth)),
            _ => None,
        }
    }

    /// Re-evaluate every aggregate and consistency check in place.
    pub fn recalculate(&mut self) {
        let snapshot = self.clone();
        for row in &mut self.rows {
            for cell in row.iter_mut() {
                match &mut cell.content {
                    Content::Aggregate { expr, value } => {
                        *value = snapshot.evaluate(expr);
                    }
                    Content::Check { left, right, holds } => {
                        *holds = approx_eq(
                            snapshot.value_of(*left).unwrap_or(0.0),
                            snapshot.value_of(*right).unwrap_or(0.0),
                        );
                    }
                    _ => {}
                }
            }
        }
    }

    /// Cells holding consistency checks.
    pub fn checks(&self) -> impl Iterator<Item = (CellRef, bool)> + '_ {
        self.cells().filter_map(|(at, cell)| match cell.content {
            Content::Check { holds, .. } => Some((at, holds)),
            _ => None,
        })
    }

    /// Every stored cell with its coordinate.
    pub fn cells(&self) -> impl Iterator<Item = (CellRef, &Cell)> + '_ {
        self.rows.iter().enumerate().flat_map(|(r, row)| {
            row.iter()
                .enumerate()
                .map(move |(c, cell)| (CellRef::new(r as u32 + 1, c as u32 + 1), cell))
        })
    }
}

/// Equality tolerant to summation order.
pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= ZERO_EPSILON * a.abs().max(b.abs()).max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letter(1), "A");
        assert_eq!(column_letter(26), "Z");
        assert_eq!(column_letter(27), "AA");
        assert_eq!(column_letter(703), "AAA");
        assert_eq!(CellRef::new(12, 3).to_string(), "C12");
    }

    #[test]
    fn test_formulas() {
        let range = Expr::sum_range(CellRef::new(8, 2), CellRef::new(10, 2));
        assert_eq!(range.formula(), "=SUM(B8:B10)");

        let cells = Expr::sum_cells(vec![CellRef::new(8, 2), CellRef::new(8, 4)]);
        assert_eq!(cells.formula(), "=SUM(B8,D8)");

        let check = Content::Check {
            left: CellRef::new(11, 2),
            right: CellRef::new(2, 2),
            holds: true,
        };
        assert_eq!(check.formula().unwrap(), "=IF(B11=B2,TRUE,FALSE)");
    }

    #[test]
    fn test_grid_grows_on_write() {
        let mut grid = Grid::new();
        grid.set(CellRef::new(3, 4), Content::number(1.0), CellStyle::Numeric);
        assert_eq!(grid.dimensions(), (3, 4));
        assert!(grid.content(CellRef::new(1, 1)).is_blank());
        assert!(grid.get(CellRef::new(0, 1)).is_none());
    }

    #[test]
    fn test_evaluate_skips_text_and_nests_aggregates() {
        let mut grid = Grid::new();
        grid.set(CellRef::new(1, 1), Content::number(2.0), CellStyle::Numeric);
        grid.set(CellRef::new(2, 1), Content::text("n/a"), CellStyle::Body);
        grid.set(CellRef::new(3, 1), Content::number(3.5), CellStyle::Numeric);

        let inner = Expr::sum_range(CellRef::new(1, 1), CellRef::new(3, 1));
        grid.set(
            CellRef::new(4, 1),
            Content::Aggregate { expr: inner.clone(), value: 0.0 },
            CellStyle::TotalValue,
        );
        assert_eq!(grid.evaluate(&inner), 5.5);

        let outer = Expr::sum_cells(vec![CellRef::new(4, 1), CellRef::new(1, 1)]);
        assert_eq!(grid.evaluate(&outer), 7.5);
    }

    #[test]
    fn test_recalculate_after_edit() {
        let mut grid = Grid::new();
        grid.set(CellRef::new(1, 1), Content::number(1.0), CellStyle::Numeric);
        let expr = Expr::sum_range(CellRef::new(1, 1), CellRef::new(1, 1));
        grid.set(CellRef::new(2, 1), Content::Aggregate { expr: expr.clone(), value: 1.0 }, CellStyle::TotalValue);
        grid.set(CellRef::new(3, 1), Content::Aggregate { expr, value: 1.0 }, CellStyle::TotalValue);
        grid.set(
            CellRef::new(4, 1),
            Content::Check { left: CellRef::new(2, 1), right: CellRef::new(3, 1), holds: true },
            CellStyle::Body,
        );

        grid.set(CellRef::new(1, 1), Content::number(9.0), CellStyle::Numeric);
        grid.recalculate();

        assert_eq!(grid.content(CellRef::new(2, 1)).numeric(), Some(9.0));
        assert!(grid.checks().all(|(_, holds)| holds));
    }

    #[test]
    fn test_style_flags() {
        assert!(CellStyle::TotalValue.is_bold());
        assert_eq!(CellStyle::TotalValue.number_format(), Some(NUMBER_FORMAT));
        assert!(!CellStyle::Body.is_bold());
        assert!(CellStyle::Fill.is_filled());
        assert_eq!(CellStyle::Label.number_format(), None);
    }
}

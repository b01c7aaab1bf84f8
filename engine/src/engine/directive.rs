//! Directive resolution: report rules -> [`ColumnPlan`].
//!
//! A rule's target label may carry modifier tokens:
//!
//! | Token   | Effect                                                        |
//! |---------|---------------------------------------------------------------|
//! | `_NZ_`  | drop rows where this column is zero or blank                  |
//! | `_ANZ_` | drop rows where every `_ANZ_` column is zero or blank         |
//! | `_SUM_` | total this column at the top and bottom of the tab            |
//!
//! A rule whose source name is wrapped in underscores (`_PAYE_`) is a
//! derived aggregate: its label is a `+`-joined list of columns whose
//! totals are summed into one named value. Only columns resolved *earlier*
//! in the same report and already marked `_SUM_` can be referenced; later
//! columns are ignored.

use serde::{Deserialize, Serialize};

use crate::definition::ColumnRule;
use crate::error::UnsatisfiableReport;
use crate::models::HeaderIndex;

pub const NON_ZERO: &str = "_NZ_";
pub const ANY_NON_ZERO: &str = "_ANZ_";
pub const SUM: &str = "_SUM_";

/// Row filter attached to an output column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnFilter {
    None,
    NonZero,
    AnyNonZero,
}

/// One visible output column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedColumn {
    /// 0-based position in the source table
    pub source_index: usize,
    pub source_name: String,
    /// Header text with modifier tokens removed
    pub label: String,
    pub filter: ColumnFilter,
    pub summed: bool,
}

/// A named sum of other columns' totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedAggregate {
    /// Name as written in the recipe, underscores included
    pub name: String,
    /// 0-based output positions of the referenced SUM columns, in reference order
    pub columns: Vec<usize>,
}

impl DerivedAggregate {
    /// Display label (`_PAYE_` -> `PAYE`).
    pub fn label(&self) -> &str {
        self.name.trim_matches('_')
    }
}

/// Resolved, index-based interpretation of one report's rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnPlan {
    pub report: String,
    pub columns: Vec<PlannedColumn>,
    pub derived: Vec<DerivedAggregate>,
}

impl ColumnPlan {
    /// Output positions filtered with `_NZ_`.
    pub fn non_zero_columns(&self) -> Vec<usize> {
        self.positions(|c| c.filter == ColumnFilter::NonZero)
    }

    /// Output positions filtered with `_ANZ_`.
    pub fn any_non_zero_columns(&self) -> Vec<usize> {
        self.positions(|c| c.filter == ColumnFilter::AnyNonZero)
    }

    /// Output positions totalled with `_SUM_`.
    pub fn sum_columns(&self) -> Vec<usize> {
        self.positions(|c| c.summed)
    }

    pub fn labels(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.label.as_str()).collect()
    }

    fn positions(&self, pred: impl Fn(&PlannedColumn) -> bool) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| pred(c))
            .map(|(i, _)| i)
            .collect()
    }
}

/// `_NAME_` marks a derived-aggregate rule.
pub fn is_derived_name(source: &str) -> bool {
    source.len() > 2 && source.starts_with('_') && source.ends_with('_')
}

/// Resolve one report's rules against the source headers.
///
/// Rules naming a missing column are dropped, unless they carry `_NZ_`:
/// a required filter column that does not exist makes the whole report
/// unsatisfiable.
pub fn resolve(
    report: &str,
    rules: &[ColumnRule],
    headers: &HeaderIndex,
) -> Result<ColumnPlan, UnsatisfiableReport> {
    let mut plan = ColumnPlan {
        report: report.to_string(),
        columns: Vec::new(),
        derived: Vec::new(),
    };

    let wants_any_non_zero = rules.iter().any(|r| r.target.contains(ANY_NON_ZERO));

    for rule in rules {
        let source = rule.source.trim();
        let mut label = rule.target.trim().to_string();

        if is_derived_name(source) {
            add_derived(&mut plan, source, &label);
            continue;
        }

        let Some(source_index) = headers.get(source) else {
            if label.contains(NON_ZERO) {
                return Err(UnsatisfiableReport::MissingRequiredColumn {
                    column: source.to_string(),
                });
            }
            continue;
        };

        // _ANZ_ wins over a _NZ_ on the same column
        let filter = if label.contains(ANY_NON_ZERO) {
            label = strip_token(&strip_token(&label, NON_ZERO), ANY_NON_ZERO);
            ColumnFilter::AnyNonZero
        } else if label.contains(NON_ZERO) {
            label = strip_token(&label, NON_ZERO);
            ColumnFilter::NonZero
        } else {
            ColumnFilter::None
        };

        let summed = label.contains(SUM);
        if summed {
            label = strip_token(&label, SUM);
        }

        plan.columns.push(PlannedColumn {
            source_index,
            source_name: source.to_string(),
            label,
            filter,
            summed,
        });
    }

    if wants_any_non_zero && plan.any_non_zero_columns().is_empty() {
        return Err(UnsatisfiableReport::NoAnyNonZeroColumns);
    }

    plan.derived.retain(|d| !d.columns.is_empty());
    Ok(plan)
}

fn strip_token(label: &str, token: &str) -> String {
    label.replace(token, "").trim().to_string()
}

/// Record the already-resolved SUM columns a derived rule references.
fn add_derived(plan: &mut ColumnPlan, name: &str, expression: &str) {
    let resolved: &ColumnPlan = plan;
    let positions: Vec<usize> = expression
        .split('+')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter_map(|token| find_resolved(resolved, token))
        .filter(|&pos| resolved.columns[pos].summed)
        .collect();

    match plan.derived.iter_mut().find(|d| d.name == name) {
        Some(existing) => existing.columns.extend(positions),
        None => plan.derived.push(DerivedAggregate {
            name: name.to_string(),
            columns: positions,
        }),
    }
}

/// Latest column resolved from `token`, by source name first, then by label.
fn find_resolved(plan: &ColumnPlan, token: &str) -> Option<usize> {
    plan.columns
        .iter()
        .rposition(|c| c.source_name == token)
        .or_else(|| plan.columns.iter().rposition(|c| c.label == token))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> HeaderIndex {
        let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        HeaderIndex::new(&names)
    }

    fn rules(pairs: &[(&str, &str)]) -> Vec<ColumnRule> {
        pairs.iter().map(|(k, v)| ColumnRule::new(*k, *v)).collect()
    }

    #[test]
    fn test_tokens_resolved_and_stripped() {
        let hdr = headers(&["Name", "Dept", "Pay"]);
        let plan = resolve(
            "R",
            &rules(&[("Name", "Employee"), ("Pay", "_NZ__SUM_Pay")]),
            &hdr,
        )
        .unwrap();

        assert_eq!(plan.labels(), vec!["Employee", "Pay"]);
        assert_eq!(plan.columns[1].source_index, 2);
        assert_eq!(plan.non_zero_columns(), vec![1]);
        assert_eq!(plan.sum_columns(), vec![1]);
        assert!(plan.any_non_zero_columns().is_empty());
    }

    #[test]
    fn test_any_non_zero_suppresses_non_zero() {
        let hdr = headers(&["A", "B"]);
        let plan = resolve("R", &rules(&[("A", "_ANZ__NZ_A"), ("B", "_ANZ_ B")]), &hdr).unwrap();

        assert_eq!(plan.any_non_zero_columns(), vec![0, 1]);
        assert!(plan.non_zero_columns().is_empty());
        assert_eq!(plan.labels(), vec!["A", "B"]);
    }

    #[test]
    fn test_missing_plain_column_dropped() {
        let hdr = headers(&["Pay"]);
        let plan = resolve("R", &rules(&[("Missing", "Foo"), ("Pay", "Pay")]), &hdr).unwrap();
        assert_eq!(plan.labels(), vec!["Pay"]);
    }

    #[test]
    fn test_missing_non_zero_column_is_unsatisfiable() {
        let hdr = headers(&["Name", "Dept", "Pay"]);
        let err = resolve("R", &rules(&[("Pay", "Pay"), ("Missing", "_NZ_Foo")]), &hdr).unwrap_err();
        assert_eq!(
            err,
            UnsatisfiableReport::MissingRequiredColumn { column: "Missing".into() }
        );
    }

    #[test]
    fn test_any_non_zero_requested_but_absent() {
        let hdr = headers(&["Pay"]);
        let err = resolve("R", &rules(&[("Pay", "Pay"), ("Gone", "_ANZ_Gone")]), &hdr).unwrap_err();
        assert_eq!(err, UnsatisfiableReport::NoAnyNonZeroColumns);
    }

    #[test]
    fn test_any_non_zero_in_derived_rule_counts() {
        let hdr = headers(&["Pay"]);
        let err = resolve(
            "R",
            &rules(&[("Pay", "_SUM_Pay"), ("_Gross_", "_ANZ_Pay")]),
            &hdr,
        )
        .unwrap_err();
        assert_eq!(err, UnsatisfiableReport::NoAnyNonZeroColumns);
    }

    #[test]
    fn test_derived_aggregate_references_earlier_sum_columns() {
        let hdr = headers(&["Name", "Pay", "Bonus", "Tax"]);
        let plan = resolve(
            "R",
            &rules(&[
                ("Name", "Name"),
                ("Pay", "_SUM_Pay"),
                ("Bonus", "_SUM_Bonus"),
                ("_Gross_", "Bonus + Pay + Name"),
                ("Tax", "_SUM_Tax"),
            ]),
            &hdr,
        )
        .unwrap();

        // Name is not summed, Tax is declared afterwards
        assert_eq!(plan.columns.len(), 4);
        assert_eq!(plan.derived.len(), 1);
        assert_eq!(plan.derived[0].name, "_Gross_");
        assert_eq!(plan.derived[0].label(), "Gross");
        assert_eq!(plan.derived[0].columns, vec![2, 1]);
    }

    #[test]
    fn test_forward_reference_ignored() {
        let hdr = headers(&["Pay"]);
        let plan = resolve("R", &rules(&[("_Early_", "Pay"), ("Pay", "_SUM_Pay")]), &hdr).unwrap();
        assert!(plan.derived.is_empty());
    }

    #[test]
    fn test_derived_by_output_label() {
        let hdr = headers(&["Basic"]);
        let plan = resolve(
            "R",
            &rules(&[("Basic", "_SUM_Basic Pay"), ("_Total Pay_", "Basic Pay")]),
            &hdr,
        )
        .unwrap();
        assert_eq!(plan.derived[0].columns, vec![0]);
    }

    #[test]
    fn test_repeated_derived_name_accumulates() {
        let hdr = headers(&["A", "B"]);
        let plan = resolve(
            "R",
            &rules(&[("A", "_SUM_A"), ("_X_", "A"), ("B", "_SUM_B"), ("_X_", "B")]),
            &hdr,
        )
        .unwrap();
        assert_eq!(plan.derived.len(), 1);
        assert_eq!(plan.derived[0].columns, vec![0, 1]);
    }

    #[test]
    fn test_derived_name_detection() {
        assert!(is_derived_name("_PAYE_"));
        assert!(!is_derived_name("PAYE_"));
        assert!(!is_derived_name("_"));
        assert!(!is_derived_name("__"));
    }
}

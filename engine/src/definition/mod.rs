//! Recipe (definition) file parsing.
//!
//! A recipe is a list of `[Section]` blocks holding `key = value` lines.
//! Each section except [`RESERVED_SECTION`] describes one report: the key is
//! a source column name, the value is the output label with its modifier
//! tokens (`_NZ_`, `_ANZ_`, `_SUM_`).
//!
//! ```text
//! [COMPANIES]
//! 1 = Acme Holdings
//!
//! [Overtime]
//! Name     = Employee
//! Overtime = _NZ__SUM_Overtime
//! ```

use serde::Serialize;
use std::path::Path;

use crate::config::ParseMode;
use crate::error::{DefinitionError, DefinitionResult};

/// Section holding the business-unit lookup list. Never a report.
pub const RESERVED_SECTION: &str = "COMPANIES";

/// One `key = value` line of a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnRule {
    /// Source column name (or `_NAME_` for a derived aggregate)
    pub source: String,
    /// Output label, possibly carrying modifier tokens
    pub target: String,
}

impl ColumnRule {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self { source: source.into(), target: target.into() }
    }
}

/// A named section and its rules, in file order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub name: String,
    pub rules: Vec<ColumnRule>,
}

/// Parsed recipe: sections in the order they first appear.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Definition {
    sections: Vec<Section>,
}

impl Definition {
    /// Parse recipe text.
    ///
    /// Permissive mode drops anything it does not understand; strict mode
    /// reports the first such line.
    pub fn parse(text: &str, mode: ParseMode) -> DefinitionResult<Self> {
        if text.trim().is_empty() {
            return Err(DefinitionError::Empty);
        }

        let mut definition = Definition::default();
        let mut current: Option<usize> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();

            if line.len() >= 2 && line.starts_with('[') && line.ends_with(']') {
                current = Some(definition.open_section(&line[1..line.len() - 1]));
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                if mode == ParseMode::Strict && !is_ignorable(line) {
                    return Err(DefinitionError::Malformed { line: line_no, text: line.to_string() });
                }
                continue;
            };

            let key = key.trim();
            let value = value.trim();

            if key.is_empty() {
                if mode == ParseMode::Strict {
                    return Err(DefinitionError::EmptyKey { line: line_no });
                }
                continue;
            }

            match current {
                Some(section) => definition.sections[section]
                    .rules
                    .push(ColumnRule::new(key, value)),
                None if mode == ParseMode::Strict => {
                    return Err(DefinitionError::OrphanRule { line: line_no, key: key.to_string() });
                }
                None => {}
            }
        }

        Ok(definition)
    }

    /// Read and parse a recipe file.
    pub fn from_file<P: AsRef<Path>>(path: P, mode: ParseMode) -> DefinitionResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| DefinitionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, mode)
    }

    /// A repeated header starts the section over, keeping its first position.
    fn open_section(&mut self, name: &str) -> usize {
        match self.sections.iter().position(|s| s.name == name) {
            Some(pos) => {
                self.sections[pos].rules.clear();
                pos
            }
            None => {
                self.sections.push(Section { name: name.to_string(), rules: Vec::new() });
                self.sections.len() - 1
            }
        }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Report sections, reserved section excluded.
    pub fn reports(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter().filter(|s| s.name != RESERVED_SECTION)
    }

    /// Business units listed in the reserved section.
    pub fn companies(&self) -> Vec<String> {
        self.section(RESERVED_SECTION)
            .map(|s| s.rules.iter().map(|r| r.target.clone()).collect())
            .unwrap_or_default()
    }
}

fn is_comment(line: &str) -> bool {
    line.starts_with('#') || line.starts_with(';')
}

fn is_ignorable(line: &str) -> bool {
    line.is_empty() || is_comment(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const RECIPE: &str = "\
[COMPANIES]
1 = Acme Holdings
2 = Acme Retail

[Overtime]
Name = Employee
Overtime = _NZ__SUM_Overtime
Notes =

[Bonus]
Bonus = _SUM_Bonus
";

    #[test]
    fn test_sections_in_order() {
        let defn = Definition::parse(RECIPE, ParseMode::Permissive).unwrap();
        let names: Vec<&str> = defn.sections().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["COMPANIES", "Overtime", "Bonus"]);

        let overtime = defn.section("Overtime").unwrap();
        assert_eq!(overtime.rules[0], ColumnRule::new("Name", "Employee"));
        assert_eq!(overtime.rules[1], ColumnRule::new("Overtime", "_NZ__SUM_Overtime"));
    }

    #[test]
    fn test_empty_value_kept() {
        let defn = Definition::parse(RECIPE, ParseMode::Permissive).unwrap();
        let overtime = defn.section("Overtime").unwrap();
        assert_eq!(overtime.rules[2], ColumnRule::new("Notes", ""));
    }

    #[test]
    fn test_reports_skip_reserved_section() {
        let defn = Definition::parse(RECIPE, ParseMode::Permissive).unwrap();
        let reports: Vec<&str> = defn.reports().map(|s| s.name.as_str()).collect();
        assert_eq!(reports, vec!["Overtime", "Bonus"]);
        assert_eq!(defn.companies(), vec!["Acme Holdings", "Acme Retail"]);
    }

    #[test]
    fn test_value_split_on_first_equals() {
        let defn = Definition::parse("[R]\nA = x = y", ParseMode::Permissive).unwrap();
        assert_eq!(defn.section("R").unwrap().rules[0], ColumnRule::new("A", "x = y"));
    }

    #[test]
    fn test_permissive_drops_bad_lines() {
        let text = "orphan = 1\n[R]\nno equals here\n = empty key\nPay = Pay";
        let defn = Definition::parse(text, ParseMode::Permissive).unwrap();
        assert_eq!(defn.sections().len(), 1);
        assert_eq!(defn.section("R").unwrap().rules, vec![ColumnRule::new("Pay", "Pay")]);
    }

    #[test]
    fn test_strict_rejects_bad_lines() {
        let err = Definition::parse("[R]\nno equals here", ParseMode::Strict).unwrap_err();
        assert!(matches!(err, DefinitionError::Malformed { line: 2, .. }));

        let err = Definition::parse("orphan = 1\n[R]", ParseMode::Strict).unwrap_err();
        assert!(matches!(err, DefinitionError::OrphanRule { line: 1, .. }));

        let err = Definition::parse("[R]\n = x", ParseMode::Strict).unwrap_err();
        assert!(matches!(err, DefinitionError::EmptyKey { line: 2 }));
    }

    #[test]
    fn test_strict_allows_comments_and_blanks() {
        let text = "# payroll recipe\n\n[R]\n; overtime rules below\nPay = Pay\n";
        let defn = Definition::parse(text, ParseMode::Strict).unwrap();
        assert_eq!(defn.section("R").unwrap().rules.len(), 1);
    }

    #[test]
    fn test_hash_prefixed_column_kept() {
        let text = "[R]\n#Days = _SUM_Days\n; Hours = Hours\nPay = Pay";
        for mode in [ParseMode::Permissive, ParseMode::Strict] {
            let defn = Definition::parse(text, mode).unwrap();
            assert_eq!(
                defn.section("R").unwrap().rules,
                vec![
                    ColumnRule::new("#Days", "_SUM_Days"),
                    ColumnRule::new("; Hours", "Hours"),
                    ColumnRule::new("Pay", "Pay"),
                ]
            );
        }
    }

    #[test]
    fn test_section_name_case_preserved() {
        let defn = Definition::parse("[Monthly Pay]\nPay = Pay", ParseMode::Permissive).unwrap();
        assert!(defn.section("Monthly Pay").is_some());
        assert!(defn.section("MONTHLY PAY").is_none());
    }

    #[test]
    fn test_repeated_section_restarts() {
        let text = "[A]\nx = 1\n[B]\ny = 2\n[A]\nz = 3";
        let defn = Definition::parse(text, ParseMode::Permissive).unwrap();
        let names: Vec<&str> = defn.sections().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(defn.section("A").unwrap().rules, vec![ColumnRule::new("z", "3")]);
    }

    #[test]
    fn test_empty_text_is_error() {
        assert!(matches!(
            Definition::parse("  \n\n", ParseMode::Permissive),
            Err(DefinitionError::Empty)
        ));
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Definition::from_file(dir.path().join("nope.ini"), ParseMode::Permissive).unwrap_err();
        assert!(matches!(err, DefinitionError::Io { .. }));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(RECIPE.as_bytes()).unwrap();

        let defn = Definition::from_file(file.path(), ParseMode::Permissive).unwrap();
        assert_eq!(defn.reports().count(), 2);
    }
}

//! Run configuration.
//!
//! [`RunOptions`] carries everything a front end has to supply: the two
//! input paths, the title context and where to write the result. Defaults
//! can come from the environment (a `.env` file is honoured by the CLI):
//!
//! | Variable                | Meaning                              |
//! |-------------------------|--------------------------------------|
//! | `PAYROLL_TABS_COMPANY`  | business unit printed in each title  |
//! | `PAYROLL_TABS_STRICT`   | `1`/`true` enables strict parsing    |
//! | `PAYROLL_TABS_VERBOSE`  | `1`/`true` shows debug log lines     |

use chrono::{Datelike, Month};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_COMPANY: &str = "PAYROLL_TABS_COMPANY";
pub const ENV_STRICT: &str = "PAYROLL_TABS_STRICT";
pub const ENV_VERBOSE: &str = "PAYROLL_TABS_VERBOSE";

/// How forgiving the recipe parser is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// Silently skip lines that are not sections or rules.
    #[default]
    Permissive,
    /// Fail on the first line that would be skipped.
    Strict,
}

impl ParseMode {
    pub fn from_env() -> Self {
        if env_flag(ENV_STRICT) {
            ParseMode::Strict
        } else {
            ParseMode::Permissive
        }
    }
}

/// Values printed in every report title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportContext {
    pub business_unit: String,
    #[serde(with = "month_abbrev")]
    pub month: Month,
    pub year: i32,
}

impl ReportContext {
    pub fn new(business_unit: impl Into<String>, month: Month, year: i32) -> Self {
        Self { business_unit: business_unit.into(), month, year }
    }

    /// `Acme - Overtime - Mar 2025`
    pub fn title(&self, report: &str) -> String {
        format!(
            "{} - {} - {} {}",
            self.business_unit,
            report,
            month_label(self.month),
            self.year
        )
    }
}

impl Default for ReportContext {
    /// Current month and year, business unit from the environment.
    fn default() -> Self {
        let today = chrono::Local::now().date_naive();
        let month = Month::try_from(today.month() as u8).unwrap_or(Month::January);
        Self {
            business_unit: std::env::var(ENV_COMPANY).unwrap_or_default(),
            month,
            year: today.year(),
        }
    }
}

/// Where generated tabs go.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputOptions {
    /// JSON document path; defaults to `<source stem> Tabs.json` beside the source
    pub json_path: Option<PathBuf>,
    /// Directory receiving one CSV file per emitted report
    pub csv_dir: Option<PathBuf>,
}

/// Everything needed for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOptions {
    pub definition_path: PathBuf,
    pub source_path: PathBuf,
    pub context: ReportContext,
    pub parse_mode: ParseMode,
    pub output: OutputOptions,
}

impl RunOptions {
    pub fn new(definition_path: impl Into<PathBuf>, source_path: impl Into<PathBuf>) -> Self {
        Self {
            definition_path: definition_path.into(),
            source_path: source_path.into(),
            context: ReportContext::default(),
            parse_mode: ParseMode::from_env(),
            output: OutputOptions::default(),
        }
    }

    /// Resolved JSON output path.
    pub fn json_output_path(&self) -> PathBuf {
        self.output
            .json_path
            .clone()
            .unwrap_or_else(|| default_output_path(&self.source_path))
    }
}

/// `/data/March.csv` -> `/data/March Tabs.json`
pub fn default_output_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    source.with_file_name(format!("{} Tabs.json", stem))
}

/// Three-letter month label (`Jan`, `Feb`, ...).
pub fn month_label(month: Month) -> &'static str {
    &month.name()[..3]
}

/// Accepts `Mar`, `march`, `3`.
pub fn parse_month(input: &str) -> Result<Month, String> {
    let input = input.trim();
    if let Ok(n) = input.parse::<u8>() {
        return Month::try_from(n).map_err(|_| format!("invalid month number: {}", n));
    }
    input
        .parse::<Month>()
        .map_err(|_| format!("invalid month: '{}'", input))
}

pub fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

mod month_abbrev {
    use chrono::Month;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(month: &Month, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(super::month_label(*month))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Month, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_month(&raw).map_err(serde::de::Error::custom)
    }
}

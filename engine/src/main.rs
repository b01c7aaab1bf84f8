//! Payroll Tabs CLI - cut report tabs out of a payroll export
//!
//! # Main Commands
//!
//! ```bash
//! payroll-tabs run recipe.ini March.csv --company Acme --month Mar --year 2025
//! payroll-tabs compare "March Tabs.json" "March Tabs (old).json"
//! ```
//!
//! # Inspection Commands
//!
//! ```bash
//! payroll-tabs parse recipe.ini               # Parsed recipe as JSON
//! payroll-tabs plan recipe.ini March.csv      # Column plan per report
//! payroll-tabs companies recipe.ini           # Business units in the recipe
//! ```

use chrono::Month;
use clap::{Parser, Subcommand};
use payroll_tabs::config::{env_flag, parse_month, ENV_VERBOSE};
use payroll_tabs::engine::directive::resolve;
use payroll_tabs::logs::LOG_BROADCASTER;
use payroll_tabs::{
    compare_documents, load_output, parse_table_file_auto, process_files, Definition,
    OutputOptions, ParseMode, ReportContext, RunOptions, RunStatus,
};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "payroll-tabs")]
#[command(about = "Cut filtered, totalled report tabs out of a payroll export", long_about = None)]
struct Cli {
    /// Show debug log lines
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every report of a recipe against a source table
    Run {
        /// Recipe (definition) file
        definition: PathBuf,

        /// Source table (delimited text export)
        source: PathBuf,

        /// Business unit shown in titles (default: PAYROLL_TABS_COMPANY)
        #[arg(short, long)]
        company: Option<String>,

        /// Month shown in titles: `Mar`, `March` or `3` (default: current month)
        #[arg(short, long, value_parser = parse_month)]
        month: Option<Month>,

        /// Year shown in titles (default: current year)
        #[arg(short, long)]
        year: Option<i32>,

        /// Output JSON file (default: `<source> Tabs.json` next to the source)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write one CSV per tab into this directory
        #[arg(long)]
        csv_dir: Option<PathBuf>,

        /// Fail on malformed recipe lines instead of skipping them
        #[arg(long)]
        strict: bool,
    },

    /// Parse a recipe and print it as JSON
    Parse {
        /// Recipe (definition) file
        definition: PathBuf,

        /// Fail on malformed recipe lines instead of skipping them
        #[arg(long)]
        strict: bool,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show how each report resolves against a source table's headers
    Plan {
        /// Recipe (definition) file
        definition: PathBuf,

        /// Source table
        source: PathBuf,

        /// Only this report
        #[arg(short, long)]
        report: Option<String>,
    },

    /// List the business units of a recipe
    Companies {
        /// Recipe (definition) file
        definition: PathBuf,
    },

    /// Compare two output documents
    Compare {
        left: PathBuf,
        right: PathBuf,
    },
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    LOG_BROADCASTER.set_verbose(cli.verbose || env_flag(ENV_VERBOSE));

    let result = match cli.command {
        Commands::Run {
            definition,
            source,
            company,
            month,
            year,
            output,
            csv_dir,
            strict,
        } => {
            let mut options = RunOptions::new(definition, source);
            options.context = context(company, month, year);
            if strict {
                options.parse_mode = ParseMode::Strict;
            }
            options.output = OutputOptions { json_path: output, csv_dir };
            cmd_run(&options)
        }

        Commands::Parse {
            definition,
            strict,
            output,
        } => cmd_parse(&definition, parse_mode(strict), output.as_deref()),

        Commands::Plan {
            definition,
            source,
            report,
        } => cmd_plan(&definition, &source, report.as_deref()),

        Commands::Companies { definition } => cmd_companies(&definition),

        Commands::Compare { left, right } => cmd_compare(&left, &right),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn context(company: Option<String>, month: Option<Month>, year: Option<i32>) -> ReportContext {
    let mut ctx = ReportContext::default();
    if let Some(company) = company {
        ctx.business_unit = company;
    }
    if let Some(month) = month {
        ctx.month = month;
    }
    if let Some(year) = year {
        ctx.year = year;
    }
    ctx
}

fn parse_mode(strict: bool) -> ParseMode {
    if strict {
        ParseMode::Strict
    } else {
        ParseMode::from_env()
    }
}

fn cmd_run(options: &RunOptions) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", options.source_path.display());

    let result = process_files(options);
    let status = RunStatus::from(&result);

    match result {
        Ok(summary) => {
            for diagnostic in &summary.report.diagnostics {
                eprintln!("   ⚠️  {}", diagnostic);
            }
            eprintln!("💾 Tabs written to: {}", summary.json_path.display());
            for file in &summary.csv_files {
                eprintln!("   {}", file.display());
            }
            println!("{}", status);
            Ok(())
        }
        Err(_) => {
            println!("{}", status);
            std::process::exit(1);
        }
    }
}

fn cmd_parse(
    definition: &Path,
    mode: ParseMode,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing recipe: {}", definition.display());

    let parsed = Definition::from_file(definition, mode)?;
    eprintln!(
        "✅ {} reports, {} companies",
        parsed.reports().count(),
        parsed.companies().len()
    );

    let json = serde_json::to_string_pretty(&parsed)?;
    write_output(&json, output)?;
    Ok(())
}

fn cmd_plan(
    definition: &Path,
    source: &Path,
    only: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let parsed = Definition::from_file(definition, ParseMode::from_env())?;
    let table = parse_table_file_auto(source)?;

    eprintln!("📄 Source: {}", source.display());
    eprintln!("   Encoding: {}", table.encoding);
    eprintln!("   Delimiter: '{}'", format_delimiter(table.delimiter));
    eprintln!("   Columns: {}", table.table.headers().join(", "));

    let plans: Vec<_> = parsed
        .reports()
        .filter(|s| only.map_or(true, |name| s.name == name))
        .map(|s| match resolve(&s.name, &s.rules, table.table.header_index()) {
            Ok(plan) => json!({ "report": s.name, "plan": plan }),
            Err(reason) => json!({ "report": s.name, "unselectable": reason.to_string() }),
        })
        .collect();

    if let Some(name) = only {
        if plans.is_empty() {
            return Err(format!("Report not found: {}", name).into());
        }
    }

    println!("{}", serde_json::to_string_pretty(&plans)?);
    Ok(())
}

fn cmd_companies(definition: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let parsed = Definition::from_file(definition, ParseMode::from_env())?;
    let companies = parsed.companies();

    if companies.is_empty() {
        eprintln!("📋 No companies listed.");
        return Ok(());
    }
    for company in companies {
        println!("{}", company);
    }
    Ok(())
}

fn cmd_compare(left: &Path, right: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let comparison = compare_documents(&load_output(left)?, &load_output(right)?);

    if comparison.is_identical() {
        println!("✅ Files are identical in content and formatting.");
        return Ok(());
    }

    for difference in &comparison.differences {
        println!("❌ {}", difference);
    }
    std::process::exit(1);
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}

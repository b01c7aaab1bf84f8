//! Source table reader with encoding and delimiter auto-detection.
//!
//! Turns a delimited export of the payroll sheet into a typed
//! [`SourceTable`]. The first record is the header row.

use std::path::Path;

use crate::error::{SourceError, SourceResult};
use crate::models::{CellValue, SourceTable};

/// Result of reading a source table, with detection metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub table: SourceTable,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> SourceResult<String> {
    let decoded = match encoding.to_lowercase().as_str() {
        // Latin-1 labels map to windows-1252
        "iso-8859-1" | "latin-1" | "latin1" | "windows-1252" | "cp1252" => {
            encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned()
        }
        _ => match String::from_utf8(bytes.to_vec()) {
            Ok(s) => s,
            Err(_) => String::from_utf8_lossy(bytes).into_owned(),
        },
    };

    // A BOM would otherwise become part of the first header name
    Ok(decoded.trim_start_matches('\u{feff}').to_string())
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [';', ',', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse delimited text into a source table with an explicit delimiter.
///
/// Short rows are padded with blanks. Surplus cells are tolerated only when
/// they are empty (trailing delimiters).
///
/// # Example
/// ```ignore
/// use payroll_tabs::parser::parse_table;
///
/// let table = parse_table("Name,Pay\nAlice,100", ',').unwrap();
/// assert_eq!(table.headers(), &["Name", "Pay"]);
/// ```
pub fn parse_table(content: &str, delimiter: char) -> SourceResult<SourceTable> {
    if content.trim().is_empty() {
        return Err(SourceError::EmptyFile);
    }

    let delimiter = u8::try_from(delimiter).map_err(|_| SourceError::Parse {
        line: 1,
        message: format!("unsupported delimiter '{}'", delimiter),
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = reader.records();

    let header_record = records
        .next()
        .ok_or(SourceError::EmptyFile)?
        .map_err(|e| parse_error(1, e))?;
    let headers: Vec<String> = header_record.iter().map(str::to_string).collect();

    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(SourceError::NoHeaders);
    }

    let width = headers.len();
    let mut rows = Vec::new();

    for (idx, record) in records.enumerate() {
        let line = idx + 2; // +1 for 0-index, +1 for header
        let record = record.map_err(|e| parse_error(line, e))?;

        let surplus_filled = record.iter().skip(width).any(|v| !v.is_empty());
        if surplus_filled {
            return Err(SourceError::RaggedRow {
                row: line,
                expected: width,
                found: record.len(),
            });
        }

        let mut row: Vec<CellValue> = record.iter().take(width).map(CellValue::infer).collect();
        row.resize(width, CellValue::Blank);
        rows.push(row);
    }

    SourceTable::new(headers, rows)
}

fn parse_error(line: usize, err: csv::Error) -> SourceError {
    let line = err
        .position()
        .map(|p| p.line() as usize)
        .unwrap_or(line);
    SourceError::Parse { line, message: err.to_string() }
}

/// Read a source table file with auto-detection of encoding and delimiter.
pub fn parse_table_file_auto<P: AsRef<Path>>(path: P) -> SourceResult<ParseResult> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_bytes_auto(&bytes)
}

/// Parse source table bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> SourceResult<ParseResult> {
    if bytes.is_empty() {
        return Err(SourceError::EmptyFile);
    }

    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let delimiter = detect_delimiter(&content);
    let table = parse_table(&content, delimiter)?;

    Ok(ParseResult { table, encoding, delimiter })
}

// Primitives shared by all the readers.

use std::path::Path;

use chrono::NaiveDate;

use crate::pipeline::*;

const MAX_SAMPLES: usize = 5;

/// The rows of one file that could not be read.
///
/// Bad rows are skipped and reported once, with a few samples, instead of
/// stopping the whole run.
#[derive(Debug, Clone)]
pub struct RowIssues {
    source: String,
    count: usize,
    samples: Vec<String>,
}

impl RowIssues {
    pub fn new(path: &Path) -> RowIssues {
        RowIssues {
            source: path.display().to_string(),
            count: 0,
            samples: Vec::new(),
        }
    }

    pub fn record(&mut self, lineno: usize, message: String) {
        debug!("{}:{}: {}", self.source, lineno, message);
        self.count += 1;
        if self.samples.len() < MAX_SAMPLES {
            self.samples.push(format!("line {}: {}", lineno, message));
        }
    }

    /// Logs the issues, and fails if they left nothing to work with.
    pub fn finish(&self, kept: usize) -> PipelineResult<()> {
        if self.count == 0 {
            return Ok(());
        }
        warn!(
            "{}: skipped {} rows that could not be read, for example:",
            self.source, self.count
        );
        for s in self.samples.iter() {
            warn!("  {}", s);
        }
        if kept == 0 {
            return NoSurvivingRowsSnafu {
                path: self.source.clone(),
            }
            .fail();
        }
        Ok(())
    }
}

/// Empty cells are missing values.
pub fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

/// Accepts ISO dates and the US format of the election authority.
pub fn parse_date(s: &str) -> Result<Option<NaiveDate>, String> {
    let t = s.trim();
    if t.is_empty() {
        return Ok(None);
    }
    // Timestamps: only the date part is kept.
    let day = t.split([' ', 'T']).next().unwrap_or(t);
    for fmt in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(day, fmt) {
            return Ok(Some(d));
        }
    }
    Err(format!("invalid date {:?}", s))
}

pub fn format_date(d: &Option<NaiveDate>) -> String {
    d.map(|x| x.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

pub fn parse_bool(s: &str) -> Result<bool, String> {
    match s.trim().to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Ok(true),
        "false" | "f" | "no" | "n" | "0" => Ok(false),
        _ => Err(format!("invalid boolean {:?}", s)),
    }
}

/// Splits a comma separated cell.
pub fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim())
        .filter(|x| !x.is_empty())
        .map(|x| x.to_string())
        .collect()
}

/// Extracts the code of a single member district (like "1A01") from a cell
/// and returns the canonical id.
///
/// The code is the last word of the cell, with words separated by spaces,
/// `_`, `-` or `/`: a ward digit, a commission letter and a two digit seat
/// number. This accepts "1A01", "SMD 1A01", "smd_1A01" and contest names such
/// as "ADVISORY NEIGHBORHOOD COMMISSIONER 1A01", but not "WARD X1A01".
pub fn smd_code(cell: &str, prefix: &str) -> Option<String> {
    let word = cell
        .split(|c: char| c.is_whitespace() || matches!(c, '_' | '-' | '/'))
        .filter(|w| !w.is_empty())
        .last()?;
    let code: Vec<char> = word.chars().map(|c| c.to_ascii_uppercase()).collect();
    let valid = code.len() == 4
        && code[0].is_ascii_digit()
        && code[1].is_ascii_alphabetic()
        && code[2].is_ascii_digit()
        && code[3].is_ascii_digit();
    if !valid {
        return None;
    }
    Some(format!("{}{}", prefix, code.iter().collect::<String>()))
}

pub const DEFAULT_SMD_PREFIX: &str = "smd_";

/// The index of the first header matching one of the aliases, ignoring case
/// and surrounding spaces.
pub fn find_column(headers: &[String], aliases: &[String]) -> Option<usize> {
    aliases.iter().find_map(|alias| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(alias.trim()))
    })
}

/// Like [find_column], for a column that must be present.
pub fn require_column(
    path: &Path,
    headers: &[String],
    column: &str,
    aliases: &[String],
) -> PipelineResult<usize> {
    find_column(headers, aliases).context(MissingColumnSnafu {
        path: path.display().to_string(),
        column,
        tried: aliases.to_vec(),
    })
}

pub fn optional_column(headers: &[String], aliases: &Option<Vec<String>>) -> Option<usize> {
    aliases.as_ref().and_then(|a| find_column(headers, a))
}

/// The cell at an optional column index, or "" when the row is too short.
pub fn cell<'a>(row: &'a [String], idx: Option<usize>) -> &'a str {
    idx.and_then(|i| row.get(i)).map(|s| s.as_str()).unwrap_or("")
}

/// All the rows of a CSV file, including the header. Rows may have different
/// lengths.
pub fn read_csv_rows(path: &Path) -> PipelineResult<Vec<Vec<String>>> {
    let p = path.display().to_string();
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path: p.clone() })?;
    let mut res: Vec<Vec<String>> = Vec::new();
    for line_r in rdr.into_records() {
        let line = line_r.context(CsvOpenSnafu { path: p.clone() })?;
        res.push(line.iter().map(|s| s.to_string()).collect());
    }
    Ok(res)
}

pub fn simplify_file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

// Readers for the candidate exports of the election authority.
//
// The exports come as CSV or Excel files whose column names change from one
// release to the next. The columns are found through the aliases of the
// configuration, then each row is mapped to a SourceRecord.

use std::path::Path;

use calamine::{open_workbook, DataType, Reader, Xlsx};
use chrono::{Duration, NaiveDate};

use crate::pipeline::config_reader::ExportSource;
use crate::pipeline::io_common::*;
use crate::pipeline::*;

pub fn read_export(path: &Path, source: &ExportSource) -> PipelineResult<Vec<SourceRecord>> {
    let rows = match source.provider.to_lowercase().as_str() {
        "csv" => read_csv_rows(path)?,
        "xlsx" | "excel" => read_excel_rows(path, &source.excel_worksheet_name)?,
        _ => {
            return UnknownProviderSnafu {
                provider: source.provider.clone(),
                path: path.display().to_string(),
            }
            .fail()
        }
    };
    let res = rows_to_records(path, source, &rows)?;
    info!(
        "read_export: {}: {} candidate records",
        simplify_file_name(path),
        res.len()
    );
    Ok(res)
}

fn read_excel_rows(path: &Path, sheet: &Option<String>) -> PipelineResult<Vec<Vec<String>>> {
    let p = path.display().to_string();
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path: p.clone() })?;
    let wrange_o = match sheet {
        Some(name) => workbook.worksheet_range(name),
        None => workbook.worksheet_range_at(0),
    };
    let wrange = wrange_o
        .context(MissingWorksheetSnafu {
            path: p.clone(),
            sheet: sheet.clone().unwrap_or_else(|| "(first)".to_string()),
        })?
        .context(OpeningExcelSnafu { path: p })?;
    let res: Vec<Vec<String>> = wrange
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();
    debug!("read_excel_rows: {} rows", res.len());
    Ok(res)
}

// Excel stores dates as days since 1899-12-30.
fn excel_date(serial: f64) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_signed(Duration::days(serial.floor() as i64))
}

fn cell_to_string(cell: &DataType) -> String {
    match cell {
        DataType::String(s) => s.clone(),
        DataType::Int(i) => i.to_string(),
        DataType::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        DataType::Float(f) => f.to_string(),
        DataType::Bool(b) => b.to_string(),
        DataType::DateTime(f) => excel_date(*f)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| f.to_string()),
        DataType::Empty => String::new(),
        other => format!("{:?}", other),
    }
}

fn rows_to_records(
    path: &Path,
    source: &ExportSource,
    rows: &[Vec<String>],
) -> PipelineResult<Vec<SourceRecord>> {
    let header = match rows.first() {
        Some(h) => h,
        None => {
            warn!("read_export: {} is empty", path.display());
            return Ok(Vec::new());
        }
    };
    debug!("read_export: header: {:?}", header);
    let cols = &source.columns;
    let smd_idx = require_column(path, header, "smdId", &cols.smd_id)?;
    let name_idx = require_column(path, header, "candidateName", &cols.candidate_name)?;
    let pickup_idx = optional_column(header, &cols.pickup_date);
    let filed_idx = optional_column(header, &cols.filed_date);
    let status_idx = optional_column(header, &cols.candidate_status);
    let prefix = source.smd_prefix.as_deref().unwrap_or(DEFAULT_SMD_PREFIX);

    let mut issues = RowIssues::new(path);
    let mut res: Vec<SourceRecord> = Vec::new();
    for (idx, row) in rows.iter().enumerate().skip(1) {
        let lineno = idx + 1;
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        let smd_cell = cell(row, Some(smd_idx));
        let smd_id = match smd_code(smd_cell, prefix) {
            Some(x) => x,
            None => {
                issues.record(lineno, format!("invalid district {:?}", smd_cell));
                continue;
            }
        };
        let candidate_name = match non_empty(cell(row, Some(name_idx))) {
            Some(x) => x,
            None => {
                issues.record(lineno, "empty candidate name".to_string());
                continue;
            }
        };
        let dates = parse_date(cell(row, pickup_idx))
            .and_then(|p| parse_date(cell(row, filed_idx)).map(|f| (p, f)));
        let (pickup_date, filed_date) = match dates {
            Ok(x) => x,
            Err(msg) => {
                issues.record(lineno, msg);
                continue;
            }
        };
        res.push(SourceRecord {
            smd_id,
            candidate_name,
            pickup_date,
            filed_date,
            candidate_status: non_empty(cell(row, status_idx)),
        });
    }
    issues.finish(res.len())?;
    Ok(res)
}

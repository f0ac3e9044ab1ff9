//! Whole-file parsing: sheets in, normalized transaction records out.
//!
//! Dispatches on file extension (xlsx family via calamine, csv via the
//! csv crate), feeds every sheet through the structural scanner, and
//! turns completed account sections into `TransactionRecord`s with
//! computed running balances.

use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use log::{debug, info, warn};
use rust_decimal::Decimal;

use crate::account_code::decompose;
use crate::balance::running_balances;
use crate::error::{LedgerError, Result};
use crate::models::{Cell, IngestWarning, TransactionRecord, WarningKind};
use crate::scanner::{RowData, ScanEvent, SheetScanner};

pub const XLSX_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "xlsb"];

/// Parse output for one file. `batch_id` on the records is left empty;
/// the orchestrator stamps it before records leave the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFile {
    pub filename: String,
    pub records: Vec<TransactionRecord>,
    pub warnings: Vec<IngestWarning>,
}

/// One contiguous spreadsheet block belonging to a single account code.
/// Transaction rows are held in row order; the opening balance is set at
/// most once, and rows seen before the balance marker are kept, not
/// dropped.
struct AccountSection {
    code: String,
    name: String,
    opening: Option<Decimal>,
    rows: Vec<RowData>,
}

/// Parses one spreadsheet file from raw bytes. Pure function of its
/// input: the same bytes always yield the same records.
pub fn parse_file(filename: &str, bytes: &[u8]) -> Result<ParsedFile> {
    let ext = Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let sheets: Vec<Vec<Vec<Cell>>> = if XLSX_EXTENSIONS.contains(&ext.as_str()) {
        workbook_sheets(bytes)?
    } else if ext == "csv" {
        vec![csv_rows(bytes)?]
    } else {
        return Err(LedgerError::UnsupportedExtension(filename.to_string()));
    };

    let mut out = ParsedFile {
        filename: filename.to_string(),
        records: Vec::new(),
        warnings: Vec::new(),
    };
    let mut sections_found = 0usize;

    for rows in &sheets {
        scan_sheet(rows, &mut out, &mut sections_found);
    }

    if sections_found == 0 {
        warn!("{filename}: no account sections found");
        return Err(LedgerError::UnrecognizedFormat(filename.to_string()));
    }

    info!(
        "{filename}: {} record(s) from {} section(s), {} warning(s)",
        out.records.len(),
        sections_found,
        out.warnings.len()
    );
    Ok(out)
}

fn workbook_sheets(bytes: &[u8]) -> Result<Vec<Vec<Vec<Cell>>>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let names = workbook.sheet_names().to_owned();
    let mut sheets = Vec::with_capacity(names.len());
    for name in &names {
        let range = workbook.worksheet_range(name)?;
        let rows = range
            .rows()
            .map(|row| row.iter().map(cell_from_data).collect())
            .collect();
        sheets.push(rows);
    }
    Ok(sheets)
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(_) => Cell::Empty,
    }
}

fn csv_rows(bytes: &[u8]) -> Result<Vec<Vec<Cell>>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);
    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.trim().is_empty() {
                        Cell::Empty
                    } else {
                        Cell::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }
    Ok(rows)
}

fn scan_sheet(rows: &[Vec<Cell>], out: &mut ParsedFile, sections_found: &mut usize) {
    let mut scanner = SheetScanner::new(rows);
    let mut current: Option<AccountSection> = None;

    while let Some(event) = scanner.next() {
        match event {
            ScanEvent::SectionStart { code, name } => {
                *sections_found += 1;
                current = Some(AccountSection {
                    code,
                    name,
                    opening: None,
                    rows: Vec::new(),
                });
            }
            ScanEvent::OpeningBalance(amount) => {
                if let Some(section) = current.as_mut() {
                    // First marker wins; duplicates are decorative.
                    if section.opening.is_none() {
                        section.opening = Some(amount);
                    }
                }
            }
            ScanEvent::Transaction(row) => {
                if let Some(section) = current.as_mut() {
                    section.rows.push(row);
                }
            }
            ScanEvent::SectionEnd => {
                if let Some(section) = current.take() {
                    finish_section(section, out);
                }
            }
        }
    }

    for kind in scanner.take_warnings() {
        out.warnings.push(IngestWarning {
            file: out.filename.clone(),
            kind,
        });
    }
}

/// Runs the balance calculator over a completed section and emits one
/// record per transaction row. A malformed account code skips the whole
/// section with a warning so one corrupt block cannot sink the file.
fn finish_section(section: AccountSection, out: &mut ParsedFile) {
    let components = match decompose(&section.code) {
        Ok(c) => c,
        Err(err) => {
            debug!("{}: skipping section: {err}", out.filename);
            out.warnings.push(IngestWarning {
                file: out.filename.clone(),
                kind: WarningKind::MalformedAccountCode {
                    code: section.code.trim().to_string(),
                },
            });
            return;
        }
    };

    let opening = match section.opening {
        Some(amount) => amount,
        None => {
            out.warnings.push(IngestWarning {
                file: out.filename.clone(),
                kind: WarningKind::MissingOpeningBalance {
                    account_code: section.code.trim().to_string(),
                },
            });
            Decimal::ZERO
        }
    };

    let movements: Vec<(Decimal, Decimal)> =
        section.rows.iter().map(|r| (r.charge, r.credit)).collect();
    let closings = running_balances(opening, &movements);

    let code = components.concat();
    for (i, row) in section.rows.into_iter().enumerate() {
        let row_opening = if i == 0 { opening } else { closings[i - 1] };
        out.records.push(TransactionRecord {
            batch_id: String::new(),
            source_file: out.filename.clone(),
            account_code: code.clone(),
            account_name: section.name.clone(),
            components: components.clone(),
            date: row.date,
            policy: row.policy,
            payment_order: row.payment_order,
            payee: row.payee,
            description: row.description,
            opening_balance: row_opening,
            charge: row.charge,
            credit: row.credit,
            closing_balance: closings[i],
        });
    }
}

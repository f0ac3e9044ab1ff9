//! Single-pass structural scan of one sheet.
//!
//! The scanner walks raw rows in physical order and yields typed events:
//! section starts ("CUENTA CONTABLE:" marker rows), opening balances
//! ("SALDO INICIAL CUENTA" rows), transaction rows, and section ends.
//! Rows that match no pattern are skipped; exported ledgers are full of
//! blank and decorative rows and none of them should be fatal.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::columns::{is_header_row, normalize_label, ColumnMap, MonetaryField};
use crate::models::{Cell, WarningKind};

const SECTION_MARKER: &str = "cuenta contable";
const OPENING_MARKER: &str = "saldo inicial cuenta";
const SKIP_MARKERS: &[&str] = &["saldo acumulado", "saldo final cuenta", "total"];

/// Money cells are stored to two decimal places.
pub const MONEY_SCALE: u32 = 2;

// ---------------------------------------------------------------------------
// Value parsing helpers
// ---------------------------------------------------------------------------

/// Parses a monetary string: thousands separators, currency symbols and
/// quotes are stripped, parenthesized values are negative.
pub fn parse_money(raw: &str) -> Option<Decimal> {
    let s = raw.replace(',', "").replace('"', "").replace('$', "");
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return inner
            .trim()
            .parse::<Decimal>()
            .ok()
            .map(|d| -d.round_dp(MONEY_SCALE));
    }
    s.parse::<Decimal>().ok().map(|d| d.round_dp(MONEY_SCALE))
}

pub fn money_from_cell(cell: &Cell) -> Option<Decimal> {
    match cell {
        Cell::Empty => None,
        Cell::Text(s) => parse_money(s),
        Cell::Number(n) => Decimal::from_f64_retain(*n).map(|d| d.round_dp(MONEY_SCALE)),
    }
}

/// Excel epoch is 1899-12-30, accounting for the 1900 leap year bug.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(chrono::Duration::days(serial as i64))
}

/// Parses a date cell. Numbers are Excel serials; text is tried against
/// the formats seen in real exports.
pub fn date_from_cell(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Empty => None,
        Cell::Number(n) => excel_serial_to_date(*n),
        Cell::Text(s) => {
            let s = s.trim();
            for fmt in ["%d/%m/%Y", "%Y-%m-%d", "%d-%m-%Y"] {
                if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
                    return Some(d);
                }
            }
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Scan events
// ---------------------------------------------------------------------------

/// One transaction row, extracted per the active column map.
#[derive(Debug, Clone, PartialEq)]
pub struct RowData {
    pub date: NaiveDate,
    pub policy: String,
    pub payment_order: String,
    pub payee: String,
    pub description: String,
    pub charge: Decimal,
    pub credit: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    SectionStart { code: String, name: String },
    OpeningBalance(Decimal),
    Transaction(RowData),
    SectionEnd,
}

/// Forward-only scanner over one sheet's rows. Not restartable: re-invoke
/// with the original rows to scan again.
pub struct SheetScanner<'a> {
    rows: std::iter::Enumerate<std::slice::Iter<'a, Vec<Cell>>>,
    columns: Option<ColumnMap>,
    in_section: bool,
    queued: Option<ScanEvent>,
    warnings: Vec<WarningKind>,
}

impl<'a> SheetScanner<'a> {
    pub fn new(rows: &'a [Vec<Cell>]) -> Self {
        Self {
            rows: rows.iter().enumerate(),
            columns: None,
            in_section: false,
            queued: None,
            warnings: Vec::new(),
        }
    }

    /// Drains warnings accumulated so far. Call after the scan completes.
    pub fn take_warnings(&mut self) -> Vec<WarningKind> {
        std::mem::take(&mut self.warnings)
    }

    fn joined_text(row: &[Cell]) -> String {
        row.iter()
            .map(|c| c.text())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Extracts `(code, name)` from a "CUENTA CONTABLE: <code> - <name>"
    /// marker line.
    fn parse_section_marker(raw: &str) -> Option<(String, String)> {
        let rhs = raw.splitn(2, ':').nth(1)?.trim();
        if rhs.is_empty() {
            return None;
        }
        match rhs.split_once(" - ") {
            Some((code, name)) => Some((code.trim().to_string(), name.trim().to_string())),
            None => Some((rhs.to_string(), String::new())),
        }
    }

    /// Opening balance amount: the classified opening column when present,
    /// otherwise the first parsable monetary cell in the row.
    fn opening_amount(&self, row: &[Cell]) -> Option<Decimal> {
        if let Some(idx) = self
            .columns
            .as_ref()
            .and_then(|m| m.monetary_col(MonetaryField::OpeningBalance))
        {
            if let Some(amount) = row.get(idx).and_then(money_from_cell) {
                return Some(amount);
            }
        }
        row.iter().find_map(money_from_cell)
    }

    fn cell_text(row: &[Cell], idx: Option<usize>) -> String {
        idx.and_then(|i| row.get(i)).map(Cell::text).unwrap_or_default()
    }

    /// Attempts to read a transaction row under the active column map.
    fn read_transaction(&mut self, row_idx: usize, row: &[Cell]) -> Option<RowData> {
        let map = self.columns.as_ref()?;
        if !map.supports_transactions() {
            return None;
        }

        let charge_cell = map.monetary_col(MonetaryField::Charges).and_then(|i| row.get(i));
        let credit_cell = map.monetary_col(MonetaryField::Credits).and_then(|i| row.get(i));
        let has_movement = charge_cell.map_or(false, |c| !c.is_empty())
            || credit_cell.map_or(false, |c| !c.is_empty());
        if !has_movement {
            return None;
        }

        let date_cell = map.date_col().and_then(|i| row.get(i))?;
        let date = match date_from_cell(date_cell) {
            Some(d) => d,
            None => {
                if !date_cell.is_empty() {
                    self.warnings.push(WarningKind::UnparsableDate {
                        row: row_idx + 1,
                        value: date_cell.text(),
                    });
                }
                return None;
            }
        };

        let mut money = |cell: Option<&Cell>| -> Decimal {
            match cell {
                None => Decimal::ZERO,
                Some(c) if c.is_empty() => Decimal::ZERO,
                Some(c) => money_from_cell(c).unwrap_or_else(|| {
                    self.warnings.push(WarningKind::UnparsableMonetaryValue {
                        row: row_idx + 1,
                        value: c.text(),
                    });
                    Decimal::ZERO
                }),
            }
        };
        let charge = money(charge_cell);
        let credit = money(credit_cell);

        let map = self.columns.as_ref()?;
        Some(RowData {
            date,
            policy: Self::cell_text(row, map.policy_col()),
            payment_order: Self::cell_text(row, map.payment_order_col()),
            payee: Self::cell_text(row, map.payee_col()),
            description: Self::cell_text(row, map.description_col()),
            charge,
            credit,
        })
    }
}

impl<'a> Iterator for SheetScanner<'a> {
    type Item = ScanEvent;

    fn next(&mut self) -> Option<ScanEvent> {
        if let Some(ev) = self.queued.take() {
            return Some(ev);
        }

        loop {
            let (idx, row) = match self.rows.next() {
                Some(pair) => pair,
                None => {
                    if self.in_section {
                        self.in_section = false;
                        return Some(ScanEvent::SectionEnd);
                    }
                    return None;
                }
            };

            if row.iter().all(Cell::is_empty) {
                continue;
            }

            let joined = Self::joined_text(row);
            let normalized = normalize_label(&joined);

            if normalized.contains(SECTION_MARKER) && joined.contains(':') {
                if let Some((code, name)) = Self::parse_section_marker(&joined) {
                    let start = ScanEvent::SectionStart { code, name };
                    if self.in_section {
                        // Sections never nest: close the prior one first.
                        self.queued = Some(start);
                        return Some(ScanEvent::SectionEnd);
                    }
                    self.in_section = true;
                    return Some(start);
                }
                continue;
            }

            if is_header_row(row) {
                self.columns = Some(ColumnMap::from_header_row(row));
                continue;
            }

            if self.in_section && normalized.contains(OPENING_MARKER) {
                match self.opening_amount(row) {
                    Some(amount) => return Some(ScanEvent::OpeningBalance(amount)),
                    None => {
                        self.warnings.push(WarningKind::UnparsableMonetaryValue {
                            row: idx + 1,
                            value: joined,
                        });
                        continue;
                    }
                }
            }

            if SKIP_MARKERS.iter().any(|m| normalized.contains(m)) {
                continue;
            }

            if !self.in_section {
                continue;
            }

            if let Some(data) = self.read_transaction(idx, row) {
                return Some(ScanEvent::Transaction(data));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> Cell {
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.to_string())
        }
    }

    fn row(cells: &[&str]) -> Vec<Cell> {
        cells.iter().map(|s| t(s)).collect()
    }

    fn header() -> Vec<Cell> {
        row(&[
            "Fecha",
            "Póliza",
            "Beneficiario",
            "Descripción",
            "Saldo Inicial",
            "Cargos",
            "Abonos",
            "Saldo Final",
        ])
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_money() {
        assert_eq!(parse_money("1,234.56"), Some(dec("1234.56")));
        assert_eq!(parse_money("$500.00"), Some(dec("500.00")));
        assert_eq!(parse_money("(42.50)"), Some(dec("-42.50")));
        assert_eq!(parse_money("\"2,000.00\""), Some(dec("2000.00")));
        assert_eq!(parse_money(""), None);
        assert_eq!(parse_money("n/a"), None);
    }

    #[test]
    fn test_date_from_cell() {
        let d = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        assert_eq!(date_from_cell(&t("15/01/2025")), Some(d));
        assert_eq!(date_from_cell(&t("2025-01-15")), Some(d));
        assert_eq!(date_from_cell(&t("15-01-2025")), Some(d));
        assert_eq!(date_from_cell(&t("garbage")), None);
        // 2025-01-10 as an Excel serial.
        assert_eq!(
            date_from_cell(&Cell::Number(45667.0)),
            NaiveDate::from_ymd_opt(2025, 1, 10)
        );
    }

    #[test]
    fn test_scan_full_section() {
        let rows = vec![
            header(),
            row(&["CUENTA CONTABLE: 112340506070891021234 - FONDO GENERAL"]),
            row(&["SALDO INICIAL CUENTA", "", "", "", "100.00", "", "", ""]),
            row(&["15/01/2025", "P-1", "ACME", "Pago", "", "50.00", "0.00", "150.00"]),
            row(&["16/01/2025", "P-2", "BETA", "Cobro", "", "0.00", "30.00", "120.00"]),
            row(&["SALDO FINAL CUENTA", "", "", "", "", "", "", "120.00"]),
        ];
        let mut scanner = SheetScanner::new(&rows);
        let events: Vec<_> = scanner.by_ref().collect();

        assert_eq!(events.len(), 5);
        assert_eq!(
            events[0],
            ScanEvent::SectionStart {
                code: "112340506070891021234".to_string(),
                name: "FONDO GENERAL".to_string(),
            }
        );
        assert_eq!(events[1], ScanEvent::OpeningBalance(dec("100.00")));
        match &events[2] {
            ScanEvent::Transaction(r) => {
                assert_eq!(r.charge, dec("50.00"));
                assert_eq!(r.credit, dec("0.00"));
                assert_eq!(r.policy, "P-1");
                assert_eq!(r.payee, "ACME");
            }
            other => panic!("expected transaction, got {other:?}"),
        }
        assert_eq!(events[4], ScanEvent::SectionEnd);
        assert!(scanner.take_warnings().is_empty());
    }

    #[test]
    fn test_new_section_closes_previous() {
        let rows = vec![
            header(),
            row(&["CUENTA CONTABLE: 112340506070891021234"]),
            row(&["15/01/2025", "P-1", "A", "x", "", "1.00", "", ""]),
            row(&["CUENTA CONTABLE: 999999999999999999999 - OTRA"]),
            row(&["16/01/2025", "P-2", "B", "y", "", "2.00", "", ""]),
        ];
        let events: Vec<_> = SheetScanner::new(&rows).collect();
        let kinds: Vec<&str> = events
            .iter()
            .map(|e| match e {
                ScanEvent::SectionStart { .. } => "start",
                ScanEvent::OpeningBalance(_) => "opening",
                ScanEvent::Transaction(_) => "txn",
                ScanEvent::SectionEnd => "end",
            })
            .collect();
        assert_eq!(kinds, vec!["start", "txn", "end", "start", "txn", "end"]);
    }

    #[test]
    fn test_decorative_rows_are_skipped() {
        let rows = vec![
            header(),
            row(&["CUENTA CONTABLE: 112340506070891021234"]),
            row(&[]),
            row(&["SALDO ACUMULADO", "", "", "", "", "", "", "999.99"]),
            row(&["TOTAL", "", "", "", "", "", "", "999.99"]),
            row(&["15/01/2025", "P-1", "A", "x", "", "1.00", "", ""]),
        ];
        let events: Vec<_> = SheetScanner::new(&rows).collect();
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, ScanEvent::Transaction(_)))
                .count(),
            1
        );
    }

    #[test]
    fn test_unparsable_money_becomes_zero_with_warning() {
        let rows = vec![
            header(),
            row(&["CUENTA CONTABLE: 112340506070891021234"]),
            row(&["15/01/2025", "P-1", "A", "x", "", "???", "5.00", ""]),
        ];
        let mut scanner = SheetScanner::new(&rows);
        let events: Vec<_> = scanner.by_ref().collect();
        match &events[1] {
            ScanEvent::Transaction(r) => {
                assert_eq!(r.charge, Decimal::ZERO);
                assert_eq!(r.credit, dec("5.00"));
            }
            other => panic!("expected transaction, got {other:?}"),
        }
        let warnings = scanner.take_warnings();
        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            warnings[0],
            WarningKind::UnparsableMonetaryValue { .. }
        ));
    }

    #[test]
    fn test_unparsable_date_with_movement_warns_and_skips() {
        let rows = vec![
            header(),
            row(&["CUENTA CONTABLE: 112340506070891021234"]),
            row(&["not-a-date", "P-1", "A", "x", "", "1.00", "", ""]),
        ];
        let mut scanner = SheetScanner::new(&rows);
        let events: Vec<_> = scanner.by_ref().collect();
        assert!(!events.iter().any(|e| matches!(e, ScanEvent::Transaction(_))));
        let warnings = scanner.take_warnings();
        assert!(matches!(warnings[0], WarningKind::UnparsableDate { .. }));
    }

    #[test]
    fn test_rows_outside_sections_are_ignored() {
        let rows = vec![
            header(),
            row(&["15/01/2025", "P-1", "A", "x", "", "1.00", "", ""]),
        ];
        let events: Vec<_> = SheetScanner::new(&rows).collect();
        assert!(events.is_empty());
    }

    #[test]
    fn test_scan_is_deterministic() {
        let rows = vec![
            header(),
            row(&["CUENTA CONTABLE: 112340506070891021234 - X"]),
            row(&["SALDO INICIAL CUENTA", "", "", "", "10.00", "", "", ""]),
            row(&["15/01/2025", "P-1", "A", "d", "", "1.50", "0.25", ""]),
        ];
        let first: Vec<_> = SheetScanner::new(&rows).collect();
        let second: Vec<_> = SheetScanner::new(&rows).collect();
        assert_eq!(first, second);
    }
}

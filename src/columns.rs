//! Header-driven column classification.
//!
//! Ledger exports carry inconsistent header spellings drawn from a small
//! vocabulary, so columns are classified by an allowlist of normalized
//! header names. Value sniffing is deliberately avoided: description codes
//! routinely look numeric and would be misread as amounts.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::Cell;

/// Which monetary column a header denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonetaryField {
    OpeningBalance,
    Charges,
    Credits,
    ClosingBalance,
}

/// Which identifier column a header denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdField {
    Policy,
    PaymentOrder,
}

/// Which free-text column a header denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    Payee,
    Description,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Date,
    Identifier(IdField),
    Monetary(MonetaryField),
    FreeText(TextField),
    Unclassified,
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Lowercases, strips diacritics, trims and collapses internal whitespace.
pub fn normalize_label(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let stripped: String = lowered
        .chars()
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' | 'ü' => 'u',
            'ñ' => 'n',
            other => other,
        })
        .collect();
    whitespace_re().replace_all(&stripped, " ").into_owned()
}

/// Classifies one normalized header label.
pub fn classify_label(label: &str) -> ColumnKind {
    if label.is_empty() {
        return ColumnKind::Unclassified;
    }
    if label.starts_with("fecha") {
        return ColumnKind::Date;
    }
    if label.contains("poliza") {
        return ColumnKind::Identifier(IdField::Policy);
    }
    if label.contains("orden de pago") || label == "op" {
        return ColumnKind::Identifier(IdField::PaymentOrder);
    }
    match label {
        "saldo inicial" | "saldo inicial cuenta" => {
            return ColumnKind::Monetary(MonetaryField::OpeningBalance)
        }
        "cargos" | "cargo" | "debe" => return ColumnKind::Monetary(MonetaryField::Charges),
        "abonos" | "abono" | "haber" => return ColumnKind::Monetary(MonetaryField::Credits),
        "saldo final" | "saldo" => return ColumnKind::Monetary(MonetaryField::ClosingBalance),
        _ => {}
    }
    if label.contains("beneficiario") {
        return ColumnKind::FreeText(TextField::Payee);
    }
    if label.contains("descripcion") || label.contains("concepto") {
        return ColumnKind::FreeText(TextField::Description);
    }
    if label.contains("nombre") || label.contains("referencia") {
        return ColumnKind::FreeText(TextField::Other);
    }
    // Numeric-looking headers fall back to free text, never to monetary.
    if label.chars().any(|c| c.is_ascii_digit()) {
        return ColumnKind::FreeText(TextField::Other);
    }
    ColumnKind::Unclassified
}

/// True if a row looks like the column header line of a ledger export.
pub fn is_header_row(row: &[Cell]) -> bool {
    let joined = normalize_label(
        &row.iter()
            .map(|c| c.text())
            .collect::<Vec<_>>()
            .join(" "),
    );
    joined.contains("fecha") && (joined.contains("poliza") || joined.contains("saldo"))
}

/// Position -> classification lookup built from one header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    kinds: Vec<ColumnKind>,
}

impl ColumnMap {
    pub fn from_header_row(row: &[Cell]) -> Self {
        let kinds = row
            .iter()
            .map(|cell| classify_label(&normalize_label(&cell.text())))
            .collect();
        Self { kinds }
    }

    pub fn kind_at(&self, idx: usize) -> ColumnKind {
        self.kinds
            .get(idx)
            .copied()
            .unwrap_or(ColumnKind::Unclassified)
    }

    fn position_of(&self, kind: ColumnKind) -> Option<usize> {
        self.kinds.iter().position(|k| *k == kind)
    }

    pub fn date_col(&self) -> Option<usize> {
        self.position_of(ColumnKind::Date)
    }

    pub fn policy_col(&self) -> Option<usize> {
        self.position_of(ColumnKind::Identifier(IdField::Policy))
    }

    pub fn payment_order_col(&self) -> Option<usize> {
        self.position_of(ColumnKind::Identifier(IdField::PaymentOrder))
    }

    pub fn payee_col(&self) -> Option<usize> {
        self.position_of(ColumnKind::FreeText(TextField::Payee))
    }

    pub fn description_col(&self) -> Option<usize> {
        self.position_of(ColumnKind::FreeText(TextField::Description))
    }

    pub fn monetary_col(&self, field: MonetaryField) -> Option<usize> {
        self.position_of(ColumnKind::Monetary(field))
    }

    /// A map is usable for transaction rows once it can locate a date and
    /// at least one movement column.
    pub fn supports_transactions(&self) -> bool {
        self.date_col().is_some()
            && (self.monetary_col(MonetaryField::Charges).is_some()
                || self.monetary_col(MonetaryField::Credits).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(labels: &[&str]) -> Vec<Cell> {
        labels.iter().map(|l| Cell::Text(l.to_string())).collect()
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("  PÓLIZA  "), "poliza");
        assert_eq!(normalize_label("Descripción"), "descripcion");
        assert_eq!(normalize_label("Saldo   Inicial"), "saldo inicial");
        assert_eq!(normalize_label("AÑO"), "ano");
        assert_eq!(normalize_label(""), "");
    }

    #[test]
    fn test_classify_monetary_allowlist() {
        assert_eq!(
            classify_label("saldo inicial"),
            ColumnKind::Monetary(MonetaryField::OpeningBalance)
        );
        assert_eq!(
            classify_label("cargos"),
            ColumnKind::Monetary(MonetaryField::Charges)
        );
        assert_eq!(
            classify_label("debe"),
            ColumnKind::Monetary(MonetaryField::Charges)
        );
        assert_eq!(
            classify_label("abonos"),
            ColumnKind::Monetary(MonetaryField::Credits)
        );
        assert_eq!(
            classify_label("haber"),
            ColumnKind::Monetary(MonetaryField::Credits)
        );
        assert_eq!(
            classify_label("saldo final"),
            ColumnKind::Monetary(MonetaryField::ClosingBalance)
        );
    }

    #[test]
    fn test_classify_non_monetary() {
        assert_eq!(classify_label("fecha"), ColumnKind::Date);
        assert_eq!(
            classify_label("no. de poliza"),
            ColumnKind::Identifier(IdField::Policy)
        );
        assert_eq!(
            classify_label("orden de pago"),
            ColumnKind::Identifier(IdField::PaymentOrder)
        );
        assert_eq!(
            classify_label("beneficiario"),
            ColumnKind::FreeText(TextField::Payee)
        );
        assert_eq!(
            classify_label("concepto"),
            ColumnKind::FreeText(TextField::Description)
        );
        assert_eq!(classify_label("algo raro"), ColumnKind::Unclassified);
    }

    #[test]
    fn test_numeric_looking_header_is_free_text_not_monetary() {
        assert_eq!(
            classify_label("columna 3"),
            ColumnKind::FreeText(TextField::Other)
        );
        assert_eq!(classify_label("1200"), ColumnKind::FreeText(TextField::Other));
    }

    #[test]
    fn test_column_map_lookup() {
        let map = ColumnMap::from_header_row(&cells(&[
            "Fecha",
            "Póliza",
            "Beneficiario",
            "Descripción",
            "Saldo Inicial",
            "Cargos",
            "Abonos",
            "Saldo Final",
        ]));
        assert_eq!(map.date_col(), Some(0));
        assert_eq!(map.policy_col(), Some(1));
        assert_eq!(map.payee_col(), Some(2));
        assert_eq!(map.description_col(), Some(3));
        assert_eq!(map.monetary_col(MonetaryField::OpeningBalance), Some(4));
        assert_eq!(map.monetary_col(MonetaryField::Charges), Some(5));
        assert_eq!(map.monetary_col(MonetaryField::Credits), Some(6));
        assert_eq!(map.monetary_col(MonetaryField::ClosingBalance), Some(7));
        assert!(map.supports_transactions());
    }

    #[test]
    fn test_is_header_row() {
        assert!(is_header_row(&cells(&["Fecha", "Póliza", "Cargos"])));
        assert!(is_header_row(&cells(&["FECHA", "Saldo Inicial"])));
        assert!(!is_header_row(&cells(&["Beneficiario", "Descripción"])));
        assert!(!is_header_row(&[]));
    }
}

use std::collections::HashMap;

use anyhow::bail;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::models::NormalizedRow;
use crate::workbook::{serial_to_datetime, Cell};

/// How many leading rows the positional fallback scans for a header row.
const HEADER_SCAN_LIMIT: usize = 50;

/// Fixed column layout agreed with the report provider, used by the
/// positional fallback: C=group, D=status, E=product, F=data,
/// G=operador, J=adesao, K=manifesto, V=severidade.
const POSITIONAL_COLUMNS: [(&str, usize); 8] = [
    ("group", 2),
    ("status", 3),
    ("product", 4),
    ("data", 5),
    ("operador", 6),
    ("adesao", 9),
    ("manifesto", 10),
    ("severidade", 21),
];

/// Tunables for the header-vs-positional decision. The 100-row floor is
/// inherited from the report provider's format quirks; small legitimate
/// reports need a lower value to avoid always falling back.
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    pub min_viable_rows: usize,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        NormalizeOptions { min_viable_rows: 100 }
    }
}

#[derive(Debug)]
pub struct NormalizeOutcome {
    pub rows: Vec<NormalizedRow>,
    /// Rows discarded by the validity filter, exposed for logging.
    pub dropped: usize,
    pub used_fallback: bool,
}

/// Covers the accents that occur in the Portuguese-language reports.
pub fn strip_diacritics(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'A',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'É' | 'È' | 'Ê' | 'Ë' => 'E',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
            'ç' => 'c',
            'Ç' => 'C',
            'ñ' => 'n',
            'Ñ' => 'N',
            other => other,
        })
        .collect()
}

fn norm_key(key: &str) -> String {
    let lowered = key.trim().to_lowercase();
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    strip_diacritics(&collapsed)
}

// Accepted header spellings per canonical field, in precedence order.
fn header_aliases(canonical: &str) -> &'static [&'static str] {
    match canonical {
        "status" => &["status atendimento", "status"],
        "operador" => &["operador", "analista"],
        "adesao" => &["adesao", "ade"],
        "group" => &["grupo", "esteira"],
        "manifesto" => &["manifesto", "motivo"],
        "severidade" => &["severidade"],
        "campaign" => &["campanha"],
        "product" => &["produto"],
        "data" => &["data"],
        _ => &[],
    }
}

pub enum RawRecord {
    Keyed(HashMap<String, Cell>),
    Positional(Vec<Cell>),
}

impl RawRecord {
    fn field(&self, canonical: &str) -> Option<&Cell> {
        match self {
            RawRecord::Keyed(map) => header_aliases(canonical)
                .iter()
                .filter_map(|alias| map.get(*alias))
                .find(|cell| **cell != Cell::Empty),
            RawRecord::Positional(cells) => POSITIONAL_COLUMNS
                .iter()
                .find(|(name, _)| *name == canonical)
                .and_then(|(_, idx)| cells.get(*idx)),
        }
    }

    fn text(&self, canonical: &str) -> Option<String> {
        self.field(canonical).and_then(Cell::to_text)
    }
}

/// Failure yields None and never invalidates the row.
fn coerce_datetime(cell: Option<&Cell>) -> Option<DateTime<Utc>> {
    match cell? {
        Cell::DateTime(dt) => Some(*dt),
        Cell::Number(serial) => serial_to_datetime(*serial),
        Cell::Text(s) => parse_date_text(s.trim()),
        _ => None,
    }
}

fn parse_date_text(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%d/%m/%Y %H:%M:%S", "%d/%m/%Y %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc());
        }
    }
    for fmt in ["%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }
    None
}

fn normalize_record(record: &RawRecord) -> NormalizedRow {
    NormalizedRow {
        campaign: record.text("campaign"),
        client: None,
        group: record.text("group"),
        product: record.text("product"),
        adesao: record.text("adesao"),
        operador: record.text("operador"),
        status: record.text("status"),
        manifesto: record.text("manifesto"),
        severidade: record.text("severidade"),
        data: coerce_datetime(record.field("data")),
    }
}

// Status must be present and at least one of operador/adesao/manifesto
// must identify the row; everything else is dropped without error.
fn row_is_usable(row: &NormalizedRow) -> bool {
    row.status.is_some()
        && (row.operador.is_some() || row.adesao.is_some() || row.manifesto.is_some())
}

fn normalize_records<I>(records: I) -> (Vec<NormalizedRow>, usize)
where
    I: Iterator<Item = RawRecord>,
{
    let mut rows = Vec::new();
    let mut dropped = 0usize;
    for record in records {
        let row = normalize_record(&record);
        if row_is_usable(&row) {
            rows.push(row);
        } else {
            dropped += 1;
        }
    }
    (rows, dropped)
}

fn keyed_records(matrix: &[Vec<Cell>]) -> impl Iterator<Item = RawRecord> + '_ {
    let headers: Vec<String> = matrix[0]
        .iter()
        .map(|cell| norm_key(&cell.to_text().unwrap_or_default()))
        .collect();
    matrix[1..].iter().map(move |cells| {
        let mut map = HashMap::new();
        for (key, cell) in headers.iter().zip(cells.iter()) {
            if !key.is_empty() {
                map.insert(key.clone(), cell.clone());
            }
        }
        RawRecord::Keyed(map)
    })
}

// Data starts after the first row mentioning "status" and an analyst
// column; defaults to the top of the sheet.
fn find_positional_header(matrix: &[Vec<Cell>]) -> usize {
    for (idx, row) in matrix.iter().take(HEADER_SCAN_LIMIT).enumerate() {
        let joined = row
            .iter()
            .map(|cell| cell.to_text().unwrap_or_default())
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        if joined.contains("status") && (joined.contains("operador") || joined.contains("analista"))
        {
            return idx;
        }
    }
    0
}

/// Header-keyed strategy first; when its result looks unreliable (too
/// few rows kept, or no operador anywhere) the sheet is re-read
/// positionally.
pub fn normalize_matrix(
    matrix: &[Vec<Cell>],
    opts: &NormalizeOptions,
) -> anyhow::Result<NormalizeOutcome> {
    if matrix.is_empty() {
        bail!("spreadsheet has no rows");
    }

    let (rows, dropped) = normalize_records(keyed_records(matrix));
    let header_looks_ok =
        rows.iter().any(|r| r.operador.is_some()) && rows.len() > opts.min_viable_rows;
    if header_looks_ok {
        return Ok(NormalizeOutcome { rows, dropped, used_fallback: false });
    }

    let header_idx = find_positional_header(matrix);
    let data_rows = &matrix[(header_idx + 1).min(matrix.len())..];
    let (rows, dropped) =
        normalize_records(data_rows.iter().map(|cells| RawRecord::Positional(cells.clone())));
    Ok(NormalizeOutcome { rows, dropped, used_fallback: true })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn header_matrix(headers: &[&str], rows: &[&[&str]]) -> Vec<Vec<Cell>> {
        let mut matrix = vec![headers.iter().map(|h| text(h)).collect::<Vec<_>>()];
        for row in rows {
            matrix.push(
                row.iter()
                    .map(|v| if v.is_empty() { Cell::Empty } else { text(v) })
                    .collect(),
            );
        }
        matrix
    }

    fn small_report_opts() -> NormalizeOptions {
        NormalizeOptions { min_viable_rows: 0 }
    }

    #[test]
    fn strips_diacritics() {
        assert_eq!(strip_diacritics("NÃO CONFERE"), "NAO CONFERE");
        assert_eq!(strip_diacritics("gravíssimo"), "gravissimo");
        assert_eq!(strip_diacritics("Relatório"), "Relatorio");
    }

    #[test]
    fn header_keys_tolerate_case_whitespace_and_accents() {
        let matrix = header_matrix(
            &["  STATUS   Atendimento ", "Operádor", "Adesão", "Manifesto", "Data"],
            &[&["CONFERE", "Alice", "ADE-1", "", "2025-01-01"]],
        );
        let out = normalize_matrix(&matrix, &small_report_opts()).unwrap();
        assert!(!out.used_fallback);
        assert_eq!(out.rows.len(), 1);
        let row = &out.rows[0];
        assert_eq!(row.status.as_deref(), Some("CONFERE"));
        assert_eq!(row.operador.as_deref(), Some("Alice"));
        assert_eq!(row.adesao.as_deref(), Some("ADE-1"));
        assert_eq!(row.data.unwrap().to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }

    #[test]
    fn already_clean_headers_normalize_identically() {
        let clean = header_matrix(
            &["status", "operador", "adesao"],
            &[&["CONFERE", "Alice", "ADE-1"]],
        );
        let noisy = header_matrix(
            &[" Status ", "  OPERADOR", "adesão "],
            &[&["CONFERE", "Alice", "ADE-1"]],
        );
        let a = normalize_matrix(&clean, &small_report_opts()).unwrap();
        let b = normalize_matrix(&noisy, &small_report_opts()).unwrap();
        assert_eq!(a.rows, b.rows);
    }

    #[test]
    fn alias_columns_resolve() {
        let matrix = header_matrix(
            &["status", "analista", "ade", "esteira", "motivo"],
            &[&["NÃO CONFERE", "Bruno", "ADE-2", "CNC", "atraso"]],
        );
        let out = normalize_matrix(&matrix, &small_report_opts()).unwrap();
        let row = &out.rows[0];
        assert_eq!(row.operador.as_deref(), Some("Bruno"));
        assert_eq!(row.adesao.as_deref(), Some("ADE-2"));
        assert_eq!(row.group.as_deref(), Some("CNC"));
        assert_eq!(row.manifesto.as_deref(), Some("atraso"));
    }

    #[test]
    fn rows_without_status_are_dropped() {
        let matrix = header_matrix(
            &["status", "operador"],
            &[&["", "Alice"], &["CONFERE", "Bruno"], &["", ""]],
        );
        let out = normalize_matrix(&matrix, &small_report_opts()).unwrap();
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.dropped, 2);
        assert_eq!(out.rows[0].operador.as_deref(), Some("Bruno"));
    }

    #[test]
    fn status_alone_is_not_enough() {
        let matrix = header_matrix(&["status", "operador"], &[&["CONFERE", ""]]);
        let out = normalize_matrix(&matrix, &small_report_opts()).unwrap();
        assert!(out.rows.is_empty());
        assert_eq!(out.dropped, 1);
    }

    fn positional_row(status: &str, operador: &str, adesao: &str) -> Vec<Cell> {
        let mut cells = vec![Cell::Empty; 22];
        cells[3] = if status.is_empty() { Cell::Empty } else { text(status) };
        cells[5] = text("2025-02-03");
        cells[6] = if operador.is_empty() { Cell::Empty } else { text(operador) };
        cells[9] = if adesao.is_empty() { Cell::Empty } else { text(adesao) };
        cells[21] = text("GRAVE");
        cells
    }

    #[test]
    fn falls_back_to_positions_when_no_operador_column_maps() {
        let mut matrix = vec![
            vec![text("Relatório de Qualidade")],
            vec![text("gerado em 2025-02-10")],
        ];
        let mut header = vec![Cell::Empty; 22];
        header[3] = text("Status Atendimento");
        header[6] = text("Operador");
        matrix.push(header);
        matrix.push(positional_row("NÃO CONFERE", "Carla", "ADE-9"));
        matrix.push(positional_row("", "Dora", ""));

        let out = normalize_matrix(&matrix, &small_report_opts()).unwrap();
        assert!(out.used_fallback);
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.dropped, 1);
        let row = &out.rows[0];
        assert_eq!(row.operador.as_deref(), Some("Carla"));
        assert_eq!(row.severidade.as_deref(), Some("GRAVE"));
        assert_eq!(row.data.unwrap().to_rfc3339(), "2025-02-03T00:00:00+00:00");
    }

    #[test]
    fn small_reports_fall_back_under_default_threshold() {
        let matrix = header_matrix(
            &["status", "operador", "adesao"],
            &[&["CONFERE", "Alice", "ADE-1"]],
        );
        // Default options demand more than 100 kept rows.
        let out = normalize_matrix(&matrix, &NormalizeOptions::default()).unwrap();
        assert!(out.used_fallback);
        // Same matrix with the threshold lowered sticks to headers.
        let out = normalize_matrix(&matrix, &small_report_opts()).unwrap();
        assert!(!out.used_fallback);
    }

    #[test]
    fn date_coercion_accepts_serials_and_strings() {
        assert_eq!(
            coerce_datetime(Some(&Cell::Number(45658.0))).unwrap().to_rfc3339(),
            "2025-01-01T00:00:00+00:00"
        );
        assert_eq!(
            coerce_datetime(Some(&text("2025-01-02T10:30:00Z"))).unwrap().to_rfc3339(),
            "2025-01-02T10:30:00+00:00"
        );
        assert_eq!(
            coerce_datetime(Some(&text("03/01/2025"))).unwrap().to_rfc3339(),
            "2025-01-03T00:00:00+00:00"
        );
        assert_eq!(coerce_datetime(Some(&text("not a date"))), None);
        assert_eq!(coerce_datetime(None), None);
        // Numeric junk far outside any calendar degrades too.
        assert_eq!(coerce_datetime(Some(&Cell::Number(5.5e12))), None);
    }

    #[test]
    fn numeric_junk_in_date_column_keeps_the_row() {
        let matrix = header_matrix(&["status", "operador", "data"], &[&["CONFERE", "Alice", ""]]);
        let mut matrix = matrix;
        matrix[1][2] = Cell::Number(5.5e12);
        let out = normalize_matrix(&matrix, &small_report_opts()).unwrap();
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].data, None);
    }

    #[test]
    fn unparseable_date_keeps_the_row() {
        let matrix = header_matrix(
            &["status", "operador", "data"],
            &[&["CONFERE", "Alice", "???"]],
        );
        let out = normalize_matrix(&matrix, &small_report_opts()).unwrap();
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].data, None);
    }

    #[test]
    fn empty_matrix_is_an_error() {
        assert!(normalize_matrix(&[], &NormalizeOptions::default()).is_err());
    }
}

use std::path::Path;

use anyhow::{bail, Context};
use calamine::{open_workbook_auto, Data, Reader};
use chrono::{DateTime, Duration, TimeZone, Utc};

/// Sheet names the report provider uses, tried in order before falling
/// back to the first sheet in the workbook.
const PREFERRED_SHEETS: [&str; 2] = ["Relatorio", "Relatório"];

/// One spreadsheet cell, decoupled from the reader library.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    DateTime(DateTime<Utc>),
    Bool(bool),
}

impl Cell {
    /// Cleaning rule shared by both normalization strategies:
    /// empty cell -> None, otherwise stringify and trim, empty -> None.
    pub fn to_text(&self) -> Option<String> {
        let s = match self {
            Cell::Empty => return None,
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{n}")
                }
            }
            Cell::DateTime(dt) => dt.to_rfc3339(),
            Cell::Bool(b) => b.to_string(),
        };
        if s.is_empty() {
            None
        } else {
            Some(s)
        }
    }
}

/// Converts a spreadsheet date serial (days since 1899-12-30, fraction
/// of day as time) to a UTC instant. Values no calendar can hold, like
/// a phone number landing in the date column, yield None.
pub fn serial_to_datetime(serial: f64) -> Option<DateTime<Utc>> {
    if !serial.is_finite() {
        return None;
    }
    let epoch = Utc.with_ymd_and_hms(1899, 12, 30, 0, 0, 0).single()?;
    let seconds = (serial * 86_400.0).round() as i64;
    epoch.checked_add_signed(Duration::try_seconds(seconds)?)
}

fn from_calamine(cell: &Data) -> Cell {
    match cell {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => match serial_to_datetime(dt.as_f64()) {
            Some(parsed) => Cell::DateTime(parsed),
            None => Cell::Empty,
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

/// Reads the report sheet of an XLSX/XLS/ODS workbook as a raw cell
/// matrix. `sheet` overrides the preferred-name lookup.
pub fn read_workbook_matrix(path: &Path, sheet: Option<&str>) -> anyhow::Result<Vec<Vec<Cell>>> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("failed to open workbook {}", path.display()))?;

    let names = workbook.sheet_names().to_vec();
    if names.is_empty() {
        bail!("workbook {} has no sheets", path.display());
    }
    let chosen = match sheet {
        Some(s) => s.to_string(),
        None => PREFERRED_SHEETS
            .iter()
            .find(|p| names.iter().any(|n| n == *p))
            .map(|p| p.to_string())
            .unwrap_or_else(|| names[0].clone()),
    };

    let range = workbook
        .worksheet_range(&chosen)
        .with_context(|| format!("sheet '{chosen}' not found in {}", path.display()))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(from_calamine).collect())
        .collect())
}

/// Reads a CSV export of the same report as a cell matrix, header line
/// included, so it goes through the same normalization path.
pub fn read_csv_matrix(path: &Path) -> anyhow::Result<Vec<Vec<Cell>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open csv {}", path.display()))?;

    let mut matrix = Vec::new();
    for record in reader.records() {
        let record = record?;
        matrix.push(
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
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_conversion_matches_spreadsheet_epoch() {
        // 45658 = 2025-01-01 in the 1900 date system.
        let dt = serial_to_datetime(45658.0).unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-01-01T00:00:00+00:00");

        let noon = serial_to_datetime(45658.5).unwrap();
        assert_eq!(noon.to_rfc3339(), "2025-01-01T12:00:00+00:00");
    }

    #[test]
    fn absurd_serials_degrade_to_none() {
        // A phone number or similar junk in the date column must not
        // take the import down with it.
        assert_eq!(serial_to_datetime(5.5e12), None);
        assert_eq!(serial_to_datetime(1e18), None);
        assert_eq!(serial_to_datetime(-1e18), None);
        assert_eq!(serial_to_datetime(f64::NAN), None);
        assert_eq!(serial_to_datetime(f64::INFINITY), None);
    }

    #[test]
    fn cell_text_cleaning() {
        assert_eq!(Cell::Empty.to_text(), None);
        assert_eq!(Cell::Text("   ".into()).to_text(), None);
        assert_eq!(Cell::Text("  ADE-1 ".into()).to_text(), Some("ADE-1".into()));
        assert_eq!(Cell::Number(42.0).to_text(), Some("42".into()));
        assert_eq!(Cell::Number(1.5).to_text(), Some("1.5".into()));
        assert_eq!(Cell::Bool(true).to_text(), Some("true".into()));
    }
}

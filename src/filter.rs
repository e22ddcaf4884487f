use chrono::NaiveDate;

use crate::models::{Filters, StoredRow};

/// A filter field only constrains when it is present and non-empty; an
/// empty string from the query form means "no constraint".
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Numeric bounds tolerate junk: a non-numeric value imposes no bound.
fn numeric(value: &Option<String>) -> Option<f64> {
    present(value).and_then(|s| s.trim().parse::<f64>().ok())
}

/// Date bounds likewise: an unparseable date imposes no bound.
fn calendar_date(value: &Option<String>) -> Option<NaiveDate> {
    present(value).and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
}

fn contains_ci(haystack: &Option<String>, needle: &str) -> bool {
    haystack
        .as_deref()
        .map(|h| h.to_lowercase().contains(&needle.to_lowercase()))
        .unwrap_or(false)
}

/// The single predicate shared by the dashboard, the row listing and
/// snapshot materialization, so all three agree on matching semantics.
/// Date bounds are inclusive and compare the calendar-date portion of
/// the event timestamp; adesao is exact; operador/group/severidade are
/// case-insensitive substring matches; point bounds are inclusive.
pub fn matches(filters: &Filters, row: &StoredRow) -> bool {
    if let Some(from) = calendar_date(&filters.date_from) {
        match row.data {
            Some(dt) if dt.date_naive() >= from => {}
            _ => return false,
        }
    }
    if let Some(to) = calendar_date(&filters.date_to) {
        match row.data {
            Some(dt) if dt.date_naive() <= to => {}
            _ => return false,
        }
    }
    if let Some(adesao) = present(&filters.adesao) {
        if row.adesao.as_deref() != Some(adesao) {
            return false;
        }
    }
    if let Some(operador) = present(&filters.operador) {
        if !contains_ci(&row.operador, operador) {
            return false;
        }
    }
    if let Some(group) = present(&filters.group) {
        if !contains_ci(&row.group, group) {
            return false;
        }
    }
    if let Some(severidade) = present(&filters.severidade) {
        if !contains_ci(&row.severidade, severidade) {
            return false;
        }
    }
    if let Some(min) = numeric(&filters.min_points) {
        if f64::from(row.pontos) < min {
            return false;
        }
    }
    if let Some(max) = numeric(&filters.max_points) {
        if f64::from(row.pontos) > max {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn stored(
        operador: &str,
        severidade: Option<&str>,
        adesao: &str,
        day: u32,
        pontos: i32,
    ) -> StoredRow {
        StoredRow {
            id: Uuid::new_v4(),
            imported_at: Utc.with_ymd_and_hms(2025, 2, 1, 12, 0, 0).unwrap(),
            import_label: "test".into(),
            campaign: None,
            client: None,
            group: Some("CNC".into()),
            product: None,
            adesao: Some(adesao.into()),
            operador: Some(operador.into()),
            status: Some("NÃO CONFERE".into()),
            manifesto: None,
            severidade: severidade.map(Into::into),
            data: Utc.with_ymd_and_hms(2025, 1, day, 8, 30, 0).single(),
            pontos,
        }
    }

    /// Five rows spanning two analysts, two severities and one
    /// out-of-range date.
    fn fixture() -> Vec<StoredRow> {
        vec![
            stored("Alice", Some("LEVE"), "ADE-1", 5, 98),
            stored("Alice", Some("GRAVE"), "ADE-2", 10, 90),
            stored("Bruno", Some("LEVE"), "ADE-3", 15, 98),
            stored("Bruno", Some("GRAVE"), "ADE-4", 20, 90),
            stored("Bruno", Some("GRAVE"), "ADE-5", 31, 80),
        ]
    }

    fn count(filters: &Filters) -> usize {
        fixture().iter().filter(|r| matches(filters, r)).count()
    }

    #[test]
    fn empty_filters_match_everything() {
        assert_eq!(count(&Filters::default()), 5);
    }

    #[test]
    fn empty_strings_impose_no_constraint() {
        let filters = Filters {
            operador: Some(String::new()),
            severidade: Some(String::new()),
            min_points: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(count(&filters), 5);
    }

    #[test]
    fn date_bounds_are_inclusive_on_calendar_dates() {
        let filters = Filters {
            date_from: Some("2025-01-10".into()),
            date_to: Some("2025-01-20".into()),
            ..Default::default()
        };
        // Rows on the 10th and 20th stay; the 5th and 31st are out.
        assert_eq!(count(&filters), 3);
    }

    #[test]
    fn rows_without_event_date_fail_date_bounds() {
        let mut row = stored("Alice", None, "ADE-1", 5, 98);
        row.data = None;
        let filters = Filters { date_from: Some("2025-01-01".into()), ..Default::default() };
        assert!(!matches(&filters, &row));
        assert!(matches(&Filters::default(), &row));
    }

    #[test]
    fn operador_is_case_insensitive_substring() {
        let filters = Filters { operador: Some("ali".into()), ..Default::default() };
        assert_eq!(count(&filters), 2);
        let filters = Filters { operador: Some("BRUNO".into()), ..Default::default() };
        assert_eq!(count(&filters), 3);
    }

    #[test]
    fn adesao_is_exact() {
        let filters = Filters { adesao: Some("ADE-3".into()), ..Default::default() };
        assert_eq!(count(&filters), 1);
        let filters = Filters { adesao: Some("ADE".into()), ..Default::default() };
        assert_eq!(count(&filters), 0);
    }

    #[test]
    fn severidade_substring_matches() {
        let filters = Filters { severidade: Some("leve".into()), ..Default::default() };
        assert_eq!(count(&filters), 2);
    }

    #[test]
    fn group_substring_matches() {
        let filters = Filters { group: Some("cnc".into()), ..Default::default() };
        assert_eq!(count(&filters), 5);
        let filters = Filters { group: Some("outro".into()), ..Default::default() };
        assert_eq!(count(&filters), 0);
    }

    #[test]
    fn point_bounds_are_inclusive() {
        let filters = Filters {
            min_points: Some("90".into()),
            max_points: Some("98".into()),
            ..Default::default()
        };
        assert_eq!(count(&filters), 4);
    }

    #[test]
    fn non_numeric_point_bounds_are_ignored() {
        let filters = Filters {
            min_points: Some("abc".into()),
            max_points: Some("".into()),
            ..Default::default()
        };
        assert_eq!(count(&filters), 5);
    }
}

use crate::models::HoStatus;
use crate::normalize::strip_diacritics;

/// How many ranking positions keep home-office eligibility.
const HO_RANK_LIMIT: i64 = 25;

fn norm(value: Option<&str>) -> String {
    match value {
        Some(s) => strip_diacritics(s.trim()).to_uppercase(),
        None => String::new(),
    }
}

/// Points for one reviewed row. Conforming rows score 100; otherwise the
/// severity decides, with a missing or unrecognized severity treated as
/// GRAVE. Total over every (status, severidade) pair.
pub fn points_for(status: Option<&str>, severidade: Option<&str>) -> i32 {
    let status = norm(status);
    if status.contains("CONFERE") && !status.contains("NAO") {
        return 100;
    }
    let sev = norm(severidade);
    if sev.contains("GRAVISSIMO") {
        80
    } else if sev.contains("GRAVE") {
        90
    } else if sev.contains("MEDIO") {
        95
    } else if sev.contains("LEVE") {
        98
    } else {
        90
    }
}

/// A row counts as an error when its status resolves to non-conforming
/// ("NÃO CONFERE" in any spelling), regardless of severity.
pub fn is_error(status: Option<&str>) -> bool {
    let status = norm(status);
    status.contains("NAO") && status.contains("CONFERE")
}

/// Home-office eligibility from average quality and production rank.
/// The three bands partition every input pair.
pub fn ho_status(avg_quality: f64, prod_rank: i64) -> HoStatus {
    if avg_quality >= 0.90 && prod_rank <= HO_RANK_LIMIT {
        HoStatus::Ho
    } else if (0.88..0.90).contains(&avg_quality) {
        HoStatus::Alerta
    } else {
        HoStatus::Presencial
    }
}

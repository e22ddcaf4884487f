use std::collections::BTreeMap;

use crate::filter;
use crate::models::{AnalystRollup, Dashboard, Filters, HoStatus, Kpis, StoredRow};
use crate::scoring;

/// Label substituted for rows whose operador is missing.
pub const NO_OPERADOR_LABEL: &str = "(Sem operador)";

/// Pure over its inputs; analyst name breaks count/quality ties so
/// reruns against unchanged rows are identical.
pub fn build_dashboard(rows: &[StoredRow], filters: &Filters) -> Dashboard {
    let filtered: Vec<&StoredRow> = rows.iter().filter(|r| filter::matches(filters, r)).collect();

    let total = filtered.len() as i64;
    let avg_quality = if filtered.is_empty() {
        0.0
    } else {
        filtered.iter().map(|r| f64::from(r.pontos)).sum::<f64>() / filtered.len() as f64 / 100.0
    };

    let mut groups: BTreeMap<String, (i64, i64, i64)> = BTreeMap::new();
    for row in &filtered {
        let key = row.operador.clone().unwrap_or_else(|| NO_OPERADOR_LABEL.to_string());
        let entry = groups.entry(key).or_insert((0, 0, 0));
        entry.0 += 1;
        entry.1 += i64::from(row.pontos);
        if scoring::is_error(row.status.as_deref()) {
            entry.2 += 1;
        }
    }

    let mut analysts: Vec<(String, i64, f64, i64)> = groups
        .into_iter()
        .map(|(operador, (count, total_pontos, errors))| {
            let avg = total_pontos as f64 / count as f64 / 100.0;
            (operador, count, avg, errors)
        })
        .collect();

    analysts.sort_by(|a, b| {
        b.1.cmp(&a.1)
            .then(b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal))
            .then(a.0.cmp(&b.0))
    });

    let analysts: Vec<AnalystRollup> = analysts
        .into_iter()
        .enumerate()
        .map(|(idx, (operador, count, avg, errors))| {
            let prod_rank = idx as i64 + 1;
            AnalystRollup {
                operador,
                total: count,
                avg_quality: avg,
                errors,
                prod_rank,
                ho_status: scoring::ho_status(avg, prod_rank),
            }
        })
        .collect();

    let ho_ok = analysts.iter().filter(|a| a.ho_status == HoStatus::Ho).count() as i64;
    let ho_presencial =
        analysts.iter().filter(|a| a.ho_status == HoStatus::Presencial).count() as i64;

    Dashboard {
        filters: filters.clone(),
        kpis: Kpis { total_analyses: total, avg_quality, ho_ok, ho_presencial },
        analysts,
    }
}

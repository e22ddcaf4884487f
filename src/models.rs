use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Field names follow the report provider's vocabulary (adesao =
/// adhesion code, operador = analyst, manifesto = rejection reason).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizedRow {
    pub campaign: Option<String>,
    pub client: Option<String>,
    pub group: Option<String>,
    pub product: Option<String>,
    pub adesao: Option<String>,
    pub operador: Option<String>,
    pub status: Option<String>,
    pub manifesto: Option<String>,
    pub severidade: Option<String>,
    pub data: Option<DateTime<Utc>>,
}

impl NormalizedRow {
    /// Trimmed, empty becomes None; rows arriving over HTTP may carry
    /// padding the browser-side normalizer missed.
    pub fn cleaned(self) -> Self {
        fn clean(v: Option<String>) -> Option<String> {
            v.and_then(|s| {
                let t = s.trim();
                if t.is_empty() {
                    None
                } else {
                    Some(t.to_string())
                }
            })
        }
        NormalizedRow {
            campaign: clean(self.campaign),
            client: clean(self.client),
            group: clean(self.group),
            product: clean(self.product),
            adesao: clean(self.adesao),
            operador: clean(self.operador),
            status: clean(self.status),
            manifesto: clean(self.manifesto),
            severidade: clean(self.severidade),
            data: self.data,
        }
    }
}

/// Append-only; never mutated after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRow {
    pub id: Uuid,
    pub imported_at: DateTime<Utc>,
    pub import_label: String,
    pub campaign: Option<String>,
    pub client: Option<String>,
    pub group: Option<String>,
    pub product: Option<String>,
    pub adesao: Option<String>,
    pub operador: Option<String>,
    pub status: Option<String>,
    pub manifesto: Option<String>,
    pub severidade: Option<String>,
    pub data: Option<DateTime<Utc>>,
    pub pontos: i32,
}

/// Absent and empty both mean "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Filters {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub adesao: Option<String>,
    pub operador: Option<String>,
    pub group: Option<String>,
    pub severidade: Option<String>,
    pub min_points: Option<String>,
    pub max_points: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HoStatus {
    #[serde(rename = "HO")]
    Ho,
    #[serde(rename = "ALERTA")]
    Alerta,
    #[serde(rename = "PRESENCIAL")]
    Presencial,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalystRollup {
    pub operador: String,
    pub total: i64,
    pub avg_quality: f64,
    pub errors: i64,
    pub prod_rank: i64,
    pub ho_status: HoStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpis {
    pub total_analyses: i64,
    pub avg_quality: f64,
    pub ho_ok: i64,
    pub ho_presencial: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub filters: Filters,
    pub kpis: Kpis,
    pub analysts: Vec<AnalystRollup>,
}

/// Frozen at save time; viewing never re-runs the query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub filters: Filters,
    pub dashboard: Dashboard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSummary {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub name: String,
}

use anyhow::bail;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::models::{NormalizedRow, StoredRow};
use crate::scoring;

/// Rows per storage transaction; a chunk is the atomicity unit.
pub const CHUNK_SIZE: usize = 300;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReceipt {
    pub imported_at: DateTime<Utc>,
    pub import_label: String,
    pub inserted: usize,
}

pub fn score_row(
    row: NormalizedRow,
    imported_at: DateTime<Utc>,
    import_label: &str,
) -> StoredRow {
    let row = row.cleaned();
    let pontos = scoring::points_for(row.status.as_deref(), row.severidade.as_deref());
    StoredRow {
        id: Uuid::new_v4(),
        imported_at,
        import_label: import_label.to_string(),
        campaign: row.campaign,
        client: row.client,
        group: row.group,
        product: row.product,
        adesao: row.adesao,
        operador: row.operador,
        status: row.status,
        manifesto: row.manifesto,
        severidade: row.severidade,
        data: row.data,
        pontos,
    }
}

/// If a chunk fails, earlier chunks remain committed and the error is
/// surfaced; rows are never deduplicated, so a retry can duplicate them.
pub async fn import_rows(
    pool: &PgPool,
    import_label: Option<String>,
    rows: Vec<NormalizedRow>,
) -> anyhow::Result<ImportReceipt> {
    if rows.is_empty() {
        bail!("no rows to import");
    }

    let imported_at = Utc::now();
    let import_label = import_label
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| format!("Import {}", imported_at.to_rfc3339()));

    let inserted = rows.len();
    let scored: Vec<StoredRow> = rows
        .into_iter()
        .map(|row| score_row(row, imported_at, &import_label))
        .collect();

    for chunk in scored.chunks(CHUNK_SIZE) {
        db::insert_chunk(pool, chunk).await?;
    }

    Ok(ImportReceipt { imported_at, import_label, inserted })
}

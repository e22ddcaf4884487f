use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{Dashboard, Filters, Snapshot, SnapshotSummary, StoredRow};

/// Most-recent-first page size for the snapshot listing.
pub const SNAPSHOT_LIST_LIMIT: i64 = 100;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::query("CREATE SCHEMA IF NOT EXISTS qa_review")
        .execute(pool)
        .await?;

    // seq records insertion order; listings are ordered by
    // (imported_at DESC, seq DESC).
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS qa_review.rows (
            seq BIGSERIAL PRIMARY KEY,
            id UUID NOT NULL UNIQUE,
            imported_at TIMESTAMPTZ NOT NULL,
            import_label TEXT NOT NULL,
            campaign TEXT,
            client TEXT,
            grupo TEXT,
            product TEXT,
            adesao TEXT,
            operador TEXT,
            status TEXT,
            manifesto TEXT,
            severidade TEXT,
            data TIMESTAMPTZ,
            pontos INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS qa_review.snapshots (
            id UUID PRIMARY KEY,
            created_at TIMESTAMPTZ NOT NULL,
            name TEXT NOT NULL,
            filters_json TEXT NOT NULL,
            dashboard_json TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Inserts one chunk of scored rows as a single transaction. A failure
/// rolls back this chunk only; previously committed chunks stay.
pub async fn insert_chunk(pool: &PgPool, rows: &[StoredRow]) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;
    for row in rows {
        sqlx::query(
            r#"
            INSERT INTO qa_review.rows
            (id, imported_at, import_label, campaign, client, grupo, product,
             adesao, operador, status, manifesto, severidade, data, pontos)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(row.id)
        .bind(row.imported_at)
        .bind(&row.import_label)
        .bind(&row.campaign)
        .bind(&row.client)
        .bind(&row.group)
        .bind(&row.product)
        .bind(&row.adesao)
        .bind(&row.operador)
        .bind(&row.status)
        .bind(&row.manifesto)
        .bind(&row.severidade)
        .bind(row.data)
        .bind(row.pontos)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Fetches every stored row in listing order. Filtering happens in
/// process through the shared predicate; pushdown is an optimization
/// this store does not need at its scale.
pub async fn fetch_rows(pool: &PgPool) -> anyhow::Result<Vec<StoredRow>> {
    let records = sqlx::query(
        r#"
        SELECT id, imported_at, import_label, campaign, client, grupo, product,
               adesao, operador, status, manifesto, severidade, data, pontos
        FROM qa_review.rows
        ORDER BY imported_at DESC, seq DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        rows.push(StoredRow {
            id: record.get("id"),
            imported_at: record.get("imported_at"),
            import_label: record.get("import_label"),
            campaign: record.get("campaign"),
            client: record.get("client"),
            group: record.get("grupo"),
            product: record.get("product"),
            adesao: record.get("adesao"),
            operador: record.get("operador"),
            status: record.get("status"),
            manifesto: record.get("manifesto"),
            severidade: record.get("severidade"),
            data: record.get("data"),
            pontos: record.get("pontos"),
        });
    }
    Ok(rows)
}

pub async fn insert_snapshot(pool: &PgPool, snapshot: &Snapshot) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO qa_review.snapshots (id, created_at, name, filters_json, dashboard_json)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(snapshot.id)
    .bind(snapshot.created_at)
    .bind(&snapshot.name)
    .bind(serde_json::to_string(&snapshot.filters)?)
    .bind(serde_json::to_string(&snapshot.dashboard)?)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_snapshots(pool: &PgPool) -> anyhow::Result<Vec<SnapshotSummary>> {
    let records = sqlx::query(
        r#"
        SELECT id, created_at, name
        FROM qa_review.snapshots
        ORDER BY created_at DESC
        LIMIT $1
        "#,
    )
    .bind(SNAPSHOT_LIST_LIMIT)
    .fetch_all(pool)
    .await?;

    Ok(records
        .into_iter()
        .map(|record| SnapshotSummary {
            id: record.get("id"),
            created_at: record.get("created_at"),
            name: record.get("name"),
        })
        .collect())
}

pub async fn get_snapshot(pool: &PgPool, id: Uuid) -> anyhow::Result<Option<Snapshot>> {
    let record = sqlx::query(
        r#"
        SELECT id, created_at, name, filters_json, dashboard_json
        FROM qa_review.snapshots
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let Some(record) = record else {
        return Ok(None);
    };

    let filters: Filters = serde_json::from_str(record.get("filters_json"))
        .context("corrupt filters_json in snapshot")?;
    let dashboard: Dashboard = serde_json::from_str(record.get("dashboard_json"))
        .context("corrupt dashboard_json in snapshot")?;
    let created_at: DateTime<Utc> = record.get("created_at");

    Ok(Some(Snapshot {
        id: record.get("id"),
        created_at,
        name: record.get("name"),
        filters,
        dashboard,
    }))
}

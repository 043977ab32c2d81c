use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::analyzer::AsinReport;
use crate::api::health::HealthState;
use crate::db::models::{RunRow, TrafficRunRow};
use crate::error::{AppError, Result};
use crate::types::SalesTrafficReport;

/// Receives finished reports from the analysis fan-out and persists them to SQLite.
/// Runs as a dedicated background task so analysis never waits on disk.
pub struct DbWriter {
    pool: SqlitePool,
    report_rx: mpsc::Receiver<Arc<AsinReport>>,
    health: Arc<HealthState>,
    top_n: usize,
}

impl DbWriter {
    pub fn new(
        pool: SqlitePool,
        report_rx: mpsc::Receiver<Arc<AsinReport>>,
        health: Arc<HealthState>,
        top_n: usize,
    ) -> Self {
        Self { pool, report_rx, health, top_n }
    }

    pub async fn run(mut self) {
        while let Some(report) = self.report_rx.recv().await {
            match write_run(&self.pool, &report, self.top_n).await {
                Ok(run_id) => {
                    self.health.inc_runs_persisted();
                    info!(run_id, asin = %report.asin, "run persisted");
                }
                Err(e) => {
                    self.health.inc_write_failures();
                    error!(asin = %report.asin, "DB write error: {e}");
                }
            }
        }
    }
}

/// Insert one run and all of its sheets in a single transaction. Returns the run id.
pub async fn write_run(pool: &SqlitePool, report: &AsinReport, top_n: usize) -> Result<i64> {
    let created_at = unix_now();
    let mut tx = pool.begin().await?;

    let run_id = sqlx::query(
        r#"
        INSERT INTO runs (asin, week_date, created_at, total_keywords, health_score)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&report.asin)
    .bind(report.week_date.to_string())
    .bind(created_at)
    .bind(report.summary.total_keywords as i64)
    .bind(report.summary.health_score)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    for (sheet, rows) in report.sheets(top_n) {
        for (position, row) in rows.iter().enumerate() {
            let row_json = serde_json::to_string(row)?;
            sqlx::query(
                "INSERT INTO sheet_rows (run_id, sheet, position, row_json) VALUES (?, ?, ?, ?)",
            )
            .bind(run_id)
            .bind(sheet)
            .bind(position as i64)
            .bind(row_json)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;
    Ok(run_id)
}

/// Newest first.
pub async fn runs_for_asin(pool: &SqlitePool, asin: &str) -> Result<Vec<RunRow>> {
    let runs = sqlx::query_as::<_, RunRow>(
        r#"
        SELECT id, asin, week_date, created_at, total_keywords, health_score
        FROM runs
        WHERE asin = ?
        ORDER BY id DESC
        "#,
    )
    .bind(asin)
    .fetch_all(pool)
    .await?;
    Ok(runs)
}

pub async fn run_by_id(pool: &SqlitePool, run_id: i64) -> Result<Option<RunRow>> {
    let run = sqlx::query_as::<_, RunRow>(
        "SELECT id, asin, week_date, created_at, total_keywords, health_score FROM runs WHERE id = ?",
    )
    .bind(run_id)
    .fetch_optional(pool)
    .await?;
    Ok(run)
}

/// Stored rows of one sheet, in their original order.
pub async fn sheet_rows(pool: &SqlitePool, run_id: i64, sheet: &str) -> Result<Vec<serde_json::Value>> {
    let raw: Vec<String> = sqlx::query_scalar(
        "SELECT row_json FROM sheet_rows WHERE run_id = ? AND sheet = ? ORDER BY position",
    )
    .bind(run_id)
    .bind(sheet)
    .fetch_all(pool)
    .await?;

    raw.iter()
        .map(|s| serde_json::from_str::<serde_json::Value>(s).map_err(AppError::from))
        .collect()
}

/// Insert one Sales & Traffic document and both of its sheets in a single transaction.
pub async fn write_traffic_run(pool: &SqlitePool, source: &str, report: &SalesTrafficReport) -> Result<i64> {
    let mut tx = pool.begin().await?;

    let run_id = sqlx::query(
        r#"
        INSERT INTO traffic_runs (source, data_start, data_end, created_at, date_rows, asin_rows)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(source)
    .bind(report.data_start.map(|d| d.to_string()))
    .bind(report.data_end.map(|d| d.to_string()))
    .bind(unix_now())
    .bind(report.by_date.len() as i64)
    .bind(report.by_asin.len() as i64)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    for (sheet, rows) in report.sheets() {
        for (position, row) in rows.iter().enumerate() {
            sqlx::query(
                "INSERT INTO traffic_rows (traffic_run_id, sheet, position, row_json) VALUES (?, ?, ?, ?)",
            )
            .bind(run_id)
            .bind(sheet)
            .bind(position as i64)
            .bind(serde_json::to_string(row)?)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;
    Ok(run_id)
}

/// Newest first.
pub async fn traffic_runs(pool: &SqlitePool) -> Result<Vec<TrafficRunRow>> {
    let runs = sqlx::query_as::<_, TrafficRunRow>(
        r#"
        SELECT id, source, data_start, data_end, created_at, date_rows, asin_rows
        FROM traffic_runs
        ORDER BY id DESC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(runs)
}

pub async fn traffic_run_by_id(pool: &SqlitePool, run_id: i64) -> Result<Option<TrafficRunRow>> {
    let run = sqlx::query_as::<_, TrafficRunRow>(
        "SELECT id, source, data_start, data_end, created_at, date_rows, asin_rows FROM traffic_runs WHERE id = ?",
    )
    .bind(run_id)
    .fetch_optional(pool)
    .await?;
    Ok(run)
}

pub async fn traffic_rows(pool: &SqlitePool, run_id: i64, sheet: &str) -> Result<Vec<serde_json::Value>> {
    let raw: Vec<String> = sqlx::query_scalar(
        "SELECT row_json FROM traffic_rows WHERE traffic_run_id = ? AND sheet = ? ORDER BY position",
    )
    .bind(run_id)
    .bind(sheet)
    .fetch_all(pool)
    .await?;

    raw.iter()
        .map(|s| serde_json::from_str::<serde_json::Value>(s).map_err(AppError::from))
        .collect()
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

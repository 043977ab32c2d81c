mod analyzer;
mod api;
mod config;
mod db;
mod error;
mod ingest;
mod state;
mod types;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::analyzer::{analyze_snapshots, AsinReport};
use crate::api::health::HealthState;
use crate::api::routes::{router, ApiState};
use crate::config::{Config, CHANNEL_CAPACITY, TOP_OPPORTUNITIES};
use crate::db::writer::write_traffic_run;
use crate::db::DbWriter;
use crate::error::Result;
use crate::ingest::{load_report_dir, load_traffic_dir, merge_snapshots};
use crate::state::ReportStore;
use crate::types::{SalesTrafficReport, WeeklySnapshot};

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let pool = sqlx::SqlitePool::connect(&format!("sqlite:{}?mode=rwc", cfg.db_path)).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database ready at {}", cfg.db_path);

    // --- Load SQP reports ---
    let snapshots = load_report_dir(Path::new(&cfg.report_dir)).await?;
    let by_asin = group_by_asin(snapshots);
    if by_asin.is_empty() {
        warn!("No SQP data found in {}", cfg.report_dir);
    } else {
        info!("Loaded weekly data for {} ASINs from {}", by_asin.len(), cfg.report_dir);
    }

    // --- Shared state ---
    let store = ReportStore::new();
    let health = Arc::new(HealthState::new());

    // --- DB writer ---
    let (report_tx, writer_handle) = if cfg.dry_run {
        info!("DRY_RUN set: results will not be persisted");
        (None, None)
    } else {
        let (tx, rx) = mpsc::channel::<Arc<AsinReport>>(CHANNEL_CAPACITY);
        let writer = DbWriter::new(pool.clone(), rx, Arc::clone(&health), TOP_OPPORTUNITIES);
        (Some(tx), Some(tokio::spawn(async move { writer.run().await })))
    };

    // --- Per-ASIN analysis fan-out ---
    let today = chrono::Local::now().date_naive();
    let mut tasks = JoinSet::new();
    for (asin, weeks) in by_asin {
        let thresholds = cfg.thresholds.clone();
        tasks.spawn_blocking(move || {
            let report = analyze_snapshots(&thresholds, &weeks, today);
            (asin, report)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let report = match joined {
            Ok((_, Some(report))) => Arc::new(report),
            Ok((asin, None)) => {
                warn!(%asin, "no weekly data to analyze");
                continue;
            }
            Err(e) => {
                error!("Analysis task failed: {e}");
                continue;
            }
        };

        log_report(&report);
        health.record_analysis(now_secs());
        store.insert(Arc::clone(&report));

        if let Some(tx) = &report_tx {
            if tx.send(report).await.is_err() {
                warn!("DB writer channel closed");
            }
        }
    }
    if store.is_empty() {
        warn!("No ASIN reports were produced");
    } else {
        info!("Analysis complete for {} ASINs", store.len());
    }

    // --- Sales & Traffic reports ---
    if let Some(dir) = &cfg.traffic_report_dir {
        for (source, report) in load_traffic_dir(Path::new(dir)).await? {
            log_traffic(&source, &report);
            if cfg.dry_run {
                continue;
            }
            match write_traffic_run(&pool, &source, &report).await {
                Ok(run_id) => info!(run_id, %source, "traffic run persisted"),
                Err(e) => {
                    health.inc_write_failures();
                    error!(%source, "DB write error: {e}");
                }
            }
        }
    }

    // Closing the channel lets the writer drain and exit.
    drop(report_tx);

    // --- HTTP API server ---
    if cfg.serve_api {
        let api_state = ApiState {
            store: Arc::clone(&store),
            pool: pool.clone(),
            health: Arc::clone(&health),
        };
        let app = router(api_state);
        let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
        let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
        info!("HTTP API listening on {bind_addr}");

        axum::serve(listener, app).await?;
    } else if let Some(handle) = writer_handle {
        if let Err(e) = handle.await {
            error!("DB writer task failed: {e}");
        }
    }

    Ok(())
}

/// ASIN → its weekly snapshots, one per week. Ordered by ASIN so runs are reproducible.
fn group_by_asin(snapshots: Vec<WeeklySnapshot>) -> BTreeMap<String, Vec<WeeklySnapshot>> {
    let mut by_asin: BTreeMap<String, Vec<WeeklySnapshot>> = BTreeMap::new();
    for snapshot in merge_snapshots(snapshots) {
        by_asin.entry(snapshot.asin.clone()).or_default().push(snapshot);
    }
    by_asin
}

fn log_report(r: &AsinReport) {
    let categories = &r.summaries.categories;
    let diagnostics = &r.summaries.diagnostics;
    info!(
        event = "ASIN_ANALYZED",
        asin = %r.asin,
        week = %r.week_date,
        weeks = r.weeks_analyzed,
        keywords = categories.total(),
        bread_butter = categories.get("bread_butter"),
        opportunities = categories.get("opportunities"),
        leaks = categories.get("leaks"),
        price_flagged = r.summaries.prices.get("total_flagged"),
        health_score = r.summary.health_score,
        "ASIN {} | keywords: {} | B&B: {} | opp: {} | leaks: {} | health: {:.1}",
        r.asin,
        categories.total(),
        categories.get("bread_butter"),
        categories.get("opportunities"),
        categories.get("leaks"),
        r.summary.health_score,
    );
    info!(
        event = "ASIN_DIAGNOSTICS",
        asin = %r.asin,
        ghost = diagnostics.get("ghost"),
        window_shopper = diagnostics.get("window_shopper"),
        price_problem = diagnostics.get("price_problem"),
        healthy = diagnostics.get("healthy"),
        title = r.summaries.placements.get("title"),
        bullets = r.summaries.placements.get("bullets"),
        backend = r.summaries.placements.get("backend"),
        description = r.summaries.placements.get("description"),
        "ASIN {} | ghost: {} | window shopper: {} | price problem: {} | healthy: {}",
        r.asin,
        diagnostics.get("ghost"),
        diagnostics.get("window_shopper"),
        diagnostics.get("price_problem"),
        diagnostics.get("healthy"),
    );
    if let Some(top) = r.top_opportunities(1).first() {
        info!(
            asin = %r.asin,
            query = %top.search_query,
            score = top.opportunity_score,
            diagnostic = %top.diagnostic_type,
            "Top opportunity"
        );
    }
}

fn log_traffic(source: &str, r: &SalesTrafficReport) {
    let units: u64 = r.by_date.iter().map(|d| d.units_ordered).sum();
    let sessions: u64 = r.by_date.iter().map(|d| d.sessions).sum();
    info!(
        event = "TRAFFIC_LOADED",
        source,
        start = %r.data_start.map(|d| d.to_string()).unwrap_or_default(),
        end = %r.data_end.map(|d| d.to_string()).unwrap_or_default(),
        days = r.by_date.len(),
        asins = r.by_asin.len(),
        units,
        sessions,
        "Traffic {} | days: {} | ASINs: {} | units: {} | sessions: {}",
        source,
        r.by_date.len(),
        r.by_asin.len(),
        units,
        sessions,
    );
    if let Some(top) = r.by_asin.first() {
        info!(source, asin = %top.asin, units = top.units_ordered, "Top ASIN by units");
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Thresholds;
    use crate::types::SQPRecord;
    use chrono::NaiveDate;

    #[test]
    fn group_by_asin_keeps_week_order_per_asin() {
        let w = |d: u32| NaiveDate::from_ymd_opt(2025, 1, d).unwrap();
        let snaps = vec![
            WeeklySnapshot::new("B0B", w(5), vec![]),
            WeeklySnapshot::new("B0A", w(12), vec![]),
            WeeklySnapshot::new("B0A", w(5), vec![]),
        ];
        let grouped = group_by_asin(snaps);
        let asins: Vec<&str> = grouped.keys().map(String::as_str).collect();
        assert_eq!(asins, ["B0A", "B0B"]);
        let weeks: Vec<NaiveDate> = grouped["B0A"].iter().map(|s| s.week_date).collect();
        assert_eq!(weeks, [w(12), w(5)]);
    }

    #[test]
    fn same_week_from_two_sources_is_analyzed_as_one() {
        let week = NaiveDate::from_ymd_opt(2025, 1, 26).unwrap();
        let snaps = vec![
            WeeklySnapshot::new("B0A", week, vec![SQPRecord::new("file1 kw", "B0A", week)]),
            WeeklySnapshot::new("B0A", week, vec![SQPRecord::new("file2 kw", "B0A", week)]),
        ];
        let grouped = group_by_asin(snaps);
        assert_eq!(grouped["B0A"].len(), 1);

        let report = analyze_snapshots(&Thresholds::default(), &grouped["B0A"], week).unwrap();
        assert_eq!(report.weeks_analyzed, 1);
        let mut queries: Vec<&str> = report
            .diagnostics
            .iter()
            .map(|d| d.search_query.as_str())
            .collect();
        queries.sort_unstable();
        assert_eq!(queries, ["file1 kw", "file2 kw"]);
    }
}

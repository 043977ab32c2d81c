use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::analyzer::report::ReportSummaries;
use crate::analyzer::{AsinReport, SHEETS};
use crate::api::health::HealthState;
use crate::db::models::{RunRow, TrafficRunRow};
use crate::db::writer::{
    run_by_id, runs_for_asin, sheet_rows, traffic_run_by_id, traffic_rows, traffic_runs,
};
use crate::error::AppError;
use crate::state::ReportStore;
use crate::types::{
    AsinSummary, CategorizedKeyword, DiagnosticType, KeywordCategory, KeywordDiagnostic,
    KeywordPlacement, PlacementTarget, PriceFlag, TrendRecord, TRAFFIC_SHEETS,
};

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<ReportStore>,
    pub pool: sqlx::SqlitePool,
    pub health: Arc<HealthState>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/asins", get(get_asins))
        .route("/asins/:asin/summary", get(get_asin_summary))
        .route("/asins/:asin/diagnostics", get(get_diagnostics))
        .route("/asins/:asin/placements", get(get_placements))
        .route("/asins/:asin/price-flags", get(get_price_flags))
        .route("/asins/:asin/trends", get(get_trends))
        .route("/asins/:asin/keywords", get(get_keywords))
        .route("/asins/:asin/runs", get(get_runs))
        .route("/runs/:id/sheets/:sheet", get(get_sheet))
        .route("/traffic/runs", get(get_traffic_runs))
        .route("/traffic/runs/:id/sheets/:sheet", get(get_traffic_sheet))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize, Default)]
pub struct DiagnosticsQuery {
    pub diagnostic: Option<DiagnosticType>,
    pub limit: Option<usize>,
}

#[derive(Deserialize, Default)]
pub struct PlacementsQuery {
    pub placement: Option<PlacementTarget>,
}

#[derive(Deserialize, Default)]
pub struct KeywordsQuery {
    pub category: Option<KeywordCategory>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub asins: usize,
    pub asins_analyzed: u64,
    pub runs_persisted: u64,
    pub write_failures: u64,
    pub last_run_at: u64,
}

#[derive(Serialize)]
pub struct AsinSummaryResponse {
    pub summary: AsinSummary,
    pub week_date: String,
    pub weeks_analyzed: usize,
    pub breakdown: ReportSummaries,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn report_for(state: &ApiState, asin: &str) -> Result<Arc<AsinReport>, AppError> {
    state
        .store
        .get(asin)
        .ok_or_else(|| AppError::NotFound(format!("no analysis for ASIN {asin}")))
}

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        asins: state.store.len(),
        asins_analyzed: state.health.asins_analyzed(),
        runs_persisted: state.health.runs_persisted(),
        write_failures: state.health.write_failures(),
        last_run_at: state.health.last_run_at(),
    })
}

async fn get_asins(State(state): State<ApiState>) -> Json<Vec<AsinSummary>> {
    Json(state.store.summaries())
}

async fn get_asin_summary(
    State(state): State<ApiState>,
    Path(asin): Path<String>,
) -> Result<Json<AsinSummaryResponse>, AppError> {
    let report = report_for(&state, &asin)?;
    Ok(Json(AsinSummaryResponse {
        summary: report.summary.clone(),
        week_date: report.week_date.to_string(),
        weeks_analyzed: report.weeks_analyzed,
        breakdown: report.summaries.clone(),
    }))
}

/// Ordered by opportunity score; `limit` applies after the type filter.
async fn get_diagnostics(
    State(state): State<ApiState>,
    Path(asin): Path<String>,
    Query(params): Query<DiagnosticsQuery>,
) -> Result<Json<Vec<KeywordDiagnostic>>, AppError> {
    let report = report_for(&state, &asin)?;
    let diagnostics = report
        .diagnostics
        .iter()
        .filter(|d| params.diagnostic.map_or(true, |t| d.diagnostic_type == t))
        .take(params.limit.unwrap_or(usize::MAX))
        .cloned()
        .collect();
    Ok(Json(diagnostics))
}

async fn get_placements(
    State(state): State<ApiState>,
    Path(asin): Path<String>,
    Query(params): Query<PlacementsQuery>,
) -> Result<Json<Vec<KeywordPlacement>>, AppError> {
    let report = report_for(&state, &asin)?;
    let placements = report
        .placements
        .iter()
        .filter(|p| params.placement.map_or(true, |t| p.placement == t))
        .cloned()
        .collect();
    Ok(Json(placements))
}

async fn get_price_flags(
    State(state): State<ApiState>,
    Path(asin): Path<String>,
) -> Result<Json<Vec<PriceFlag>>, AppError> {
    Ok(Json(report_for(&state, &asin)?.price_flags.clone()))
}

async fn get_trends(
    State(state): State<ApiState>,
    Path(asin): Path<String>,
) -> Result<Json<Vec<TrendRecord>>, AppError> {
    Ok(Json(report_for(&state, &asin)?.trends.clone()))
}

async fn get_keywords(
    State(state): State<ApiState>,
    Path(asin): Path<String>,
    Query(params): Query<KeywordsQuery>,
) -> Result<Json<Vec<CategorizedKeyword>>, AppError> {
    let report = report_for(&state, &asin)?;
    let keywords = report
        .categorized
        .iter()
        .filter(|k| params.category.map_or(true, |c| k.category == c))
        .cloned()
        .collect();
    Ok(Json(keywords))
}

async fn get_runs(
    State(state): State<ApiState>,
    Path(asin): Path<String>,
) -> Result<Json<Vec<RunRow>>, AppError> {
    Ok(Json(runs_for_asin(&state.pool, &asin).await?))
}

async fn get_sheet(
    State(state): State<ApiState>,
    Path((run_id, sheet)): Path<(i64, String)>,
) -> Result<Json<Vec<serde_json::Value>>, AppError> {
    if !SHEETS.contains(&sheet.as_str()) {
        return Err(AppError::NotFound(format!("unknown sheet {sheet}")));
    }
    if run_by_id(&state.pool, run_id).await?.is_none() {
        return Err(AppError::NotFound(format!("run {run_id}")));
    }
    Ok(Json(sheet_rows(&state.pool, run_id, &sheet).await?))
}

async fn get_traffic_runs(State(state): State<ApiState>) -> Result<Json<Vec<TrafficRunRow>>, AppError> {
    Ok(Json(traffic_runs(&state.pool).await?))
}

async fn get_traffic_sheet(
    State(state): State<ApiState>,
    Path((run_id, sheet)): Path<(i64, String)>,
) -> Result<Json<Vec<serde_json::Value>>, AppError> {
    if !TRAFFIC_SHEETS.contains(&sheet.as_str()) {
        return Err(AppError::NotFound(format!("unknown sheet {sheet}")));
    }
    if traffic_run_by_id(&state.pool, run_id).await?.is_none() {
        return Err(AppError::NotFound(format!("traffic run {run_id}")));
    }
    Ok(Json(traffic_rows(&state.pool, run_id, &sheet).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::analyze_snapshots;
    use crate::config::Thresholds;
    use crate::db::writer::{write_run, write_traffic_run};
    use crate::ingest::parse_sales_traffic_report;
    use crate::types::{SQPRecord, WeeklySnapshot};
    use chrono::NaiveDate;
    use sqlx::sqlite::SqlitePoolOptions;

    const ASIN: &str = "B000TEST01";

    fn rec(query: &str, volume: u64, imp: f64, click: f64, purchase: f64) -> SQPRecord {
        let mut r = SQPRecord::new(query, ASIN, NaiveDate::from_ymd_opt(2025, 1, 26).unwrap());
        r.search_volume = volume;
        r.impressions_share = imp;
        r.clicks_share = click;
        r.purchases_share = purchase;
        r
    }

    async fn state() -> ApiState {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();

        let week = NaiveDate::from_ymd_opt(2025, 1, 26).unwrap();
        let snap = WeeklySnapshot::new(
            ASIN,
            week,
            vec![
                rec("yoga mat", 5000, 25.0, 20.0, 18.0),
                rec("thick yoga mat", 1200, 0.4, 0.0, 0.0),
                rec("pilates mat", 800, 12.0, 0.5, 0.0),
            ],
        );
        let store = ReportStore::new();
        store.insert(Arc::new(analyze_snapshots(&Thresholds::default(), &[snap], week).unwrap()));
        ApiState { store, pool, health: Arc::new(HealthState::new()) }
    }

    #[tokio::test]
    async fn unknown_asin_is_not_found() {
        let s = state().await;
        let err = get_price_flags(State(s), Path("NOPE".to_string())).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn diagnostics_filter_and_limit() {
        let s = state().await;
        let Json(all) = get_diagnostics(
            State(s.clone()),
            Path(ASIN.to_string()),
            Query(DiagnosticsQuery::default()),
        )
        .await
        .unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].search_query, "yoga mat");

        let Json(ghosts) = get_diagnostics(
            State(s.clone()),
            Path(ASIN.to_string()),
            Query(DiagnosticsQuery { diagnostic: Some(DiagnosticType::Ghost), limit: None }),
        )
        .await
        .unwrap();
        assert_eq!(ghosts.len(), 1);
        assert_eq!(ghosts[0].search_query, "thick yoga mat");

        let Json(one) = get_diagnostics(
            State(s),
            Path(ASIN.to_string()),
            Query(DiagnosticsQuery { diagnostic: None, limit: Some(1) }),
        )
        .await
        .unwrap();
        assert_eq!(one.len(), 1);
    }

    #[tokio::test]
    async fn keywords_filter_by_category() {
        let s = state().await;
        let Json(leaks) = get_keywords(
            State(s),
            Path(ASIN.to_string()),
            Query(KeywordsQuery { category: Some(KeywordCategory::Leak) }),
        )
        .await
        .unwrap();
        let queries: Vec<&str> = leaks.iter().map(|k| k.search_query.as_str()).collect();
        assert_eq!(queries, ["pilates mat"]);
    }

    #[tokio::test]
    async fn placements_filter_by_target() {
        let s = state().await;
        let Json(all) = get_placements(
            State(s.clone()),
            Path(ASIN.to_string()),
            Query(PlacementsQuery::default()),
        )
        .await
        .unwrap();
        let Json(titles) = get_placements(
            State(s),
            Path(ASIN.to_string()),
            Query(PlacementsQuery { placement: Some(PlacementTarget::Title) }),
        )
        .await
        .unwrap();
        assert_eq!(all.len(), 3);
        assert!(titles.iter().all(|p| p.placement == PlacementTarget::Title));
    }

    #[tokio::test]
    async fn health_and_asin_list() {
        let s = state().await;
        let Json(health) = get_health(State(s.clone())).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.asins, 1);

        let Json(asins) = get_asins(State(s.clone())).await;
        assert_eq!(asins.len(), 1);
        assert_eq!(asins[0].total_keywords, 3);

        let Json(summary) = get_asin_summary(State(s), Path(ASIN.to_string())).await.unwrap();
        assert_eq!(summary.week_date, "2025-01-26");
        assert_eq!(summary.breakdown.diagnostics.get("ghost"), 1);
    }

    #[tokio::test]
    async fn persisted_sheets_are_served() {
        let s = state().await;
        let report = s.store.get(ASIN).unwrap();
        let run_id = write_run(&s.pool, &report, 50).await.unwrap();

        let Json(runs) = get_runs(State(s.clone()), Path(ASIN.to_string())).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].id, run_id);

        let Json(rows) = get_sheet(State(s.clone()), Path((run_id, "leaks".to_string())))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["Category"], "leak");

        let err = get_sheet(State(s.clone()), Path((run_id, "bogus".to_string())))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = get_sheet(State(s), Path((run_id + 1, "leaks".to_string())))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn traffic_sheets_are_served() {
        let s = state().await;
        let doc = serde_json::json!({
            "salesAndTrafficByDate": [
                { "date": "2025-01-20", "salesByDate": { "unitsOrdered": 4 }, "trafficByDate": { "sessions": 70 } }
            ],
            "salesAndTrafficByAsin": [
                { "childAsin": "B0LOW", "salesByAsin": { "unitsOrdered": 1 } },
                { "childAsin": "B0HIGH", "salesByAsin": { "unitsOrdered": 3 } }
            ]
        })
        .to_string();
        let report = parse_sales_traffic_report(&doc).unwrap();
        let run_id = write_traffic_run(&s.pool, "w04.json", &report).await.unwrap();

        let Json(runs) = get_traffic_runs(State(s.clone())).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].asin_rows, 2);

        let Json(rows) = get_traffic_sheet(State(s.clone()), Path((run_id, "traffic_by_asin".to_string())))
            .await
            .unwrap();
        assert_eq!(rows[0]["ASIN"], "B0HIGH");
        assert_eq!(rows[1]["Units Ordered"], 1);

        let err = get_traffic_sheet(State(s.clone()), Path((run_id, "weekly".to_string())))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = get_traffic_sheet(State(s), Path((run_id + 1, "traffic_by_date".to_string())))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}

use serde::Serialize;

/// Row of the `runs` table: one analyzed ASIN per run.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct RunRow {
    pub id: i64,
    pub asin: String,
    /// ISO date of the latest analyzed week.
    pub week_date: String,
    /// Unix seconds.
    pub created_at: i64,
    pub total_keywords: i64,
    pub health_score: f64,
}

/// Row of the `traffic_runs` table: one loaded Sales & Traffic document.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct TrafficRunRow {
    pub id: i64,
    /// File the document was read from.
    pub source: String,
    pub data_start: Option<String>,
    pub data_end: Option<String>,
    pub created_at: i64,
    pub date_rows: i64,
    pub asin_rows: i64,
}

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::types::{SQPRecord, SalesTrafficReport, TrafficByAsin, TrafficByDate, WeeklySnapshot};

/// Top-level Brand Analytics search query performance document.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReport {
    report_specification: Option<RawSpecification>,
    /// Kept as raw values so one malformed entry doesn't sink the whole file.
    #[serde(default)]
    data_by_asin: Vec<serde_json::Value>,
    error_details: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSpecification {
    data_start_time: Option<String>,
    data_end_time: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawEntry {
    start_date: Option<String>,
    asin: Option<String>,
    search_query_data: RawSearchQueryData,
    impression_data: RawImpressionData,
    click_data: RawClickData,
    purchase_data: RawPurchaseData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawSearchQueryData {
    search_query: Option<String>,
    search_query_score: Option<f64>,
    search_query_volume: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawImpressionData {
    total_query_impression_count: Option<f64>,
    asin_impression_count: Option<f64>,
    asin_impression_share: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawClickData {
    total_click_count: Option<f64>,
    asin_click_count: Option<f64>,
    asin_click_share: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawPurchaseData {
    total_purchase_count: Option<f64>,
    asin_purchase_count: Option<f64>,
    asin_purchase_share: Option<f64>,
    total_median_purchase_price: Option<RawMoney>,
    asin_median_purchase_price: Option<RawMoney>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMoney {
    amount: Option<f64>,
}

fn count(v: Option<f64>) -> u64 {
    v.map_or(0, |n| n.max(0.0).round() as u64)
}

/// Accepts a plain date or an RFC 3339 timestamp; only the date part is used.
fn parse_week(raw: &str) -> Option<NaiveDate> {
    let date = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

impl RawEntry {
    fn into_record(self) -> Option<SQPRecord> {
        let query = self.search_query_data.search_query.filter(|q| !q.trim().is_empty())?;
        let asin = self.asin.filter(|a| !a.trim().is_empty())?;
        let week = parse_week(self.start_date.as_deref()?)?;

        let mut r = SQPRecord::new(query, asin, week);
        r.search_volume = count(self.search_query_data.search_query_volume);
        r.search_score = self.search_query_data.search_query_score.unwrap_or(0.0);

        r.impressions_total = count(self.impression_data.total_query_impression_count);
        r.impressions_asin = count(self.impression_data.asin_impression_count);
        r.impressions_share = self.impression_data.asin_impression_share.unwrap_or(0.0);

        r.clicks_total = count(self.click_data.total_click_count);
        r.clicks_asin = count(self.click_data.asin_click_count);
        r.clicks_share = self.click_data.asin_click_share.unwrap_or(0.0);

        let p = self.purchase_data;
        r.purchases_total = count(p.total_purchase_count);
        r.purchases_asin = count(p.asin_purchase_count);
        r.purchases_share = p.asin_purchase_share.unwrap_or(0.0);
        r.asin_price = p.asin_median_purchase_price.and_then(|m| m.amount);
        r.market_price = p.total_median_purchase_price.and_then(|m| m.amount);
        Some(r)
    }
}

/// Parse one report document into weekly snapshots, one per (ASIN, week) in
/// first-seen order. A query repeated within the same week keeps its first entry.
pub fn parse_sqp_report(json: &str) -> Result<Vec<WeeklySnapshot>> {
    let raw: RawReport = serde_json::from_str(json)
        .map_err(|e| AppError::Report(format!("invalid report document: {e}")))?;

    if let Some(details) = raw.error_details {
        return Err(AppError::Report(format!("report carries errorDetails: {details}")));
    }

    if let Some(period) = &raw.report_specification {
        debug!(
            start = period.data_start_time.as_deref().unwrap_or(""),
            end = period.data_end_time.as_deref().unwrap_or(""),
            "parsing SQP report"
        );
    }

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for (i, value) in raw.data_by_asin.into_iter().enumerate() {
        let record = match serde_json::from_value::<RawEntry>(value) {
            Ok(entry) => entry.into_record(),
            Err(e) => {
                warn!(entry = i, "unreadable report entry: {e}");
                None
            }
        };
        match record {
            Some(record) => records.push(record),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!(skipped, "report entries without query, ASIN or start date were skipped");
    }
    Ok(merge_snapshots(
        records
            .into_iter()
            .map(|r| WeeklySnapshot::new(r.asin.clone(), r.week_date, vec![r]))
            .collect(),
    ))
}

/// Fold snapshots that share an (ASIN, week) into one, in first-seen order.
/// A query already recorded for that week keeps its earlier record.
pub fn merge_snapshots(snapshots: Vec<WeeklySnapshot>) -> Vec<WeeklySnapshot> {
    let mut merged: Vec<WeeklySnapshot> = Vec::new();
    let mut slots: HashMap<(String, NaiveDate), usize> = HashMap::new();
    let mut seen: HashSet<(String, NaiveDate, String)> = HashSet::new();
    let mut dropped = 0usize;

    for snapshot in snapshots {
        let WeeklySnapshot { asin, week_date, records } = snapshot;
        let slot = *slots.entry((asin.clone(), week_date)).or_insert_with(|| {
            merged.push(WeeklySnapshot::new(asin.clone(), week_date, Vec::new()));
            merged.len() - 1
        });
        for record in records {
            if seen.insert((asin.clone(), week_date, record.search_query.clone())) {
                merged[slot].records.push(record);
            } else {
                dropped += 1;
            }
        }
    }

    if dropped > 0 {
        debug!(dropped, "duplicate (asin, week, query) records dropped");
    }
    merged
}

/// Read every `*.json` report in `dir`, in file-name order. Files covering the
/// same ASIN and week are merged into one snapshot; the earlier file wins a
/// repeated query.
pub async fn load_report_dir(dir: &Path) -> Result<Vec<WeeklySnapshot>> {
    let mut snapshots = Vec::new();
    for path in json_files(dir).await? {
        let body = tokio::fs::read_to_string(&path).await?;
        let parsed = parse_sqp_report(&body)
            .map_err(|e| AppError::Report(format!("{}: {e}", path.display())))?;
        info!(file = %path.display(), snapshots = parsed.len(), "loaded SQP report");
        snapshots.extend(parsed);
    }
    Ok(merge_snapshots(snapshots))
}

async fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

// ---------------------------------------------------------------------------
// Sales & Traffic reports
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSalesTrafficReport {
    report_specification: Option<RawSpecification>,
    #[serde(default)]
    sales_and_traffic_by_date: Vec<serde_json::Value>,
    #[serde(default)]
    sales_and_traffic_by_asin: Vec<serde_json::Value>,
    error_details: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawDateEntry {
    date: Option<String>,
    sales_by_date: RawSales,
    traffic_by_date: RawTraffic,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawAsinEntry {
    parent_asin: Option<String>,
    child_asin: Option<String>,
    sku: Option<String>,
    sales_by_asin: RawSales,
    traffic_by_asin: RawTraffic,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawSales {
    units_ordered: Option<f64>,
    ordered_product_sales: Option<RawMoney>,
    units_shipped: Option<f64>,
    orders_shipped: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawTraffic {
    sessions: Option<f64>,
    page_views: Option<f64>,
    buy_box_percentage: Option<f64>,
    unit_session_percentage: Option<f64>,
    order_item_session_percentage: Option<f64>,
}

impl RawSales {
    fn sales_amount(&self) -> f64 {
        self.ordered_product_sales
            .as_ref()
            .and_then(|m| m.amount)
            .unwrap_or(0.0)
    }
}

impl RawDateEntry {
    fn into_row(self) -> Option<TrafficByDate> {
        let date = parse_week(self.date.as_deref()?)?;
        let (s, t) = (self.sales_by_date, self.traffic_by_date);
        Some(TrafficByDate {
            date,
            units_ordered: count(s.units_ordered),
            ordered_product_sales: s.sales_amount(),
            units_shipped: count(s.units_shipped),
            orders_shipped: count(s.orders_shipped),
            sessions: count(t.sessions),
            page_views: count(t.page_views),
            buy_box_percentage: t.buy_box_percentage.unwrap_or(0.0),
            unit_session_percentage: t.unit_session_percentage.unwrap_or(0.0),
            order_item_session_percentage: t.order_item_session_percentage.unwrap_or(0.0),
        })
    }
}

impl RawAsinEntry {
    fn into_row(self) -> Option<TrafficByAsin> {
        let non_empty = |v: Option<String>| v.filter(|a| !a.trim().is_empty());
        let parent_asin = non_empty(self.parent_asin);
        let asin = non_empty(self.child_asin).or_else(|| parent_asin.clone())?;
        let (s, t) = (self.sales_by_asin, self.traffic_by_asin);
        Some(TrafficByAsin {
            asin,
            parent_asin: parent_asin.unwrap_or_default(),
            sku: self.sku.unwrap_or_default(),
            units_ordered: count(s.units_ordered),
            ordered_product_sales: s.sales_amount(),
            units_shipped: count(s.units_shipped),
            sessions: count(t.sessions),
            page_views: count(t.page_views),
            buy_box_percentage: t.buy_box_percentage.unwrap_or(0.0),
            unit_session_percentage: t.unit_session_percentage.unwrap_or(0.0),
        })
    }
}

/// Deserialize each entry on its own; unreadable or incomplete ones are counted and dropped.
fn collect_entries<R, T>(
    section: &str,
    values: Vec<serde_json::Value>,
    into_row: impl Fn(R) -> Option<T>,
) -> Vec<T>
where
    R: serde::de::DeserializeOwned,
{
    let mut rows = Vec::with_capacity(values.len());
    let mut skipped = 0usize;
    for (i, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<R>(value) {
            Ok(raw) => match into_row(raw) {
                Some(row) => rows.push(row),
                None => skipped += 1,
            },
            Err(e) => {
                warn!(section, entry = i, "unreadable report entry: {e}");
                skipped += 1;
            }
        }
    }
    if skipped > 0 {
        warn!(section, skipped, "report entries without a date or ASIN were skipped");
    }
    rows
}

/// Parse one Sales & Traffic document. Per-ASIN rows come back ordered by
/// units ordered, highest first; equal counts keep document order.
pub fn parse_sales_traffic_report(json: &str) -> Result<SalesTrafficReport> {
    let raw: RawSalesTrafficReport = serde_json::from_str(json)
        .map_err(|e| AppError::Report(format!("invalid report document: {e}")))?;

    if let Some(details) = raw.error_details {
        return Err(AppError::Report(format!("report carries errorDetails: {details}")));
    }

    let (data_start, data_end) = match &raw.report_specification {
        Some(period) => (
            period.data_start_time.as_deref().and_then(parse_week),
            period.data_end_time.as_deref().and_then(parse_week),
        ),
        None => (None, None),
    };

    let by_date = collect_entries(
        "salesAndTrafficByDate",
        raw.sales_and_traffic_by_date,
        RawDateEntry::into_row,
    );
    let mut by_asin = collect_entries(
        "salesAndTrafficByAsin",
        raw.sales_and_traffic_by_asin,
        RawAsinEntry::into_row,
    );
    by_asin.sort_by(|a, b| b.units_ordered.cmp(&a.units_ordered));

    Ok(SalesTrafficReport { data_start, data_end, by_date, by_asin })
}

/// Read every `*.json` Sales & Traffic report in `dir`, in file-name order,
/// paired with its file name.
pub async fn load_traffic_dir(dir: &Path) -> Result<Vec<(String, SalesTrafficReport)>> {
    let mut reports = Vec::new();
    for path in json_files(dir).await? {
        let body = tokio::fs::read_to_string(&path).await?;
        let report = parse_sales_traffic_report(&body)
            .map_err(|e| AppError::Report(format!("{}: {e}", path.display())))?;
        info!(
            file = %path.display(),
            days = report.by_date.len(),
            asins = report.by_asin.len(),
            "loaded Sales & Traffic report"
        );
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        reports.push((source, report));
    }
    Ok(reports)
}

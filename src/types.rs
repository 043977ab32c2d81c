use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Input: weekly SQP metrics
// ---------------------------------------------------------------------------

/// One search query's weekly metrics for one product.
/// Shares are percentages (0–100); nothing here is range-checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SQPRecord {
    pub search_query: String,
    pub asin: String,
    pub week_date: NaiveDate,

    pub search_volume: u64,
    pub search_score: f64,

    pub impressions_total: u64,
    pub impressions_asin: u64,
    pub impressions_share: f64,

    pub clicks_total: u64,
    pub clicks_asin: u64,
    pub clicks_share: f64,

    pub purchases_total: u64,
    pub purchases_asin: u64,
    pub purchases_share: f64,

    pub asin_price: Option<f64>,
    pub market_price: Option<f64>,
}

impl SQPRecord {
    /// A record with every metric zeroed and no prices.
    pub fn new(search_query: impl Into<String>, asin: impl Into<String>, week_date: NaiveDate) -> Self {
        Self {
            search_query: search_query.into(),
            asin: asin.into(),
            week_date,
            search_volume: 0,
            search_score: 0.0,
            impressions_total: 0,
            impressions_asin: 0,
            impressions_share: 0.0,
            clicks_total: 0,
            clicks_asin: 0,
            clicks_share: 0.0,
            purchases_total: 0,
            purchases_asin: 0,
            purchases_share: 0.0,
            asin_price: None,
            market_price: None,
        }
    }

    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.push("Search Query", self.search_query.as_str());
        row.push("ASIN", self.asin.as_str());
        row.push("Week", self.week_date.to_string());
        row.push("Volume", self.search_volume);
        row.push("Score", self.search_score);
        row.push("Imp Total", self.impressions_total);
        row.push("Imp ASIN", self.impressions_asin);
        row.push("Imp Share", self.impressions_share);
        row.push("Click Total", self.clicks_total);
        row.push("Click ASIN", self.clicks_asin);
        row.push("Click Share", self.clicks_share);
        row.push("Purchase Total", self.purchases_total);
        row.push("Purchase ASIN", self.purchases_asin);
        row.push("Purchase Share", self.purchases_share);
        row.push("ASIN Price", self.asin_price);
        row.push("Market Price", self.market_price);
        row
    }
}

/// One ASIN's full keyword set for one week. Record order is ingestion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySnapshot {
    pub asin: String,
    pub week_date: NaiveDate,
    pub records: Vec<SQPRecord>,
}

impl WeeklySnapshot {
    pub fn new(asin: impl Into<String>, week_date: NaiveDate, records: Vec<SQPRecord>) -> Self {
        Self { asin: asin.into(), week_date, records }
    }

    pub fn records_by_query(&self) -> HashMap<&str, &SQPRecord> {
        self.records
            .iter()
            .map(|r| (r.search_query.as_str(), r))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Classification outcomes
// ---------------------------------------------------------------------------

/// Estimated page position, derived from impression share alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankStatus {
    #[serde(rename = "top_3")]
    Top3,
    #[serde(rename = "page_1_high")]
    Page1High,
    #[serde(rename = "page_1_low")]
    Page1Low,
    Invisible,
}

impl std::fmt::Display for RankStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RankStatus::Top3 => "top_3",
            RankStatus::Page1High => "page_1_high",
            RankStatus::Page1Low => "page_1_low",
            RankStatus::Invisible => "invisible",
        };
        write!(f, "{s}")
    }
}

/// Root cause for a keyword. Variants are listed in evaluation priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticType {
    /// High volume, product is essentially invisible.
    Ghost,
    /// Seen but not clicked.
    WindowShopper,
    /// Visible and priced above market.
    PriceProblem,
    Healthy,
}

impl DiagnosticType {
    pub const ALL: [DiagnosticType; 4] = [
        DiagnosticType::Ghost,
        DiagnosticType::WindowShopper,
        DiagnosticType::PriceProblem,
        DiagnosticType::Healthy,
    ];

    pub fn recommended_fix(self) -> &'static str {
        match self {
            DiagnosticType::Ghost => {
                "Not ranking for this keyword. Add to listing (title/bullets/backend) \
                 or run PPC to build relevance."
            }
            DiagnosticType::WindowShopper => {
                "Customers see but don't click. Improve main image, title, \
                 or review count. Check competitor positioning."
            }
            DiagnosticType::PriceProblem => {
                "Price is above market. Consider price adjustment, bundle offers, \
                 or highlight value proposition in listing."
            }
            DiagnosticType::Healthy => "No issues detected. Maintain current strategy.",
        }
    }
}

impl std::fmt::Display for DiagnosticType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DiagnosticType::Ghost => "ghost",
            DiagnosticType::WindowShopper => "window_shopper",
            DiagnosticType::PriceProblem => "price_problem",
            DiagnosticType::Healthy => "healthy",
        };
        write!(f, "{s}")
    }
}

/// Listing field a keyword should live in. Declaration order is output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementTarget {
    Title,
    Bullets,
    Backend,
    Description,
}

impl PlacementTarget {
    pub const ALL: [PlacementTarget; 4] = [
        PlacementTarget::Title,
        PlacementTarget::Bullets,
        PlacementTarget::Backend,
        PlacementTarget::Description,
    ];

    /// Position of the group in merged placement output.
    pub fn order(self) -> u8 {
        match self {
            PlacementTarget::Title => 0,
            PlacementTarget::Bullets => 1,
            PlacementTarget::Backend => 2,
            PlacementTarget::Description => 3,
        }
    }
}

impl std::fmt::Display for PlacementTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PlacementTarget::Title => "title",
            PlacementTarget::Bullets => "bullets",
            PlacementTarget::Backend => "backend",
            PlacementTarget::Description => "description",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordCategory {
    BreadButter,
    Opportunity,
    Leak,
    Uncategorized,
}

impl KeywordCategory {
    pub fn action(self) -> &'static str {
        match self {
            KeywordCategory::BreadButter => {
                "Protect: keep in title, maintain ad coverage and stock levels."
            }
            KeywordCategory::Opportunity => {
                "Converts when seen. Increase visibility with PPC and listing placement."
            }
            KeywordCategory::Leak => {
                "Visible but losing the sale. Review images, price and reviews versus competitors."
            }
            KeywordCategory::Uncategorized => "Monitor.",
        }
    }
}

impl std::fmt::Display for KeywordCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            KeywordCategory::BreadButter => "bread_butter",
            KeywordCategory::Opportunity => "opportunity",
            KeywordCategory::Leak => "leak",
            KeywordCategory::Uncategorized => "uncategorized",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSeverity {
    Ok,
    Warning,
    Critical,
}

impl std::fmt::Display for PriceSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PriceSeverity::Ok => "ok",
            PriceSeverity::Warning => "warning",
            PriceSeverity::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Growing,
    Stable,
    Declining,
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TrendDirection::Growing => "growing",
            TrendDirection::Stable => "stable",
            TrendDirection::Declining => "declining",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Derived results, rebuilt on every run
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordDiagnostic {
    pub search_query: String,
    pub asin: String,
    pub diagnostic_type: DiagnosticType,
    pub rank_status: RankStatus,
    pub opportunity_score: f64,
    pub search_volume: u64,
    pub impressions_share: f64,
    pub clicks_share: f64,
    pub purchases_share: f64,
    pub recommended_fix: String,
}

impl KeywordDiagnostic {
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.push("Search Query", self.search_query.as_str());
        row.push("ASIN", self.asin.as_str());
        row.push("Diagnostic", self.diagnostic_type.to_string());
        row.push("Rank Status", self.rank_status.to_string());
        row.push("Opportunity Score", self.opportunity_score);
        row.push("Volume", self.search_volume);
        row.push("Imp Share", self.impressions_share);
        row.push("Click Share", self.clicks_share);
        row.push("Purchase Share", self.purchases_share);
        row.push("Recommended Fix", self.recommended_fix.as_str());
        row
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordPlacement {
    pub search_query: String,
    pub asin: String,
    pub placement: PlacementTarget,
    /// 1-based rank inside the placement group; 0 until ranked.
    pub priority: u32,
    pub search_volume: u64,
    pub clicks_share: f64,
    pub reasoning: String,
}

impl KeywordPlacement {
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.push("Search Query", self.search_query.as_str());
        row.push("ASIN", self.asin.as_str());
        row.push("Placement", self.placement.to_string());
        row.push("Priority", self.priority);
        row.push("Volume", self.search_volume);
        row.push("Click Share", self.clicks_share);
        row.push("Reasoning", self.reasoning.as_str());
        row
    }
}

/// Keyed by `search_query`; at most one flag per query per snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceFlag {
    pub search_query: String,
    pub asin: String,
    pub asin_price: f64,
    pub market_price: f64,
    pub price_diff_percent: f64,
    pub severity: PriceSeverity,
    pub impressions_share: f64,
    pub purchases_share: f64,
}

impl PriceFlag {
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.push("Search Query", self.search_query.as_str());
        row.push("ASIN", self.asin.as_str());
        row.push("ASIN Price", self.asin_price);
        row.push("Market Price", self.market_price);
        row.push("Price Diff %", self.price_diff_percent);
        row.push("Severity", self.severity.to_string());
        row.push("Imp Share", self.impressions_share);
        row.push("Purchase Share", self.purchases_share);
        row
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizedKeyword {
    pub search_query: String,
    pub asin: String,
    pub category: KeywordCategory,
    pub action: String,
    pub impressions_share: f64,
    pub clicks_share: f64,
    pub purchases_share: f64,
    pub search_volume: u64,
    pub asin_price: Option<f64>,
    pub market_price: Option<f64>,
}

impl CategorizedKeyword {
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.push("Search Query", self.search_query.as_str());
        row.push("ASIN", self.asin.as_str());
        row.push("Category", self.category.to_string());
        row.push("Imp Share", self.impressions_share);
        row.push("Click Share", self.clicks_share);
        row.push("Purchase Share", self.purchases_share);
        row.push("Volume", self.search_volume);
        row.push("Recommended Action", self.action.as_str());
        row
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendRecord {
    pub search_query: String,
    pub asin: String,
    /// week → purchase share, chronological.
    pub weekly_purchase_shares: BTreeMap<NaiveDate, f64>,
    pub trend_direction: TrendDirection,
    pub growth_percent: f64,
}

impl TrendRecord {
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.push("Search Query", self.search_query.as_str());
        row.push("ASIN", self.asin.as_str());
        row.push("Trend Direction", self.trend_direction.to_string());
        row.push("Growth %", self.growth_percent);
        for (week, share) in &self.weekly_purchase_shares {
            row.push(week.to_string(), *share);
        }
        row
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsinSummary {
    pub asin: String,
    pub product_name: String,
    pub total_keywords: usize,
    pub bread_butter_count: usize,
    pub opportunities_count: usize,
    pub leaks_count: usize,
    pub price_flagged_count: usize,
    pub health_score: f64,
    pub last_updated: Option<NaiveDate>,
}

impl AsinSummary {
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.push("ASIN", self.asin.as_str());
        row.push("Product Name", self.product_name.as_str());
        row.push("Total Keywords", self.total_keywords);
        row.push("Bread & Butter", self.bread_butter_count);
        row.push("Opportunities", self.opportunities_count);
        row.push("Leaks", self.leaks_count);
        row.push("Price Flagged", self.price_flagged_count);
        row.push("Health Score", self.health_score);
        row.push(
            "Last Updated",
            self.last_updated.map(|d| d.to_string()).unwrap_or_default(),
        );
        row
    }
}

// ---------------------------------------------------------------------------
// Sales & Traffic
// ---------------------------------------------------------------------------

/// Sheet names of a Sales & Traffic run, in write order.
pub const TRAFFIC_SHEETS: [&str; 2] = ["traffic_by_date", "traffic_by_asin"];

/// Account-wide sales and traffic for one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficByDate {
    pub date: NaiveDate,
    pub units_ordered: u64,
    pub ordered_product_sales: f64,
    pub units_shipped: u64,
    pub orders_shipped: u64,
    pub sessions: u64,
    pub page_views: u64,
    pub buy_box_percentage: f64,
    pub unit_session_percentage: f64,
    pub order_item_session_percentage: f64,
}

impl TrafficByDate {
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.push("Date", self.date.to_string());
        row.push("Units Ordered", self.units_ordered);
        row.push("Sales ($)", self.ordered_product_sales);
        row.push("Units Shipped", self.units_shipped);
        row.push("Orders Shipped", self.orders_shipped);
        row.push("Sessions", self.sessions);
        row.push("Page Views", self.page_views);
        row.push("Buy Box %", self.buy_box_percentage);
        row.push("Unit Session %", self.unit_session_percentage);
        row.push("Order Item Session %", self.order_item_session_percentage);
        row
    }
}

/// Sales and traffic for one child ASIN over the whole report period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficByAsin {
    /// Child ASIN, or the parent when the report has no child.
    pub asin: String,
    pub parent_asin: String,
    pub sku: String,
    pub units_ordered: u64,
    pub ordered_product_sales: f64,
    pub units_shipped: u64,
    pub sessions: u64,
    pub page_views: u64,
    pub buy_box_percentage: f64,
    pub unit_session_percentage: f64,
}

impl TrafficByAsin {
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.push("ASIN", self.asin.as_str());
        row.push("Parent ASIN", self.parent_asin.as_str());
        row.push("SKU", self.sku.as_str());
        row.push("Units Ordered", self.units_ordered);
        row.push("Sales ($)", self.ordered_product_sales);
        row.push("Units Shipped", self.units_shipped);
        row.push("Sessions", self.sessions);
        row.push("Page Views", self.page_views);
        row.push("Buy Box %", self.buy_box_percentage);
        row.push("Unit Session %", self.unit_session_percentage);
        row
    }
}

/// One parsed Sales & Traffic document. `by_asin` is ordered by units ordered, highest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SalesTrafficReport {
    pub data_start: Option<NaiveDate>,
    pub data_end: Option<NaiveDate>,
    pub by_date: Vec<TrafficByDate>,
    pub by_asin: Vec<TrafficByAsin>,
}

impl SalesTrafficReport {
    pub fn sheets(&self) -> Vec<(&'static str, Vec<Row>)> {
        vec![
            (TRAFFIC_SHEETS[0], self.by_date.iter().map(|d| d.to_row()).collect()),
            (TRAFFIC_SHEETS[1], self.by_asin.iter().map(|a| a.to_row()).collect()),
        ]
    }
}

// ---------------------------------------------------------------------------
// Flat rows for tabular output
// ---------------------------------------------------------------------------

/// A single scalar cell. `Empty` serializes as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Int(i64),
    Float(f64),
    Text(String),
    Empty,
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Text(v.to_string())
    }
}

impl From<String> for Cell {
    fn from(v: String) -> Self {
        Cell::Text(v)
    }
}

impl From<u64> for Cell {
    fn from(v: u64) -> Self {
        Cell::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<usize> for Cell {
    fn from(v: usize) -> Self {
        Cell::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<u32> for Cell {
    fn from(v: u32) -> Self {
        Cell::Int(i64::from(v))
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Float(v)
    }
}

impl From<Option<f64>> for Cell {
    fn from(v: Option<f64>) -> Self {
        v.map_or(Cell::Empty, Cell::Float)
    }
}

/// Column name → value, in column order. Column names are stable across runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row(Vec<(String, Cell)>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<Cell>) {
        self.0.push((key.into(), value.into()));
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&Cell> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    #[cfg(test)]
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Row {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

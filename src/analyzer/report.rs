use chrono::NaiveDate;
use serde::Serialize;

use crate::analyzer::{
    latest_snapshot, DiagnosticAnalyzer, KeywordCategorizer, PlacementRecommender, PriceBenchmark,
    Summary, TrendTracker,
};
use crate::config::Thresholds;
use crate::types::{
    AsinSummary, CategorizedKeyword, KeywordDiagnostic, KeywordPlacement, PriceFlag, Row,
    TrendRecord, WeeklySnapshot,
};

/// Sheet names in the order `AsinReport::sheets` produces them.
pub const SHEETS: [&str; 10] = [
    "weekly",
    "bread_butter",
    "opportunities",
    "leaks",
    "trends",
    "price_flags",
    "diagnostics",
    "top_opportunities",
    "placements",
    "summary",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummaries {
    pub categories: Summary,
    pub prices: Summary,
    pub diagnostics: Summary,
    pub placements: Summary,
    pub trends: Summary,
}

/// Everything one run produces for one ASIN.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AsinReport {
    pub asin: String,
    pub week_date: NaiveDate,
    pub weeks_analyzed: usize,
    pub latest: WeeklySnapshot,
    pub categorized: Vec<CategorizedKeyword>,
    pub bread_butter: Vec<CategorizedKeyword>,
    pub opportunities: Vec<CategorizedKeyword>,
    pub leaks: Vec<CategorizedKeyword>,
    pub trends: Vec<TrendRecord>,
    pub price_flags: Vec<PriceFlag>,
    pub diagnostics: Vec<KeywordDiagnostic>,
    pub placements: Vec<KeywordPlacement>,
    pub summaries: ReportSummaries,
    pub summary: AsinSummary,
}

impl AsinReport {
    /// Diagnostics are already ordered by opportunity score.
    pub fn top_opportunities(&self, n: usize) -> &[KeywordDiagnostic] {
        &self.diagnostics[..n.min(self.diagnostics.len())]
    }

    /// Flat output tables keyed by sheet name, in write order.
    pub fn sheets(&self, top_n: usize) -> Vec<(&'static str, Vec<Row>)> {
        vec![
            ("weekly", self.latest.records.iter().map(|r| r.to_row()).collect()),
            ("bread_butter", self.bread_butter.iter().map(|k| k.to_row()).collect()),
            ("opportunities", self.opportunities.iter().map(|k| k.to_row()).collect()),
            ("leaks", self.leaks.iter().map(|k| k.to_row()).collect()),
            ("trends", self.trends.iter().map(|t| t.to_row()).collect()),
            ("price_flags", self.price_flags.iter().map(|f| f.to_row()).collect()),
            ("diagnostics", self.diagnostics.iter().map(|d| d.to_row()).collect()),
            (
                "top_opportunities",
                self.top_opportunities(top_n).iter().map(|d| d.to_row()).collect(),
            ),
            ("placements", self.placements.iter().map(|p| p.to_row()).collect()),
            ("summary", vec![self.summary.to_row()]),
        ]
    }
}

/// 0–100, higher is better. Rewards bread & butter share, penalizes leaks and
/// price flags (the price penalty is capped at 20).
pub fn health_score(categories: &Summary, prices: &Summary) -> f64 {
    let total = categories.total();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    let bread_butter = categories.get("bread_butter") as f64;
    let leaks = categories.get("leaks") as f64;
    let flagged = prices.get("total_flagged") as f64;

    let base = bread_butter / total * 100.0;
    let leak_penalty = leaks / total * 30.0;
    let price_penalty = (flagged / total * 20.0).min(20.0);

    (base - leak_penalty - price_penalty).clamp(0.0, 100.0)
}

/// Run every analyzer over one ASIN's weekly history. The latest week drives
/// categorization, pricing, diagnostics and placement; the full history drives
/// trends. Weeks belonging to other ASINs are ignored. `None` for no input.
pub fn analyze_snapshots(
    thresholds: &Thresholds,
    snapshots: &[WeeklySnapshot],
    today: NaiveDate,
) -> Option<AsinReport> {
    let latest = latest_snapshot(snapshots)?;
    let history: Vec<WeeklySnapshot> = snapshots
        .iter()
        .filter(|s| s.asin == latest.asin)
        .cloned()
        .collect();

    let categorizer = KeywordCategorizer::new(thresholds.clone());
    let trend_tracker = TrendTracker::new(thresholds.clone());
    let price_benchmark = PriceBenchmark::new(thresholds.clone());
    let diagnostic_analyzer = DiagnosticAnalyzer::new(thresholds.clone());
    let placement_recommender = PlacementRecommender::new(thresholds.clone());

    let categorized = categorizer.categorize(latest);
    let trends = trend_tracker.analyze_trends(&history);
    let price_flags = price_benchmark.analyze(latest);
    let diagnostics = diagnostic_analyzer.analyze(latest, Some(&price_flags));
    let placements = placement_recommender.analyze(latest);

    let summaries = ReportSummaries {
        categories: categorizer.summarize(&categorized),
        prices: price_benchmark.summarize(&price_flags),
        diagnostics: diagnostic_analyzer.summarize(&diagnostics),
        placements: placement_recommender.summarize(&placements),
        trends: trend_tracker.summarize(&trends),
    };

    let summary = AsinSummary {
        asin: latest.asin.clone(),
        product_name: String::new(),
        total_keywords: summaries.categories.total(),
        bread_butter_count: summaries.categories.get("bread_butter"),
        opportunities_count: summaries.categories.get("opportunities"),
        leaks_count: summaries.categories.get("leaks"),
        price_flagged_count: summaries.prices.get("total_flagged"),
        health_score: health_score(&summaries.categories, &summaries.prices),
        last_updated: Some(today),
    };

    Some(AsinReport {
        asin: latest.asin.clone(),
        week_date: latest.week_date,
        weeks_analyzed: history.len(),
        latest: latest.clone(),
        bread_butter: categorizer.get_bread_butter(&categorized),
        opportunities: categorizer.get_opportunities(&categorized),
        leaks: categorizer.get_leaks(&categorized),
        categorized,
        trends,
        price_flags,
        diagnostics,
        placements,
        summaries,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DiagnosticType, SQPRecord, TrendDirection};

    const ASIN: &str = "B000TEST01";

    fn week(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 5).unwrap() + chrono::Duration::weeks(i64::from(n))
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    struct Kw {
        query: &'static str,
        volume: u64,
        imp: f64,
        click: f64,
        purchase: f64,
        prices: Option<(f64, f64)>,
    }

    fn snapshot(n: u32, asin: &str, kws: &[Kw]) -> WeeklySnapshot {
        let records = kws
            .iter()
            .map(|k| {
                let mut r = SQPRecord::new(k.query, asin, week(n));
                r.search_volume = k.volume;
                r.impressions_share = k.imp;
                r.clicks_share = k.click;
                r.purchases_share = k.purchase;
                if let Some((asin_price, market_price)) = k.prices {
                    r.asin_price = Some(asin_price);
                    r.market_price = Some(market_price);
                }
                r
            })
            .collect();
        WeeklySnapshot::new(asin, week(n), records)
    }

    fn latest_week() -> Vec<Kw> {
        vec![
            Kw { query: "yoga mat", volume: 5000, imp: 25.0, click: 20.0, purchase: 18.0, prices: None },
            Kw { query: "thick yoga mat", volume: 1200, imp: 0.4, click: 0.0, purchase: 0.0, prices: None },
            Kw { query: "pilates mat", volume: 800, imp: 12.0, click: 0.5, purchase: 0.0, prices: None },
            Kw { query: "exercise mat", volume: 300, imp: 7.0, click: 4.0, purchase: 3.0, prices: Some((30.0, 24.0)) },
        ]
    }

    #[test]
    fn no_snapshots_no_report() {
        assert!(analyze_snapshots(&Thresholds::default(), &[], today()).is_none());
    }

    #[test]
    fn full_run_wires_price_flags_into_diagnostics() {
        let snaps = vec![
            snapshot(0, ASIN, &[Kw { query: "yoga mat", volume: 4000, imp: 20.0, click: 18.0, purchase: 12.0, prices: None }]),
            snapshot(1, ASIN, &latest_week()),
        ];
        let report = analyze_snapshots(&Thresholds::default(), &snaps, today()).unwrap();

        assert_eq!(report.asin, ASIN);
        assert_eq!(report.week_date, week(1));
        assert_eq!(report.weeks_analyzed, 2);
        assert_eq!(report.price_flags.len(), 1);

        let diag = |q: &str| {
            report
                .diagnostics
                .iter()
                .find(|d| d.search_query == q)
                .map(|d| d.diagnostic_type)
                .unwrap()
        };
        assert_eq!(diag("thick yoga mat"), DiagnosticType::Ghost);
        assert_eq!(diag("pilates mat"), DiagnosticType::WindowShopper);
        assert_eq!(diag("exercise mat"), DiagnosticType::PriceProblem);
        assert_eq!(diag("yoga mat"), DiagnosticType::Healthy);

        assert_eq!(report.bread_butter.len(), 1);
        assert_eq!(report.leaks.len(), 1);
        assert_eq!(report.trends[0].trend_direction, TrendDirection::Growing);

        assert_eq!(report.summary.total_keywords, 4);
        assert_eq!(report.summary.price_flagged_count, 1);
        assert_eq!(report.summary.last_updated, Some(today()));
        assert_eq!(report.summaries.diagnostics.category_sum(), 4);
        assert_eq!(report.summaries.placements.total(), 4);
    }

    #[test]
    fn other_asins_are_ignored_in_history() {
        let snaps = vec![
            snapshot(0, "B000OTHER1", &[Kw { query: "yoga mat", volume: 10, imp: 1.0, click: 1.0, purchase: 1.0, prices: None }]),
            snapshot(1, ASIN, &latest_week()),
        ];
        let report = analyze_snapshots(&Thresholds::default(), &snaps, today()).unwrap();
        assert_eq!(report.weeks_analyzed, 1);
        assert_eq!(report.trends[0].weekly_purchase_shares.len(), 1);
    }

    #[test]
    fn health_score_formula() {
        let mut categories = Summary::new(10);
        categories.insert("bread_butter", 5);
        categories.insert("leaks", 2);
        let mut prices = Summary::new(1);
        prices.insert("total_flagged", 1);
        // 50 - 6 - 2
        assert!((health_score(&categories, &prices) - 42.0).abs() < 1e-9);
    }

    #[test]
    fn health_score_is_clamped_and_zero_for_empty() {
        let empty = Summary::new(0);
        assert_eq!(health_score(&empty, &empty), 0.0);

        let mut categories = Summary::new(4);
        categories.insert("leaks", 4);
        let mut prices = Summary::new(4);
        prices.insert("total_flagged", 4);
        assert_eq!(health_score(&categories, &prices), 0.0);
    }

    #[test]
    fn sheets_include_top_opportunities_slice() {
        let report =
            analyze_snapshots(&Thresholds::default(), &[snapshot(0, ASIN, &latest_week())], today()).unwrap();
        let sheets = report.sheets(2);
        let names: Vec<&str> = sheets.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, SHEETS);
        let top = &sheets.iter().find(|(n, _)| *n == "top_opportunities").unwrap().1;
        assert_eq!(top.len(), 2);
        assert_eq!(report.top_opportunities(100).len(), 4);
    }

    #[test]
    fn latest_week_tie_analyzes_the_first_snapshot() {
        let first = vec![Kw { query: "first", volume: 100, imp: 25.0, click: 20.0, purchase: 18.0, prices: None }];
        let second = vec![Kw { query: "second", volume: 100, imp: 25.0, click: 20.0, purchase: 18.0, prices: None }];
        let snaps = vec![snapshot(1, ASIN, &first), snapshot(0, ASIN, &latest_week()), snapshot(1, ASIN, &second)];

        let latest = latest_snapshot(&snaps).unwrap();
        assert_eq!(latest.records[0].search_query, "first");

        let report = analyze_snapshots(&Thresholds::default(), &snaps, today()).unwrap();
        assert_eq!(report.week_date, week(1));
        assert_eq!(report.categorized.len(), 1);
        assert_eq!(report.categorized[0].search_query, "first");
    }
}

use crate::analyzer::Summary;
use crate::config::Thresholds;
use crate::types::{PriceFlag, PriceSeverity, WeeklySnapshot};

/// Flags keywords where the ASIN's price sits above the market median.
pub struct PriceBenchmark {
    thresholds: Thresholds,
}

impl PriceBenchmark {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// Severity for a price difference in percent. Only prices above market are risky.
    pub fn classify_severity(&self, price_diff_percent: f64) -> PriceSeverity {
        if price_diff_percent >= self.thresholds.price_critical_threshold {
            PriceSeverity::Critical
        } else if price_diff_percent >= self.thresholds.price_warning_threshold {
            PriceSeverity::Warning
        } else {
            PriceSeverity::Ok
        }
    }

    /// `(asin_price - market_price) / market_price * 100`, or `None` when either
    /// price is missing or the market price is not positive.
    pub fn price_diff_percent(asin_price: Option<f64>, market_price: Option<f64>) -> Option<f64> {
        match (asin_price, market_price) {
            (Some(asin), Some(market)) if market > 0.0 => Some((asin - market) / market * 100.0),
            _ => None,
        }
    }

    /// One flag per priced keyword at WARNING or above, largest gap first.
    pub fn analyze(&self, snapshot: &WeeklySnapshot) -> Vec<PriceFlag> {
        let mut flags: Vec<PriceFlag> = snapshot
            .records
            .iter()
            .filter_map(|record| {
                let (asin_price, market_price) = (record.asin_price?, record.market_price?);
                let diff = Self::price_diff_percent(Some(asin_price), Some(market_price))?;
                let severity = self.classify_severity(diff);
                if severity == PriceSeverity::Ok {
                    return None;
                }
                Some(PriceFlag {
                    search_query: record.search_query.clone(),
                    asin: record.asin.clone(),
                    asin_price,
                    market_price,
                    price_diff_percent: diff,
                    severity,
                    impressions_share: record.impressions_share,
                    purchases_share: record.purchases_share,
                })
            })
            .collect();

        flags.sort_by(|a, b| b.price_diff_percent.total_cmp(&a.price_diff_percent));
        flags
    }

    pub fn summarize(&self, flags: &[PriceFlag]) -> Summary {
        let mut summary = Summary::new(flags.len());
        summary.insert("total_flagged", flags.len());
        summary.insert("warning", 0);
        summary.insert("critical", 0);
        for f in flags {
            match f.severity {
                PriceSeverity::Warning => summary.increment("warning"),
                PriceSeverity::Critical => summary.increment("critical"),
                PriceSeverity::Ok => {}
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SQPRecord;
    use chrono::NaiveDate;

    fn week() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 26).unwrap()
    }

    fn priced(query: &str, asin_price: Option<f64>, market_price: Option<f64>) -> SQPRecord {
        let mut r = SQPRecord::new(query, "B000TEST01", week());
        r.asin_price = asin_price;
        r.market_price = market_price;
        r.impressions_share = 7.0;
        r
    }

    fn benchmark() -> PriceBenchmark {
        PriceBenchmark::new(Thresholds::default())
    }

    #[test]
    fn severity_boundaries() {
        let b = benchmark();
        assert_eq!(b.classify_severity(20.0), PriceSeverity::Critical);
        assert_eq!(b.classify_severity(19.9), PriceSeverity::Warning);
        assert_eq!(b.classify_severity(10.0), PriceSeverity::Warning);
        assert_eq!(b.classify_severity(9.9), PriceSeverity::Ok);
        assert_eq!(b.classify_severity(-50.0), PriceSeverity::Ok);
    }

    #[test]
    fn diff_needs_both_prices_and_positive_market() {
        assert_eq!(PriceBenchmark::price_diff_percent(Some(12.0), Some(10.0)), Some(20.0));
        assert_eq!(PriceBenchmark::price_diff_percent(None, Some(10.0)), None);
        assert_eq!(PriceBenchmark::price_diff_percent(Some(12.0), None), None);
        assert_eq!(PriceBenchmark::price_diff_percent(Some(12.0), Some(0.0)), None);
    }

    #[test]
    fn analyze_skips_unpriced_and_competitive_keywords() {
        let snap = WeeklySnapshot::new(
            "B000TEST01",
            week(),
            vec![
                priced("no-asin-price", None, Some(10.0)),
                priced("no-market", Some(10.0), None),
                priced("cheaper", Some(8.0), Some(10.0)),
                priced("warning", Some(11.5), Some(10.0)),
                priced("critical", Some(15.0), Some(10.0)),
            ],
        );
        let flags = benchmark().analyze(&snap);
        let got: Vec<(&str, PriceSeverity)> = flags
            .iter()
            .map(|f| (f.search_query.as_str(), f.severity))
            .collect();
        assert_eq!(
            got,
            [("critical", PriceSeverity::Critical), ("warning", PriceSeverity::Warning)]
        );
        assert_eq!(flags[0].price_diff_percent, 50.0);
        assert_eq!(flags[0].impressions_share, 7.0);
    }

    #[test]
    fn summarize_counts_severities() {
        let snap = WeeklySnapshot::new(
            "B000TEST01",
            week(),
            vec![
                priced("a", Some(15.0), Some(10.0)),
                priced("b", Some(11.2), Some(10.0)),
                priced("c", Some(11.5), Some(10.0)),
            ],
        );
        let b = benchmark();
        let summary = b.summarize(&b.analyze(&snap));
        assert_eq!(summary.get("total_flagged"), 3);
        assert_eq!(summary.get("critical"), 1);
        assert_eq!(summary.get("warning"), 2);
    }

    #[test]
    fn empty_snapshot_has_no_flags() {
        let b = benchmark();
        let flags = b.analyze(&WeeklySnapshot::new("B000TEST01", week(), vec![]));
        assert!(flags.is_empty());
        assert_eq!(b.summarize(&flags).get("total_flagged"), 0);
    }

    #[test]
    fn analyze_is_idempotent() {
        let snap = WeeklySnapshot::new(
            "B000TEST01",
            week(),
            vec![
                priced("a", Some(15.0), Some(10.0)),
                priced("b", Some(11.5), Some(10.0)),
                priced("c", Some(9.0), Some(10.0)),
            ],
        );
        let b = benchmark();
        let first = b.analyze(&snap);
        let second = b.analyze(&snap);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}

use crate::analyzer::Summary;
use crate::config::Thresholds;
use crate::types::{CategorizedKeyword, KeywordCategory, SQPRecord, WeeklySnapshot};

pub struct KeywordCategorizer {
    thresholds: Thresholds,
}

impl KeywordCategorizer {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// First match wins: BREAD_BUTTER, OPPORTUNITY, LEAK, else UNCATEGORIZED.
    pub fn classify(&self, record: &SQPRecord) -> KeywordCategory {
        let t = &self.thresholds;

        if record.purchases_share >= t.bread_butter_min_purchase_share {
            return KeywordCategory::BreadButter;
        }

        // Converts well when it is seen, but it is rarely seen.
        if record.impressions_share < t.opportunity_max_imp_share
            && record.purchases_share >= t.opportunity_min_purchase_share
        {
            return KeywordCategory::Opportunity;
        }

        if record.impressions_share >= t.leak_min_imp_share
            && (record.clicks_share < t.leak_max_click_share
                || record.purchases_share < t.leak_max_purchase_share)
        {
            return KeywordCategory::Leak;
        }

        KeywordCategory::Uncategorized
    }

    /// Snapshot order is kept.
    pub fn categorize(&self, snapshot: &WeeklySnapshot) -> Vec<CategorizedKeyword> {
        snapshot
            .records
            .iter()
            .map(|record| {
                let category = self.classify(record);
                CategorizedKeyword {
                    search_query: record.search_query.clone(),
                    asin: record.asin.clone(),
                    category,
                    action: category.action().to_string(),
                    impressions_share: record.impressions_share,
                    clicks_share: record.clicks_share,
                    purchases_share: record.purchases_share,
                    search_volume: record.search_volume,
                    asin_price: record.asin_price,
                    market_price: record.market_price,
                }
            })
            .collect()
    }

    pub fn get_bread_butter(&self, keywords: &[CategorizedKeyword]) -> Vec<CategorizedKeyword> {
        filter_category(keywords, KeywordCategory::BreadButter)
    }

    pub fn get_opportunities(&self, keywords: &[CategorizedKeyword]) -> Vec<CategorizedKeyword> {
        filter_category(keywords, KeywordCategory::Opportunity)
    }

    pub fn get_leaks(&self, keywords: &[CategorizedKeyword]) -> Vec<CategorizedKeyword> {
        filter_category(keywords, KeywordCategory::Leak)
    }

    pub fn summarize(&self, keywords: &[CategorizedKeyword]) -> Summary {
        let mut summary = Summary::new(keywords.len());
        for key in ["bread_butter", "opportunities", "leaks", "uncategorized"] {
            summary.insert(key, 0);
        }
        for k in keywords {
            let key = match k.category {
                KeywordCategory::BreadButter => "bread_butter",
                KeywordCategory::Opportunity => "opportunities",
                KeywordCategory::Leak => "leaks",
                KeywordCategory::Uncategorized => "uncategorized",
            };
            summary.increment(key);
        }
        summary
    }
}

fn filter_category(keywords: &[CategorizedKeyword], category: KeywordCategory) -> Vec<CategorizedKeyword> {
    keywords
        .iter()
        .filter(|k| k.category == category)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn week() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 26).unwrap()
    }

    fn rec(query: &str, imp: f64, click: f64, purchase: f64) -> SQPRecord {
        let mut r = SQPRecord::new(query, "B000TEST01", week());
        r.impressions_share = imp;
        r.clicks_share = click;
        r.purchases_share = purchase;
        r
    }

    fn categorizer() -> KeywordCategorizer {
        KeywordCategorizer::new(Thresholds::default())
    }

    #[test]
    fn bread_butter_takes_precedence() {
        // Also satisfies the opportunity rule (low imp share, high purchase share).
        assert_eq!(categorizer().classify(&rec("q", 2.0, 8.0, 12.0)), KeywordCategory::BreadButter);
        assert_eq!(categorizer().classify(&rec("q", 30.0, 20.0, 10.0)), KeywordCategory::BreadButter);
    }

    #[test]
    fn opportunity_is_low_visibility_with_conversions() {
        assert_eq!(categorizer().classify(&rec("q", 4.9, 3.0, 5.0)), KeywordCategory::Opportunity);
        assert_eq!(categorizer().classify(&rec("q", 4.9, 3.0, 4.9)), KeywordCategory::Uncategorized);
    }

    #[test]
    fn leak_is_visible_without_clicks_or_sales() {
        let c = categorizer();
        assert_eq!(c.classify(&rec("q", 5.0, 1.0, 3.0)), KeywordCategory::Leak);
        assert_eq!(c.classify(&rec("q", 8.0, 6.0, 1.0)), KeywordCategory::Leak);
        assert_eq!(c.classify(&rec("q", 8.0, 6.0, 3.0)), KeywordCategory::Uncategorized);
        assert_eq!(c.classify(&rec("q", 4.0, 0.0, 0.0)), KeywordCategory::Uncategorized);
    }

    #[test]
    fn categorize_keeps_order_and_filters_split_it() {
        let snap = WeeklySnapshot::new(
            "B000TEST01",
            week(),
            vec![
                rec("leak", 9.0, 0.5, 0.0),
                rec("core", 25.0, 20.0, 15.0),
                rec("opp", 1.0, 2.0, 6.0),
                rec("meh", 2.0, 2.0, 1.0),
                rec("core2", 25.0, 20.0, 11.0),
            ],
        );
        let c = categorizer();
        let all = c.categorize(&snap);
        let order: Vec<&str> = all.iter().map(|k| k.search_query.as_str()).collect();
        assert_eq!(order, ["leak", "core", "opp", "meh", "core2"]);
        assert_eq!(all[0].action, KeywordCategory::Leak.action());

        let bb: Vec<String> = c.get_bread_butter(&all).into_iter().map(|k| k.search_query).collect();
        assert_eq!(bb, ["core", "core2"]);
        assert_eq!(c.get_opportunities(&all).len(), 1);
        assert_eq!(c.get_leaks(&all).len(), 1);

        let summary = c.summarize(&all);
        assert_eq!(summary.total(), 5);
        assert_eq!(summary.get("bread_butter"), 2);
        assert_eq!(summary.get("opportunities"), 1);
        assert_eq!(summary.get("leaks"), 1);
        assert_eq!(summary.get("uncategorized"), 1);
        assert_eq!(summary.category_sum(), 5);
    }

    #[test]
    fn empty_snapshot() {
        let c = categorizer();
        let all = c.categorize(&WeeklySnapshot::new("B000TEST01", week(), vec![]));
        assert!(all.is_empty());
        assert_eq!(c.summarize(&all).total(), 0);
    }

    #[test]
    fn categorize_is_idempotent() {
        let snap = WeeklySnapshot::new(
            "B000TEST01",
            week(),
            vec![rec("leak", 9.0, 0.5, 0.0), rec("core", 25.0, 20.0, 15.0), rec("opp", 1.0, 2.0, 6.0)],
        );
        let c = categorizer();
        let first = c.categorize(&snap);
        let second = c.categorize(&snap);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}

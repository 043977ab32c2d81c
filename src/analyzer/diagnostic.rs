use std::collections::HashSet;

use crate::analyzer::Summary;
use crate::config::Thresholds;
use crate::types::{
    DiagnosticType, KeywordDiagnostic, PriceFlag, RankStatus, SQPRecord, WeeklySnapshot,
};

/// Root-cause diagnosis, rank estimate and opportunity scoring per keyword.
pub struct DiagnosticAnalyzer {
    thresholds: Thresholds,
}

impl DiagnosticAnalyzer {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// Estimate page position from impression share. First matching rung wins.
    pub fn rank_status(&self, impressions_share: f64) -> RankStatus {
        let t = &self.thresholds;
        if impressions_share >= t.rank_top_3_threshold {
            RankStatus::Top3
        } else if impressions_share >= t.rank_page_1_high_threshold {
            RankStatus::Page1High
        } else if impressions_share >= t.rank_page_1_low_threshold {
            RankStatus::Page1Low
        } else {
            RankStatus::Invisible
        }
    }

    /// Untapped volume: `search_volume * (1 - impressions_share / 100)`.
    /// Shares above 100 are taken literally and give a negative score.
    pub fn opportunity_score(&self, record: &SQPRecord) -> f64 {
        record.search_volume as f64 * (1.0 - record.impressions_share / 100.0)
    }

    /// Priority-ordered decision list. The conditions overlap, so order matters:
    /// GHOST, then WINDOW_SHOPPER, then PRICE_PROBLEM, else HEALTHY.
    pub fn diagnose(&self, record: &SQPRecord, has_price_flag: bool) -> DiagnosticType {
        let t = &self.thresholds;

        if record.search_volume >= t.ghost_min_volume
            && record.impressions_share < t.ghost_max_imp_share
        {
            return DiagnosticType::Ghost;
        }

        if record.impressions_share >= t.window_shopper_min_imp_share
            && record.clicks_share < t.window_shopper_max_click_share
        {
            return DiagnosticType::WindowShopper;
        }

        if has_price_flag && record.impressions_share >= t.price_problem_min_imp_share {
            return DiagnosticType::PriceProblem;
        }

        DiagnosticType::Healthy
    }

    /// Diagnose every record of the snapshot, highest opportunity score first.
    /// `None` and an empty slice of price flags behave the same.
    pub fn analyze(
        &self,
        snapshot: &WeeklySnapshot,
        price_flags: Option<&[PriceFlag]>,
    ) -> Vec<KeywordDiagnostic> {
        let flagged: HashSet<&str> = price_flags
            .unwrap_or_default()
            .iter()
            .map(|pf| pf.search_query.as_str())
            .collect();

        let mut diagnostics: Vec<KeywordDiagnostic> = snapshot
            .records
            .iter()
            .map(|record| {
                let has_price_flag = flagged.contains(record.search_query.as_str());
                let diagnostic_type = self.diagnose(record, has_price_flag);
                KeywordDiagnostic {
                    search_query: record.search_query.clone(),
                    asin: record.asin.clone(),
                    diagnostic_type,
                    rank_status: self.rank_status(record.impressions_share),
                    opportunity_score: self.opportunity_score(record),
                    search_volume: record.search_volume,
                    impressions_share: record.impressions_share,
                    clicks_share: record.clicks_share,
                    purchases_share: record.purchases_share,
                    recommended_fix: diagnostic_type.recommended_fix().to_string(),
                }
            })
            .collect();

        // Stable: equal scores keep snapshot order.
        diagnostics.sort_by(|a, b| b.opportunity_score.total_cmp(&a.opportunity_score));
        diagnostics
    }

    pub fn summarize(&self, diagnostics: &[KeywordDiagnostic]) -> Summary {
        let mut summary = Summary::new(diagnostics.len());
        for d in DiagnosticType::ALL {
            summary.insert(d.to_string(), 0);
        }
        for d in diagnostics {
            summary.increment(&d.diagnostic_type.to_string());
        }
        summary
    }
}

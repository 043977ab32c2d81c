use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::analyzer::{latest_snapshot, Summary};
use crate::config::Thresholds;
use crate::types::{TrendDirection, TrendRecord, WeeklySnapshot};

/// Week-over-week purchase share trajectory for the keywords of the latest week.
pub struct TrendTracker {
    thresholds: Thresholds,
}

impl TrendTracker {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// `(last - first) / first * 100`. A zero baseline yields 0.0.
    pub fn growth_percent(first: f64, last: f64) -> f64 {
        if first == 0.0 {
            return 0.0;
        }
        (last - first) / first * 100.0
    }

    /// Compare first vs last observed share. With a zero baseline any
    /// positive share counts as growth, since no percentage can be taken.
    pub fn direction(&self, first: f64, last: f64) -> TrendDirection {
        if first == 0.0 {
            return if last > 0.0 {
                TrendDirection::Growing
            } else {
                TrendDirection::Stable
            };
        }
        let growth = Self::growth_percent(first, last);
        let cutoff = self.thresholds.trend_growth_threshold;
        if growth >= cutoff {
            TrendDirection::Growing
        } else if growth <= -cutoff {
            TrendDirection::Declining
        } else {
            TrendDirection::Stable
        }
    }

    /// One record per query of the most recent snapshot, in that snapshot's order.
    /// Snapshots may arrive in any order; the history is built chronologically.
    pub fn analyze_trends(&self, snapshots: &[WeeklySnapshot]) -> Vec<TrendRecord> {
        let Some(latest) = latest_snapshot(snapshots) else {
            return Vec::new();
        };

        let by_week: Vec<_> = snapshots
            .iter()
            .map(|s| (s.week_date, s.records_by_query()))
            .collect();

        latest
            .records
            .iter()
            .map(|record| {
                let mut history: BTreeMap<NaiveDate, f64> = BTreeMap::new();
                for (week, index) in &by_week {
                    if let Some(r) = index.get(record.search_query.as_str()) {
                        history.entry(*week).or_insert(r.purchases_share);
                    }
                }

                let first = history.values().next().copied().unwrap_or(0.0);
                let last = history.values().next_back().copied().unwrap_or(0.0);
                let (trend_direction, growth_percent) = if history.len() < 2 {
                    (TrendDirection::Stable, 0.0)
                } else {
                    (self.direction(first, last), Self::growth_percent(first, last))
                };

                TrendRecord {
                    search_query: record.search_query.clone(),
                    asin: record.asin.clone(),
                    weekly_purchase_shares: history,
                    trend_direction,
                    growth_percent,
                }
            })
            .collect()
    }

    pub fn summarize(&self, trends: &[TrendRecord]) -> Summary {
        let mut summary = Summary::new(trends.len());
        for d in [TrendDirection::Growing, TrendDirection::Stable, TrendDirection::Declining] {
            summary.insert(d.to_string(), 0);
        }
        for t in trends {
            summary.increment(&t.trend_direction.to_string());
        }
        summary
    }
}

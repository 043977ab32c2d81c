use crate::analyzer::Summary;
use crate::config::Thresholds;
use crate::types::{KeywordPlacement, PlacementTarget, SQPRecord, WeeklySnapshot};

/// Recommends which listing field a keyword belongs in, from its volume
/// percentile within the snapshot and its click share.
pub struct PlacementRecommender {
    thresholds: Thresholds,
}

/// Share (%) of `all_volumes` that are <= `volume`. A one-element list gives 100
/// for any value at or above its single entry.
pub fn volume_percentile(volume: u64, all_volumes: &[u64]) -> f64 {
    if all_volumes.is_empty() {
        return 0.0;
    }
    let at_or_below = all_volumes.iter().filter(|&&v| v <= volume).count();
    at_or_below as f64 / all_volumes.len() as f64 * 100.0
}

impl PlacementRecommender {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn recommend_placement(
        &self,
        record: &SQPRecord,
        volume_percentile: f64,
    ) -> (PlacementTarget, String) {
        let t = &self.thresholds;

        if volume_percentile >= t.title_top_volume_percentile {
            return (
                PlacementTarget::Title,
                format!("Top {:.0}% volume - must be in title", 100.0 - volume_percentile),
            );
        }

        if volume_percentile >= t.title_min_volume_percentile
            && record.clicks_share >= t.title_min_click_share
        {
            return (
                PlacementTarget::Title,
                format!(
                    "High volume ({volume_percentile:.0}th percentile) with {:.1}% click share",
                    record.clicks_share
                ),
            );
        }

        if volume_percentile >= t.bullets_min_volume_percentile {
            return (
                PlacementTarget::Bullets,
                format!(
                    "Mid-high volume ({volume_percentile:.0}th percentile) - include in bullet points"
                ),
            );
        }

        if volume_percentile >= t.backend_min_volume_percentile {
            return (
                PlacementTarget::Backend,
                format!(
                    "Moderate volume ({volume_percentile:.0}th percentile) - add to backend keywords"
                ),
            );
        }

        (
            PlacementTarget::Description,
            format!(
                "Lower volume ({volume_percentile:.0}th percentile) - consider for description or A+ content"
            ),
        )
    }

    /// Place every keyword, then rank within each placement group by volume.
    /// Output is grouped TITLE, BULLETS, BACKEND, DESCRIPTION, priority ascending.
    pub fn analyze(&self, snapshot: &WeeklySnapshot) -> Vec<KeywordPlacement> {
        if snapshot.records.is_empty() {
            return Vec::new();
        }

        let volumes: Vec<u64> = snapshot.records.iter().map(|r| r.search_volume).collect();

        // Pass 1: placement per record, snapshot order.
        let placements: Vec<KeywordPlacement> = snapshot
            .records
            .iter()
            .map(|record| {
                let percentile = volume_percentile(record.search_volume, &volumes);
                let (placement, reasoning) = self.recommend_placement(record, percentile);
                KeywordPlacement {
                    search_query: record.search_query.clone(),
                    asin: record.asin.clone(),
                    placement,
                    priority: 0,
                    search_volume: record.search_volume,
                    clicks_share: record.clicks_share,
                    reasoning,
                }
            })
            .collect();

        // Pass 2: per-group priority, highest volume = 1. Stable sort keeps input
        // order between equal volumes.
        let mut ranked = Vec::with_capacity(placements.len());
        for target in PlacementTarget::ALL {
            let mut group: Vec<KeywordPlacement> = placements
                .iter()
                .filter(|p| p.placement == target)
                .cloned()
                .collect();
            group.sort_by(|a, b| b.search_volume.cmp(&a.search_volume));
            for (i, p) in group.iter_mut().enumerate() {
                p.priority = i as u32 + 1;
            }
            ranked.extend(group);
        }

        ranked.sort_by_key(|p| (p.placement.order(), p.priority));
        ranked
    }

    pub fn summarize(&self, placements: &[KeywordPlacement]) -> Summary {
        let mut summary = Summary::new(placements.len());
        for target in PlacementTarget::ALL {
            summary.insert(target.to_string(), 0);
        }
        for p in placements {
            summary.increment(&p.placement.to_string());
        }
        summary
    }
}

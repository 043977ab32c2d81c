// Scoring and classification core. Every analyzer is a pure function of
// (records, thresholds); none of them does I/O or keeps state between calls.

pub mod categorizer;
pub mod diagnostic;
pub mod placement;
pub mod price_benchmark;
pub mod report;
pub mod trend;

pub use categorizer::KeywordCategorizer;
pub use diagnostic::DiagnosticAnalyzer;
pub use placement::PlacementRecommender;
pub use price_benchmark::PriceBenchmark;
pub use report::{analyze_snapshots, AsinReport, SHEETS};
pub use trend::TrendTracker;

use serde::ser::SerializeMap;
use serde::Serialize;

use crate::types::WeeklySnapshot;

/// Most recent snapshot; the earliest-listed one wins a tie on week.
pub fn latest_snapshot(snapshots: &[WeeklySnapshot]) -> Option<&WeeklySnapshot> {
    snapshots
        .iter()
        .reduce(|best, s| if s.week_date > best.week_date { s } else { best })
}

/// Fixed-key counts produced by each analyzer's `summarize`. Always starts with "total".
#[derive(Debug, Clone, PartialEq)]
pub struct Summary(Vec<(String, usize)>);

impl Summary {
    pub fn new(total: usize) -> Self {
        Self(vec![("total".to_string(), total)])
    }

    /// Sets `key`, adding it if absent.
    pub fn insert(&mut self, key: impl Into<String>, count: usize) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = count,
            None => self.0.push((key, count)),
        }
    }

    pub fn increment(&mut self, key: &str) {
        match self.0.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v += 1,
            None => self.0.push((key.to_string(), 1)),
        }
    }

    /// Missing keys read as zero.
    pub fn get(&self, key: &str) -> usize {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map_or(0, |(_, v)| *v)
    }

    pub fn total(&self) -> usize {
        self.get("total")
    }

    /// Sum of every count except "total".
    #[cfg(test)]
    pub fn category_sum(&self) -> usize {
        self.0
            .iter()
            .filter(|(k, _)| k != "total")
            .map(|(_, v)| v)
            .sum()
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl Serialize for Summary {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::analyzer::AsinReport;
use crate::types::AsinSummary;

// ---------------------------------------------------------------------------
// ReportStore
// ---------------------------------------------------------------------------

/// Latest analysis per ASIN. Written once per run by the fan-out, read by the API.
pub struct ReportStore {
    /// asin → most recent report
    reports: DashMap<String, Arc<AsinReport>>,
}

impl ReportStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            reports: DashMap::new(),
        })
    }

    /// Replaces any earlier report for the same ASIN unless it covers a newer week.
    pub fn insert(&self, report: Arc<AsinReport>) -> bool {
        match self.reports.entry(report.asin.clone()) {
            Entry::Occupied(existing) if existing.get().week_date > report.week_date => false,
            Entry::Occupied(mut existing) => {
                existing.insert(report);
                true
            }
            Entry::Vacant(slot) => {
                slot.insert(report);
                true
            }
        }
    }

    pub fn get(&self, asin: &str) -> Option<Arc<AsinReport>> {
        self.reports.get(asin).map(|r| Arc::clone(r.value()))
    }

    /// Per-ASIN roll-ups, sorted by ASIN.
    pub fn summaries(&self) -> Vec<AsinSummary> {
        let mut out: Vec<AsinSummary> = self
            .reports
            .iter()
            .map(|r| r.value().summary.clone())
            .collect();
        out.sort_by(|a, b| a.asin.cmp(&b.asin));
        out
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

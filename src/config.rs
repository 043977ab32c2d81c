use std::str::FromStr;

use crate::error::{AppError, Result};

/// Channel capacity for handing finished reports to the DB writer.
pub const CHANNEL_CAPACITY: usize = 64;

/// Number of diagnostics persisted to the top-opportunities sheet.
pub const TOP_OPPORTUNITIES: usize = 50;

/// Default cutoffs. Shares and percentiles are percentages (0–100).
pub mod defaults {
    pub const BREAD_BUTTER_MIN_PURCHASE_SHARE: f64 = 10.0;
    pub const OPPORTUNITY_MAX_IMP_SHARE: f64 = 5.0;
    pub const OPPORTUNITY_MIN_PURCHASE_SHARE: f64 = 5.0;
    pub const LEAK_MIN_IMP_SHARE: f64 = 5.0;
    pub const LEAK_MAX_CLICK_SHARE: f64 = 2.0;
    pub const LEAK_MAX_PURCHASE_SHARE: f64 = 2.0;
    pub const PRICE_WARNING_THRESHOLD: f64 = 10.0;
    pub const PRICE_CRITICAL_THRESHOLD: f64 = 20.0;

    pub const RANK_TOP_3_THRESHOLD: f64 = 20.0;
    pub const RANK_PAGE_1_HIGH_THRESHOLD: f64 = 10.0;
    pub const RANK_PAGE_1_LOW_THRESHOLD: f64 = 1.0;

    pub const GHOST_MIN_VOLUME: u64 = 500;
    pub const GHOST_MAX_IMP_SHARE: f64 = 1.0;
    pub const WINDOW_SHOPPER_MIN_IMP_SHARE: f64 = 10.0;
    pub const WINDOW_SHOPPER_MAX_CLICK_SHARE: f64 = 1.0;
    pub const PRICE_PROBLEM_MIN_IMP_SHARE: f64 = 5.0;

    pub const TITLE_MIN_VOLUME_PERCENTILE: f64 = 80.0;
    pub const TITLE_MIN_CLICK_SHARE: f64 = 5.0;
    pub const TITLE_TOP_VOLUME_PERCENTILE: f64 = 95.0;
    pub const BULLETS_MIN_VOLUME_PERCENTILE: f64 = 50.0;
    pub const BACKEND_MIN_VOLUME_PERCENTILE: f64 = 20.0;

    /// Week-over-week purchase share change (%) that counts as a trend.
    pub const TREND_GROWTH_THRESHOLD: f64 = 10.0;
}

/// Named cutoffs shared by every analyzer. Read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds {
    // Categorization
    pub bread_butter_min_purchase_share: f64,
    pub opportunity_max_imp_share: f64,
    pub opportunity_min_purchase_share: f64,
    pub leak_min_imp_share: f64,
    pub leak_max_click_share: f64,
    pub leak_max_purchase_share: f64,

    // Price benchmark (price above market, in %)
    pub price_warning_threshold: f64,
    pub price_critical_threshold: f64,

    // Rank status (impression share %)
    pub rank_top_3_threshold: f64,
    pub rank_page_1_high_threshold: f64,
    pub rank_page_1_low_threshold: f64,

    // Diagnostics
    pub ghost_min_volume: u64,
    pub ghost_max_imp_share: f64,
    pub window_shopper_min_imp_share: f64,
    pub window_shopper_max_click_share: f64,
    pub price_problem_min_imp_share: f64,

    // Placement (volume percentile)
    pub title_min_volume_percentile: f64,
    pub title_min_click_share: f64,
    pub title_top_volume_percentile: f64,
    pub bullets_min_volume_percentile: f64,
    pub backend_min_volume_percentile: f64,

    // Trends
    pub trend_growth_threshold: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        use defaults::*;
        Self {
            bread_butter_min_purchase_share: BREAD_BUTTER_MIN_PURCHASE_SHARE,
            opportunity_max_imp_share: OPPORTUNITY_MAX_IMP_SHARE,
            opportunity_min_purchase_share: OPPORTUNITY_MIN_PURCHASE_SHARE,
            leak_min_imp_share: LEAK_MIN_IMP_SHARE,
            leak_max_click_share: LEAK_MAX_CLICK_SHARE,
            leak_max_purchase_share: LEAK_MAX_PURCHASE_SHARE,
            price_warning_threshold: PRICE_WARNING_THRESHOLD,
            price_critical_threshold: PRICE_CRITICAL_THRESHOLD,
            rank_top_3_threshold: RANK_TOP_3_THRESHOLD,
            rank_page_1_high_threshold: RANK_PAGE_1_HIGH_THRESHOLD,
            rank_page_1_low_threshold: RANK_PAGE_1_LOW_THRESHOLD,
            ghost_min_volume: GHOST_MIN_VOLUME,
            ghost_max_imp_share: GHOST_MAX_IMP_SHARE,
            window_shopper_min_imp_share: WINDOW_SHOPPER_MIN_IMP_SHARE,
            window_shopper_max_click_share: WINDOW_SHOPPER_MAX_CLICK_SHARE,
            price_problem_min_imp_share: PRICE_PROBLEM_MIN_IMP_SHARE,
            title_min_volume_percentile: TITLE_MIN_VOLUME_PERCENTILE,
            title_min_click_share: TITLE_MIN_CLICK_SHARE,
            title_top_volume_percentile: TITLE_TOP_VOLUME_PERCENTILE,
            bullets_min_volume_percentile: BULLETS_MIN_VOLUME_PERCENTILE,
            backend_min_volume_percentile: BACKEND_MIN_VOLUME_PERCENTILE,
            trend_growth_threshold: TREND_GROWTH_THRESHOLD,
        }
    }
}

impl Thresholds {
    /// Every field can be overridden by its upper-cased name, e.g. `GHOST_MIN_VOLUME=1000`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key: &str| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            bread_butter_min_purchase_share: parse_or(&get, "BREAD_BUTTER_MIN_PURCHASE_SHARE", d.bread_butter_min_purchase_share)?,
            opportunity_max_imp_share: parse_or(&get, "OPPORTUNITY_MAX_IMP_SHARE", d.opportunity_max_imp_share)?,
            opportunity_min_purchase_share: parse_or(&get, "OPPORTUNITY_MIN_PURCHASE_SHARE", d.opportunity_min_purchase_share)?,
            leak_min_imp_share: parse_or(&get, "LEAK_MIN_IMP_SHARE", d.leak_min_imp_share)?,
            leak_max_click_share: parse_or(&get, "LEAK_MAX_CLICK_SHARE", d.leak_max_click_share)?,
            leak_max_purchase_share: parse_or(&get, "LEAK_MAX_PURCHASE_SHARE", d.leak_max_purchase_share)?,
            price_warning_threshold: parse_or(&get, "PRICE_WARNING_THRESHOLD", d.price_warning_threshold)?,
            price_critical_threshold: parse_or(&get, "PRICE_CRITICAL_THRESHOLD", d.price_critical_threshold)?,
            rank_top_3_threshold: parse_or(&get, "RANK_TOP_3_THRESHOLD", d.rank_top_3_threshold)?,
            rank_page_1_high_threshold: parse_or(&get, "RANK_PAGE_1_HIGH_THRESHOLD", d.rank_page_1_high_threshold)?,
            rank_page_1_low_threshold: parse_or(&get, "RANK_PAGE_1_LOW_THRESHOLD", d.rank_page_1_low_threshold)?,
            ghost_min_volume: parse_or(&get, "GHOST_MIN_VOLUME", d.ghost_min_volume)?,
            ghost_max_imp_share: parse_or(&get, "GHOST_MAX_IMP_SHARE", d.ghost_max_imp_share)?,
            window_shopper_min_imp_share: parse_or(&get, "WINDOW_SHOPPER_MIN_IMP_SHARE", d.window_shopper_min_imp_share)?,
            window_shopper_max_click_share: parse_or(&get, "WINDOW_SHOPPER_MAX_CLICK_SHARE", d.window_shopper_max_click_share)?,
            price_problem_min_imp_share: parse_or(&get, "PRICE_PROBLEM_MIN_IMP_SHARE", d.price_problem_min_imp_share)?,
            title_min_volume_percentile: parse_or(&get, "TITLE_MIN_VOLUME_PERCENTILE", d.title_min_volume_percentile)?,
            title_min_click_share: parse_or(&get, "TITLE_MIN_CLICK_SHARE", d.title_min_click_share)?,
            title_top_volume_percentile: parse_or(&get, "TITLE_TOP_VOLUME_PERCENTILE", d.title_top_volume_percentile)?,
            bullets_min_volume_percentile: parse_or(&get, "BULLETS_MIN_VOLUME_PERCENTILE", d.bullets_min_volume_percentile)?,
            backend_min_volume_percentile: parse_or(&get, "BACKEND_MIN_VOLUME_PERCENTILE", d.backend_min_volume_percentile)?,
            trend_growth_threshold: parse_or(&get, "TREND_GROWTH_THRESHOLD", d.trend_growth_threshold)?,
        })
    }
}

fn parse_or<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T> {
    match get(key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{key} must be a number, got {raw:?}"))),
    }
}

fn parse_flag(raw: Option<String>, default: bool) -> bool {
    match raw.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "y"),
        _ => default,
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Directory holding SQP report documents (*.json) (REPORT_DIR)
    pub report_dir: String,
    /// Directory holding Sales & Traffic documents, if any (TRAFFIC_REPORT_DIR)
    pub traffic_report_dir: Option<String>,
    /// Analyze only, skip persistence (DRY_RUN)
    pub dry_run: bool,
    /// Keep serving the HTTP API after analysis (SERVE_API)
    pub serve_api: bool,
    pub thresholds: Thresholds,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "sqp.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            report_dir: std::env::var("REPORT_DIR").unwrap_or_else(|_| "reports".to_string()),
            traffic_report_dir: std::env::var("TRAFFIC_REPORT_DIR")
                .ok()
                .filter(|d| !d.trim().is_empty()),
            dry_run: parse_flag(std::env::var("DRY_RUN").ok(), false),
            serve_api: parse_flag(std::env::var("SERVE_API").ok(), true),
            thresholds: Thresholds::from_env()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let t = Thresholds::from_lookup(lookup(&[])).unwrap();
        assert_eq!(t, Thresholds::default());
        assert_eq!(t.ghost_min_volume, 500);
        assert_eq!(t.rank_top_3_threshold, 20.0);
    }

    #[test]
    fn overrides_are_applied() {
        let t = Thresholds::from_lookup(lookup(&[
            ("GHOST_MIN_VOLUME", "1000"),
            ("PRICE_CRITICAL_THRESHOLD", " 25.5 "),
        ]))
        .unwrap();
        assert_eq!(t.ghost_min_volume, 1000);
        assert_eq!(t.price_critical_threshold, 25.5);
        assert_eq!(t.price_warning_threshold, 10.0);
    }

    #[test]
    fn malformed_value_is_a_config_error() {
        let err = Thresholds::from_lookup(lookup(&[("GHOST_MIN_VOLUME", "lots")])).unwrap_err();
        assert!(matches!(err, AppError::Config(msg) if msg.contains("GHOST_MIN_VOLUME")));
    }

    #[test]
    fn flags_parse_common_spellings() {
        assert!(parse_flag(Some("true".into()), false));
        assert!(parse_flag(Some("YES".into()), false));
        assert!(!parse_flag(Some("0".into()), true));
        assert!(parse_flag(None, true));
        assert!(!parse_flag(Some("  ".into()), false));
    }
}

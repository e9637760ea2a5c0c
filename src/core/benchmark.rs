use crate::core::metrics::Statistics;
use crate::core::store::StoredList;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Mean of each metric over every stored list that opted into aggregates.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AverageStats {
    pub lists_included: usize,
    pub subscribers: f64,
    pub open_rate: f64,
    pub subscribed_pct: f64,
    pub unsubscribed_pct: f64,
    pub cleaned_pct: f64,
    pub pending_pct: f64,
    pub high_open_rt_pct: f64,
    pub cur_yr_inactive_pct: f64,
}

pub fn average_stats(stored: &[StoredList]) -> AverageStats {
    let included: Vec<&Statistics> = stored
        .iter()
        .filter(|s| s.store_aggregates)
        .map(|s| &s.stats)
        .collect();
    if included.is_empty() {
        return AverageStats::default();
    }

    let n = included.len() as f64;
    let mean = |f: fn(&Statistics) -> f64| included.iter().map(|s| f(s)).sum::<f64>() / n;

    AverageStats {
        lists_included: included.len(),
        subscribers: mean(|s| s.subscribers as f64),
        open_rate: mean(|s| s.open_rate),
        subscribed_pct: mean(|s| s.subscribed_pct),
        unsubscribed_pct: mean(|s| s.unsubscribed_pct),
        cleaned_pct: mean(|s| s.cleaned_pct),
        pending_pct: mean(|s| s.pending_pct),
        high_open_rt_pct: mean(|s| s.high_open_rt_pct),
        cur_yr_inactive_pct: mean(|s| s.cur_yr_inactive_pct),
    }
}

/// A list's statistics side by side with the benchmark averages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub list_id: String,
    pub list_name: String,
    pub generated_at: DateTime<Utc>,
    pub list: Statistics,
    pub hist_bin_proportions: Vec<f64>,
    pub average: AverageStats,
}

pub fn build_report(
    list_id: &str,
    list_name: &str,
    stats: &Statistics,
    average: AverageStats,
    now: DateTime<Utc>,
) -> ComparisonReport {
    ComparisonReport {
        list_id: list_id.to_string(),
        list_name: list_name.to_string(),
        generated_at: now,
        list: stats.clone(),
        hist_bin_proportions: stats.hist_bin_proportions(),
        average,
    }
}

//! Statistics derived from a fully merged member table.
//!
//! Every percentage is a fraction in `[0, 1]`. Functions that divide by the
//! subscriber count require at least one subscriber; callers check
//! [`MergedMemberTable::subscriber_count`] first.

use crate::config::{self, EngagementThresholds};
use crate::model::job::ListImportJob;
use crate::model::member::{MemberStatus, MergedMemberTable, StatusCounts};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub subscribers: u64,
    pub open_rate: f64,
    /// Raw subscriber counts per open-rate decile, lowest first.
    pub hist_bin_counts: Vec<u64>,
    pub subscribed_pct: f64,
    pub unsubscribed_pct: f64,
    pub cleaned_pct: f64,
    pub pending_pct: f64,
    pub high_open_rt_pct: f64,
    pub cur_yr_inactive_pct: f64,
    /// Average days between campaigns; 0 for lists with too few campaigns.
    pub frequency: f64,
}

impl Statistics {
    pub fn hist_bin_proportions(&self) -> Vec<f64> {
        if self.subscribers == 0 {
            return vec![0.0; self.hist_bin_counts.len()];
        }
        self.hist_bin_counts
            .iter()
            .map(|&c| c as f64 / self.subscribers as f64)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ListBreakdown {
    pub subscribed_pct: f64,
    pub unsubscribed_pct: f64,
    pub cleaned_pct: f64,
    pub pending_pct: f64,
}

/// Share of each status in the list. A status absent from the data is exactly 0.
///
/// The denominator is the reported list size, raised to the number of rows
/// actually seen if the report was stale and too small.
pub fn list_breakdown(counts: &StatusCounts, total_count: u64) -> ListBreakdown {
    let denominator = total_count.max(counts.total());
    let pct = |status: MemberStatus| -> f64 {
        match counts.get(status) {
            0 => 0.0,
            n => n as f64 / denominator as f64,
        }
    };
    ListBreakdown {
        subscribed_pct: pct(MemberStatus::Subscribed),
        unsubscribed_pct: pct(MemberStatus::Unsubscribed),
        cleaned_pct: pct(MemberStatus::Cleaned),
        pending_pct: pct(MemberStatus::Pending),
    }
}

#[inline]
pub fn normalize_open_rate(reported_pct: f64) -> f64 {
    reported_pct / 100.0
}

pub fn campaign_frequency(
    campaign_count: u64,
    date_created: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> f64 {
    if campaign_count < config::MIN_CAMPAIGNS_FOR_CADENCE {
        return 0.0;
    }
    match date_created {
        Some(created) => {
            let days = (now - created).num_days().max(0);
            days as f64 / campaign_count as f64
        }
        None => 0.0,
    }
}

/// Decile for an open rate, bins right-closed with 0 in the first bin.
pub fn histogram_bin(rate: f64) -> Option<usize> {
    if !(0.0..=1.0).contains(&rate) {
        return None;
    }
    config::HISTOGRAM_UPPER_EDGES
        .iter()
        .position(|&edge| rate <= edge)
}

pub fn open_rate_histogram(table: &MergedMemberTable) -> Vec<u64> {
    let mut bins = vec![0u64; config::HISTOGRAM_BINS];
    for row in table.subscribers() {
        if let Some(i) = row.member.avg_open_rate.and_then(histogram_bin) {
            bins[i] += 1;
        }
    }
    bins
}

pub fn high_open_rate_pct(table: &MergedMemberTable, threshold: f64) -> f64 {
    let subscribers = table.subscriber_count();
    debug_assert!(subscribers > 0, "high_open_rate_pct requires subscribers");
    let high = table
        .subscribers()
        .filter(|r| r.member.avg_open_rate.is_some_and(|rate| rate > threshold))
        .count();
    high as f64 / subscribers as f64
}

/// Share of subscribers with no open inside the recency window.
pub fn recent_inactive_pct(table: &MergedMemberTable) -> f64 {
    let subscribers = table.subscriber_count();
    debug_assert!(subscribers > 0, "recent_inactive_pct requires subscribers");
    let active = table
        .subscribers()
        .filter(|r| r.recent_open.is_some())
        .count() as u64;
    (subscribers - active) as f64 / subscribers as f64
}

/// Computes every metric for a list. Pure: the same table, job and `now`
/// always yield identical statistics.
pub fn compute_statistics(
    table: &MergedMemberTable,
    job: &ListImportJob,
    thresholds: &EngagementThresholds,
    now: DateTime<Utc>,
) -> Statistics {
    let breakdown = list_breakdown(&table.status_counts(), job.total_count());

    Statistics {
        subscribers: table.subscriber_count(),
        open_rate: normalize_open_rate(job.reported_open_rate()),
        hist_bin_counts: open_rate_histogram(table),
        subscribed_pct: breakdown.subscribed_pct,
        unsubscribed_pct: breakdown.unsubscribed_pct,
        cleaned_pct: breakdown.cleaned_pct,
        pending_pct: breakdown.pending_pct,
        high_open_rt_pct: high_open_rate_pct(table, thresholds.high_open_rate),
        cur_yr_inactive_pct: recent_inactive_pct(table),
        frequency: campaign_frequency(job.campaign_count(), job.date_created(), now),
    }
}

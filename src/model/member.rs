use crate::model::common::MemberId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Subscribed,
    Unsubscribed,
    Cleaned,
    Pending,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Subscribed => "subscribed",
            MemberStatus::Unsubscribed => "unsubscribed",
            MemberStatus::Cleaned => "cleaned",
            MemberStatus::Pending => "pending",
        }
    }
}

impl FromStr for MemberStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "subscribed" => Ok(MemberStatus::Subscribed),
            "unsubscribed" => Ok(MemberStatus::Unsubscribed),
            "cleaned" => Ok(MemberStatus::Cleaned),
            "pending" => Ok(MemberStatus::Pending),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One flattened list member, as fetched in the membership phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberRecord {
    pub id: MemberId,
    pub status: MemberStatus,
    pub timestamp_opt: Option<DateTime<Utc>>,
    pub timestamp_signup: Option<DateTime<Utc>>,
    /// Historical open rate in [0, 1]; `None` when the API gave nothing usable.
    pub avg_open_rate: Option<f64>,
    pub avg_click_rate: Option<f64>,
}

/// Most recent qualifying open for one subscriber. Transient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityRecord {
    pub id: MemberId,
    pub recent_open: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub subscribed: u64,
    pub unsubscribed: u64,
    pub cleaned: u64,
    pub pending: u64,
}

impl StatusCounts {
    pub fn get(&self, status: MemberStatus) -> u64 {
        match status {
            MemberStatus::Subscribed => self.subscribed,
            MemberStatus::Unsubscribed => self.unsubscribed,
            MemberStatus::Cleaned => self.cleaned,
            MemberStatus::Pending => self.pending,
        }
    }

    fn bump(&mut self, status: MemberStatus) {
        match status {
            MemberStatus::Subscribed => self.subscribed += 1,
            MemberStatus::Unsubscribed => self.unsubscribed += 1,
            MemberStatus::Cleaned => self.cleaned += 1,
            MemberStatus::Pending => self.pending += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.subscribed + self.unsubscribed + self.cleaned + self.pending
    }
}

/// Pre-merge member table. Member ids are unique.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemberTable {
    rows: Vec<MemberRecord>,
}

impl MemberTable {
    /// Builds the table, keeping the first row seen for any repeated id.
    /// Returns the table and the number of rows dropped as duplicates.
    pub fn from_records(records: Vec<MemberRecord>) -> (MemberTable, usize) {
        let mut seen: HashSet<MemberId> = HashSet::with_capacity(records.len());
        let mut rows = Vec::with_capacity(records.len());
        let mut duplicates = 0;
        for record in records {
            if seen.insert(record.id.clone()) {
                rows.push(record);
            } else {
                duplicates += 1;
            }
        }
        (MemberTable { rows }, duplicates)
    }

    pub fn rows(&self) -> &[MemberRecord] {
        &self.rows
    }
    pub fn len(&self) -> usize {
        self.rows.len()
    }
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn subscriber_ids(&self) -> Vec<MemberId> {
        self.rows
            .iter()
            .filter(|r| r.status == MemberStatus::Subscribed)
            .map(|r| r.id.clone())
            .collect()
    }

    /// Left-joins activity onto the table by member id. Members without an
    /// activity record get `recent_open = None`, so the column always exists.
    pub fn merge_activity(self, activity: Vec<ActivityRecord>) -> MergedMemberTable {
        let mut latest: HashMap<MemberId, DateTime<Utc>> = HashMap::with_capacity(activity.len());
        for record in activity {
            if let Some(ts) = record.recent_open {
                latest
                    .entry(record.id)
                    .and_modify(|cur| {
                        if ts > *cur {
                            *cur = ts
                        }
                    })
                    .or_insert(ts);
            }
        }

        let rows = self
            .rows
            .into_iter()
            .map(|member| {
                let recent_open = latest.get(&member.id).copied();
                MergedMember {
                    member,
                    recent_open,
                }
            })
            .collect();
        MergedMemberTable { rows }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedMember {
    #[serde(flatten)]
    pub member: MemberRecord,
    pub recent_open: Option<DateTime<Utc>>,
}

/// Post-merge member table; every row carries the `recent_open` column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedMemberTable {
    rows: Vec<MergedMember>,
}

impl MergedMemberTable {
    pub fn rows(&self) -> &[MergedMember] {
        &self.rows
    }
    pub fn len(&self) -> usize {
        self.rows.len()
    }
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn subscribers(&self) -> impl Iterator<Item = &MergedMember> {
        self.rows
            .iter()
            .filter(|r| r.member.status == MemberStatus::Subscribed)
    }

    pub fn subscriber_count(&self) -> u64 {
        self.subscribers().count() as u64
    }

    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for row in &self.rows {
            counts.bump(row.member.status);
        }
        counts
    }
}

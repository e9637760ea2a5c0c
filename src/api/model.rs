use crate::model::common::{
    deserialize_flexible_u64, deserialize_optional_flexible_f64, deserialize_optional_string,
    deserialize_optional_timestamp, MemberId,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ApiMembersPage {
    #[serde(default)]
    pub members: Vec<ApiMember>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ApiMember {
    pub id: MemberId,
    /// Kept as a string; unknown statuses are filtered when the table is built.
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub timestamp_opt: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub timestamp_signup: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stats: ApiMemberStats,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ApiMemberStats {
    #[serde(default, deserialize_with = "deserialize_optional_flexible_f64")]
    pub avg_open_rate: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_optional_flexible_f64")]
    pub avg_click_rate: Option<f64>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ApiActivityResponse {
    pub email_id: MemberId,
    #[serde(default)]
    pub activity: Vec<ApiActivity>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ApiActivity {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub action: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub timestamp: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ApiListSummary {
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stats: ApiListStats,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ApiListStats {
    #[serde(default, deserialize_with = "deserialize_flexible_u64")]
    pub member_count: u64,
    #[serde(default, deserialize_with = "deserialize_flexible_u64")]
    pub unsubscribe_count: u64,
    #[serde(default, deserialize_with = "deserialize_flexible_u64")]
    pub cleaned_count: u64,
    #[serde(default, deserialize_with = "deserialize_optional_flexible_f64")]
    pub open_rate: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_flexible_u64")]
    pub campaign_count: u64,
}

impl ApiListStats {
    /// Every member the list has ever held that can still be paged.
    pub fn total_count(&self) -> u64 {
        self.member_count + self.unsubscribe_count + self.cleaned_count
    }
}

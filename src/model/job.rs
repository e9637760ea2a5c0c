use crate::config;
use crate::error::{AppError, AppResult};
use crate::model::common::ListId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An API key of the form `<secret>-<data center>`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApiKey {
    raw: String,
    data_center_start: usize,
}

impl ApiKey {
    pub fn parse(raw: &str) -> AppResult<Self> {
        let raw = raw.trim();
        let (secret, data_center) = raw
            .rsplit_once('-')
            .ok_or_else(|| AppError::invalid_key(raw, "missing '-<data center>' suffix"))?;
        if secret.is_empty() {
            return Err(AppError::invalid_key(raw, "empty secret"));
        }
        if data_center.is_empty() || !data_center.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(AppError::invalid_key(raw, "malformed data center suffix"));
        }
        Ok(ApiKey {
            raw: raw.to_string(),
            data_center_start: secret.len() + 1,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn data_center(&self) -> &str {
        &self.raw[self.data_center_start..]
    }
}

impl TryFrom<String> for ApiKey {
    type Error = AppError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        ApiKey::parse(&value)
    }
}

impl From<ApiKey> for String {
    fn from(key: ApiKey) -> Self {
        key.raw
    }
}

// Keys end up in structured error payloads; keep them out of debug logs.
impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey(***-{})", self.data_center())
    }
}

/// Inputs for one import run. Validated at construction and immutable after.
#[derive(Debug, Clone, PartialEq)]
pub struct ListImportJob {
    list_id: ListId,
    list_name: String,
    api_key: ApiKey,
    total_count: u64,
    reported_open_rate: f64,
    campaign_count: u64,
    date_created: Option<DateTime<Utc>>,
}

impl ListImportJob {
    pub fn new(
        list_id: impl Into<ListId>,
        list_name: impl Into<String>,
        api_key: &str,
        total_count: u64,
        reported_open_rate: f64,
    ) -> AppResult<Self> {
        let list_id = list_id.into();
        if list_id.trim().is_empty() {
            return Err(AppError::Argument("List id must not be empty.".into()));
        }
        if !reported_open_rate.is_finite() || reported_open_rate < 0.0 {
            return Err(AppError::Argument(format!(
                "Reported open rate must be a non-negative percentage, got {}",
                reported_open_rate
            )));
        }
        Ok(ListImportJob {
            list_id,
            list_name: list_name.into(),
            api_key: ApiKey::parse(api_key)?,
            total_count,
            reported_open_rate,
            campaign_count: 0,
            date_created: None,
        })
    }

    pub fn with_campaign_history(
        mut self,
        campaign_count: u64,
        date_created: Option<DateTime<Utc>>,
    ) -> Self {
        self.campaign_count = campaign_count;
        self.date_created = date_created;
        self
    }

    pub fn list_id(&self) -> &str {
        &self.list_id
    }
    pub fn list_name(&self) -> &str {
        &self.list_name
    }
    pub fn api_key(&self) -> &ApiKey {
        &self.api_key
    }
    pub fn data_center(&self) -> &str {
        self.api_key.data_center()
    }
    /// Only used to plan pagination; never trusted for correctness.
    pub fn total_count(&self) -> u64 {
        self.total_count
    }
    /// List-level open rate as the remote API reports it (a percentage).
    pub fn reported_open_rate(&self) -> f64 {
        self.reported_open_rate
    }
    pub fn campaign_count(&self) -> u64 {
        self.campaign_count
    }
    pub fn date_created(&self) -> Option<DateTime<Utc>> {
        self.date_created
    }
}

/// One page of the membership pagination protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    pub offset: u64,
    pub count: u64,
}

pub fn plan_chunks(total_count: u64) -> Vec<ChunkPlan> {
    let size = config::CHUNK_SIZE;
    let chunks = total_count.div_ceil(size).max(1);
    (0..chunks)
        .map(|i| {
            let remainder = total_count % size;
            let count = if i == chunks - 1 && remainder != 0 {
                remainder
            } else {
                size
            };
            ChunkPlan {
                offset: i * size,
                count,
            }
        })
        .collect()
}

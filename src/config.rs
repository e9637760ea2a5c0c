use crate::error::{AppError, AppResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::env;

pub const DEFAULT_OUT_DIR: &str = "./benchmark_data";

// Remote API page size for the members endpoint.
pub const CHUNK_SIZE: u64 = 5000;
// The API allows 10 simultaneous connections per key; leave room for other jobs.
pub const MAX_CONNECTIONS: usize = 4;
pub const MAX_ACTIVITY_CONNECTIONS: usize = 2;

pub const HTTP_TIMEOUT_SECONDS: u64 = 120;
pub const HTTP_CONNECT_TIMEOUT: u64 = 20;
pub const MAX_RETRIES: u32 = 3;
pub const BACKOFF_BASE_SECS: u64 = 5;
pub const RETRYABLE_STATUS_CODES: [u16; 2] = [429, 504];

pub const PROXY_BOOT_TIME_SECS: u64 = 30;
pub const PROXY_ROTATE_URL: &str = "http://us-proxies.com/api.php";
pub const PROXY_ACCOUNT_ID: &str = "9557";

pub const API_USERNAME: &str = "listbench";
const API_HOST_SUFFIX: &str = "api.mailchimp.com/3.0";

pub const MEMBER_FIELDS: &str =
    "members.status,members.timestamp_opt,members.timestamp_signup,members.stats,members.id";
pub const ACTIVITY_FIELDS: &str = "activity.action,activity.timestamp,email_id";
pub const LIST_SUMMARY_FIELDS: &str = "date_created,stats.member_count,stats.unsubscribe_count,\
stats.cleaned_count,stats.open_rate,stats.campaign_count";

pub const OPEN_ACTION: &str = "open";
pub const HISTOGRAM_BINS: usize = 10;
// Right-closed upper edges; 0.0 falls into the first bin.
pub const HISTOGRAM_UPPER_EDGES: [f64; HISTOGRAM_BINS] =
    [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0];
pub const MIN_CAMPAIGNS_FOR_CADENCE: u64 = 10;

pub const DEFAULT_RECENCY_WINDOW_DAYS: i64 = 365;
pub const MAX_RECENCY_WINDOW_DAYS: i64 = 36_500;
pub const DEFAULT_HIGH_OPEN_RATE_THRESHOLD: f64 = 0.8;

pub const ENV_NO_PROXY: &str = "LISTBENCH_NO_PROXY";
pub const ENV_PROXY_SECRET: &str = "PROXY_AUTH_PWD";
pub const ENV_PROXY_URL: &str = "LISTBENCH_PROXY_URL";
pub const ENV_API_BASE_URL: &str = "LISTBENCH_API_BASE_URL";
pub const ENV_RECENCY_DAYS: &str = "LISTBENCH_RECENCY_DAYS";
pub const ENV_HIGH_OPEN_RATE: &str = "LISTBENCH_HIGH_OPEN_RATE";

pub static FORBIDDEN_CHARS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f\x7f\^!@#$%^&*()+={}\[\];,.']"#).unwrap());
pub static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s_]+").unwrap());

pub fn api_base_url(data_center: &str) -> String {
    format!("https://{}.{}", data_center, API_HOST_SUFFIX)
}

/// Business thresholds used by the statistics engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngagementThresholds {
    pub recency_window_days: i64,
    pub high_open_rate: f64,
}

impl Default for EngagementThresholds {
    fn default() -> Self {
        Self {
            recency_window_days: DEFAULT_RECENCY_WINDOW_DAYS,
            high_open_rate: DEFAULT_HIGH_OPEN_RATE_THRESHOLD,
        }
    }
}

/// Environment-level settings, read once when a job starts.
#[derive(Debug, Clone)]
pub struct ImportSettings {
    pub proxy_disabled: bool,
    pub proxy_secret: Option<String>,
    pub proxy_rotate_url: String,
    pub api_base_override: Option<String>,
    pub thresholds: EngagementThresholds,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            proxy_disabled: false,
            proxy_secret: None,
            proxy_rotate_url: PROXY_ROTATE_URL.to_string(),
            api_base_override: None,
            thresholds: EngagementThresholds::default(),
        }
    }
}

impl ImportSettings {
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = EngagementThresholds::default();

        let recency_window_days = match non_empty(lookup(ENV_RECENCY_DAYS)) {
            Some(raw) => match raw.parse::<i64>() {
                Ok(days) if (1..=MAX_RECENCY_WINDOW_DAYS).contains(&days) => days,
                _ => {
                    return Err(AppError::ConfigError(format!(
                        "{} must be a whole number of days in [1, {}], got '{}'",
                        ENV_RECENCY_DAYS, MAX_RECENCY_WINDOW_DAYS, raw
                    )))
                }
            },
            None => defaults.recency_window_days,
        };

        let high_open_rate = match non_empty(lookup(ENV_HIGH_OPEN_RATE)) {
            Some(raw) => match raw.parse::<f64>() {
                Ok(rate) if (0.0..=1.0).contains(&rate) => rate,
                _ => {
                    return Err(AppError::ConfigError(format!(
                        "{} must be a number in [0, 1], got '{}'",
                        ENV_HIGH_OPEN_RATE, raw
                    )))
                }
            },
            None => defaults.high_open_rate,
        };

        Ok(Self {
            proxy_disabled: non_empty(lookup(ENV_NO_PROXY)).is_some_and(|v| is_truthy(&v)),
            proxy_secret: non_empty(lookup(ENV_PROXY_SECRET)),
            proxy_rotate_url: non_empty(lookup(ENV_PROXY_URL))
                .unwrap_or_else(|| PROXY_ROTATE_URL.to_string()),
            api_base_override: non_empty(lookup(ENV_API_BASE_URL))
                .map(|url| url.trim_end_matches('/').to_string()),
            thresholds: EngagementThresholds {
                recency_window_days,
                high_open_rate,
            },
        })
    }

    pub fn base_url_for(&self, data_center: &str) -> String {
        self.api_base_override
            .clone()
            .unwrap_or_else(|| api_base_url(data_center))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

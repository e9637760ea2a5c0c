use crate::api::model::{ApiActivityResponse, ApiMembersPage};
use crate::config::EngagementThresholds;
use crate::core::metrics::{self, Statistics};
use crate::error::{AppError, AppResult};
use crate::io;
use crate::logging::{log, LogLevel};
use crate::model::job::ListImportJob;
use crate::transform;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Placeholder credentials for offline jobs; nothing is ever sent with them.
const OFFLINE_API_KEY: &str = "offline-local";

/// List-level inputs that a live import would read from the list summary.
#[derive(Debug, Clone, Default)]
pub struct OfflineListInfo {
    pub reported_open_rate: f64,
    pub campaign_count: u64,
    pub date_created: Option<DateTime<Utc>>,
    /// Defaults to the number of member rows in the file.
    pub total_count: Option<u64>,
}

/// Computes statistics from a saved members page and, optionally, a saved
/// array of activity responses, without touching the network.
pub async fn analyze_files(
    members_path: &Path,
    activity_path: Option<&Path>,
    info: OfflineListInfo,
    thresholds: EngagementThresholds,
    output_path: Option<PathBuf>,
) -> AppResult<Statistics> {
    log(LogLevel::Info, "--- Running Offline Analysis ---");
    log(
        LogLevel::Info,
        &format!("Members file: {}", members_path.display()),
    );

    let page: ApiMembersPage = io::read_json(members_path).await?.ok_or_else(|| {
        AppError::Argument(format!(
            "Members file not found: {}",
            members_path.display()
        ))
    })?;

    let activity: Vec<ApiActivityResponse> = match activity_path {
        Some(path) => {
            log(LogLevel::Info, &format!("Activity file: {}", path.display()));
            io::read_json(path).await?.ok_or_else(|| {
                AppError::Argument(format!("Activity file not found: {}", path.display()))
            })?
        }
        None => Vec::new(),
    };

    let now = Utc::now();
    let stats = analyze_pages(vec![page], &activity, &info, &thresholds, now)?;

    if let Some(output_path) = output_path {
        let log_ctx = format!("Offline Statistics ({})", members_path.display());
        io::save_json(output_path.clone(), stats.clone(), log_ctx).await?;
        log(
            LogLevel::Success,
            &format!("Saved statistics to {}", output_path.display()),
        );
    }
    Ok(stats)
}

pub fn analyze_pages(
    pages: Vec<ApiMembersPage>,
    activity: &[ApiActivityResponse],
    info: &OfflineListInfo,
    thresholds: &EngagementThresholds,
    now: DateTime<Utc>,
) -> AppResult<Statistics> {
    let (table, report) = transform::members::build_member_table(pages);
    let total_count = info.total_count.unwrap_or(report.fetched as u64);
    let job = ListImportJob::new(
        "offline",
        "offline",
        OFFLINE_API_KEY,
        total_count,
        info.reported_open_rate,
    )?
    .with_campaign_history(info.campaign_count, info.date_created);

    let records =
        transform::activity::latest_opens(activity, now, thresholds.recency_window_days);
    let merged = table.merge_activity(records);
    if merged.subscriber_count() == 0 {
        return Err(AppError::NoSubscribers {
            list_id: job.list_id().to_string(),
        });
    }
    Ok(metrics::compute_statistics(&merged, &job, thresholds, now))
}

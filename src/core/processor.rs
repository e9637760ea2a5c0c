use crate::api::backoff::SharedSleeper;
use crate::api::client::ApiClient;
use crate::api::fetchers;
use crate::api::model::ApiListSummary;
use crate::api::proxy::{ProxyLease, ProxyProvisioner, WorkerSlot};
use crate::config::{self, ImportSettings};
use crate::core::metrics::{self, Statistics};
use crate::error::{AppError, AppResult};
use crate::logging::{log, LogLevel};
use crate::model::job::{ApiKey, ListImportJob};
use crate::transform;
use crate::utils;
use chrono::Utc;
use std::time::{Duration, Instant};

/// Everything an import needs besides the job itself.
#[derive(Clone)]
pub struct ImportContext {
    pub settings: ImportSettings,
    pub sleeper: SharedSleeper,
    pub worker: WorkerSlot,
}

impl ImportContext {
    pub fn new(settings: ImportSettings, sleeper: SharedSleeper, worker: WorkerSlot) -> Self {
        ImportContext {
            settings,
            sleeper,
            worker,
        }
    }

    fn client(&self, key: &ApiKey, lease: Option<&ProxyLease>) -> AppResult<ApiClient> {
        ApiClient::new(
            self.settings.base_url_for(key.data_center()),
            key,
            lease,
            self.sleeper.clone(),
        )
    }
}

/// Pulls the list summary and turns it into a job. The summary's counts are
/// only used to plan pagination.
pub async fn plan_job(
    list_id: &str,
    list_name: &str,
    api_key: &ApiKey,
    ctx: &ImportContext,
) -> AppResult<ListImportJob> {
    let client = ctx.client(api_key, None)?;
    let summary = fetchers::fetch_list_summary(&client, list_id).await?;
    job_from_summary(list_id, list_name, api_key, &summary)
}

pub fn job_from_summary(
    list_id: &str,
    list_name: &str,
    api_key: &ApiKey,
    summary: &ApiListSummary,
) -> AppResult<ListImportJob> {
    let job = ListImportJob::new(
        list_id,
        list_name,
        api_key.as_str(),
        summary.stats.total_count(),
        summary.stats.open_rate.unwrap_or(0.0),
    )?;
    Ok(job.with_campaign_history(summary.stats.campaign_count, summary.date_created))
}

/// Runs one import end to end: proxy, membership fetch, activity fetch,
/// merge, statistics. Any terminal fetch failure aborts the job with its
/// structured error; partial data is never turned into statistics.
pub async fn run_import(job: &ListImportJob, ctx: &ImportContext) -> AppResult<Statistics> {
    let overall_start_time = Instant::now();
    log(
        LogLevel::Step,
        &format!(
            "Starting import of list {} ({}) on data center {}",
            job.list_id(),
            job.list_name(),
            job.data_center()
        ),
    );

    let provisioner = ProxyProvisioner::new(&ctx.settings, ctx.sleeper.clone())?;
    let lease = provisioner.acquire(ctx.worker).await;

    let members_start_time = Instant::now();
    log(LogLevel::Step, "--- Phase 1: Membership Fetch ---");
    let member_table = {
        let client = ctx.client(job.api_key(), lease.as_ref())?;
        let pages = fetchers::fetch_member_pages(
            &client,
            job.list_id(),
            job.total_count(),
            config::MAX_CONNECTIONS,
        )
        .await?;
        let (table, report) = transform::members::build_member_table(pages);
        log_phase_completion(
            "Membership Fetch",
            &format!("{} fetched, {} kept", report.fetched, table.len()),
            members_start_time.elapsed(),
        );
        table
    };

    let activity_start_time = Instant::now();
    log(LogLevel::Step, "--- Phase 2: Subscriber Activity Fetch ---");
    // One instant for the whole job so every member shares the same window.
    let now = Utc::now();
    let subscriber_ids = member_table.subscriber_ids();
    let subscriber_total = subscriber_ids.len();
    let activity = {
        let client = ctx.client(job.api_key(), lease.as_ref())?;
        fetchers::fetch_subscriber_activity(
            &client,
            job.list_id(),
            subscriber_ids,
            config::MAX_ACTIVITY_CONNECTIONS,
            now,
            ctx.settings.thresholds.recency_window_days,
        )
        .await?
    };
    log_phase_completion(
        "Subscriber Activity Fetch",
        &format!("{} subscriber(s)", subscriber_total),
        activity_start_time.elapsed(),
    );

    let merged = member_table.merge_activity(activity);
    if merged.subscriber_count() == 0 {
        log(
            LogLevel::Error,
            &format!(
                "List {} has no subscribed members; cannot compute statistics.",
                job.list_id()
            ),
        );
        return Err(AppError::NoSubscribers {
            list_id: job.list_id().to_string(),
        });
    }

    log(LogLevel::Step, "--- Phase 3: Statistics ---");
    let job_clone = job.clone();
    let thresholds = ctx.settings.thresholds;
    let stats = utils::run_cpu_intensive(move || {
        metrics::compute_statistics(&merged, &job_clone, &thresholds, now)
    })
    .await?;

    log(
        LogLevel::Success,
        &format!(
            "Import of list {} complete: {} subscriber(s), open rate {:.3} | Elapsed: {:?}",
            job.list_id(),
            stats.subscribers,
            stats.open_rate,
            overall_start_time.elapsed()
        ),
    );
    Ok(stats)
}

fn log_phase_completion(phase: &str, detail: &str, elapsed: Duration) {
    log(
        LogLevel::Success,
        &format!(
            "--- {} Phase complete ({}) | Elapsed: {:?} ---",
            phase, detail, elapsed
        ),
    );
}

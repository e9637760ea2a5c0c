use crate::core::benchmark::{self, ComparisonReport};
use crate::core::metrics::Statistics;
use crate::core::notify::Notifier;
use crate::core::processor::{self, ImportContext};
use crate::core::stats::{self, RunStats, CAT_IMPORT, CAT_REPORT, CAT_STORE, CAT_SUMMARY};
use crate::core::store::{StatsStore, StoredList};
use crate::error::{AppError, AppResult, ListFailure};
use crate::logging::{log, LogLevel};
use crate::model::job::ApiKey;
use chrono::Utc;
use std::time::Instant;

/// A user asking for a benchmark report on one of their lists.
#[derive(Debug, Clone)]
pub struct UserImportRequest {
    pub list_id: String,
    pub list_name: String,
    pub api_key: String,
    pub user_email: String,
    pub store_aggregates: bool,
    pub monthly_updates: bool,
    /// Re-import even when statistics for the list are already stored.
    pub force: bool,
}

/// Imports (or reuses) a list's statistics, stores them and sends the
/// comparison report. On failure the user gets a failure notice carrying the
/// structured error report, and the error is returned.
pub async fn run_user_import<S, N>(
    request: &UserImportRequest,
    ctx: &ImportContext,
    store: &S,
    notifier: &N,
) -> AppResult<ComparisonReport>
where
    S: StatsStore,
    N: Notifier,
{
    let result = import_and_report(request, ctx, store, notifier).await;
    if let Err(e) = &result {
        log(
            LogLevel::Error,
            &format!("Import of list {} failed: {}", request.list_id, e),
        );
        if let Err(notify_err) = notifier
            .import_failed(&request.user_email, &request.list_id, &e.report())
            .await
        {
            log(
                LogLevel::Error,
                &format!(
                    "Could not queue failure notice for list {}: {}",
                    request.list_id, notify_err
                ),
            );
        }
    }
    result
}

async fn import_and_report<S, N>(
    request: &UserImportRequest,
    ctx: &ImportContext,
    store: &S,
    notifier: &N,
) -> AppResult<ComparisonReport>
where
    S: StatsStore,
    N: Notifier,
{
    let api_key = ApiKey::parse(&request.api_key)?;

    let cached = if request.force {
        None
    } else {
        store.load(&request.list_id).await?
    };

    let stats = match cached {
        Some(entry) => {
            log(
                LogLevel::Info,
                &format!(
                    "Reusing statistics for list {} stored at {}.",
                    request.list_id, entry.updated_at
                ),
            );
            entry.stats
        }
        None => {
            let job =
                processor::plan_job(&request.list_id, &request.list_name, &api_key, ctx).await?;
            let stats = processor::run_import(&job, ctx).await?;
            // Opted out of both: nothing of the list, key included, is kept.
            if request.store_aggregates || request.monthly_updates {
                store
                    .upsert(StoredList {
                        list_id: request.list_id.clone(),
                        list_name: request.list_name.clone(),
                        api_key,
                        user_email: request.user_email.clone(),
                        store_aggregates: request.store_aggregates,
                        monthly_updates: request.monthly_updates,
                        updated_at: Utc::now(),
                        stats: stats.clone(),
                    })
                    .await?;
            } else {
                log(
                    LogLevel::Info,
                    &format!(
                        "List {} opted out of storage and updates; statistics not stored.",
                        request.list_id
                    ),
                );
            }
            stats
        }
    };

    let report = comparison_for(store, &request.list_id, &request.list_name, &stats).await?;
    notifier.report_ready(&request.user_email, &report).await?;
    Ok(report)
}

async fn comparison_for<S: StatsStore>(
    store: &S,
    list_id: &str,
    list_name: &str,
    stats: &Statistics,
) -> AppResult<ComparisonReport> {
    let all = store.load_all().await?;
    let average = benchmark::average_stats(&all);
    Ok(benchmark::build_report(
        list_id,
        list_name,
        stats,
        average,
        Utc::now(),
    ))
}

/// Re-imports every stored list. A failing list is skipped and recorded; the
/// remaining lists still run. Updated reports go out only after every list
/// has been refreshed, so all of them compare against the same averages.
/// Returns the number of lists refreshed, or `RefreshFailed` listing every
/// failure.
pub async fn run_scheduled_refresh<S, N>(
    ctx: &ImportContext,
    store: &S,
    notifier: &N,
) -> AppResult<usize>
where
    S: StatsStore,
    N: Notifier,
{
    let overall_start_time = Instant::now();
    let stored = store.load_all().await?;
    let total = stored.len();
    log(
        LogLevel::Step,
        &format!(
            "Starting scheduled refresh of {} list(s) at {}",
            total,
            Utc::now().format("%Y-%m-%d %H:%M:%S %Z")
        ),
    );

    let mut run_stats = RunStats::new(total);
    let mut failures: Vec<ListFailure> = Vec::new();
    let mut refreshed: Vec<StoredList> = Vec::with_capacity(total);

    for entry in stored {
        match refresh_one(&entry, ctx, store, &mut run_stats).await {
            Ok(updated) => refreshed.push(updated),
            Err(e) => {
                log(
                    LogLevel::Warning,
                    &format!("Skipping list {} for this refresh: {}", entry.list_id, e),
                );
                failures.push(ListFailure {
                    list_id: entry.list_id.clone(),
                    report: e.report(),
                });
            }
        }
    }

    let refreshed_count = refreshed.len();
    if refreshed.iter().any(|e| e.monthly_updates) {
        let average = benchmark::average_stats(&store.load_all().await?);
        for entry in &refreshed {
            if !entry.monthly_updates {
                run_stats.category(CAT_REPORT).add_skip();
                continue;
            }
            let report = benchmark::build_report(
                &entry.list_id,
                &entry.list_name,
                &entry.stats,
                average.clone(),
                Utc::now(),
            );
            match notifier.report_ready(&entry.user_email, &report).await {
                Ok(()) => run_stats.category(CAT_REPORT).add_ok(),
                Err(e) => {
                    run_stats.category(CAT_REPORT).add_fail();
                    failures.push(ListFailure {
                        list_id: entry.list_id.clone(),
                        report: e.report(),
                    });
                }
            }
        }
    } else {
        for _ in &refreshed {
            run_stats.category(CAT_REPORT).add_skip();
        }
    }

    stats::print_summary(&run_stats, total, overall_start_time.elapsed());

    if failures.is_empty() {
        return Ok(refreshed_count);
    }

    if let Err(e) = notifier.refresh_failed(total, &failures).await {
        log(
            LogLevel::Error,
            &format!("Could not queue refresh failure summary: {}", e),
        );
    }
    Err(AppError::RefreshFailed { total, failures })
}

async fn refresh_one<S: StatsStore>(
    entry: &StoredList,
    ctx: &ImportContext,
    store: &S,
    run_stats: &mut RunStats,
) -> AppResult<StoredList> {
    let job = match processor::plan_job(&entry.list_id, &entry.list_name, &entry.api_key, ctx).await
    {
        Ok(job) => {
            run_stats.category(CAT_SUMMARY).add_ok();
            job
        }
        Err(e) => {
            run_stats.category(CAT_SUMMARY).add_fail();
            return Err(e);
        }
    };

    let stats = match processor::run_import(&job, ctx).await {
        Ok(stats) => {
            run_stats.category(CAT_IMPORT).add_ok();
            stats
        }
        Err(e) => {
            run_stats.category(CAT_IMPORT).add_fail();
            return Err(e);
        }
    };

    let updated = StoredList {
        stats,
        updated_at: Utc::now(),
        ..entry.clone()
    };
    match store.upsert(updated.clone()).await {
        Ok(()) => {
            run_stats.category(CAT_STORE).add_ok();
            Ok(updated)
        }
        Err(e) => {
            run_stats.category(CAT_STORE).add_fail();
            Err(e)
        }
    }
}

use super::client::ApiClient;
use super::model::{ApiActivityResponse, ApiListSummary, ApiMembersPage};
use crate::config;
use crate::error::{AppError, AppResult};
use crate::logging::{log, LogLevel};
use crate::model::common::MemberId;
use crate::model::job::plan_chunks;
use crate::model::member::ActivityRecord;
use crate::transform::activity;
use crate::utils;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub async fn fetch_list_summary(client: &ApiClient, list_id: &str) -> AppResult<ApiListSummary> {
    let url = client.endpoint(&format!("lists/{}", list_id));
    let query = [("fields", config::LIST_SUMMARY_FIELDS.to_string())];

    match client.fetch_json::<ApiListSummary>(&url, &query).await {
        Ok(summary) => Ok(summary),
        Err(e) => {
            log(
                LogLevel::Warning,
                &format!("List Summary FAIL [{}]: {}", list_id, e),
            );
            Err(e)
        }
    }
}

/// Fetches every membership page concurrently, at most `max_concurrent` in
/// flight. The first unrecoverable chunk failure aborts the remaining chunks.
pub async fn fetch_member_pages(
    client: &ApiClient,
    list_id: &str,
    total_count: u64,
    max_concurrent: usize,
) -> AppResult<Vec<ApiMembersPage>> {
    let plan = plan_chunks(total_count);
    let total_chunks = plan.len();
    let url = client.endpoint(&format!("lists/{}/members", list_id));
    let sem = Arc::new(Semaphore::new(max_concurrent.max(1)));

    log(
        LogLevel::Info,
        &format!(
            "Requesting {} member chunk(s) for list {} (reported size {}).",
            total_chunks, list_id, total_count
        ),
    );

    let mut tasks = JoinSet::new();
    for (i, chunk) in plan.into_iter().enumerate() {
        let client_clone = client.clone();
        let sem_clone = sem.clone();
        let url_clone = url.clone();
        let chunk_num = i + 1;

        tasks.spawn(async move {
            let query = [
                ("fields", config::MEMBER_FIELDS.to_string()),
                ("count", chunk.count.to_string()),
                ("offset", chunk.offset.to_string()),
            ];

            // Held across the whole retry loop so retries stay under the cap.
            let permit = utils::acquire_request_slot(sem_clone, "Member Chunk").await?;
            let result = client_clone
                .fetch_json::<ApiMembersPage>(&url_clone, &query)
                .await;
            drop(permit);

            result.map(|page| (chunk_num, page))
        });
    }

    let mut pages = Vec::with_capacity(total_chunks);
    while let Some(join_result) = tasks.join_next().await {
        match join_result {
            Ok(Ok((chunk_num, page))) => {
                log(
                    LogLevel::Info,
                    &format!(
                        "Member chunk {}/{} OK ({} rows).",
                        chunk_num,
                        total_chunks,
                        page.members.len()
                    ),
                );
                pages.push(page);
            }
            Ok(Err(e)) => {
                log(
                    LogLevel::Warning,
                    &format!("Member chunk FAILED for list {}: {}. Aborting phase.", list_id, e),
                );
                return Err(e);
            }
            Err(e) => {
                log(
                    LogLevel::Error,
                    &format!("Member chunk task panicked for list {}: {}", list_id, e),
                );
                return Err(AppError::from(e));
            }
        }
    }

    Ok(pages)
}

/// Fetches each subscriber's activity feed, one request per member, and keeps
/// only the newest open inside the recency window.
pub async fn fetch_subscriber_activity(
    client: &ApiClient,
    list_id: &str,
    subscriber_ids: Vec<MemberId>,
    max_concurrent: usize,
    now: DateTime<Utc>,
    window_days: i64,
) -> AppResult<Vec<ActivityRecord>> {
    if subscriber_ids.is_empty() {
        return Ok(Vec::new());
    }

    let total = subscriber_ids.len();
    let sem = Arc::new(Semaphore::new(max_concurrent.max(1)));
    let mut tasks = JoinSet::new();

    for member_id in subscriber_ids {
        let client_clone = client.clone();
        let sem_clone = sem.clone();
        let url = client.endpoint(&format!("lists/{}/members/{}/activity", list_id, member_id));

        tasks.spawn(async move {
            let query = [("fields", config::ACTIVITY_FIELDS.to_string())];

            let permit = utils::acquire_request_slot(sem_clone, "Member Activity").await?;
            let result = client_clone
                .fetch_json::<ApiActivityResponse>(&url, &query)
                .await;
            drop(permit);

            result.map(|resp| activity::latest_open(&resp, now, window_days))
        });
    }

    let progress_every = (total / 10).max(1);
    let mut records = Vec::with_capacity(total);
    while let Some(join_result) = tasks.join_next().await {
        match join_result {
            Ok(Ok(record)) => {
                records.push(record);
                if records.len() % progress_every == 0 {
                    log(
                        LogLevel::Info,
                        &format!("Activity progress: {}/{}", records.len(), total),
                    );
                }
            }
            Ok(Err(e)) => {
                log(
                    LogLevel::Warning,
                    &format!("Activity fetch FAILED for list {}: {}. Aborting phase.", list_id, e),
                );
                return Err(e);
            }
            Err(e) => {
                log(
                    LogLevel::Error,
                    &format!("Activity task panicked for list {}: {}", list_id, e),
                );
                return Err(AppError::from(e));
            }
        }
    }

    Ok(records)
}

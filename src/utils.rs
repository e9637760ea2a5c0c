use crate::error::{AppError, AppResult};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task;

/// Runs a CPU-bound pass over a member table on the blocking pool.
pub async fn run_cpu_intensive<F, T>(func: F) -> AppResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    Ok(task::spawn_blocking(func).await?)
}

/// Pretty-prints `data` as JSON bytes on the blocking pool.
pub async fn to_pretty_json<T>(data: T) -> AppResult<Vec<u8>>
where
    T: Serialize + Send + 'static,
{
    task::spawn_blocking(move || serde_json::to_vec_pretty(&data))
        .await?
        .map_err(AppError::from)
}

/// Waits for one of a phase's request slots. The permit is owned by the
/// spawned request task and is released only when the request, retries
/// included, has finished.
pub async fn acquire_request_slot(
    slots: Arc<Semaphore>,
    phase: &str,
) -> AppResult<OwnedSemaphorePermit> {
    slots
        .acquire_owned()
        .await
        .map_err(|e| AppError::SemaphoreAcquire(format!("{} request slot: {}", phase, e)))
}

use crate::core::benchmark::ComparisonReport;
use crate::error::{AppResult, ErrorReport, ListFailure};
use crate::io;
use crate::logging::{log, LogLevel};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};

pub const SUBJECT_REPORT_READY: &str = "Your Email Benchmarking Report is Ready!";
pub const SUBJECT_IMPORT_FAILED: &str = "We Couldn't Process Your Email Benchmarking Report";
pub const SUBJECT_REFRESH_FAILED: &str = "Scheduled list refresh finished with failures";

/// Delivery of reports and failure notices. End users get per-list messages;
/// operators get one summary per scheduled refresh.
pub trait Notifier {
    fn report_ready(
        &self,
        user_email: &str,
        report: &ComparisonReport,
    ) -> impl Future<Output = AppResult<()>> + Send;

    fn import_failed(
        &self,
        user_email: &str,
        list_id: &str,
        report: &ErrorReport,
    ) -> impl Future<Output = AppResult<()>> + Send;

    fn refresh_failed(
        &self,
        total: usize,
        failures: &[ListFailure],
    ) -> impl Future<Output = AppResult<()>> + Send;
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboxMessage<T> {
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    pub created_at: DateTime<Utc>,
    pub payload: T,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshFailureSummary {
    pub total_lists: usize,
    pub failed_lists: usize,
    pub failures: Vec<ListFailure>,
}

/// Writes each message as a JSON file under `<base>/outbox` for a mailer to
/// pick up.
#[derive(Debug, Clone)]
pub struct OutboxNotifier {
    dir: PathBuf,
}

impl OutboxNotifier {
    pub fn new(base_dir: &Path) -> Self {
        OutboxNotifier {
            dir: base_dir.join(io::OUTBOX_SUBDIR),
        }
    }

    async fn write<T>(&self, kind: &str, key: &str, message: OutboxMessage<T>) -> AppResult<()>
    where
        T: Serialize + Send + Sync + 'static,
    {
        tokio::fs::create_dir_all(&self.dir).await?;
        let file_name = format!(
            "{}_{}_{}.json",
            message.created_at.format("%Y%m%dT%H%M%S%.3f"),
            kind,
            io::clean_filename(key)
        );
        let log_ctx = format!("Outbox {} ({})", kind, key);
        io::save_json(self.dir.join(file_name), message, log_ctx).await
    }
}

impl Notifier for OutboxNotifier {
    async fn report_ready(&self, user_email: &str, report: &ComparisonReport) -> AppResult<()> {
        log(
            LogLevel::Info,
            &format!("Queueing report for list {} to {}", report.list_id, user_email),
        );
        let message = OutboxMessage {
            subject: SUBJECT_REPORT_READY.to_string(),
            recipient: Some(user_email.to_string()),
            created_at: Utc::now(),
            payload: report.clone(),
        };
        self.write("report", &report.list_id, message).await
    }

    async fn import_failed(
        &self,
        user_email: &str,
        list_id: &str,
        report: &ErrorReport,
    ) -> AppResult<()> {
        log(
            LogLevel::Info,
            &format!("Queueing failure notice for list {} to {}", list_id, user_email),
        );
        let message = OutboxMessage {
            subject: SUBJECT_IMPORT_FAILED.to_string(),
            recipient: Some(user_email.to_string()),
            created_at: Utc::now(),
            payload: report.clone(),
        };
        self.write("error", list_id, message).await
    }

    async fn refresh_failed(&self, total: usize, failures: &[ListFailure]) -> AppResult<()> {
        let message = OutboxMessage {
            subject: SUBJECT_REFRESH_FAILED.to_string(),
            recipient: None,
            created_at: Utc::now(),
            payload: RefreshFailureSummary {
                total_lists: total,
                failed_lists: failures.len(),
                failures: failures.to_vec(),
            },
        };
        self.write("refresh", "summary", message).await
    }
}

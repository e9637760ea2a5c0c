use crate::config;
use crate::core::tasks::UserImportRequest;
use crate::error::{AppError, AppResult};
use crate::model::common::parse_timestamp;
use crate::testing::OfflineListInfo;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Imports mailing lists and benchmarks their engagement statistics.",
    long_about = None,
    arg_required_else_help = true
)]
pub struct CliArgs {
    #[arg(
        long,
        global = true,
        env = "LISTBENCH_OUT_DIR",
        default_value = config::DEFAULT_OUT_DIR,
        value_name = "DIR_PATH",
        help = "Directory holding stored statistics and the outbox"
    )]
    out_dir: String,

    #[arg(
        long,
        global = true,
        env = "LISTBENCH_WORKER_INDEX",
        value_name = "INDEX",
        help = "Zero-based worker index; selects the proxy process slot"
    )]
    worker_index: Option<u32>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import one list and send its benchmark report.
    Import(ImportArgs),
    /// Re-import every stored list.
    Refresh,
    /// Compute statistics from local JSON files without any network access.
    Analyze(AnalyzeArgs),
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    #[arg(long, help = "Remote list id")]
    list_id: String,

    #[arg(long, default_value = "", help = "Display name of the list")]
    list_name: String,

    #[arg(
        long,
        env = "LISTBENCH_API_KEY",
        hide_env_values = true,
        help = "API key in the form <secret>-<data center>"
    )]
    api_key: String,

    #[arg(long, help = "Address that receives the report")]
    email: String,

    #[arg(long, help = "Include this list in the benchmark averages")]
    store_aggregates: bool,

    #[arg(long, help = "Send an updated report after each scheduled refresh")]
    monthly_updates: bool,

    #[arg(long, help = "Re-import even if statistics are already stored")]
    force: bool,
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    #[arg(long, value_name = "FILE_PATH", help = "Members page JSON file")]
    members_file: String,

    #[arg(long, value_name = "FILE_PATH", help = "JSON array of member activity responses")]
    activity_file: Option<String>,

    #[arg(long, default_value_t = 0.0, help = "List open rate as a percentage")]
    open_rate: f64,

    #[arg(long, default_value_t = 0, help = "Number of campaigns sent to the list")]
    campaign_count: u64,

    #[arg(long, value_name = "RFC3339", help = "List creation timestamp")]
    date_created: Option<String>,

    #[arg(long, help = "Total member count; defaults to the rows in the members file")]
    total_count: Option<u64>,

    #[arg(long, value_name = "OUTPUT_FILE", help = "Write the statistics to this file")]
    output_file: Option<String>,
}

impl CliArgs {
    pub fn get_out_dir(&self) -> PathBuf {
        PathBuf::from(&self.out_dir)
    }

    pub fn worker_index(&self) -> Option<u32> {
        self.worker_index
    }
}

impl ImportArgs {
    pub fn to_request(&self) -> AppResult<UserImportRequest> {
        if self.list_id.trim().is_empty() {
            return Err(AppError::Argument("--list-id must not be empty.".into()));
        }
        if !self.email.contains('@') {
            return Err(AppError::Argument(format!(
                "'{}' is not an email address.",
                self.email
            )));
        }
        let list_name = if self.list_name.trim().is_empty() {
            self.list_id.clone()
        } else {
            self.list_name.clone()
        };
        Ok(UserImportRequest {
            list_id: self.list_id.trim().to_string(),
            list_name,
            api_key: self.api_key.clone(),
            user_email: self.email.clone(),
            store_aggregates: self.store_aggregates,
            monthly_updates: self.monthly_updates,
            force: self.force,
        })
    }
}

impl AnalyzeArgs {
    pub fn members_file(&self) -> PathBuf {
        PathBuf::from(&self.members_file)
    }

    pub fn activity_file(&self) -> Option<PathBuf> {
        self.activity_file.as_deref().map(PathBuf::from)
    }

    pub fn output_file(&self) -> Option<PathBuf> {
        self.output_file.as_deref().map(PathBuf::from)
    }

    pub fn list_info(&self) -> AppResult<OfflineListInfo> {
        let date_created: Option<DateTime<Utc>> = match self.date_created.as_deref() {
            Some(raw) => Some(parse_timestamp(raw).ok_or_else(|| {
                AppError::Argument(format!("Invalid --date-created timestamp '{}'", raw))
            })?),
            None => None,
        };
        Ok(OfflineListInfo {
            reported_open_rate: self.open_rate,
            campaign_count: self.campaign_count,
            date_created,
            total_count: self.total_count,
        })
    }
}

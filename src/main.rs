use clap::{CommandFactory, Parser};
use list_benchmark::api::backoff::tokio_sleeper;
use list_benchmark::api::proxy::WorkerSlot;
use list_benchmark::cli::{CliArgs, Command};
use list_benchmark::config::ImportSettings;
use list_benchmark::core::notify::OutboxNotifier;
use list_benchmark::core::processor::ImportContext;
use list_benchmark::core::store::JsonStatsStore;
use list_benchmark::core::tasks;
use list_benchmark::error::{AppError, AppResult};
use list_benchmark::io;
use list_benchmark::logging::{log, setup_logging, LogLevel};
use list_benchmark::testing;
use std::process::ExitCode;
use tokio::runtime::Builder;

fn main() -> ExitCode {
    setup_logging();

    let cli_args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            log(LogLevel::Error, &format!("CLI Argument Error: {}", e));
            let _ = CliArgs::command().print_help();
            return ExitCode::from(2);
        }
    };

    // Each process drives one job at a time on a single thread; scale out by
    // running more processes with distinct worker indexes.
    let runtime = match Builder::new_current_thread()
        .enable_all()
        .thread_name("listbench-worker")
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            log(
                LogLevel::Error,
                &format!("FATAL: Failed to build Tokio runtime: {}", e),
            );
            return ExitCode::FAILURE;
        }
    };

    let main_result: AppResult<()> = runtime.block_on(run(cli_args));

    match main_result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if !matches!(e, AppError::Argument(_)) {
                log(LogLevel::Error, &format!("FATAL: {}", e));
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(args: CliArgs) -> AppResult<()> {
    let settings = ImportSettings::from_env()?;
    let out_dir = args.get_out_dir();

    match &args.command {
        Command::Analyze(analyze) => {
            let info = analyze.list_info()?;
            let activity = analyze.activity_file();
            let stats = testing::analyze_files(
                &analyze.members_file(),
                activity.as_deref(),
                info,
                settings.thresholds,
                analyze.output_file(),
            )
            .await?;
            let rendered = serde_json::to_string_pretty(&stats)?;
            println!("{}", rendered);
            Ok(())
        }
        Command::Import(import) => {
            let request = import.to_request().inspect_err(|e| {
                log(LogLevel::Error, &e.to_string());
            })?;
            io::ensure_output_directories(&out_dir).await?;
            let ctx = ImportContext::new(
                settings,
                tokio_sleeper(),
                WorkerSlot::from_worker_index(args.worker_index()),
            );
            let store = JsonStatsStore::new(&out_dir);
            let notifier = OutboxNotifier::new(&out_dir);
            let report = tasks::run_user_import(&request, &ctx, &store, &notifier).await?;
            log(
                LogLevel::Success,
                &format!(
                    "Report for list {} queued ({} list(s) in the benchmark).",
                    report.list_id, report.average.lists_included
                ),
            );
            Ok(())
        }
        Command::Refresh => {
            io::ensure_output_directories(&out_dir).await?;
            let ctx = ImportContext::new(
                settings,
                tokio_sleeper(),
                WorkerSlot::from_worker_index(args.worker_index()),
            );
            let store = JsonStatsStore::new(&out_dir);
            let notifier = OutboxNotifier::new(&out_dir);
            tasks::run_scheduled_refresh(&ctx, &store, &notifier).await?;
            Ok(())
        }
    }
}

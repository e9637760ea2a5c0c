use crate::logging::{log, LogLevel};
use std::collections::BTreeMap;
use std::time::Duration;

pub const CAT_SUMMARY: &str = "List Summary";
pub const CAT_IMPORT: &str = "Import";
pub const CAT_STORE: &str = "Store Stats";
pub const CAT_REPORT: &str = "Send Report";

const CATEGORIES_ORDER: [&str; 4] = [CAT_SUMMARY, CAT_IMPORT, CAT_STORE, CAT_REPORT];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryStats {
    pub ok: usize,
    pub fail: usize,
    pub skip: usize,
    pub total_tasks: usize,
}

impl CategoryStats {
    pub fn add_ok(&mut self) {
        self.ok += 1;
    }
    pub fn add_fail(&mut self) {
        self.fail += 1;
    }
    pub fn add_skip(&mut self) {
        self.skip += 1;
    }
    pub fn set_total(&mut self, total: usize) {
        self.total_tasks = total;
    }
    pub fn get_processed(&self) -> usize {
        self.ok + self.fail + self.skip
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunStats(BTreeMap<&'static str, CategoryStats>);

impl RunStats {
    pub fn new(total_lists: usize) -> Self {
        let mut stats = BTreeMap::new();
        for cat in CATEGORIES_ORDER {
            let mut s = CategoryStats::default();
            s.set_total(total_lists);
            stats.insert(cat, s);
        }
        RunStats(stats)
    }

    pub fn category(&mut self, name: &'static str) -> &mut CategoryStats {
        self.0.entry(name).or_default()
    }

    pub fn get(&self, name: &str) -> CategoryStats {
        self.0.get(name).copied().unwrap_or_default()
    }

    pub fn total_failures(&self) -> usize {
        self.0.values().map(|s| s.fail).sum()
    }
}

pub fn print_summary(stats: &RunStats, lists: usize, duration: Duration) {
    let sep = "=".repeat(60);
    let title = format!("Refresh Summary ({} Lists)", lists);
    println!("\n{}\n{:^60}\n{}", sep, title, sep);
    println!("Total Run Time:    {:.3?}", duration);
    println!("{}", "-".repeat(60));

    println!(
        "{:<17} {:<8} {:<12} {:<8} {:<8}",
        "Category", "OK", "Skipped", "Fail", "Total"
    );
    println!("{}", "-".repeat(60));

    for cat_name in CATEGORIES_ORDER {
        let s = stats.get(cat_name);
        println!(
            "{:<17} {:<8} {:<12} {:<8} {:<8}",
            cat_name, s.ok, s.skip, s.fail, s.total_tasks
        );
    }

    println!("{}", sep);

    log_overall_status(stats, lists);

    let end_ts_str = chrono::Utc::now()
        .format("%Y-%m-%d %H:%M:%S %Z")
        .to_string();
    log(
        LogLevel::Step,
        &format!("--- Refresh Finished at {} ---", end_ts_str),
    );
}

fn log_overall_status(stats: &RunStats, lists: usize) {
    let failures = stats.total_failures();
    if lists == 0 {
        log(
            LogLevel::Warning,
            "Refresh completed, but no stored lists were selected.",
        );
    } else if failures > 0 {
        log(
            LogLevel::Error,
            &format!(
                "Refresh completed with errors: {} task(s) failed. Check logs.",
                failures
            ),
        );
    } else {
        log(LogLevel::Success, "Refresh completed successfully.");
    }
}

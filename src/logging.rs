use colored::*;
use once_cell::sync::Lazy;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Step,
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    const ALL: [LogLevel; 5] = [
        LogLevel::Step,
        LogLevel::Info,
        LogLevel::Success,
        LogLevel::Warning,
        LogLevel::Error,
    ];

    fn tag(&self) -> &'static str {
        match self {
            LogLevel::Step => "STEP",
            LogLevel::Info => "INFO",
            LogLevel::Success => "SUCCESS",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }

    fn color(&self) -> Color {
        match self {
            LogLevel::Step => Color::Magenta,
            LogLevel::Info => Color::Cyan,
            LogLevel::Success => Color::Green,
            LogLevel::Warning => Color::Yellow,
            LogLevel::Error => Color::Red,
        }
    }
}

// "[ WARNING ]" plus one space of padding
static PREFIX_WIDTH: Lazy<usize> = Lazy::new(|| {
    LogLevel::ALL
        .iter()
        .map(|l| l.tag().len() + 4)
        .max()
        .unwrap_or(11)
        + 1
});

static LOG_PREFIXES: Lazy<HashMap<LogLevel, String>> = Lazy::new(|| {
    colored::control::set_override(true);

    LogLevel::ALL
        .iter()
        .map(|level| {
            let visual_width = level.tag().len() + 4;
            let padding = PREFIX_WIDTH.saturating_sub(visual_width);
            let inner = format!(" {} ", level.tag()).color(level.color()).bold();
            (*level, format!("[{}]{}", inner, " ".repeat(padding)))
        })
        .collect()
});

/// Installs the global subscriber. `RUST_LOG` defaults to `info`.
pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }

    let format = tracing_subscriber::fmt::format()
        .without_time()
        .with_level(false)
        .with_target(false)
        .compact();

    tracing_subscriber::fmt()
        .event_format(format)
        .with_ansi(true)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

pub fn log(level: LogLevel, message: &str) {
    let prefix = LOG_PREFIXES
        .get(&level)
        .cloned()
        .unwrap_or_else(|| format!("[ {} ] ", level.tag()));
    let line = format!("{}{}", prefix, message);

    match level {
        LogLevel::Step => tracing::info!(target: "step", "{}", line),
        LogLevel::Info | LogLevel::Success => tracing::info!("{}", line),
        LogLevel::Warning => tracing::warn!("{}", line),
        LogLevel::Error => tracing::error!("{}", line),
    }
}

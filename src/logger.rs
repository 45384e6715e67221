use std::io;

use chrono::Local;
use fern::Dispatch;
use log::LevelFilter;

pub const LEVEL_ENV: &str = "GATEWAY_DEBUG";

fn parse_level(value: Option<&str>) -> LevelFilter {
    match value {
        Some("trace") => LevelFilter::Trace,
        Some("debug") => LevelFilter::Debug,
        Some("info") => LevelFilter::Info,
        Some("warn") => LevelFilter::Warn,
        Some("error") => LevelFilter::Error,
        _ => LevelFilter::Info,
    }
}

fn logging_level() -> LevelFilter {
    parse_level(std::env::var(LEVEL_ENV).ok().as_deref())
}

/// Formats one log line. Every level carries the `<file:line>` suffix; the
/// timestamp is added unless the filter is plain `info`.
fn format_line(
    level_filter: LevelFilter,
    level: log::Level,
    message: &std::fmt::Arguments<'_>,
    file: &str,
    line: u32,
) -> String {
    if level_filter == LevelFilter::Info {
        format!("[{level}]: {message} <{file}:{line}>")
    } else {
        format!(
            "[{}][{level}]: {message} <{file}:{line}>",
            Local::now().format("%b-%d-%Y %H:%M:%S.%f"),
        )
    }
}

/// Installs the global logger. Output goes to stderr; stdout is reserved for
/// rendered call results.
pub fn setup_logger() {
    let level_filter = logging_level();

    if let Err(e) = Dispatch::new()
        .format(move |out, message, record| {
            let file = record.file().unwrap_or("unknown_file");
            let line = record.line().unwrap_or(0);
            out.finish(format_args!(
                "{}",
                format_line(level_filter, record.level(), message, file, line)
            ));
        })
        .level(level_filter)
        .chain(io::stderr())
        .apply()
    {
        eprintln!("Logger initialization failed: {e}");
    }
}

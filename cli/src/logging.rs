use colored::*;
use log::LevelFilter;

// User-facing status lines on stderr. Diagnostics go through `log`/`tracing`
// and env_logger instead.

pub fn log_info(message: &str) {
    if log::log_enabled!(log::Level::Debug) {
        eprintln!("{} {}", "[INFO]".cyan(), message);
    }
}

pub fn log_warn(message: &str) {
    eprintln!("{} {}", "[WARN]".yellow().bold(), message);
}

pub fn log_error(message: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), message);
}

/// Map a configured level name onto a filter, defaulting to `Info`
pub fn level_filter(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filter() {
        assert_eq!(level_filter("DEBUG"), LevelFilter::Debug);
        assert_eq!(level_filter("warn"), LevelFilter::Warn);
        assert_eq!(level_filter("chatty"), LevelFilter::Info);
    }
}

//! Structured logging for walletscope
//!
//! Leveled, tag-scoped console logging:
//! - Standard log levels (Error/Warning/Info/Debug)
//! - Per-module debug control via --debug-<module> flags
//! - Colored console output with aligned tag and event columns
//!
//! ## Usage
//!
//! ```ignore
//! use walletscope::logger::{self, LogTag};
//!
//! logger::info(LogTag::Rpc, "endpoint healthy");
//! logger::debug(LogTag::Analytics, "delta resolved"); // only with --debug-analytics
//! logger::log(LogTag::Analytics, "BATCH", "processed 8 transactions");
//! ```

use chrono::Local;
use colored::*;
use std::io::{self, Write};

use crate::arguments;

/// Log message categories, one per subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTag {
    System,
    Rpc,
    Metadata,
    Analytics,
    Pnl,
}

impl LogTag {
    pub fn label(&self) -> &'static str {
        match self {
            LogTag::System => "SYSTEM",
            LogTag::Rpc => "RPC",
            LogTag::Metadata => "METADATA",
            LogTag::Analytics => "ANALYTICS",
            LogTag::Pnl => "PNL",
        }
    }

    /// Command-line flag that enables debug output for this tag
    pub fn debug_flag(&self) -> &'static str {
        match self {
            LogTag::System => "--debug-system",
            LogTag::Rpc => "--debug-rpc",
            LogTag::Metadata => "--debug-metadata",
            LogTag::Analytics => "--debug-analytics",
            LogTag::Pnl => "--debug-pnl",
        }
    }

    fn colored_label(&self) -> ColoredString {
        match self {
            LogTag::System => self.label().bright_white().bold(),
            LogTag::Rpc => self.label().bright_green().bold(),
            LogTag::Metadata => self.label().cyan().bold(),
            LogTag::Analytics => self.label().magenta().bold(),
            LogTag::Pnl => self.label().yellow().bold(),
        }
    }
}

/// Log levels ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warning = 1,
    Info = 2,
    Debug = 3,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARNING",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }
}

/// Debug output requires the matching --debug-<module> flag or --verbose
fn should_log(tag: &LogTag, level: LogLevel) -> bool {
    if level == LogLevel::Debug {
        return arguments::is_verbose_enabled() || arguments::has_arg(tag.debug_flag());
    }
    true
}

fn write_line(tag: LogTag, event: &str, message: &str, level: LogLevel) {
    let time = Local::now().format("%H:%M:%S").to_string();
    let event_str = match level {
        LogLevel::Error => event.red().bold(),
        LogLevel::Warning => event.yellow().bold(),
        LogLevel::Info => event.normal(),
        LogLevel::Debug => event.dimmed(),
    };
    println!(
        "{} [{:<9}] [{}] {}",
        time.dimmed(),
        tag.colored_label(),
        event_str,
        message
    );
    let _ = io::stdout().flush();
}

/// Log an event at INFO level with an explicit event label
pub fn log(tag: LogTag, event: &str, message: &str) {
    if should_log(&tag, LogLevel::Info) {
        write_line(tag, event, message, LogLevel::Info);
    }
}

/// Log at ERROR level (always shown)
pub fn error(tag: LogTag, message: &str) {
    write_line(tag, "ERROR", message, LogLevel::Error);
}

/// Log at WARNING level
pub fn warning(tag: LogTag, message: &str) {
    if should_log(&tag, LogLevel::Warning) {
        write_line(tag, "WARNING", message, LogLevel::Warning);
    }
}

/// Log at INFO level
pub fn info(tag: LogTag, message: &str) {
    if should_log(&tag, LogLevel::Info) {
        write_line(tag, "INFO", message, LogLevel::Info);
    }
}

/// Log at DEBUG level (gated by --debug-<module> or --verbose)
pub fn debug(tag: LogTag, message: &str) {
    if should_log(&tag, LogLevel::Debug) {
        write_line(tag, "DEBUG", message, LogLevel::Debug);
    }
}

/// Shorten a signature or address for log output
pub fn format_signature_short(signature: &str) -> String {
    if signature.len() > 16 {
        format!("{}...{}", &signature[..8], &signature[signature.len() - 8..])
    } else {
        signature.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_shortening() {
        let sig = "5UfDuX94A1QfqkQvg5WBvM3WLx9nhL89QwVXfYJqNCYwNYsaQnjg4sCzDKMSKxYZ";
        let short = format_signature_short(sig);
        assert!(short.len() < sig.len());
        assert!(short.contains("..."));
        assert_eq!(format_signature_short("abc"), "abc");
    }

    #[test]
    fn test_tag_debug_flags() {
        assert_eq!(LogTag::Rpc.debug_flag(), "--debug-rpc");
        assert_eq!(LogTag::Analytics.debug_flag(), "--debug-analytics");
    }
}

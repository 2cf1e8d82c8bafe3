//! FILENAME: report-engine/src/logging.rs
//! PURPOSE: Category logging for template parsing and report generation.
//! CONTEXT: Every message goes through the `log` facade with the category as
//! its target, so a host picks whatever backend it likes. Messages carry a
//! process-wide sequence number to keep interleaved generations apart.

use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// CATEGORIES
// ============================================================================

pub const TEMPLATE: &str = "TEMPLATE";
pub const CELL: &str = "CELL";
pub const SUM: &str = "SUM";
pub const REPORT: &str = "REPORT";
pub const CACHE: &str = "CACHE";

// ============================================================================
// WRITERS
// ============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);

/// Next process-wide message number, starting at 1.
pub fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst) + 1
}

/// Writes `seq|message` under the category target. Fatal messages go out at
/// error level with a FATAL marker.
pub fn write_log(level: log::Level, fatal: bool, category: &str, message: &str) {
    let marker = if fatal { "FATAL " } else { "" };
    log::log!(target: category, level, "{}|{}{}", next_seq(), marker, message);
}

/// Function tracing: `ENTER name` / `EXIT name`, with optional detail.
pub fn write_trace(category: &str, edge: &str, func: &str, detail: &str) {
    let line = match detail {
        "" => format!("{} {}", edge, func),
        _ => format!("{} {} {}", edge, func, detail),
    };
    write_log(log::Level::Debug, false, category, &line);
}

// ============================================================================
// MACROS
// ============================================================================

#[doc(hidden)]
#[macro_export]
macro_rules! __log_at {
    ($level:ident, $fatal:expr, $cat:expr, $($arg:tt)*) => {
        $crate::logging::write_log(::log::Level::$level, $fatal, $cat, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_debug {
    ($cat:expr, $($arg:tt)*) => { $crate::__log_at!(Debug, false, $cat, $($arg)*) };
}

#[macro_export]
macro_rules! log_info {
    ($cat:expr, $($arg:tt)*) => { $crate::__log_at!(Info, false, $cat, $($arg)*) };
}

#[macro_export]
macro_rules! log_warn {
    ($cat:expr, $($arg:tt)*) => { $crate::__log_at!(Warn, false, $cat, $($arg)*) };
}

#[macro_export]
macro_rules! log_error {
    ($cat:expr, $($arg:tt)*) => { $crate::__log_at!(Error, false, $cat, $($arg)*) };
}

/// A failure that aborted a template, band or cell.
#[macro_export]
macro_rules! log_fatal {
    ($cat:expr, $($arg:tt)*) => { $crate::__log_at!(Error, true, $cat, $($arg)*) };
}

#[macro_export]
macro_rules! log_enter {
    ($cat:expr, $func:expr) => { $crate::logging::write_trace($cat, "ENTER", $func, "") };
    ($cat:expr, $func:expr, $($arg:tt)*) => {
        $crate::logging::write_trace($cat, "ENTER", $func, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_exit {
    ($cat:expr, $func:expr) => { $crate::logging::write_trace($cat, "EXIT", $func, "") };
    ($cat:expr, $func:expr, $($arg:tt)*) => {
        $crate::logging::write_trace($cat, "EXIT", $func, &format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = next_seq();
        let b = next_seq();
        assert!(b > a);
    }

    #[test]
    fn macros_expand_without_a_backend() {
        crate::log_debug!(TEMPLATE, "row {}", 1);
        crate::log_fatal!(REPORT, "band {} failed", "detail");
        crate::log_enter!(REPORT, "generate");
        crate::log_exit!(REPORT, "generate", "rows={}", 3);
    }
}

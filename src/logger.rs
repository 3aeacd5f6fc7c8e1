//! Structured logging for the Chip32 core.
//!
//! Ported from the host kernel's logging subsystem: a small set of log
//! levels, a tick-counter timestamp, and a macro family that expands to a
//! single internal `_log` call. Unlike a bare-metal kernel this crate does
//! not own a UART — the host installs a [`LogSink`] once at startup, and
//! until it does, log calls are simply dropped rather than panicking.

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

/// Global tick counter used as a timestamp for log lines.
static TICK_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Log severity, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO ",
            LogLevel::Warn => "WARN ",
            LogLevel::Error => "ERROR",
        }
    }
}

/// A host-provided log backend. Implementations typically write to a UART,
/// a ring buffer drained by a debugger, or (in tests) nowhere at all.
pub trait LogSink: Sync {
    fn write_log(&self, timestamp: u64, level: LogLevel, args: fmt::Arguments<'_>);
}

struct NullSink;
impl LogSink for NullSink {
    fn write_log(&self, _timestamp: u64, _level: LogLevel, _args: fmt::Arguments<'_>) {}
}

static NULL_SINK: NullSink = NullSink;
static SINK: spin::Mutex<&'static dyn LogSink> = spin::Mutex::new(&NULL_SINK);

/// Install the log sink the host wants messages routed to.
pub fn init(sink: &'static dyn LogSink) {
    *SINK.lock() = sink;
}

/// Current tick-based timestamp.
pub fn get_timestamp() -> u64 {
    TICK_COUNTER.load(Ordering::Relaxed)
}

/// Advance the tick counter. Called by the scheduler's timer tick.
pub fn tick() {
    TICK_COUNTER.fetch_add(1, Ordering::Relaxed);
}

#[doc(hidden)]
pub fn _log(level: LogLevel, args: fmt::Arguments<'_>) {
    let sink = *SINK.lock();
    sink.write_log(get_timestamp(), level, args);
}

#[macro_export]
macro_rules! log_level {
    ($level:expr, $($arg:tt)*) => {
        $crate::logger::_log($level, format_args!($($arg)*))
    };
}

/// Info-level log.
#[macro_export]
macro_rules! log {
    ($($arg:tt)*) => {
        $crate::log_level!($crate::logger::LogLevel::Info, $($arg)*)
    };
}

/// Debug-level log.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::log_level!($crate::logger::LogLevel::Debug, $($arg)*)
    };
}

/// Warning-level log.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::log_level!($crate::logger::LogLevel::Warn, $($arg)*)
    };
}

/// Error-level log.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::log_level!($crate::logger::LogLevel::Error, $($arg)*)
    };
}

//! Pluggable logging for the emulation core.
//!
//! The core never links a logging framework directly; a frontend installs a
//! [`LogSink`] once per process and the `core_*!` macros forward to it. With
//! no sink installed the macros compile down to a cheap flag check.

use std::fmt;
use std::sync::OnceLock;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
        };
        f.write_str(name)
    }
}

pub trait LogSink: Send + Sync + 'static {
    fn log(&self, level: Level, target: &'static str, args: fmt::Arguments);
}

static SINK: OnceLock<Box<dyn LogSink>> = OnceLock::new();

/// Install the process-wide sink. Returns the sink back if one was already
/// installed.
pub fn set_sink(sink: Box<dyn LogSink>) -> Result<(), Box<dyn LogSink>> {
    SINK.set(sink)
}

pub fn sink_installed() -> bool {
    SINK.get().is_some()
}

pub(crate) fn emit(level: Level, target: &'static str, args: fmt::Arguments) {
    if let Some(sink) = SINK.get() {
        sink.log(level, target, args);
    }
}

//! Explicit logger handle passed into each component.
//!
//! The donor wires up `env_logger` in `main.rs` but the protocol code itself
//! reaches for `println!`/`eprintln!` rather than a passed-in logger — a
//! global-logger pattern this crate deliberately avoids. `Session`,
//! `Negotiator`, and the parser each hold an `Arc<dyn Logger>` supplied at
//! construction instead.

use std::fmt;
use std::sync::Arc;

pub trait Logger: Send + Sync {
    fn log(&self, level: Level, target: &str, args: fmt::Arguments<'_>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

/// Forwards to the `log` crate's facade, so a host binary's `env_logger`
/// (or any other `log`-compatible subscriber) sees these events normally.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFacade;

impl Logger for LogFacade {
    fn log(&self, level: Level, target: &str, args: fmt::Arguments<'_>) {
        let level = match level {
            Level::Debug => log::Level::Debug,
            Level::Info => log::Level::Info,
            Level::Warn => log::Level::Warn,
            Level::Error => log::Level::Error,
        };
        log::log!(target: "tn3270_core", level, "[{target}] {args}");
    }
}

/// Zero-cost default for tests and for callers that don't want output.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn log(&self, _level: Level, _target: &str, _args: fmt::Arguments<'_>) {}
}

pub fn null() -> Arc<dyn Logger> {
    Arc::new(NullLogger)
}

pub fn facade() -> Arc<dyn Logger> {
    Arc::new(LogFacade)
}

macro_rules! log_at {
    ($logger:expr, $level:expr, $target:expr, $($arg:tt)*) => {
        $logger.log($level, $target, format_args!($($arg)*))
    };
}

pub(crate) use log_at;

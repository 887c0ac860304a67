//! A small [`log::Log`] sink with independent per-module thresholds.
//!
//! Each target (roughly, each module) can carry its own threshold rather than one global level.
//! `ERROR` and `WARN` records always go to stderr; `INFO` and `DEBUG` go to stdout, gated by the
//! emitting target's threshold.

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::collections::HashMap;
use std::sync::RwLock;

/// Environment variable consulted by [`init_from_env`], analogous to `RUST_LOG`.
pub const ENV_VAR: &str = "TSINFO_LOG";

/// A [`log::Log`] implementation with a default threshold plus per-target overrides.
pub struct ModuleLogger {
    default_threshold: LevelFilter,
    thresholds: RwLock<HashMap<String, LevelFilter>>,
}

impl ModuleLogger {
    /// Creates a logger with `default_threshold` applied to any target without its own entry.
    pub fn new(default_threshold: LevelFilter) -> Self {
        Self {
            default_threshold,
            thresholds: RwLock::new(HashMap::new()),
        }
    }

    /// Sets the threshold for one target (module), overriding the default for it.
    pub fn set_threshold(&self, target: &str, threshold: LevelFilter) {
        self.thresholds
            .write()
            .unwrap()
            .insert(target.to_owned(), threshold);
    }

    fn threshold_for(&self, target: &str) -> LevelFilter {
        self.thresholds
            .read()
            .unwrap()
            .get(target)
            .copied()
            .unwrap_or(self.default_threshold)
    }

    /// Parses a `TSINFO_LOG`-style spec: either a bare level (`"debug"`) applied as the default,
    /// or a comma-separated list of `target=level` pairs, optionally prefixed by a bare default
    /// level (`"warn,tsinfo::tsfile=debug"`).
    pub fn from_spec(spec: &str) -> Self {
        let mut default_threshold = LevelFilter::Info;
        let mut overrides = Vec::new();
        for term in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match term.split_once('=') {
                Some((target, level)) => {
                    if let Ok(level) = level.parse() {
                        overrides.push((target.to_owned(), level));
                    }
                }
                None => {
                    if let Ok(level) = term.parse() {
                        default_threshold = level;
                    }
                }
            }
        }
        let logger = ModuleLogger::new(default_threshold);
        for (target, level) in overrides {
            logger.set_threshold(&target, level);
        }
        logger
    }
}

impl Log for ModuleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= LevelFilter::Warn || metadata.level() <= self.threshold_for(metadata.target())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        use log::Level::*;
        match record.level() {
            Error | Warn => eprintln!("{:<5} {}: {}", record.level(), record.target(), record.args()),
            Info | Debug | Trace => {
                println!("{:<5} {}: {}", record.level(), record.target(), record.args())
            }
        }
    }

    fn flush(&self) {}
}

/// Installs a [`ModuleLogger`] configured from the `TSINFO_LOG` environment variable (default
/// threshold `info` if unset or unparseable).
pub fn init_from_env() -> Result<(), SetLoggerError> {
    let spec = std::env::var(ENV_VAR).unwrap_or_default();
    let logger = ModuleLogger::from_spec(&spec);
    let max_level = std::cmp::max(
        LevelFilter::Warn,
        std::cmp::max(
            logger.default_threshold,
            logger
                .thresholds
                .read()
                .unwrap()
                .values()
                .copied()
                .max()
                .unwrap_or(LevelFilter::Off),
        ),
    );
    log::set_max_level(max_level);
    log::set_boxed_logger(Box::new(logger))
}

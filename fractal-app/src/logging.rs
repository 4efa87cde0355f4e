//! Logging setup for the application.

use env_logger::{Builder, Env};
use log::LevelFilter;

use crate::config::GlobalLogLevel;

impl From<GlobalLogLevel> for LevelFilter {
    fn from(level: GlobalLogLevel) -> Self {
        match level {
            GlobalLogLevel::Trace => Self::Trace,
            GlobalLogLevel::Debug => Self::Debug,
            GlobalLogLevel::Info => Self::Info,
            GlobalLogLevel::Warn => Self::Warn,
            GlobalLogLevel::Error => Self::Error,
        }
    }
}

/// Initializes the logger.
///
/// RUST_LOG is respected when set. Otherwise `level` applies to every module,
/// with wgpu's internals capped at `warn` since they are noisy at `info`.
/// Log output goes to stderr so it never mixes with JSON on stdout.
pub fn init_logger(level: GlobalLogLevel) {
    let filter = LevelFilter::from(level);
    let mut builder = Builder::from_env(Env::default());

    if std::env::var_os("RUST_LOG").is_none() {
        builder.filter_level(filter);
        builder.filter_module("wgpu_core", filter.min(LevelFilter::Warn));
        builder.filter_module("wgpu_hal", filter.min(LevelFilter::Warn));
        builder.filter_module("naga", filter.min(LevelFilter::Warn));
    }

    if let Err(e) = builder.try_init() {
        eprintln!("Logger already initialized: {e}");
        return;
    }

    log::debug!("Logger initialized with global log level: {:?}", level);
}

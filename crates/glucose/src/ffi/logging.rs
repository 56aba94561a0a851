//! Log backend that forwards records to the host
//!
//! Installs a `log::Log` implementation that hands every enabled record to a
//! UniFFI `LogCallback`, so engine logs land in Apple's unified logging next
//! to the app's own.

use std::sync::{Arc, OnceLock, RwLock};

use log::{Level, Log, Metadata, Record, SetLoggerError};

use super::types::{FfiLogLevel, LogCallback};

/// Global storage for the host logger
static HOST_LOGGER: OnceLock<HostLogger> = OnceLock::new();

struct HostLogger {
    callback: RwLock<Option<Arc<dyn LogCallback>>>,
    max_level: RwLock<Level>,
}

impl HostLogger {
    fn new(max_level: Level) -> Self {
        Self {
            callback: RwLock::new(None),
            max_level: RwLock::new(max_level),
        }
    }

    fn set_callback(&self, callback: Option<Arc<dyn LogCallback>>) {
        if let Ok(mut guard) = self.callback.write() {
            *guard = callback;
        }
    }

    fn set_max_level(&self, level: Level) {
        if let Ok(mut guard) = self.max_level.write() {
            *guard = level;
        }
    }

    fn max_level(&self) -> Level {
        self.max_level.read().map(|l| *l).unwrap_or(Level::Info)
    }
}

impl Log for HostLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level()
            && self
                .callback
                .read()
                .is_ok_and(|callback| callback.is_some())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        // Clone out so the host callback runs without the lock held
        let callback = match self.callback.read() {
            Ok(guard) => guard.clone(),
            Err(_) => return,
        };
        if let Some(callback) = callback {
            callback.on_log(
                FfiLogLevel::from(record.level()),
                record.target().to_string(),
                record.args().to_string(),
            );
        }
    }

    fn flush(&self) {}
}

/// Install the host logger as the global logger
///
/// Fails if another logger (e.g. env_logger in the CLI) is already installed.
/// The callback can be attached later with [`set_log_callback`]; until then
/// records are dropped.
pub fn init_ffi_logger(max_level: Level) -> Result<(), SetLoggerError> {
    let logger = HOST_LOGGER.get_or_init(|| HostLogger::new(max_level));
    log::set_logger(logger)?;
    log::set_max_level(max_level.to_level_filter());
    Ok(())
}

/// Attach or detach the host callback. Safe from any thread.
pub fn set_log_callback(callback: Option<Arc<dyn LogCallback>>) {
    if let Some(logger) = HOST_LOGGER.get() {
        logger.set_callback(callback);
    }
}

/// Change the maximum forwarded level
pub fn set_log_level(level: Level) {
    if let Some(logger) = HOST_LOGGER.get() {
        logger.set_max_level(level);
        log::set_max_level(level.to_level_filter());
    }
}

/// Route engine logs to `callback`
///
/// Returns false when a different global logger was installed first; the
/// callback is still attached in case the host logger was the one installed.
#[uniffi::export]
pub fn initialize_logging(callback: Box<dyn LogCallback>, max_level: FfiLogLevel) -> bool {
    let installed = init_ffi_logger(max_level.into()).is_ok();
    set_log_callback(Some(Arc::from(callback)));
    installed
}

/// Change the log level at runtime
#[uniffi::export]
pub fn set_logging_level(level: FfiLogLevel) {
    set_log_level(level.into());
}

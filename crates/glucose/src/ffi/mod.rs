//! FFI bindings for UniFFI export
//!
//! This module provides Swift/Kotlin bindings for the glucose crate via UniFFI.
//!
//! ## Usage from Swift
//!
//! ```swift
//! import GlucoseFFI
//!
//! // Initialize logging first
//! initializeLogging(callback: myLogCallback, maxLevel: .info)
//!
//! // Open the engine with the app's HealthKit bridge
//! let service = try GlucoseService(
//!     dbPath: "/path/to/readings.sqlite",
//!     options: defaultSyncOptions(),
//!     health: healthKitBridge
//! )
//! _ = service.loadSavedCredentials()
//!
//! // Draw whatever gets published
//! service.setSeriesListener(listener: chartModel)
//!
//! // On scene activation
//! try service.notify(trigger: .foreground)
//! ```

mod logging;
mod service;
mod types;

// Re-export all FFI types and the GlucoseService
pub use logging::{
    init_ffi_logger, initialize_logging, set_log_callback, set_log_level, set_logging_level,
};
pub use service::*;
pub use types::*;

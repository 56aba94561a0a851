//! Sync engine for assembling the published glucose series
//!
//! Refreshes are debounced, ordered by generation, and safe to start at any
//! time from any trigger.

mod orchestrator;
mod timing;
mod triggers;

pub use orchestrator::{
    AUTHENTICATION_MESSAGE, NO_DATA_MESSAGE, PERMISSION_MESSAGE, RefreshOutcome, SyncOrchestrator,
    SyncSources, SyncStats,
};
pub use timing::{Clock, SystemClock, cooldown_elapsed};
pub use triggers::{RefreshTrigger, spawn_trigger_listener, trigger_channel};

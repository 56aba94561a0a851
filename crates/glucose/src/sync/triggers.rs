//! Refresh triggers
//!
//! Hosts translate their own lifecycle notifications (app foregrounded, the
//! local store written by another process, a pull-to-refresh) into
//! `RefreshTrigger` events. Every trigger forces a refresh.

use log::{debug, info};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::SyncOrchestrator;

/// Why a refresh was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    /// The app came to the foreground
    Foreground,
    /// The local reading store was written outside this orchestrator
    StoreChanged,
    /// The user asked for it
    Manual,
}

/// Create a bounded trigger channel
pub fn trigger_channel(
    buffer: usize,
) -> (mpsc::Sender<RefreshTrigger>, mpsc::Receiver<RefreshTrigger>) {
    mpsc::channel(buffer.max(1))
}

/// Run forced refreshes for incoming triggers until every sender is dropped
///
/// Triggers that pile up while a refresh is running are coalesced into the
/// next one.
pub fn spawn_trigger_listener(
    orchestrator: Arc<SyncOrchestrator>,
    mut triggers: mpsc::Receiver<RefreshTrigger>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(trigger) = triggers.recv().await {
            let mut coalesced = 0;
            while triggers.try_recv().is_ok() {
                coalesced += 1;
            }
            info!("Refresh triggered by {:?}", trigger);
            if coalesced > 0 {
                debug!("Coalesced {} queued triggers", coalesced);
            }
            orchestrator.refresh(true).await;
        }
        debug!("Trigger channel closed");
    })
}

//! Auto-lock and auto-sync driver loops.
//!
//! Both are message-driven: a control channel in, an event channel out,
//! cancellation by message (or by dropping the sender). The shell feeds
//! activity pings and enable/disable commands; the loops emit what they
//! did so the shell can refresh.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use jottery_crypto::KeyManager;

use crate::service::NoteService;
use crate::sync::engine::SyncEngine;

/// Fallback poll interval while auto-lock is disabled or far away.
const IDLE_POLL: Duration = Duration::from_secs(60);

// =============================================================================
// AUTO-LOCK
// =============================================================================

/// Control messages for the auto-lock loop.
#[derive(Debug, Clone)]
pub enum LockControl {
    /// User activity; resets the inactivity deadline.
    Activity,
    /// Change the timeout (minutes; 0 disables).
    SetTimeout(u64),
    /// Lock immediately.
    LockNow,
    /// Stop the loop.
    Shutdown,
}

/// Events emitted by the auto-lock loop.
#[derive(Debug, Clone)]
pub enum LockEvent {
    /// The key was zeroized and decrypted caches were cleared.
    Locked,
}

/// Run the auto-lock loop until shutdown.
///
/// On expiry the key is zeroized and the note service's decrypted cache
/// is cleared before the event goes out.
pub async fn run_auto_lock(
    keys: KeyManager,
    service: Arc<NoteService>,
    mut control: mpsc::Receiver<LockControl>,
    events: broadcast::Sender<LockEvent>,
) {
    info!(
        subsystem = "service",
        component = "auto_lock",
        op = "start",
        "Auto-lock driver started"
    );
    loop {
        let wait = keys
            .time_until_lock()
            .map(|d| d.max(Duration::from_millis(10)))
            .unwrap_or(IDLE_POLL);

        tokio::select! {
            message = control.recv() => match message {
                None | Some(LockControl::Shutdown) => break,
                Some(LockControl::Activity) => keys.register_activity(),
                Some(LockControl::SetTimeout(minutes)) => keys.set_timeout(minutes),
                Some(LockControl::LockNow) => {
                    keys.lock();
                    service.clear_cache();
                    let _ = events.send(LockEvent::Locked);
                }
            },
            _ = sleep(wait) => {
                if keys.should_lock() {
                    keys.lock();
                    service.clear_cache();
                    let _ = events.send(LockEvent::Locked);
                    info!(
                        subsystem = "service",
                        component = "auto_lock",
                        op = "expire",
                        "Inactivity timeout; key zeroized"
                    );
                }
            }
        }
    }
    debug!(
        subsystem = "service",
        component = "auto_lock",
        op = "stop",
        "Auto-lock driver stopped"
    );
}

// =============================================================================
// AUTO-SYNC
// =============================================================================

/// Control messages for the auto-sync loop.
#[derive(Debug, Clone)]
pub enum SyncControl {
    /// Start periodic syncing with the given interval in minutes.
    Enable(u64),
    /// Cancel the periodic timer.
    Disable,
    /// Trigger one pass immediately (manual sync shares the engine's
    /// in-flight serialization).
    SyncNow,
    /// Stop the loop.
    Shutdown,
}

/// Events emitted by the auto-sync loop.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A pass finished; counts are (pushed, pulled).
    Completed { pushed: usize, pulled: usize },
    /// A pass failed with the given reason; retry happens on the next tick.
    Failed(String),
}

/// Run the auto-sync loop until shutdown.
///
/// Ticks are coalesced: the pass runs inline on this task, so at most one
/// auto-sync is outstanding and missed ticks collapse into the next one.
pub async fn run_auto_sync(
    engine: Arc<SyncEngine>,
    mut control: mpsc::Receiver<SyncControl>,
    events: broadcast::Sender<SyncEvent>,
) {
    let mut interval: Option<Duration> = None;

    info!(
        subsystem = "sync",
        component = "auto_sync",
        op = "start",
        "Auto-sync driver started"
    );
    loop {
        let wait = interval.unwrap_or(IDLE_POLL);
        tokio::select! {
            message = control.recv() => match message {
                None | Some(SyncControl::Shutdown) => break,
                Some(SyncControl::Enable(minutes)) => {
                    interval = Some(Duration::from_secs(minutes.max(1) * 60));
                }
                Some(SyncControl::Disable) => interval = None,
                Some(SyncControl::SyncNow) => {
                    run_pass(&engine, &events).await;
                }
            },
            _ = sleep(wait) => {
                if interval.is_some() {
                    run_pass(&engine, &events).await;
                }
            }
        }
    }
    debug!(
        subsystem = "sync",
        component = "auto_sync",
        op = "stop",
        "Auto-sync driver stopped"
    );
}

async fn run_pass(engine: &SyncEngine, events: &broadcast::Sender<SyncEvent>) {
    match engine.sync_now().await {
        Ok(outcome) => {
            let _ = events.send(SyncEvent::Completed {
                pushed: outcome.pushed,
                pulled: outcome.pulled,
            });
        }
        Err(e) => {
            // The next tick is the retry for transient failures.
            warn!(
                subsystem = "sync",
                component = "auto_sync",
                error = %e,
                "Sync pass failed"
            );
            let _ = events.send(SyncEvent::Failed(e.to_string()));
        }
    }
}

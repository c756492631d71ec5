//! Synchronization progress events
//!
//! A small listener seam so host applications can observe synchronization
//! without the engine knowing about bindings: listeners are registered on
//! the account synchronizer, receive every event of a pass, and their
//! failures are isolated: a broken listener never fails a pass.

use std::error::Error;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::warn;

/// Events emitted over the lifetime of a synchronization pass
#[derive(Debug, Clone, Serialize)]
pub enum SyncEvent {
    /// A pass started
    Started {
        /// Height synchronization resumes from
        from_height: u32,
        /// Explorer tip height at the start of the pass
        tip_height: u32,
    },
    /// One unit of fetched work was applied to the databases
    BatchApplied {
        /// Transactions contained in the unit
        transactions: usize,
        /// Blocks written to the stable database
        stable_blocks: usize,
        /// Blocks written to the unstable database
        unstable_blocks: usize,
    },
    /// An unstable block was replaced by a different canonical block
    Reorg {
        /// Height of the replaced block
        height: u32,
        /// Hash of the evicted block
        old_hash: String,
        /// Hash of the canonical replacement
        new_hash: String,
    },
    /// The pass completed successfully
    Completed {
        /// Tip height the account is now synchronized to
        tip_height: u32,
        /// New operations discovered during the pass
        new_transactions: usize,
    },
    /// The pass failed
    Failed {
        /// Failure description
        message: String,
    },
}

impl SyncEvent {
    /// JSON rendering, for listeners that forward events across a binding
    /// boundary
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Receives synchronization events
#[async_trait]
pub trait SyncEventListener: Send + Sync {
    /// Handle one event. Errors are logged and isolated; they never
    /// interrupt the pass or other listeners.
    async fn handle_event(&mut self, event: &SyncEvent) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Listener name, for logs
    fn name(&self) -> &'static str;
}

/// Dispatches events to registered listeners in registration order
#[derive(Default)]
pub struct SyncEventDispatcher {
    listeners: Mutex<Vec<Box<dyn SyncEventListener>>>,
}

impl SyncEventDispatcher {
    /// Create a dispatcher with no listeners
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener
    pub async fn register(&self, listener: Box<dyn SyncEventListener>) {
        let mut listeners = self.listeners.lock().await;
        listeners.push(listener);
    }

    /// Dispatch an event to every listener, isolating failures
    pub async fn dispatch(&self, event: &SyncEvent) {
        let mut listeners = self.listeners.lock().await;
        for listener in listeners.iter_mut() {
            if let Err(e) = listener.handle_event(event).await {
                warn!(listener = listener.name(), error = %e, "sync event listener failed");
            }
        }
    }
}

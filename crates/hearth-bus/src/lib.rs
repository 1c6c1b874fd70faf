//! Event bus for program engine publications
//!
//! This crate provides the ProgramEventBus, the channel through which the
//! program engine publishes observable program properties (status changes,
//! runtime errors, enablement). Hub components subscribe to mirror these
//! values onto program modules and to surface them to users.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use hearth_core::ProgramEvent;

/// Default channel capacity for event subscriptions
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// The bus for publishing and subscribing to program events
pub struct ProgramEventBus {
    sender: broadcast::Sender<ProgramEvent>,
}

impl ProgramEventBus {
    /// Create a new bus with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new bus with the specified channel capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to all program events
    pub fn subscribe(&self) -> broadcast::Receiver<ProgramEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers
    pub fn fire(&self, event: ProgramEvent) {
        debug!(
            address = %event.address,
            property = %event.property,
            value = %event.value,
            "Publishing program event"
        );

        // Ignore send errors - they just mean no active receivers
        let _ = self.sender.send(event);
    }

    /// Number of active subscribers
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ProgramEventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe wrapper for ProgramEventBus
pub type SharedProgramEventBus = Arc<ProgramEventBus>;

// Operation listeners: log sink, broadcast channel and fan-out

use crate::port::{OperationEvent, OperationListener};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Logs every lifecycle event through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingListener;

impl OperationListener for TracingListener {
    fn on_event(&self, event: &OperationEvent) {
        match event {
            OperationEvent::Started { kind, run_id, title } => {
                info!(kind = %kind, run_id = %run_id, "{} started", title);
            }
            OperationEvent::Progress {
                kind,
                run_id,
                progress,
            } => {
                debug!(kind = %kind, run_id = %run_id, progress = ?progress, "Progress");
            }
            OperationEvent::Ended {
                kind,
                run_id,
                outcome,
            } => {
                info!(kind = %kind, run_id = %run_id, outcome = ?outcome, "Operation ended");
            }
        }
    }
}

/// Publishes events on a tokio broadcast channel for UI collaborators.
///
/// Slow subscribers lose the oldest events (`RecvError::Lagged`); the
/// operation thread never blocks on them.
pub struct BroadcastListener {
    tx: broadcast::Sender<OperationEvent>,
}

impl BroadcastListener {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OperationEvent> {
        self.tx.subscribe()
    }
}

impl OperationListener for BroadcastListener {
    fn on_event(&self, event: &OperationEvent) {
        // No subscriber is not an error
        let _ = self.tx.send(event.clone());
    }
}

/// Forwards each event to every inner listener, in order
#[derive(Default)]
pub struct FanoutListener {
    listeners: Vec<Arc<dyn OperationListener>>,
}

impl FanoutListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, listener: Arc<dyn OperationListener>) -> Self {
        self.listeners.push(listener);
        self
    }
}

impl OperationListener for FanoutListener {
    fn on_event(&self, event: &OperationEvent) {
        if self.listeners.is_empty() {
            warn!(kind = %event.kind(), "Operation event without listeners");
        }
        for listener in &self.listeners {
            listener.on_event(event);
        }
    }
}

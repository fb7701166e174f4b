// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use dx_wire::WorkerEvent;
use tokio::sync::broadcast::{self, error::RecvError};

/// Receiver for unsolicited worker events, optionally filtered by type tag.
///
/// Events are delivered in arrival order. A subscriber that falls more than
/// the channel capacity behind skips the oldest events and keeps going.
pub struct EventSubscription {
    rx: broadcast::Receiver<WorkerEvent>,
    kind: Option<String>,
}

impl EventSubscription {
    pub(crate) fn new(rx: broadcast::Receiver<WorkerEvent>, kind: Option<String>) -> Self {
        Self { rx, kind }
    }

    /// Next matching event, or `None` once the bridge is gone.
    pub async fn recv(&mut self) -> Option<WorkerEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.matches(&event) => return Some(event),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, kind = ?self.kind, "event subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    fn matches(&self, event: &WorkerEvent) -> bool {
        match &self.kind {
            Some(kind) => kind == event.kind(),
            None => true,
        }
    }
}

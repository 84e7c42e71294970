//! Lifecycle notifications
//!
//! Published on a broadcast channel. Having no subscriber is fine; a lagging
//! subscriber loses the oldest events.

use crate::instance::InstanceId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceEventKind {
    Created,
    Started,
    Stopped,
    Destroyed,
}

impl std::fmt::Display for InstanceEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceEventKind::Created => write!(f, "created"),
            InstanceEventKind::Started => write!(f, "started"),
            InstanceEventKind::Stopped => write!(f, "stopped"),
            InstanceEventKind::Destroyed => write!(f, "destroyed"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InstanceEvent {
    pub kind: InstanceEventKind,
    /// Instance concerned, if one was held when the event fired
    pub instance_id: Option<InstanceId>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub(crate) struct EventBus {
    tx: broadcast::Sender<InstanceEvent>,
}

impl EventBus {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<InstanceEvent> {
        self.tx.subscribe()
    }

    pub(crate) fn fire(&self, kind: InstanceEventKind, instance_id: Option<&InstanceId>) {
        let event = InstanceEvent {
            kind,
            instance_id: instance_id.cloned(),
            at: Utc::now(),
        };
        tracing::trace!(event = %kind, "Instance event");
        // Err only means nobody listens.
        let _ = self.tx.send(event);
    }
}

use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::prediction::{PredictionRecord, PredictionStatus};

/// Notification published whenever a prediction's state advances, from
/// either the webhook path or the poller.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionEvent {
    pub id: String,
    pub status: PredictionStatus,
    pub output: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl PredictionEvent {
    pub fn from_record(record: &PredictionRecord) -> Self {
        Self {
            id: record.id.clone(),
            status: record.status,
            output: record.output.clone(),
            error: record.error.clone(),
        }
    }
}

/// In-process publish/subscribe channel for prediction events.
///
/// Cheap to clone; all clones share one broadcast channel. Publishing with no
/// live subscribers is not an error.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PredictionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: PredictionEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PredictionEvent> {
        self.tx.subscribe()
    }
}

/**
 * notifier.rs
 * Graph-change notifications
 *
 * Update batches are pairs of deleted and inserted quads of row ids.
 * Watchers subscribe to a broadcast channel and resolve the ids against the
 * Resource table at their own pace; a slow subscriber only loses its own
 * backlog.
 */

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// One statement change: (graph, subject, predicate, object) as Resource
/// row ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quad {
    pub graph_id: i64,
    pub subject_id: i64,
    pub predicate_id: i64,
    pub object_id: i64,
}

impl Quad {
    pub fn new(graph_id: i64, subject_id: i64, predicate_id: i64, object_id: i64) -> Quad {
        Quad {
            graph_id,
            subject_id,
            predicate_id,
            object_id,
        }
    }
}

/// A batch of changes from one update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphUpdate {
    pub deleted: Vec<Quad>,
    pub inserted: Vec<Quad>,
}

impl GraphUpdate {
    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty() && self.inserted.is_empty()
    }
}

const CHANNEL_CAPACITY: usize = 64;

/// Fan-out of graph updates to any number of subscribers.
pub struct GraphUpdateNotifier {
    sender: broadcast::Sender<GraphUpdate>,
}

impl GraphUpdateNotifier {
    pub fn new() -> GraphUpdateNotifier {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        GraphUpdateNotifier { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GraphUpdate> {
        self.sender.subscribe()
    }

    /// Emit a batch; empty batches and missing subscribers are no-ops.
    pub fn emit(&self, update: GraphUpdate) {
        if update.is_empty() {
            return;
        }

        // Send only fails when nobody is subscribed
        let _ = self.sender.send(update);
    }
}

impl Default for GraphUpdateNotifier {
    fn default() -> Self {
        GraphUpdateNotifier::new()
    }
}

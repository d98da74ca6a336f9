// One streaming session of the overlay
//
// Opens the stream, folds every batch into a fresh reconciler, publishes the
// result, and reports how the session ended. All state writes are guarded by
// the session's generation so a superseded session can never clobber a newer one.

use super::Shared;
use crate::graph::GraphEdge;
use crate::reconcile::{EdgeReconciler, EdgeUpdate};
use crate::stream::{FlowStream, StreamConnector};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum SessionState {
    /// No session yet, or the last one ended normally
    #[default]
    Idle,
    Streaming,
    /// Cancelled by disable, a parameter change, or teardown
    Stopped,
    /// Connect or read failure; the message is kept for display
    Errored(String),
}

/// State together with the session it belongs to
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionStatus {
    /// 0 before the first session; incremented for each new one
    pub generation: u64,
    pub state: SessionState,
}

/// Streaming → `next` for `generation` only. Returns whether it applied.
pub(super) fn transition(
    status: &watch::Sender<SessionStatus>,
    generation: u64,
    next: SessionState,
) -> bool {
    status.send_if_modified(|current| {
        if current.generation == generation && current.state == SessionState::Streaming {
            current.state = next;
            true
        } else {
            false
        }
    })
}

pub(super) struct Session {
    pub generation: u64,
    pub module_scope: String,
    pub window_seconds: u32,
    pub static_edges: Vec<GraphEdge>,
    pub connector: Arc<dyn StreamConnector>,
    pub cancel: CancellationToken,
    pub status: Arc<watch::Sender<SessionStatus>>,
    pub updates: broadcast::Sender<EdgeUpdate>,
    pub edges: Shared<Vec<GraphEdge>>,
}

impl Session {
    pub async fn run(self) {
        let connected = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return,
            result = self.connector.connect(&self.module_scope, self.window_seconds) => result,
        };

        let source = match connected {
            Ok(source) => source,
            Err(e) => {
                warn!(target: "overlay", generation = self.generation, error = %e, "Failed to open live graph stream");
                transition(&self.status, self.generation, SessionState::Errored(e.to_string()));
                return;
            }
        };

        let mut stream = FlowStream::new(source, self.window_seconds, self.cancel.clone());
        let mut reconciler = EdgeReconciler::new(self.static_edges.clone());

        loop {
            match stream.next_batch().await {
                Ok(Some(batch)) => {
                    let update = reconciler.apply(&batch);
                    if !self.publish(update) {
                        break;
                    }
                }
                Ok(None) => {
                    if !self.cancel.is_cancelled()
                        && transition(&self.status, self.generation, SessionState::Idle)
                    {
                        info!(
                            target: "overlay",
                            generation = self.generation,
                            batches = reconciler.sequence(),
                            "Live graph stream ended"
                        );
                    }
                    break;
                }
                Err(e) => {
                    warn!(target: "overlay", generation = self.generation, error = %e, "Live graph stream failed");
                    transition(&self.status, self.generation, SessionState::Errored(e.to_string()));
                    break;
                }
            }
        }

        let stats = stream.stats();
        debug!(
            target: "overlay",
            generation = self.generation,
            frames_decoded = stats.frames_decoded,
            frames_dropped = stats.frames_dropped,
            records_dropped = stats.records_dropped,
            "Session finished"
        );
    }

    /// Store and broadcast an update unless this session has been cancelled
    fn publish(&self, update: EdgeUpdate) -> bool {
        {
            // The cancel check happens under the lock so a newer session's
            // reset cannot interleave with this write.
            let mut edges = self.edges.write().unwrap_or_else(PoisonError::into_inner);
            if self.cancel.is_cancelled() {
                return false;
            }
            *edges = update.edges.clone();
        }
        // No subscribers is fine
        let _ = self.updates.send(update);
        true
    }
}

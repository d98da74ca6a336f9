// Overlay session controller
//
// Owns the lifecycle of the live data-flow overlay for one graph view: at most
// one streaming session at a time, restarted from scratch whenever the module
// scope, window or topology changes.

mod session;

pub use session::{SessionState, SessionStatus};

use crate::config::FlowgraphConfig;
use crate::graph::{FlowGraph, GraphEdge};
use crate::reconcile::EdgeUpdate;
use crate::stream::StreamConnector;
use session::Session;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

type Shared<T> = Arc<RwLock<T>>;

const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// What the graph view asks the overlay to show
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OverlayParams {
    /// `Some("")` is the root module; `None` until the view knows its module
    pub module_scope: Option<String>,
    pub window_seconds: u32,
    pub enabled: bool,
}

impl OverlayParams {
    pub fn new(module_scope: impl Into<String>, window_seconds: u32) -> Self {
        Self {
            module_scope: Some(module_scope.into()),
            window_seconds,
            enabled: true,
        }
    }

    fn can_stream(&self) -> bool {
        self.enabled && self.module_scope.is_some() && self.window_seconds >= 1
    }
}

impl Default for OverlayParams {
    fn default() -> Self {
        Self {
            module_scope: None,
            window_seconds: 5,
            enabled: false,
        }
    }
}

impl From<&FlowgraphConfig> for OverlayParams {
    fn from(config: &FlowgraphConfig) -> Self {
        Self {
            module_scope: config.module_scope.clone(),
            window_seconds: config.window_seconds,
            enabled: config.enabled,
        }
    }
}

struct ActiveSession {
    generation: u64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Supervises the live overlay of one graph view.
///
/// Must be created and driven from within a Tokio runtime. Dropping the
/// controller cancels the running session.
pub struct OverlayController {
    connector: Arc<dyn StreamConnector>,
    graph: FlowGraph,
    params: OverlayParams,
    generation: u64,
    active: Option<ActiveSession>,
    /// Cancelled sessions whose tasks may still be winding down
    retired: Vec<JoinHandle<()>>,
    status: Arc<watch::Sender<SessionStatus>>,
    updates: broadcast::Sender<EdgeUpdate>,
    edges: Shared<Vec<GraphEdge>>,
}

impl OverlayController {
    pub fn new(connector: Arc<dyn StreamConnector>, graph: FlowGraph, params: OverlayParams) -> Self {
        let (status, _) = watch::channel(SessionStatus::default());
        let status = Arc::new(status);
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let edges = Arc::new(RwLock::new(graph.edges.clone()));
        let mut controller = Self {
            connector,
            graph,
            params: OverlayParams {
                enabled: false,
                ..params.clone()
            },
            generation: 0,
            active: None,
            retired: Vec::new(),
            status,
            updates,
            edges,
        };
        controller.set_params(params);
        controller
    }

    pub fn params(&self) -> &OverlayParams {
        &self.params
    }

    pub fn graph(&self) -> &FlowGraph {
        &self.graph
    }

    pub fn state(&self) -> SessionState {
        self.status.borrow().state.clone()
    }

    /// Receiver that observes every state change
    pub fn watch_state(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// One `EdgeUpdate` per applied batch, in wire order
    pub fn subscribe(&self) -> broadcast::Receiver<EdgeUpdate> {
        self.updates.subscribe()
    }

    /// Snapshot of the current edge state
    pub fn edges(&self) -> Vec<GraphEdge> {
        self.edges
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_params(&mut self, params: OverlayParams) {
        if params != self.params {
            self.params = params;
            self.stop_active();
        }
        if self.params.can_stream() && !matches!(self.state(), SessionState::Streaming) {
            self.start();
        }
    }

    pub fn enable(&mut self) {
        let params = OverlayParams {
            enabled: true,
            ..self.params.clone()
        };
        self.set_params(params);
    }

    pub fn disable(&mut self) {
        let params = OverlayParams {
            enabled: false,
            ..self.params.clone()
        };
        self.set_params(params);
    }

    pub fn set_scope(&mut self, module_scope: Option<String>) {
        let params = OverlayParams {
            module_scope,
            ..self.params.clone()
        };
        self.set_params(params);
    }

    pub fn set_window(&mut self, window_seconds: u32) {
        let params = OverlayParams {
            window_seconds,
            ..self.params.clone()
        };
        self.set_params(params);
    }

    /// New topology snapshot: the running session restarts on the new edges
    pub fn replace_graph(&mut self, graph: FlowGraph) {
        self.stop_active();
        self.graph = graph;
        *self.edges.write().unwrap_or_else(PoisonError::into_inner) = self.graph.edges.clone();
        if self.params.can_stream() {
            self.start();
        }
    }

    /// Cancel the running session and wait for every session task to finish
    pub async fn shutdown(&mut self) {
        self.stop_active();
        for handle in self.retired.drain(..) {
            let _ = handle.await;
        }
    }

    fn start(&mut self) {
        self.stop_active();

        let Some(module_scope) = self.params.module_scope.clone() else {
            return;
        };
        self.generation += 1;
        let generation = self.generation;
        let window_seconds = self.params.window_seconds;
        let cancel = CancellationToken::new();

        *self.edges.write().unwrap_or_else(PoisonError::into_inner) = self.graph.edges.clone();
        self.status.send_replace(SessionStatus {
            generation,
            state: SessionState::Streaming,
        });

        info!(
            target: "overlay",
            generation,
            module = %module_scope,
            window_seconds,
            "Starting overlay session"
        );

        let session = Session {
            generation,
            module_scope,
            window_seconds,
            static_edges: self.graph.edges.clone(),
            connector: Arc::clone(&self.connector),
            cancel: cancel.clone(),
            status: Arc::clone(&self.status),
            updates: self.updates.clone(),
            edges: Arc::clone(&self.edges),
        };
        let handle = tokio::spawn(session.run());

        self.active = Some(ActiveSession {
            generation,
            cancel,
            handle,
        });
    }

    /// Cancel the running session, if any. Streaming → Stopped.
    fn stop_active(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        active.cancel.cancel();
        if session::transition(&self.status, active.generation, SessionState::Stopped) {
            info!(target: "overlay", generation = active.generation, "Overlay session stopped");
        }
        self.retired.retain(|handle| !handle.is_finished());
        self.retired.push(active.handle);
    }
}

impl Drop for OverlayController {
    fn drop(&mut self) {
        self.stop_active();
    }
}

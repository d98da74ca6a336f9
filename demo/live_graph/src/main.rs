use flowgraph_core::graph::format_rate;
use flowgraph_core::telemetry::init_tracing;
use flowgraph_core::{
    AgentClient, FlowgraphConfig, GraphBuilder, LayeredLayout, OverlayController, OverlayParams,
    SessionState, TopologySource,
};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> flowgraph_core::Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();
    init_tracing("info,flowgraph_core=info,live_graph=info");

    // Defaults + env + optional TOML overlay
    let config = FlowgraphConfig::load()?;
    let scope = config.module_scope.clone().unwrap_or_default();
    info!(
        target: "live_graph",
        agent = %config.agent_url,
        module = %scope,
        window_seconds = config.window_seconds,
        "Starting live graph demo"
    );

    let client = AgentClient::with_config(&config);

    // 1) Topology snapshot → laid-out graph
    let components = client.list_components(&scope).await?;
    let builder = GraphBuilder::new(Arc::new(LayeredLayout::default()));
    let graph = builder.build(&components)?;
    info!(
        target: "live_graph",
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "Graph laid out"
    );
    for node in &graph.nodes {
        info!(
            target: "live_graph",
            id = %node.id,
            x = node.position.x,
            y = node.position.y,
            "Node"
        );
    }

    // 2) Live overlay
    let mut controller = OverlayController::new(
        Arc::new(client),
        graph,
        OverlayParams::from(&config),
    );
    let mut updates = controller.subscribe();
    let mut state_rx = controller.watch_state();

    loop {
        tokio::select! {
            interrupted = signal::ctrl_c() => {
                interrupted?;
                info!(target: "live_graph", "Ctrl-C received, shutting down");
                break;
            }
            update = updates.recv() => match update {
                Ok(update) => {
                    for edge in update.edges.iter().filter(|e| e.rate.is_some()) {
                        info!(
                            target: "live_graph",
                            edge = %edge.id,
                            signal = ?edge.assigned_signal,
                            rate = %edge.rate.map(format_rate).unwrap_or_default(),
                            color = edge.color(),
                            "Edge"
                        );
                    }
                    for diagnostic in &update.diagnostics {
                        warn!(
                            target: "live_graph",
                            diagnostic = %serde_json::to_string(diagnostic)?,
                            "Overlay anomaly"
                        );
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(target: "live_graph", skipped, "Renderer fell behind; skipping updates");
                }
                Err(RecvError::Closed) => break,
            },
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = state_rx.borrow_and_update().clone();
                match status.state {
                    SessionState::Errored(message) => {
                        error!(target: "live_graph", generation = status.generation, error = %message, "Overlay session failed");
                        break;
                    }
                    SessionState::Idle => {
                        info!(target: "live_graph", generation = status.generation, "Live stream ended");
                        break;
                    }
                    state => {
                        info!(target: "live_graph", generation = status.generation, state = ?state, "Overlay state");
                    }
                }
            }
        }
    }

    controller.shutdown().await;
    info!(target: "live_graph", "Live graph demo stopped");
    Ok(())
}

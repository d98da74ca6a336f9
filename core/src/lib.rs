// Flowgraph Core Library
// Live data-flow overlay for pipeline dependency graphs

pub mod config;
pub mod graph;
pub mod overlay;
pub mod reconcile;
pub mod signal;
pub mod stream;
pub mod telemetry;
pub mod topology;

// Export core types
pub use config::FlowgraphConfig;
pub use graph::{EdgeStyle, FlowGraph, GraphBuilder, GraphEdge, GraphNode, LayeredLayout, Layout};
pub use overlay::{OverlayController, OverlayParams, SessionState, SessionStatus};
pub use reconcile::{Diagnostic, EdgeReconciler, EdgeUpdate};
pub use signal::SignalType;
pub use stream::{
    ByteSource, ChannelByteSource, FlowBatch, FlowRecord, FlowStream, FrameDecoder, StreamConnector,
    FRAME_DELIMITER,
};
pub use topology::{AgentClient, ComponentDescriptor, TopologySource};

// Error types
use thiserror::Error;

pub use config::ConfigError;
pub use graph::GraphError;
pub use stream::StreamError;
pub use topology::TopologyError;

#[derive(Error, Debug)]
pub enum FlowgraphError {
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
pub type Result<T> = std::result::Result<T, FlowgraphError>;

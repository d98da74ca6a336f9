// Component topology
//
// Descriptor model for the agent's component listing and the source trait the
// graph view pulls it through.

mod client;

pub use client::AgentClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TopologyError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("agent returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid component listing: {0}")]
    Decode(String),

    #[error("component not found: {0}")]
    NotFound(String),
}

/// One configured processing component, as reported by the agent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    #[serde(rename = "localID", alias = "id")]
    pub id: String,
    #[serde(rename = "name")]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Components this one feeds data into, in declaration order
    #[serde(rename = "dataFlowEdgesTo", default)]
    pub static_dependency_ids: Vec<String>,
    #[serde(rename = "moduleID", default)]
    pub module_id: String,
    #[serde(rename = "referencesTo", default)]
    pub references_to: Vec<String>,
    #[serde(rename = "referencedBy", default)]
    pub referenced_by: Vec<String>,
    /// Members of a module-backed component (only filled by the detail fetch)
    #[serde(rename = "moduleInfo", default)]
    pub module_members: Vec<ComponentDescriptor>,
}

impl ComponentDescriptor {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            label: None,
            static_dependency_ids: Vec::new(),
            module_id: String::new(),
            references_to: Vec::new(),
            referenced_by: Vec::new(),
            module_members: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn feeds<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.static_dependency_ids
            .extend(targets.into_iter().map(Into::into));
        self
    }

    /// Whether this component wraps a nested module (declare, import, foreach)
    pub fn is_module(&self) -> bool {
        !self.module_members.is_empty()
    }
}

/// Read-only source of component descriptors
#[async_trait]
pub trait TopologySource: Send + Sync {
    /// Components of `module_scope` (`""` is the root module)
    async fn list_components(
        &self,
        module_scope: &str,
    ) -> Result<Vec<ComponentDescriptor>, TopologyError>;

    /// One component with its nested module members
    async fn get_component(&self, id: &str) -> Result<ComponentDescriptor, TopologyError>;
}

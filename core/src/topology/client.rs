/// Agent HTTP client
///
/// Talks to the agent's web API: component listings, component detail and the
/// live graph stream (see `stream::source` for the streaming half).
use super::{ComponentDescriptor, TopologyError, TopologySource};
use crate::config::FlowgraphConfig;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

const API_PREFIX: &str = "/api/v0/web";
const REMOTECFG_SEGMENT: &str = "/remotecfg";

/// HTTP client for one agent
#[derive(Clone, Debug)]
pub struct AgentClient {
    base_url: String,
    http_client: reqwest::Client,
    request_timeout: Duration,
    remotecfg: bool,
}

impl AgentClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_config(&FlowgraphConfig {
            agent_url: base_url.into(),
            ..FlowgraphConfig::default()
        })
    }

    pub fn with_config(config: &FlowgraphConfig) -> Self {
        // No client-wide timeout: it would also cut the long-lived graph stream.
        // Topology requests set their own per-request timeout instead.
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .user_agent(&config.user_agent)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: config.agent_url.trim_end_matches('/').to_string(),
            http_client,
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            remotecfg: config.remotecfg,
        }
    }

    /// Read topology from the remotely managed configuration.
    /// The live graph stream is not affected.
    pub fn with_remotecfg(mut self, remotecfg: bool) -> Self {
        self.remotecfg = remotecfg;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http_client
    }

    fn topology_prefix(&self) -> String {
        if self.remotecfg {
            format!("{}{}{}", self.base_url, API_PREFIX, REMOTECFG_SEGMENT)
        } else {
            format!("{}{}", self.base_url, API_PREFIX)
        }
    }

    pub(crate) fn components_url(&self, module_scope: &str) -> String {
        if module_scope.is_empty() {
            format!("{}/components", self.topology_prefix())
        } else {
            format!("{}/modules/{}/components", self.topology_prefix(), module_scope)
        }
    }

    pub(crate) fn component_url(&self, id: &str) -> String {
        format!("{}/components/{}", self.topology_prefix(), id)
    }

    pub(crate) fn graph_url(&self, module_scope: &str, window_seconds: u32) -> String {
        if module_scope.is_empty() {
            format!(
                "{}{}/graph?window={}",
                self.base_url, API_PREFIX, window_seconds
            )
        } else {
            format!(
                "{}{}/graph/{}?window={}",
                self.base_url, API_PREFIX, module_scope, window_seconds
            )
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, TopologyError> {
        debug!(target: "topology", url = %url, "Fetching");

        let response = self
            .http_client
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| {
                warn!(target: "topology", error = %e, url = %url, "Topology request failed");
                TopologyError::Transport(e.to_string())
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(TopologyError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(target: "topology", status = status.as_u16(), body = %body, "Agent returned error");
            return Err(TopologyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| TopologyError::Transport(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| TopologyError::Decode(e.to_string()))
    }
}

#[async_trait]
impl TopologySource for AgentClient {
    async fn list_components(
        &self,
        module_scope: &str,
    ) -> Result<Vec<ComponentDescriptor>, TopologyError> {
        let url = self.components_url(module_scope);
        let components: Vec<ComponentDescriptor> = self.get_json(&url).await?;
        debug!(
            target: "topology",
            module = %module_scope,
            count = components.len(),
            "Fetched component listing"
        );
        Ok(components)
    }

    async fn get_component(&self, id: &str) -> Result<ComponentDescriptor, TopologyError> {
        let url = self.component_url(id);
        match self.get_json(&url).await {
            Err(TopologyError::NotFound(_)) => Err(TopologyError::NotFound(id.to_string())),
            other => other,
        }
    }
}

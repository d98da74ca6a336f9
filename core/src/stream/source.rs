// Byte sources for the live graph stream
//
// A `ByteSource` yields raw body chunks one read at a time; a `StreamConnector`
// opens one for a module scope and window.

use super::StreamError;
use crate::topology::AgentClient;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[async_trait]
pub trait ByteSource: Send {
    /// Next chunk of the body; `Ok(None)` once the body is complete
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, StreamError>;
}

#[async_trait]
pub trait StreamConnector: Send + Sync {
    /// Open the live stream for `module_scope` (`""` is the root module).
    ///
    /// A non-success response is reported here, with its status and body.
    async fn connect(
        &self,
        module_scope: &str,
        window_seconds: u32,
    ) -> Result<Box<dyn ByteSource>, StreamError>;
}

/// Body of a streaming HTTP response
pub struct HttpByteSource {
    response: reqwest::Response,
}

impl HttpByteSource {
    pub fn new(response: reqwest::Response) -> Self {
        Self { response }
    }
}

#[async_trait]
impl ByteSource for HttpByteSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, StreamError> {
        self.response
            .chunk()
            .await
            .map_err(|e| StreamError::Read(e.to_string()))
    }
}

#[async_trait]
impl StreamConnector for AgentClient {
    async fn connect(
        &self,
        module_scope: &str,
        window_seconds: u32,
    ) -> Result<Box<dyn ByteSource>, StreamError> {
        let url = self.graph_url(module_scope, window_seconds);
        info!(target: "stream", url = %url, "Opening live graph stream");

        let response = self.http().get(&url).send().await.map_err(|e| {
            warn!(target: "stream", error = %e, "Live graph request failed");
            StreamError::Transport(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!(target: "stream", status = status.as_u16(), "Live graph stream open");
        Ok(Box::new(HttpByteSource::new(response)))
    }
}

/// Byte source fed by another task through a channel.
///
/// The body ends when every sender is dropped.
pub struct ChannelByteSource {
    rx: mpsc::Receiver<Result<Bytes, StreamError>>,
}

impl ChannelByteSource {
    pub fn new(rx: mpsc::Receiver<Result<Bytes, StreamError>>) -> Self {
        Self { rx }
    }

    pub fn channel(capacity: usize) -> (mpsc::Sender<Result<Bytes, StreamError>>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl ByteSource for ChannelByteSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, StreamError> {
        match self.rx.recv().await {
            Some(Ok(bytes)) => Ok(Some(bytes)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

// Live graph stream
//
// Drives a `FrameDecoder` from a `ByteSource`, one read at a time, until the
// body ends, a read fails, or the session is cancelled.

mod decoder;
mod record;
mod source;

pub use decoder::{DecoderStats, FrameDecoder, FRAME_DELIMITER};
pub use record::{FlowBatch, FlowRecord};
pub use source::{ByteSource, ChannelByteSource, HttpByteSource, StreamConnector};

use futures_core::Stream;
use std::collections::VecDeque;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StreamError {
    #[error("failed to connect: {0}")]
    Transport(String),

    #[error("agent returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("stream read failed: {0}")]
    Read(String),
}

/// Lazy, in-order sequence of flow batches from one response body.
///
/// Not restartable: once it has ended, been cancelled, or failed, it only
/// returns `Ok(None)`.
pub struct FlowStream {
    source: Box<dyn ByteSource>,
    decoder: FrameDecoder,
    ready: VecDeque<FlowBatch>,
    cancel: CancellationToken,
    finished: bool,
}

impl FlowStream {
    pub fn new(source: Box<dyn ByteSource>, window_seconds: u32, cancel: CancellationToken) -> Self {
        Self::with_decoder(source, FrameDecoder::new(window_seconds), cancel)
    }

    pub fn with_decoder(
        source: Box<dyn ByteSource>,
        decoder: FrameDecoder,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            decoder,
            ready: VecDeque::new(),
            cancel,
            finished: false,
        }
    }

    pub fn stats(&self) -> DecoderStats {
        self.decoder.stats()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Next batch, `Ok(None)` at end of stream or after cancellation.
    ///
    /// An error is returned at most once; the stream is finished afterwards.
    pub async fn next_batch(&mut self) -> Result<Option<FlowBatch>, StreamError> {
        loop {
            if self.finished {
                return Ok(None);
            }
            if self.cancel.is_cancelled() {
                self.stop("cancelled");
                return Ok(None);
            }
            if let Some(batch) = self.ready.pop_front() {
                return Ok(Some(batch));
            }

            let read = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                chunk = self.source.next_chunk() => Some(chunk),
            };

            match read {
                None => {
                    self.stop("cancelled");
                    return Ok(None);
                }
                Some(Ok(Some(bytes))) => {
                    let batches = self.decoder.push(&bytes);
                    self.ready.extend(batches);
                }
                Some(Ok(None)) => {
                    self.decoder.finish();
                    self.stop("end of stream");
                    return Ok(None);
                }
                Some(Err(e)) => {
                    self.stop("read error");
                    return Err(e);
                }
            }
        }
    }

    /// The same sequence as a `Stream`
    pub fn into_stream(mut self) -> impl Stream<Item = Result<FlowBatch, StreamError>> + Send {
        async_stream::stream! {
            loop {
                match self.next_batch().await {
                    Ok(Some(batch)) => yield Ok(batch),
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        }
    }

    fn stop(&mut self, reason: &str) {
        debug!(
            target: "stream",
            reason = %reason,
            discarded_batches = self.ready.len(),
            "Flow stream stopped"
        );
        self.finished = true;
        self.ready.clear();
        self.decoder.reset();
    }
}

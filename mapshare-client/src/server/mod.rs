//! Transfer server capability.
//!
//! The local transfer server is consumed through a pluggable trait:
//! issue a JSON request, or open a streaming connection and receive a
//! sequence of raw frames. [`HttpTransferServer`] talks to the real
//! server through the port gate; [`MockTransferServer`] queues responses
//! and pushes frames for tests.

mod http;
mod mock;

pub use http::HttpTransferServer;
pub use mock::MockTransferServer;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

/// Transfer server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The server has not announced its port yet.
    #[error("transfer server not ready")]
    NotReady,

    /// The server answered non-2xx; the message is the server-provided
    /// one when the error body carried it, a generic fallback otherwise.
    #[error("{0}")]
    Api(String),

    /// The underlying HTTP request failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The response body was not the expected JSON shape.
    #[error("invalid response body: {0}")]
    InvalidBody(#[from] serde_json::Error),
}

/// One delivery on an open progress stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A raw frame, to be parsed by the consumer. Malformed frames are
    /// the consumer's problem to discard.
    Frame(String),
    /// The stream's connection was lost; no further frames will arrive.
    Lost(String),
}

/// Handle to an open progress stream.
///
/// Dropping the handle closes the stream: the producing side stops as
/// soon as it observes the closed channel.
#[derive(Debug)]
pub struct ProgressStream {
    /// Delivered frames, in connection order.
    pub events: mpsc::Receiver<StreamEvent>,
}

/// Capability trait for the local transfer server.
#[async_trait]
pub trait TransferServer: Send + Sync {
    /// Whether the server has announced its port.
    fn is_ready(&self) -> bool;

    /// Issue a `POST` request with a JSON body (`Value::Null` for none)
    /// and return the parsed response body (`Value::Null` when empty).
    async fn post(&self, path: &str, body: Value) -> Result<Value, ServerError>;

    /// Open a streaming connection to the given `/…/events` path.
    fn open_stream(&self, path: &str) -> Result<ProgressStream, ServerError>;
}

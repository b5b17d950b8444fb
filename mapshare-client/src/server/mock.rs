//! Mock transfer server for testing.
//!
//! Allows queueing responses, capturing requests, and pushing frames
//! into open progress streams for verification.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use super::{ProgressStream, ServerError, StreamEvent, TransferServer};

#[derive(Default)]
struct MockServerInner {
    ready: bool,
    posts: Vec<(String, Value)>,
    post_responses: VecDeque<Value>,
    fail_next_post: Option<String>,
    streams: HashMap<String, mpsc::Sender<StreamEvent>>,
    open_stream_calls: usize,
}

/// Mock transfer server for testing.
///
/// Starts ready. `post` captures the request and pops the next queued
/// response; `open_stream` registers a channel the test can push frames
/// into by path.
#[derive(Default)]
pub struct MockTransferServer {
    inner: Arc<Mutex<MockServerInner>>,
}

impl MockTransferServer {
    /// Create a new mock transfer server, ready by default.
    pub fn new() -> Self {
        let server = Self::default();
        server.inner.lock().unwrap().ready = true;
        server
    }

    /// Set whether the server reports itself ready.
    pub fn set_ready(&self, ready: bool) {
        self.inner.lock().unwrap().ready = ready;
    }

    /// Queue a response body for the next `post` call.
    pub fn queue_post_response(&self, body: Value) {
        self.inner.lock().unwrap().post_responses.push_back(body);
    }

    /// Cause the next `post` to fail with the given API error message.
    pub fn fail_next_post(&self, message: &str) {
        self.inner.lock().unwrap().fail_next_post = Some(message.to_string());
    }

    /// All captured `post` calls, as (path, body) pairs.
    pub fn posts(&self) -> Vec<(String, Value)> {
        self.inner.lock().unwrap().posts.clone()
    }

    /// Number of times `open_stream` was called.
    pub fn open_stream_count(&self) -> usize {
        self.inner.lock().unwrap().open_stream_calls
    }

    /// Whether a stream is currently open (and its consumer attached)
    /// for the given path.
    pub fn stream_open(&self, path: &str) -> bool {
        self.inner
            .lock()
            .unwrap()
            .streams
            .get(path)
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Push a raw frame into the stream opened for the given path.
    ///
    /// Frames pushed after the consumer closed the stream are dropped,
    /// like on a real connection.
    pub fn push_frame(&self, path: &str, frame: &str) {
        let inner = self.inner.lock().unwrap();
        if let Some(tx) = inner.streams.get(path) {
            let _ = tx.try_send(StreamEvent::Frame(frame.to_string()));
        }
    }

    /// Simulate a connection loss on the stream for the given path.
    pub fn lose_stream(&self, path: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(tx) = inner.streams.remove(path) {
            let _ = tx.try_send(StreamEvent::Lost("connection lost".to_string()));
        }
    }
}

impl Clone for MockTransferServer {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl TransferServer for MockTransferServer {
    fn is_ready(&self) -> bool {
        self.inner.lock().unwrap().ready
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, ServerError> {
        let mut inner = self.inner.lock().unwrap();
        inner.posts.push((path.to_string(), body));

        if let Some(message) = inner.fail_next_post.take() {
            return Err(ServerError::Api(message));
        }

        Ok(inner.post_responses.pop_front().unwrap_or(Value::Null))
    }

    fn open_stream(&self, path: &str) -> Result<ProgressStream, ServerError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.ready {
            return Err(ServerError::NotReady);
        }
        inner.open_stream_calls += 1;
        let (tx, rx) = mpsc::channel(32);
        inner.streams.insert(path.to_string(), tx);
        Ok(ProgressStream { events: rx })
    }
}

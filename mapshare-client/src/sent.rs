//! Sender-side share store.
//!
//! Tracks exactly one outgoing share. The receiver's responses arrive
//! as partial-state frames over `/mapShares/{shareId}/events`; each
//! frame is shallow-merged onto the current state. The stream opens
//! lazily with the first listener and closes with the last.
//!
//! A store whose stream connection was lost is permanently poisoned:
//! every subsequent [`snapshot`](SentShareStore::snapshot) returns the
//! captured error. Callers discard the instance once the share reaches
//! a terminal status and create a fresh one per share.

use std::sync::{Arc, Mutex, Weak};

use serde_json::Value;
use tokio::task::JoinHandle;

use mapshare_types::{
    SentShareState, SentShareUpdate, ShareCreateParams, ShareDescriptor, ShareId,
};

use crate::error::StoreError;
use crate::listeners::{ListenerSet, Subscription};
use crate::server::{ProgressStream, ServerError, StreamEvent, TransferServer};

/// Create an outgoing share on the transfer server.
pub async fn create_share(
    server: &dyn TransferServer,
    params: ShareCreateParams,
) -> Result<ShareDescriptor, ServerError> {
    let body = serde_json::to_value(&params)?;
    let response = server.post("/mapShares", body).await?;
    Ok(serde_json::from_value(response)?)
}

/// Cancel an outgoing share on the transfer server.
pub async fn cancel_share(
    server: &dyn TransferServer,
    share_id: &ShareId,
) -> Result<(), ServerError> {
    server
        .post(&format!("/mapShares/{share_id}/cancel"), Value::Null)
        .await?;
    Ok(())
}

/// Store for one outgoing share's receiver-reported state.
///
/// Cloning yields another handle to the same store, so any number of
/// consumers can observe one instance.
#[derive(Clone)]
pub struct SentShareStore {
    inner: Arc<SentInner>,
}

struct SentInner {
    server: Arc<dyn TransferServer>,
    share_id: ShareId,
    /// Self-reference handed to the reader task; it must not keep the
    /// store alive.
    weak: Weak<SentInner>,
    state: Mutex<SentState>,
}

struct SentState {
    share: SentShareState,
    /// Captured stream-connection error; set once, never cleared.
    stream_error: Option<String>,
    reader: Option<JoinHandle<()>>,
    listeners: ListenerSet,
}

impl SentShareStore {
    /// Create a store for the given share, starting from the supplied
    /// initial state.
    pub fn new(server: Arc<dyn TransferServer>, share_id: ShareId, initial: SentShareState) -> Self {
        Self {
            inner: Arc::new_cyclic(|weak| SentInner {
                server,
                share_id,
                weak: weak.clone(),
                state: Mutex::new(SentState {
                    share: initial,
                    stream_error: None,
                    reader: None,
                    listeners: ListenerSet::default(),
                }),
            }),
        }
    }

    /// The share this store tracks.
    pub fn share_id(&self) -> &ShareId {
        &self.inner.share_id
    }

    /// Register a change listener.
    ///
    /// The first listener opens the progress stream; dropping the last
    /// guard closes it. When the transfer server has not announced its
    /// port yet, tracking silently does not start and the store keeps
    /// exposing its initial state.
    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        let id = {
            let mut state = self.inner.state.lock().unwrap();
            let id = state.listeners.insert(Arc::new(listener));
            if state.reader.is_none() && state.stream_error.is_none() {
                state.reader = self.inner.open_reader();
            }
            id
        };
        let weak = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                let mut state = inner.state.lock().unwrap();
                state.listeners.remove(id);
                if state.listeners.is_empty() {
                    if let Some(reader) = state.reader.take() {
                        reader.abort();
                        tracing::debug!(share = %inner.share_id, "closed sent-share progress stream");
                    }
                }
            }
        })
    }

    /// The last known merged state.
    ///
    /// Once the stream's connection has been lost this returns the
    /// captured error on every read; the instance does not self-heal.
    pub fn snapshot(&self) -> Result<SentShareState, StoreError> {
        let state = self.inner.state.lock().unwrap();
        if let Some(message) = &state.stream_error {
            return Err(StoreError::StreamLost(message.clone()));
        }
        Ok(state.share.clone())
    }
}

impl SentInner {
    /// Open the progress stream, or silently decline when the server is
    /// not reachable yet.
    fn open_reader(&self) -> Option<JoinHandle<()>> {
        if !self.server.is_ready() {
            tracing::debug!(share = %self.share_id, "transfer server not ready, tracking not started");
            return None;
        }
        match self
            .server
            .open_stream(&format!("/mapShares/{}/events", self.share_id))
        {
            Ok(stream) => Some(spawn_sent_reader(self.weak.clone(), stream)),
            Err(e) => {
                tracing::debug!(share = %self.share_id, error = %e, "tracking not started");
                None
            }
        }
    }

    fn handle_frame(&self, raw: &str) {
        let Some(update) = SentShareUpdate::parse(raw) else {
            tracing::debug!(share = %self.share_id, "discarding malformed progress frame");
            return;
        };
        let callbacks = {
            let mut state = self.state.lock().unwrap();
            let before = state.share.clone();
            state.share.apply(update);
            if state.share != before {
                state.listeners.callbacks()
            } else {
                Vec::new()
            }
        };
        for callback in callbacks {
            callback();
        }
    }

    fn handle_lost(&self, reason: String) {
        tracing::warn!(share = %self.share_id, %reason, "sent-share progress stream lost");
        let callbacks = {
            let mut state = self.state.lock().unwrap();
            if state.stream_error.is_none() {
                state.stream_error = Some(reason);
            }
            state.reader.take();
            state.listeners.callbacks()
        };
        for callback in callbacks {
            callback();
        }
    }
}

impl Drop for SentInner {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            if let Some(reader) = state.reader.take() {
                reader.abort();
            }
        }
    }
}

fn spawn_sent_reader(weak: Weak<SentInner>, mut stream: ProgressStream) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match stream.events.recv().await {
                Some(StreamEvent::Frame(raw)) => {
                    let Some(inner) = weak.upgrade() else { break };
                    inner.handle_frame(&raw);
                }
                Some(StreamEvent::Lost(reason)) => {
                    if let Some(inner) = weak.upgrade() {
                        inner.handle_lost(reason);
                    }
                    break;
                }
                None => {
                    if let Some(inner) = weak.upgrade() {
                        inner.handle_lost("stream closed".to_string());
                    }
                    break;
                }
            }
        }
    })
}

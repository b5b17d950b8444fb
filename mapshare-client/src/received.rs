//! Receiver-side share store.
//!
//! The single source of truth for all shares offered to this device.
//! Ingests offer/cancel events from the RPC event bus, drives each share
//! through the lifecycle state machine in `mapshare-core`, and
//! multiplexes one progress stream per active download.
//!
//! # Architecture
//!
//! ```text
//! event bus ──(offer / cancel)──> ReceivedShareStore ──> listeners
//! transfer server ──(progress frames, one stream per download)──┘
//! ```
//!
//! The store owns every subscription it opens: the bus reader task is
//! started by the first listener and stopped by the last, each
//! downloading share has exactly one stream reader task, and every
//! terminal share (except aborted ones) has a delayed cleanup timer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use mapshare_core::{transition, LifecycleAction, LifecycleEvent};
use mapshare_types::{
    DownloadCreateParams, DownloadCreated, DownloadId, DownloadProgressFrame, ReceivedShareState,
    ShareDeclineParams, ShareId, ShareLifecycle, ShareOffer,
};

use crate::bus::{EventBus, MapShareEvent};
use crate::error::StoreError;
use crate::listeners::{ListenerSet, Subscription};
use crate::server::{ProgressStream, ServerError, StreamEvent, TransferServer};

/// How long a share in a terminal state is kept before removal.
pub const CLEANUP_DELAY: Duration = Duration::from_secs(5 * 60);

/// Store for shares offered to this device.
///
/// Cloning yields another handle to the same store. External code
/// observes state only through [`snapshot`](Self::snapshot) /
/// [`share_by_id`](Self::share_by_id) and mutates only through the
/// documented operations.
#[derive(Clone)]
pub struct ReceivedShareStore {
    inner: Arc<ReceivedInner>,
}

struct ReceivedInner {
    bus: Arc<dyn EventBus>,
    server: Arc<dyn TransferServer>,
    /// Self-reference handed to spawned tasks; they must not keep the
    /// store alive.
    weak: Weak<ReceivedInner>,
    state: Mutex<ReceivedState>,
}

#[derive(Default)]
struct ReceivedState {
    shares: HashMap<ShareId, ReceivedShareState>,
    /// One stream reader task per downloading share.
    streams: HashMap<ShareId, JoinHandle<()>>,
    /// One pending cleanup timer per terminal share.
    timers: HashMap<ShareId, JoinHandle<()>>,
    listeners: ListenerSet,
    bus_task: Option<JoinHandle<()>>,
}

impl ReceivedShareStore {
    /// Create a store over the given event bus and transfer server.
    pub fn new(bus: Arc<dyn EventBus>, server: Arc<dyn TransferServer>) -> Self {
        Self {
            inner: Arc::new_cyclic(|weak| ReceivedInner {
                bus,
                server,
                weak: weak.clone(),
                state: Mutex::new(ReceivedState::default()),
            }),
        }
    }

    /// Register a change listener.
    ///
    /// The first listener starts the event-bus reader; dropping the
    /// returned guard removes the listener, and removing the last one
    /// stops the reader. A second subscribe while already listening does
    /// not re-attach.
    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        let id = {
            let mut state = self.inner.state.lock().unwrap();
            let id = state.listeners.insert(Arc::new(listener));
            if state.bus_task.is_none() {
                state.bus_task = Some(spawn_bus_reader(&self.inner));
            }
            id
        };
        let weak = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                let mut state = inner.state.lock().unwrap();
                state.listeners.remove(id);
                if state.listeners.is_empty() {
                    if let Some(task) = state.bus_task.take() {
                        task.abort();
                        tracing::debug!("stopped listening for share events");
                    }
                }
            }
        })
    }

    /// All current shares, ordered by the time their offer arrived.
    pub fn snapshot(&self) -> Vec<ReceivedShareState> {
        let state = self.inner.state.lock().unwrap();
        let mut shares: Vec<_> = state.shares.values().cloned().collect();
        shares.sort_by(|a, b| {
            a.offer
                .received_at
                .cmp(&b.offer.received_at)
                .then_with(|| a.offer.share_id.as_str().cmp(b.offer.share_id.as_str()))
        });
        shares
    }

    /// Look up one share by id.
    pub fn share_by_id(&self, share_id: &ShareId) -> Option<ReceivedShareState> {
        self.inner.state.lock().unwrap().shares.get(share_id).cloned()
    }

    /// Insert (or overwrite) a share as pending and notify listeners.
    ///
    /// Called when the event bus delivers an offer; also usable directly
    /// by embedders that receive offers out of band.
    pub fn add_share(&self, offer: ShareOffer) {
        self.inner.add_share(offer);
    }

    /// Transition a pending share to downloading and open its progress
    /// stream.
    ///
    /// Fails without mutating anything when the share does not exist, is
    /// not pending, or the transfer server has not announced its port.
    pub fn start_download_tracking(
        &self,
        share_id: &ShareId,
        download_id: DownloadId,
    ) -> Result<(), StoreError> {
        self.inner.start_download_tracking(share_id, download_id)
    }

    /// Accept a pending share: create the download on the transfer
    /// server, then start tracking its progress.
    pub async fn accept(&self, share_id: &ShareId) -> Result<DownloadId, StoreError> {
        let offer = self.inner.offer_for(share_id)?;
        let params = DownloadCreateParams {
            sender_device_id: offer.sender_device_id,
            share_id: offer.share_id,
            map_share_urls: offer.map_share_urls,
            estimated_size_bytes: offer.estimated_size_bytes,
        };
        let body = serde_json::to_value(&params).map_err(ServerError::InvalidBody)?;
        let response = self.inner.server.post("/downloads", body).await?;
        let created: DownloadCreated =
            serde_json::from_value(response).map_err(ServerError::InvalidBody)?;
        self.inner
            .start_download_tracking(share_id, created.download_id.clone())?;
        Ok(created.download_id)
    }

    /// Reject a pending share: tell the transfer server, then mark it
    /// rejected locally.
    pub async fn reject(
        &self,
        share_id: &ShareId,
        reason: Option<String>,
    ) -> Result<(), StoreError> {
        let offer = self.inner.offer_for(share_id)?;
        let params = ShareDeclineParams {
            sender_device_id: offer.sender_device_id,
            map_share_urls: offer.map_share_urls,
            reason: reason.clone(),
        };
        let body = serde_json::to_value(&params).map_err(ServerError::InvalidBody)?;
        self.inner
            .server
            .post(&format!("/mapShares/{share_id}/decline"), body)
            .await?;
        self.mark_rejected(share_id, reason)
    }

    /// Abort a downloading share: tell the transfer server, then mark it
    /// aborted locally.
    pub async fn abort(&self, share_id: &ShareId) -> Result<(), StoreError> {
        let download_id = self.inner.download_id_for(share_id)?;
        self.inner
            .server
            .post(&format!("/downloads/{download_id}/abort"), Value::Null)
            .await?;
        self.mark_aborted(share_id)
    }

    /// Force a pending share into the rejected state and schedule its
    /// removal.
    pub fn mark_rejected(
        &self,
        share_id: &ShareId,
        reason: Option<String>,
    ) -> Result<(), StoreError> {
        self.inner
            .dispatch_checked(share_id, "pending", LifecycleEvent::RejectRequested { reason })
    }

    /// Force a downloading share into the aborted state, closing its
    /// progress stream first. Aborted shares are kept; no removal is
    /// scheduled.
    pub fn mark_aborted(&self, share_id: &ShareId) -> Result<(), StoreError> {
        self.inner
            .dispatch_checked(share_id, "downloading", LifecycleEvent::AbortRequested)
    }

    /// Stop all subscriptions (event bus and per-share streams) and
    /// cancel all pending cleanup timers. For store teardown.
    pub fn cleanup(&self) {
        self.inner.stop_all();
    }
}

impl ReceivedInner {
    fn add_share(&self, offer: ShareOffer) {
        {
            let mut state = self.state.lock().unwrap();
            let share_id = offer.share_id.clone();
            // A re-offered share must not be reaped by a stale timer.
            if let Some(timer) = state.timers.remove(&share_id) {
                timer.abort();
            }
            state
                .shares
                .insert(share_id, ReceivedShareState::pending(offer));
        }
        self.notify();
    }

    fn offer_for(&self, share_id: &ShareId) -> Result<ShareOffer, StoreError> {
        let state = self.state.lock().unwrap();
        let share = state
            .shares
            .get(share_id)
            .ok_or_else(|| StoreError::ShareNotFound(share_id.clone()))?;
        if !matches!(share.lifecycle, ShareLifecycle::Pending) {
            return Err(StoreError::InvalidState {
                share_id: share_id.clone(),
                expected: "pending",
                actual: share.lifecycle.label(),
            });
        }
        Ok(share.offer.clone())
    }

    fn download_id_for(&self, share_id: &ShareId) -> Result<DownloadId, StoreError> {
        let state = self.state.lock().unwrap();
        let share = state
            .shares
            .get(share_id)
            .ok_or_else(|| StoreError::ShareNotFound(share_id.clone()))?;
        match &share.lifecycle {
            ShareLifecycle::Downloading { download_id, .. } => Ok(download_id.clone()),
            other => Err(StoreError::InvalidState {
                share_id: share_id.clone(),
                expected: "downloading",
                actual: other.label(),
            }),
        }
    }

    fn start_download_tracking(
        &self,
        share_id: &ShareId,
        download_id: DownloadId,
    ) -> Result<(), StoreError> {
        let callbacks = {
            let mut state = self.state.lock().unwrap();
            let share = state
                .shares
                .get(share_id)
                .ok_or_else(|| StoreError::ShareNotFound(share_id.clone()))?;
            if !matches!(share.lifecycle, ShareLifecycle::Pending) {
                return Err(StoreError::InvalidState {
                    share_id: share_id.clone(),
                    expected: "pending",
                    actual: share.lifecycle.label(),
                });
            }
            if !self.server.is_ready() {
                return Err(StoreError::ServerNotReady);
            }

            let stream = self
                .server
                .open_stream(&format!("/downloads/{download_id}/events"))
                .map_err(StoreError::Server)?;

            let (next, _actions) = transition(
                ShareLifecycle::Pending,
                LifecycleEvent::DownloadStarted {
                    download_id: download_id.clone(),
                },
            );
            if let Some(share) = state.shares.get_mut(share_id) {
                share.lifecycle = next;
            }

            let reader = spawn_stream_reader(self.weak.clone(), share_id.clone(), stream);
            // At most one stream per share: close any pre-existing one.
            if let Some(old) = state.streams.insert(share_id.clone(), reader) {
                old.abort();
            }
            state.listeners.callbacks()
        };
        for callback in callbacks {
            callback();
        }
        Ok(())
    }

    /// Apply an event after checking the share exists and carries the
    /// expected tag; precondition violations are returned to the caller.
    fn dispatch_checked(
        &self,
        share_id: &ShareId,
        expected: &'static str,
        event: LifecycleEvent,
    ) -> Result<(), StoreError> {
        let callbacks = {
            let mut state = self.state.lock().unwrap();
            {
                let share = state
                    .shares
                    .get(share_id)
                    .ok_or_else(|| StoreError::ShareNotFound(share_id.clone()))?;
                if share.lifecycle.label() != expected {
                    return Err(StoreError::InvalidState {
                        share_id: share_id.clone(),
                        expected,
                        actual: share.lifecycle.label(),
                    });
                }
            }
            let changed = self.apply_locked(&mut state, share_id, event);
            if changed {
                state.listeners.callbacks()
            } else {
                Vec::new()
            }
        };
        for callback in callbacks {
            callback();
        }
        Ok(())
    }

    /// Apply an event delivered asynchronously (bus or stream); unknown
    /// shares and invalid transitions are silently ignored.
    fn dispatch(&self, share_id: &ShareId, event: LifecycleEvent) {
        let callbacks = {
            let mut state = self.state.lock().unwrap();
            let changed = self.apply_locked(&mut state, share_id, event);
            if changed {
                state.listeners.callbacks()
            } else {
                Vec::new()
            }
        };
        for callback in callbacks {
            callback();
        }
    }

    fn apply_locked(
        &self,
        state: &mut ReceivedState,
        share_id: &ShareId,
        event: LifecycleEvent,
    ) -> bool {
        let Some(share) = state.shares.get_mut(share_id) else {
            return false;
        };
        let (next, actions) = transition(share.lifecycle.clone(), event);
        let changed = next != share.lifecycle;
        share.lifecycle = next;

        for action in actions {
            match action {
                LifecycleAction::CloseStream => {
                    if let Some(reader) = state.streams.remove(share_id) {
                        reader.abort();
                    }
                }
                LifecycleAction::ScheduleCleanup => self.schedule_cleanup(state, share_id),
                LifecycleAction::OpenStream { .. } => {
                    // Streams are opened by start_download_tracking.
                }
            }
        }
        changed
    }

    /// Arm (or re-arm) the delayed removal timer for a terminal share.
    fn schedule_cleanup(&self, state: &mut ReceivedState, share_id: &ShareId) {
        if let Some(previous) = state.timers.remove(share_id) {
            previous.abort();
        }
        let weak = self.weak.clone();
        let id = share_id.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(CLEANUP_DELAY).await;
            let Some(inner) = weak.upgrade() else { return };
            let callbacks = {
                let mut state = inner.state.lock().unwrap();
                state.timers.remove(&id);
                if state.shares.remove(&id).is_some() {
                    state.listeners.callbacks()
                } else {
                    Vec::new()
                }
            };
            for callback in callbacks {
                callback();
            }
        });
        state.timers.insert(share_id.clone(), timer);
    }

    fn handle_frame(&self, share_id: &ShareId, raw: &str) {
        let Some(frame) = DownloadProgressFrame::parse(raw) else {
            tracing::debug!(share = %share_id, "discarding malformed progress frame");
            return;
        };
        self.dispatch(share_id, LifecycleEvent::Frame(frame));
    }

    fn handle_stream_lost(&self, share_id: &ShareId) {
        self.dispatch(share_id, LifecycleEvent::StreamLost);
    }

    fn notify(&self) {
        let callbacks = { self.state.lock().unwrap().listeners.callbacks() };
        for callback in callbacks {
            callback();
        }
    }

    fn stop_all(&self) {
        let mut state = self.state.lock().unwrap();
        if let Some(task) = state.bus_task.take() {
            task.abort();
        }
        for (_, reader) in state.streams.drain() {
            reader.abort();
        }
        for (_, timer) in state.timers.drain() {
            timer.abort();
        }
    }
}

impl Drop for ReceivedInner {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            if let Some(task) = state.bus_task.take() {
                task.abort();
            }
            for (_, reader) in state.streams.drain() {
                reader.abort();
            }
            for (_, timer) in state.timers.drain() {
                timer.abort();
            }
        }
    }
}

/// Spawn the task that ingests offer/cancel events from the bus.
fn spawn_bus_reader(inner: &Arc<ReceivedInner>) -> JoinHandle<()> {
    let mut rx = inner.bus.subscribe();
    let weak = Arc::downgrade(inner);
    tracing::debug!("listening for share events");
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(MapShareEvent::Received(offer)) => {
                    let Some(inner) = weak.upgrade() else { break };
                    inner.add_share(offer);
                }
                Ok(MapShareEvent::Cancelled { share_id }) => {
                    let Some(inner) = weak.upgrade() else { break };
                    inner.dispatch(&share_id, LifecycleEvent::OfferCancelled);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "share event bus lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Spawn the task that ingests one download's progress stream.
fn spawn_stream_reader(
    weak: Weak<ReceivedInner>,
    share_id: ShareId,
    mut stream: ProgressStream,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match stream.events.recv().await {
                Some(StreamEvent::Frame(raw)) => {
                    let Some(inner) = weak.upgrade() else { break };
                    inner.handle_frame(&share_id, &raw);
                }
                Some(StreamEvent::Lost(reason)) => {
                    if let Some(inner) = weak.upgrade() {
                        tracing::warn!(share = %share_id, %reason, "progress stream connection lost");
                        inner.handle_stream_lost(&share_id);
                    }
                    break;
                }
                None => {
                    if let Some(inner) = weak.upgrade() {
                        inner.handle_stream_lost(&share_id);
                    }
                    break;
                }
            }
        }
    })
}

//! Event bus capability.
//!
//! The RPC connection that delivers share events is consumed as a
//! capability: subscribe once, receive typed payloads. The transport
//! behind it (and its real implementation) is out of scope for this
//! library; tests use [`MockEventBus`].

mod mock;

pub use mock::MockEventBus;

use mapshare_types::{ShareId, ShareOffer};
use tokio::sync::broadcast;

/// A typed share event delivered over the RPC event bus.
#[derive(Debug, Clone)]
pub enum MapShareEvent {
    /// `map-share-received`: a peer offered a map to this device.
    Received(ShareOffer),
    /// `map-share-cancelled`: the sender withdrew an offer.
    Cancelled {
        /// Id of the withdrawn share.
        share_id: ShareId,
    },
}

/// Capability trait for the RPC event bus.
///
/// Implementations fan events out to any number of subscribers; each
/// call to `subscribe` returns an independent receiver.
pub trait EventBus: Send + Sync {
    /// Subscribe to share events.
    fn subscribe(&self) -> broadcast::Receiver<MapShareEvent>;
}

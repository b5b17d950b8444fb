//! The share offer: the immutable description of a map proposed for
//! transfer, delivered to the receiver as the payload of the
//! `map-share-received` event.

use serde::{Deserialize, Serialize};

use crate::ids::{DeviceId, MapId, ShareId};

/// Geographic bounding box as `[minLon, minLat, maxLon, maxLat]`.
pub type Bounds = [f64; 4];

/// A received map share offer.
///
/// Field names are bit-exact with the wire payload of the
/// `map-share-received` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareOffer {
    /// The id of the device that sent the share.
    pub sender_device_id: DeviceId,
    /// Display name of the sending device.
    pub sender_device_name: String,
    /// The id of the share.
    pub share_id: ShareId,
    /// URLs the map payload can be downloaded from.
    pub map_share_urls: Vec<String>,
    /// The id of the map being shared.
    pub map_id: MapId,
    /// Display name of the map being shared.
    pub map_name: String,
    /// Estimated size of the map data in bytes.
    pub estimated_size_bytes: u64,
    /// Bounding box of the map data.
    pub bounds: Bounds,
    /// Minimum zoom level of the map data.
    pub minzoom: u8,
    /// Maximum zoom level of the map data.
    pub maxzoom: u8,
    /// Timestamp (ms since epoch) when the map was created.
    pub map_created: u64,
    /// Timestamp (ms since epoch) when the offer was received.
    pub received_at: u64,
}

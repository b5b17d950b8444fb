//! Request and response bodies for the transfer server's HTTP API.
//!
//! Bodies are JSON with camelCase field names, bit-exact with the
//! server's contract.

use serde::{Deserialize, Serialize};

use crate::ids::{DeviceId, DownloadId, MapId, ShareId};
use crate::offer::Bounds;

/// Body of `POST /downloads`: accept a share and start downloading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadCreateParams {
    /// The device that offered the share.
    pub sender_device_id: DeviceId,
    /// The share being accepted.
    pub share_id: ShareId,
    /// URLs to download the map payload from.
    pub map_share_urls: Vec<String>,
    /// Estimated size of the map data in bytes.
    pub estimated_size_bytes: u64,
}

/// Response of `POST /downloads`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadCreated {
    /// Id of the newly created download.
    pub download_id: DownloadId,
}

/// Body of `POST /mapShares/{shareId}/decline`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareDeclineParams {
    /// The device that offered the share.
    pub sender_device_id: DeviceId,
    /// URLs from the original offer.
    pub map_share_urls: Vec<String>,
    /// Optional reason, e.g. `disk_full` or `user_rejected`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Body of `POST /mapShares`: create an outgoing share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareCreateParams {
    /// The map to share.
    pub map_id: MapId,
    /// The device to share it with.
    pub receiver_device_id: DeviceId,
}

/// Response of `POST /mapShares`: the created share's descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareDescriptor {
    /// Id assigned to the new share.
    pub share_id: ShareId,
    /// URLs the receiver can download the map payload from.
    pub map_share_urls: Vec<String>,
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
}

/// Error body returned by the transfer server on non-2xx responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    /// Optional server-provided failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_create_params_wire_names() {
        let params = DownloadCreateParams {
            sender_device_id: DeviceId::new("device-a"),
            share_id: ShareId::new("share-1"),
            map_share_urls: vec!["https://peer.local/maps/1".into()],
            estimated_size_bytes: 1024,
        };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["senderDeviceId"], "device-a");
        assert_eq!(json["shareId"], "share-1");
        assert_eq!(json["mapShareUrls"][0], "https://peer.local/maps/1");
        assert_eq!(json["estimatedSizeBytes"], 1024);
    }

    #[test]
    fn download_created_parses() {
        let created: DownloadCreated =
            serde_json::from_str(r#"{"downloadId":"dl-7"}"#).unwrap();
        assert_eq!(created.download_id, DownloadId::new("dl-7"));
    }

    #[test]
    fn decline_params_omit_absent_reason() {
        let params = ShareDeclineParams {
            sender_device_id: DeviceId::new("device-a"),
            map_share_urls: vec![],
            reason: None,
        };
        let json = serde_json::to_value(&params).unwrap();
        assert!(json.get("reason").is_none());
    }

    #[test]
    fn share_descriptor_roundtrip() {
        let descriptor = ShareDescriptor {
            share_id: ShareId::new("share-9"),
            map_share_urls: vec!["https://peer.local/maps/9".into()],
            estimated_size_bytes: 2048,
            bounds: [-66.1, -3.2, -65.4, -2.6],
            minzoom: 2,
            maxzoom: 12,
            map_created: 1_755_000_000_000,
        };
        let json = serde_json::to_string(&descriptor).unwrap();
        let restored: ShareDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(descriptor, restored);
    }

    #[test]
    fn error_body_tolerates_missing_message() {
        let body: ApiErrorBody = serde_json::from_str("{}").unwrap();
        assert!(body.message.is_none());
    }
}

//! Sender-side share state and the partial updates that mutate it.
//!
//! The sender's view of a share starts from a caller-supplied initial
//! state and is only ever changed by shallow-merging updates pushed over
//! the `/mapShares/{shareId}/events` stream.

use serde::{Deserialize, Serialize};

use crate::frames::FrameError;

/// Status of a share from the sender's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentShareStatus {
    /// Offer sent, receiver has not responded.
    Pending,
    /// The receiver declined the offer.
    Declined,
    /// The receiver is downloading the map.
    Downloading,
    /// The share was cancelled.
    Canceled,
    /// The receiver aborted the download.
    Aborted,
    /// The receiver finished downloading.
    Completed,
    /// The transfer failed.
    Error,
}

impl SentShareStatus {
    /// Whether no further transition is expected from this status.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Downloading)
    }
}

/// Sender-side state of one share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentShareState {
    /// Current status.
    pub status: SentShareStatus,
    /// Bytes the receiver has downloaded so far.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes_downloaded: Option<u64>,
    /// Structured error when `status` is `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FrameError>,
}

impl SentShareState {
    /// The state of a freshly created share: pending, no progress.
    pub fn pending() -> Self {
        Self {
            status: SentShareStatus::Pending,
            bytes_downloaded: None,
            error: None,
        }
    }

    /// Shallow-merge a partial update onto this state.
    ///
    /// Fields absent from the update keep their current value, so a
    /// frame updating only the byte count does not erase the status.
    pub fn apply(&mut self, update: SentShareUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(bytes) = update.bytes_downloaded {
            self.bytes_downloaded = Some(bytes);
        }
        if let Some(error) = update.error {
            self.error = Some(error);
        }
    }
}

/// One partial-state frame from a sent-share progress stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentShareUpdate {
    /// New status, if it changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SentShareStatus>,
    /// New byte count, if it changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes_downloaded: Option<u64>,
    /// Structured error, if one occurred.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FrameError>,
}

impl SentShareUpdate {
    /// Parse a raw frame. Returns `None` for malformed data.
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_merges_only_present_fields() {
        let mut state = SentShareState {
            status: SentShareStatus::Downloading,
            bytes_downloaded: Some(1024),
            error: None,
        };
        state.apply(SentShareUpdate {
            bytes_downloaded: Some(2048),
            ..Default::default()
        });
        assert_eq!(state.status, SentShareStatus::Downloading);
        assert_eq!(state.bytes_downloaded, Some(2048));
    }

    #[test]
    fn apply_updates_status_without_touching_progress() {
        let mut state = SentShareState {
            status: SentShareStatus::Downloading,
            bytes_downloaded: Some(4096),
            error: None,
        };
        state.apply(SentShareUpdate {
            status: Some(SentShareStatus::Completed),
            ..Default::default()
        });
        assert_eq!(state.status, SentShareStatus::Completed);
        assert_eq!(state.bytes_downloaded, Some(4096));
    }

    #[test]
    fn empty_update_is_a_no_op() {
        let mut state = SentShareState::pending();
        let before = state.clone();
        state.apply(SentShareUpdate::default());
        assert_eq!(state, before);
    }

    #[test]
    fn update_parses_wire_field_names() {
        let update =
            SentShareUpdate::parse(r#"{"status":"downloading","bytesDownloaded":512}"#).unwrap();
        assert_eq!(update.status, Some(SentShareStatus::Downloading));
        assert_eq!(update.bytes_downloaded, Some(512));
    }

    #[test]
    fn malformed_update_is_rejected() {
        assert!(SentShareUpdate::parse("garbage").is_none());
        assert!(SentShareUpdate::parse(r#"{"status":"sideways"}"#).is_none());
    }

    #[test]
    fn terminal_statuses() {
        assert!(!SentShareStatus::Pending.is_terminal());
        assert!(!SentShareStatus::Downloading.is_terminal());
        assert!(SentShareStatus::Declined.is_terminal());
        assert!(SentShareStatus::Canceled.is_terminal());
        assert!(SentShareStatus::Aborted.is_terminal());
        assert!(SentShareStatus::Completed.is_terminal());
        assert!(SentShareStatus::Error.is_terminal());
    }
}

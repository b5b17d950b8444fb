//! Receiver-side share state: a tagged union over the share lifecycle,
//! carried alongside the immutable offer.

use serde::{Deserialize, Serialize};

use crate::frames::FrameError;
use crate::ids::DownloadId;
use crate::offer::ShareOffer;

/// Lifecycle tag of a received share.
///
/// `Pending` and `Downloading` are the only non-terminal tags; every
/// other tag is terminal for that share. Each variant carries only the
/// fields valid for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ShareLifecycle {
    /// Offer received, not yet accepted or rejected.
    Pending,
    /// The receiver declined the offer.
    Rejected {
        /// Optional reason string, e.g. `disk_full` or `user_rejected`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// Download in progress.
    #[serde(rename_all = "camelCase")]
    Downloading {
        /// The id of the active download.
        download_id: DownloadId,
        /// Bytes downloaded so far.
        bytes_downloaded: u64,
    },
    /// The sender cancelled the share, or the download was cancelled.
    Cancelled,
    /// The receiver aborted the download.
    Aborted,
    /// Download finished successfully.
    Completed,
    /// The download failed.
    Error {
        /// Human-readable failure message.
        message: String,
    },
}

impl ShareLifecycle {
    /// Whether no further transition is expected from this tag.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Downloading { .. })
    }

    /// The wire tag for this lifecycle state.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Rejected { .. } => "rejected",
            Self::Downloading { .. } => "downloading",
            Self::Cancelled => "cancelled",
            Self::Aborted => "aborted",
            Self::Completed => "completed",
            Self::Error { .. } => "error",
        }
    }

    /// Build an `Error` lifecycle from a structured frame error, falling
    /// back to a generic message when the frame carried none.
    pub fn error_from_frame(error: Option<FrameError>) -> Self {
        Self::Error {
            message: error
                .map(|e| e.message)
                .unwrap_or_else(|| "download failed".to_string()),
        }
    }
}

/// Full receiver-side state of one share: the offer plus its lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceivedShareState {
    /// The immutable offer this share was created from.
    #[serde(flatten)]
    pub offer: ShareOffer,
    /// The current lifecycle tag and its fields.
    #[serde(flatten)]
    pub lifecycle: ShareLifecycle,
}

impl ReceivedShareState {
    /// Create a new pending share from an offer.
    pub fn pending(offer: ShareOffer) -> Self {
        Self {
            offer,
            lifecycle: ShareLifecycle::Pending,
        }
    }
}

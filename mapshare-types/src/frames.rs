//! Progress-stream frames.
//!
//! The transfer server pushes one JSON frame per state update on its
//! `/downloads/{downloadId}/events` and `/mapShares/{shareId}/events`
//! endpoints. Frames that fail to parse are discarded by the stores, so
//! every `parse` here returns an `Option` rather than an error.

use serde::{Deserialize, Serialize};

/// Structured error carried inside a progress frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameError {
    /// Human-readable failure message.
    pub message: String,
    /// Machine-readable error code.
    pub code: String,
}

/// Status tag of a download progress frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    /// Transfer in progress.
    Downloading,
    /// Transfer finished successfully.
    Completed,
    /// Transfer failed.
    Error,
    /// The sender cancelled the share.
    Canceled,
    /// The receiver aborted the download.
    Aborted,
}

/// One frame from a download progress stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadProgressFrame {
    /// Current download status.
    pub status: DownloadStatus,
    /// Bytes downloaded so far, present while `downloading`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes_downloaded: Option<u64>,
    /// Structured error, present when `status` is `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FrameError>,
}

impl DownloadProgressFrame {
    /// Parse a raw frame. Returns `None` for malformed data; the caller
    /// is expected to drop such frames without surfacing an error.
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_downloading_frame() {
        let frame =
            DownloadProgressFrame::parse(r#"{"status":"downloading","bytesDownloaded":512}"#)
                .unwrap();
        assert_eq!(frame.status, DownloadStatus::Downloading);
        assert_eq!(frame.bytes_downloaded, Some(512));
        assert!(frame.error.is_none());
    }

    #[test]
    fn parses_error_frame_with_structured_error() {
        let frame = DownloadProgressFrame::parse(
            r#"{"status":"error","error":{"message":"disk full","code":"ENOSPC"}}"#,
        )
        .unwrap();
        assert_eq!(frame.status, DownloadStatus::Error);
        let err = frame.error.unwrap();
        assert_eq!(err.message, "disk full");
        assert_eq!(err.code, "ENOSPC");
    }

    #[test]
    fn parses_bare_status_frame() {
        let frame = DownloadProgressFrame::parse(r#"{"status":"completed"}"#).unwrap();
        assert_eq!(frame.status, DownloadStatus::Completed);
    }

    #[test]
    fn rejects_non_json() {
        assert!(DownloadProgressFrame::parse("not json at all").is_none());
        assert!(DownloadProgressFrame::parse("").is_none());
    }

    #[test]
    fn rejects_schema_violations() {
        // Unknown status value
        assert!(DownloadProgressFrame::parse(r#"{"status":"paused"}"#).is_none());
        // Missing status
        assert!(DownloadProgressFrame::parse(r#"{"bytesDownloaded":1}"#).is_none());
        // Wrong type for bytesDownloaded
        assert!(
            DownloadProgressFrame::parse(r#"{"status":"downloading","bytesDownloaded":"512"}"#)
                .is_none()
        );
    }

    #[test]
    fn tolerates_unknown_extra_fields() {
        let frame =
            DownloadProgressFrame::parse(r#"{"status":"downloading","bytesDownloaded":7,"eta":3}"#)
                .unwrap();
        assert_eq!(frame.bytes_downloaded, Some(7));
    }
}

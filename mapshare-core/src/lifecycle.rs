//! Receiver-side share lifecycle state machine.
//!
//! This module provides a pure, side-effect-free transition function for
//! the lifecycle of a received share. The function takes the current
//! lifecycle and an event, and produces the new lifecycle plus a list of
//! actions to execute.
//!
//! The actual I/O (opening and closing progress streams, arming cleanup
//! timers, notifying listeners) is performed by the store in
//! `mapshare-client`, not by this module. This enables instant unit
//! testing without network mocks.
//!
//! Transition graph:
//!
//! ```text
//! pending --(offer cancelled)----------------> cancelled
//! pending --(download started)---------------> downloading
//! pending --(reject requested)---------------> rejected
//! downloading --(frame: downloading)---------> downloading (bytes updated)
//! downloading --(frame: completed)-----------> completed
//! downloading --(frame: error)---------------> error
//! downloading --(frame: canceled)------------> cancelled
//! downloading --(frame: aborted)-------------> aborted
//! downloading --(offer cancelled)------------> cancelled
//! downloading --(stream lost)----------------> error
//! downloading --(abort requested)------------> aborted
//! ```
//!
//! Any other (state, event) pair is invalid and leaves the state
//! unchanged with no actions.

use mapshare_types::{DownloadId, DownloadProgressFrame, DownloadStatus, ShareLifecycle};

/// Fixed message recorded when a progress stream's connection is lost.
pub const STREAM_LOST_MESSAGE: &str = "download connection lost";

/// Events that can occur in a received share's lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// The sender cancelled the offer (`map-share-cancelled`).
    OfferCancelled,
    /// The receiver accepted the share and a download was created.
    DownloadStarted {
        /// Id of the newly created download.
        download_id: DownloadId,
    },
    /// The receiver declined the offer.
    RejectRequested {
        /// Optional reason string.
        reason: Option<String>,
    },
    /// The receiver aborted the download.
    AbortRequested,
    /// A parsed frame arrived on the download progress stream.
    Frame(DownloadProgressFrame),
    /// The progress stream's connection was lost.
    StreamLost,
}

/// Actions for the store to execute after a transition.
///
/// These are instructions, not side effects. The store interprets them
/// and performs the actual work.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleAction {
    /// Open a progress stream for the given download.
    OpenStream {
        /// Id of the download to stream progress for.
        download_id: DownloadId,
    },
    /// Close the share's progress stream, if one is open.
    CloseStream,
    /// Schedule removal of the share after the cleanup delay,
    /// cancelling any previously scheduled removal.
    ScheduleCleanup,
}

/// Process an event against the current lifecycle.
///
/// Pure function: returns the new lifecycle and the actions to execute.
/// Invalid (state, event) pairs return the state unchanged with no
/// actions.
pub fn transition(
    current: ShareLifecycle,
    event: LifecycleEvent,
) -> (ShareLifecycle, Vec<LifecycleAction>) {
    use LifecycleAction::*;
    use LifecycleEvent::*;
    use ShareLifecycle::*;

    match (current, event) {
        // From pending
        (Pending, OfferCancelled) => (Cancelled, vec![ScheduleCleanup]),
        (Pending, DownloadStarted { download_id }) => (
            Downloading {
                download_id: download_id.clone(),
                bytes_downloaded: 0,
            },
            vec![OpenStream { download_id }],
        ),
        (Pending, RejectRequested { reason }) => (Rejected { reason }, vec![ScheduleCleanup]),

        // From downloading: sender-side cancellation and explicit abort
        (Downloading { .. }, OfferCancelled) => {
            (Cancelled, vec![CloseStream, ScheduleCleanup])
        }
        (Downloading { .. }, AbortRequested) => (Aborted, vec![CloseStream]),
        (Downloading { .. }, StreamLost) => (
            Error {
                message: STREAM_LOST_MESSAGE.to_string(),
            },
            vec![CloseStream, ScheduleCleanup],
        ),

        // From downloading: stream-delivered frames
        (
            Downloading {
                download_id,
                bytes_downloaded,
            },
            Frame(frame),
        ) => on_frame(download_id, bytes_downloaded, frame),

        // Invalid transitions - stay in current state
        (state, _) => (state, vec![]),
    }
}

/// Apply a progress frame to a downloading share.
fn on_frame(
    download_id: DownloadId,
    bytes_downloaded: u64,
    frame: DownloadProgressFrame,
) -> (ShareLifecycle, Vec<LifecycleAction>) {
    use LifecycleAction::*;
    use ShareLifecycle::*;

    match frame.status {
        DownloadStatus::Downloading => {
            // A frame without a byte count carries no new information.
            let bytes = frame.bytes_downloaded.unwrap_or(bytes_downloaded);
            (
                Downloading {
                    download_id,
                    bytes_downloaded: bytes,
                },
                vec![],
            )
        }
        DownloadStatus::Completed => (Completed, vec![CloseStream, ScheduleCleanup]),
        DownloadStatus::Error => (
            ShareLifecycle::error_from_frame(frame.error),
            vec![CloseStream, ScheduleCleanup],
        ),
        DownloadStatus::Canceled => (Cancelled, vec![CloseStream, ScheduleCleanup]),
        DownloadStatus::Aborted => (Aborted, vec![CloseStream]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapshare_types::FrameError;

    fn downloading(bytes: u64) -> ShareLifecycle {
        ShareLifecycle::Downloading {
            download_id: DownloadId::new("dl-1"),
            bytes_downloaded: bytes,
        }
    }

    fn frame(status: DownloadStatus) -> LifecycleEvent {
        LifecycleEvent::Frame(DownloadProgressFrame {
            status,
            bytes_downloaded: None,
            error: None,
        })
    }

    #[test]
    fn download_started_transitions_to_downloading_with_zero_bytes() {
        let (state, actions) = transition(
            ShareLifecycle::Pending,
            LifecycleEvent::DownloadStarted {
                download_id: DownloadId::new("dl-1"),
            },
        );
        assert_eq!(state, downloading(0));
        assert_eq!(
            actions,
            vec![LifecycleAction::OpenStream {
                download_id: DownloadId::new("dl-1")
            }]
        );
    }

    #[test]
    fn reject_from_pending_schedules_cleanup() {
        let (state, actions) = transition(
            ShareLifecycle::Pending,
            LifecycleEvent::RejectRequested {
                reason: Some("disk_full".into()),
            },
        );
        assert_eq!(
            state,
            ShareLifecycle::Rejected {
                reason: Some("disk_full".into())
            }
        );
        assert_eq!(actions, vec![LifecycleAction::ScheduleCleanup]);
    }

    #[test]
    fn offer_cancelled_while_pending() {
        let (state, actions) =
            transition(ShareLifecycle::Pending, LifecycleEvent::OfferCancelled);
        assert_eq!(state, ShareLifecycle::Cancelled);
        assert_eq!(actions, vec![LifecycleAction::ScheduleCleanup]);
    }

    #[test]
    fn offer_cancelled_while_downloading_closes_stream() {
        let (state, actions) = transition(downloading(512), LifecycleEvent::OfferCancelled);
        assert_eq!(state, ShareLifecycle::Cancelled);
        assert_eq!(
            actions,
            vec![
                LifecycleAction::CloseStream,
                LifecycleAction::ScheduleCleanup
            ]
        );
    }

    #[test]
    fn progress_frame_updates_byte_count() {
        let (state, actions) = transition(
            downloading(0),
            LifecycleEvent::Frame(DownloadProgressFrame {
                status: DownloadStatus::Downloading,
                bytes_downloaded: Some(512),
                error: None,
            }),
        );
        assert_eq!(state, downloading(512));
        assert!(actions.is_empty());
    }

    #[test]
    fn progress_frame_without_bytes_keeps_current_count() {
        let (state, actions) = transition(downloading(512), frame(DownloadStatus::Downloading));
        assert_eq!(state, downloading(512));
        assert!(actions.is_empty());
    }

    #[test]
    fn completed_frame_closes_stream_and_schedules_cleanup() {
        let (state, actions) = transition(downloading(1024), frame(DownloadStatus::Completed));
        assert_eq!(state, ShareLifecycle::Completed);
        assert_eq!(
            actions,
            vec![
                LifecycleAction::CloseStream,
                LifecycleAction::ScheduleCleanup
            ]
        );
    }

    #[test]
    fn error_frame_carries_server_message() {
        let (state, actions) = transition(
            downloading(0),
            LifecycleEvent::Frame(DownloadProgressFrame {
                status: DownloadStatus::Error,
                bytes_downloaded: None,
                error: Some(FrameError {
                    message: "disk full".into(),
                    code: "ENOSPC".into(),
                }),
            }),
        );
        assert_eq!(
            state,
            ShareLifecycle::Error {
                message: "disk full".into()
            }
        );
        assert!(actions.contains(&LifecycleAction::CloseStream));
        assert!(actions.contains(&LifecycleAction::ScheduleCleanup));
    }

    #[test]
    fn error_frame_without_detail_uses_fallback_message() {
        let (state, _) = transition(downloading(0), frame(DownloadStatus::Error));
        assert_eq!(
            state,
            ShareLifecycle::Error {
                message: "download failed".into()
            }
        );
    }

    #[test]
    fn canceled_frame_transitions_to_cancelled() {
        let (state, actions) = transition(downloading(0), frame(DownloadStatus::Canceled));
        assert_eq!(state, ShareLifecycle::Cancelled);
        assert!(actions.contains(&LifecycleAction::ScheduleCleanup));
    }

    #[test]
    fn aborted_frame_does_not_schedule_cleanup() {
        let (state, actions) = transition(downloading(0), frame(DownloadStatus::Aborted));
        assert_eq!(state, ShareLifecycle::Aborted);
        assert_eq!(actions, vec![LifecycleAction::CloseStream]);
    }

    #[test]
    fn abort_requested_does_not_schedule_cleanup() {
        let (state, actions) = transition(downloading(100), LifecycleEvent::AbortRequested);
        assert_eq!(state, ShareLifecycle::Aborted);
        assert_eq!(actions, vec![LifecycleAction::CloseStream]);
    }

    #[test]
    fn stream_lost_records_fixed_error_message() {
        let (state, actions) = transition(downloading(100), LifecycleEvent::StreamLost);
        assert_eq!(
            state,
            ShareLifecycle::Error {
                message: STREAM_LOST_MESSAGE.into()
            }
        );
        assert!(actions.contains(&LifecycleAction::CloseStream));
        assert!(actions.contains(&LifecycleAction::ScheduleCleanup));
    }

    #[test]
    fn frames_are_ignored_in_terminal_states() {
        for terminal in [
            ShareLifecycle::Completed,
            ShareLifecycle::Cancelled,
            ShareLifecycle::Aborted,
            ShareLifecycle::Rejected { reason: None },
            ShareLifecycle::Error {
                message: "x".into(),
            },
        ] {
            let (state, actions) = transition(terminal.clone(), frame(DownloadStatus::Completed));
            assert_eq!(state, terminal);
            assert!(actions.is_empty());
        }
    }

    #[test]
    fn frames_are_ignored_while_pending() {
        let (state, actions) = transition(ShareLifecycle::Pending, frame(DownloadStatus::Completed));
        assert_eq!(state, ShareLifecycle::Pending);
        assert!(actions.is_empty());
    }

    #[test]
    fn offer_cancelled_is_ignored_in_terminal_states() {
        let (state, actions) =
            transition(ShareLifecycle::Completed, LifecycleEvent::OfferCancelled);
        assert_eq!(state, ShareLifecycle::Completed);
        assert!(actions.is_empty());
    }

    #[test]
    fn full_accept_flow() {
        // pending -> downloading -> progress -> completed
        let (state, _) = transition(
            ShareLifecycle::Pending,
            LifecycleEvent::DownloadStarted {
                download_id: DownloadId::new("dl-1"),
            },
        );
        let (state, _) = transition(
            state,
            LifecycleEvent::Frame(DownloadProgressFrame {
                status: DownloadStatus::Downloading,
                bytes_downloaded: Some(512),
                error: None,
            }),
        );
        assert_eq!(state, downloading(512));
        let (state, _) = transition(state, frame(DownloadStatus::Completed));
        assert_eq!(state, ShareLifecycle::Completed);
    }
}

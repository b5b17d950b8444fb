//! # mapshare-types
//!
//! Shared types and wire formats for the mapshare sync library: the
//! share offer, receiver- and sender-side share state, progress-stream
//! frames, and the transfer server's HTTP request/response bodies.
//!
//! Everything here is plain data. The lifecycle state machine lives in
//! `mapshare-core`; the stores and I/O live in `mapshare-client`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod frames;
pub mod ids;
pub mod offer;
pub mod received;
pub mod sent;

pub use api::{
    ApiErrorBody, DownloadCreateParams, DownloadCreated, ShareCreateParams, ShareDeclineParams,
    ShareDescriptor,
};
pub use frames::{DownloadProgressFrame, DownloadStatus, FrameError};
pub use ids::{DeviceId, DownloadId, MapId, ShareId};
pub use offer::{Bounds, ShareOffer};
pub use received::{ReceivedShareState, ShareLifecycle};
pub use sent::{SentShareState, SentShareStatus, SentShareUpdate};

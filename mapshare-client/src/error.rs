//! Store errors.

use mapshare_types::ShareId;
use thiserror::Error;

use crate::server::ServerError;

/// Errors returned by the share stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The share id is not present in the store.
    #[error("share {0} not found")]
    ShareNotFound(ShareId),

    /// The transfer server has not announced its port yet.
    #[error("transfer server not ready")]
    ServerNotReady,

    /// The share is not in the state the operation requires.
    #[error("share {share_id} is {actual}, expected {expected}")]
    InvalidState {
        /// The share the operation targeted.
        share_id: ShareId,
        /// The state the operation requires.
        expected: &'static str,
        /// The share's actual state.
        actual: &'static str,
    },

    /// The sent-share progress stream's connection was lost; the store
    /// returns this on every snapshot read until it is discarded.
    #[error("progress stream connection lost: {0}")]
    StreamLost(String),

    /// A transfer server request failed.
    #[error(transparent)]
    Server(#[from] ServerError),
}

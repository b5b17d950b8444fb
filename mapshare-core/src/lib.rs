//! # mapshare-core
//!
//! Pure lifecycle logic for the mapshare sync library.
//!
//! The receiver-side share lifecycle is modelled as a side-effect-free
//! transition function over [`mapshare_types::ShareLifecycle`]; the
//! stores in `mapshare-client` interpret the returned actions and
//! perform the actual I/O.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod lifecycle;

pub use lifecycle::{transition, LifecycleAction, LifecycleEvent, STREAM_LOST_MESSAGE};

//! # mapshare-client
//!
//! Client library for peer-to-peer map sharing over a local transfer
//! server.
//!
//! This is the library applications embed to offer maps to nearby
//! devices and to download maps offered to them.
//!
//! ## Components
//!
//! - **Port Gate**: queues requests until the transfer server announces
//!   the port it bound
//! - **Received-Share Store**: all shares offered to this device, each
//!   driven through the lifecycle state machine in `mapshare-core`
//! - **Sent-Share Store**: one outgoing share, tracking the receiver's
//!   responses
//! - **Capability traits**: `EventBus` and `TransferServer`, with HTTP
//!   and mock implementations
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use mapshare_client::{HttpTransferServer, PortGate, ReceivedShareStore};
//!
//! let gate = Arc::new(PortGate::new());
//! let server = Arc::new(HttpTransferServer::new(Arc::clone(&gate)));
//! let store = ReceivedShareStore::new(bus, server);
//!
//! let _sub = store.subscribe(|| println!("shares changed"));
//! gate.set_port(announced_port);
//!
//! let download_id = store.accept(&share_id).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bus;
pub mod error;
pub mod gate;
mod listeners;
pub mod received;
pub mod sent;
pub mod server;

pub use bus::{EventBus, MapShareEvent, MockEventBus};
pub use error::StoreError;
pub use gate::PortGate;
pub use listeners::Subscription;
pub use received::{ReceivedShareStore, CLEANUP_DELAY};
pub use sent::{cancel_share, create_share, SentShareStore};
pub use server::{
    HttpTransferServer, MockTransferServer, ProgressStream, ServerError, StreamEvent,
    TransferServer,
};

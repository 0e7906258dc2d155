//! # statuspage-core
//!
//! Client-side live-update core for the status page: keeps incident and
//! service views consistent with the backend by merging one REST snapshot
//! with the stream of server-pushed events.
//!
//! ## Design Principles
//!
//! - **Explicit context**: the viewer, base address and collaborators are
//!   passed in at mount. Nothing reads ambient globals.
//! - **One driver per view**: each mounted view owns its store and its own
//!   live connection; two views never share a socket.
//! - **Fetch is authoritative**: a snapshot replaces everything; events only
//!   patch what the last snapshot established.
//! - **Quiet failures**: undecodable frames and out-of-scope events are
//!   dropped; only fetch failures are shown to the user.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use statuspage_core::{LiveCollection, LiveView, ViewConfig, WsConnector};
//!
//! let handle = LiveView::spawn(config, LiveCollection::new(EntityKind::Incident))?;
//! let mut rx = handle.subscribe();
//! while rx.changed().await.is_ok() {
//!     render(&rx.borrow().store);
//! }
//! ```

pub mod api;
pub mod auth;
pub mod backoff;
pub mod config;
pub mod error;
pub mod live;
pub mod status;
pub mod transport;
pub mod view;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_support;

// Re-export commonly used items at crate root
pub use api::{IncidentForm, LinkedService, RecordSource, ServiceForm, StatusApi};
pub use auth::{Credentials, Role, StaticCredentials, ViewerContext};
pub use backoff::ReconnectPolicy;
pub use config::{load_client_config, resolve_client_config, ClientConfig, ReconnectConfig};
pub use error::{LiveError, Result};
pub use live::{
    Applied, FetchTarget, LiveCollection, LiveRecord, RecordState, Snapshot, ViewStore,
    ViewerScope,
};
pub use status::{IncidentStatus, ServiceStatus};
pub use transport::{Connection, Connector, Frame, WsConnector};
pub use view::{ConnectionState, LiveView, ViewConfig, ViewHandle, ViewState};

pub use statuspage_protocol::{EntityKind, Event, EventKind, Record, RecordId};

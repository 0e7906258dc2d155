//! Live stores: in-memory caches kept consistent with the event feed.
//!
//! # Merge Model
//!
//! ```text
//! REST fetch ──► replace_from_fetch ──┐
//!                                     ├──► store ──► watch channel ──► renderer
//! socket ─► decode ─► scope filter ─► apply
//! ```
//!
//! Both stores share one pure merge rule ([`reduce`]):
//!
//! - `created`  → upsert at `payload.id` (duplicate delivery is idempotent)
//! - `updated`  → upsert at the subject id, last write wins, implicit insert
//! - `deleted`  → remove if present, otherwise no-op
//!
//! The fetch snapshot is authoritative and replaces everything, including any
//! event applied before it arrived.
//!
//! # Module Structure
//!
//! - [`scope`]: decides whether an event concerns the current viewer
//! - [`reducer`]: the merge rule
//! - [`collection`]: ordered list store for list views
//! - [`record`]: single-record store for detail/edit views

mod collection;
mod record;
mod reducer;
mod scope;

pub use collection::LiveCollection;
pub use record::{LiveRecord, RecordState};
pub use reducer::{reduce, RecordUpdate};
pub use scope::ViewerScope;

use statuspage_protocol::{EntityKind, Event, Record, RecordId};

/// What a view fetches over REST on mount and on refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchTarget {
    Collection(EntityKind),
    Record(EntityKind, RecordId),
}

impl FetchTarget {
    pub fn entity(&self) -> EntityKind {
        match self {
            FetchTarget::Collection(entity) | FetchTarget::Record(entity, _) => *entity,
        }
    }

    pub fn subject_id(&self) -> Option<RecordId> {
        match self {
            FetchTarget::Collection(_) => None,
            FetchTarget::Record(_, id) => Some(*id),
        }
    }
}

/// Result of a successful fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    Collection(Vec<Record>),
    Record(Record),
}

/// What `apply` did, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Inserted,
    Replaced,
    Removed,
    Ignored,
}

impl Applied {
    pub fn changed(&self) -> bool {
        !matches!(self, Applied::Ignored)
    }
}

/// A store a view driver can feed.
pub trait ViewStore: Send + Sync + 'static {
    fn target(&self) -> FetchTarget;

    /// Replaces the store's content with an authoritative snapshot.
    fn replace_from_fetch(&mut self, snapshot: Snapshot);

    fn apply(&mut self, event: &Event) -> Applied;

    /// Keeps current data and remembers the message for display.
    fn record_fetch_failure(&mut self, message: String);

    /// The backend answered 404 for the fetch target.
    fn record_not_found(&mut self, message: String) {
        self.record_fetch_failure(message);
    }

    fn last_error(&self) -> Option<&str>;
}

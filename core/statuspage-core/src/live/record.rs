//! Single-record store backing detail and edit views.

use chrono::{DateTime, Utc};
use statuspage_protocol::{EntityKind, Event, EventKind, Record, RecordId};

use super::reducer::{reduce, RecordUpdate};
use super::{Applied, FetchTarget, Snapshot, ViewStore};

#[derive(Debug, Clone, PartialEq)]
pub enum RecordState {
    /// Nothing fetched or pushed yet.
    Loading,
    Present(Record),
    /// Deleted while the view was open. Terminal for events.
    Gone,
}

#[derive(Debug, Clone)]
pub struct LiveRecord {
    entity: EntityKind,
    subject_id: RecordId,
    state: RecordState,
    last_error: Option<String>,
    last_synced_at: Option<DateTime<Utc>>,
    last_event_at: Option<DateTime<Utc>>,
}

impl LiveRecord {
    pub fn new(entity: EntityKind, subject_id: RecordId) -> Self {
        LiveRecord {
            entity,
            subject_id,
            state: RecordState::Loading,
            last_error: None,
            last_synced_at: None,
            last_event_at: None,
        }
    }

    pub fn entity(&self) -> EntityKind {
        self.entity
    }

    pub fn subject_id(&self) -> RecordId {
        self.subject_id
    }

    pub fn state(&self) -> &RecordState {
        &self.state
    }

    pub fn record(&self) -> Option<&Record> {
        match &self.state {
            RecordState::Present(record) => Some(record),
            RecordState::Loading | RecordState::Gone => None,
        }
    }

    pub fn is_gone(&self) -> bool {
        self.state == RecordState::Gone
    }

    /// Installs a fetched record. A fetch is authoritative, so this also
    /// revives a record the feed reported as deleted.
    pub fn replace(&mut self, record: Record) {
        if record.id != self.subject_id {
            tracing::warn!(
                expected = %self.subject_id,
                received = %record.id,
                entity = %self.entity,
                "Fetched record does not match the view subject; ignoring"
            );
            return;
        }
        self.state = RecordState::Present(record);
        self.last_error = None;
        self.last_synced_at = Some(Utc::now());
    }

    pub fn apply(&mut self, event: &Event) -> Applied {
        if event.target_id() != Some(self.subject_id) || self.is_gone() {
            return Applied::Ignored;
        }
        // A detail view is only opened for an id that already exists.
        if event.kind == EventKind::Created {
            return Applied::Ignored;
        }

        let applied = match reduce(self.record(), event) {
            RecordUpdate::Upsert(record) => {
                let applied = match self.state {
                    RecordState::Present(_) => Applied::Replaced,
                    RecordState::Loading | RecordState::Gone => Applied::Inserted,
                };
                self.state = RecordState::Present(record);
                applied
            }
            RecordUpdate::Delete { .. } => {
                self.state = RecordState::Gone;
                Applied::Removed
            }
            RecordUpdate::Skip if event.kind == EventKind::Deleted => {
                // Deleted before the fetch landed.
                self.state = RecordState::Gone;
                Applied::Removed
            }
            RecordUpdate::Skip => Applied::Ignored,
        };
        if applied.changed() {
            self.last_event_at = Some(Utc::now());
        }
        applied
    }

    pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.last_synced_at
    }

    pub fn last_event_at(&self) -> Option<DateTime<Utc>> {
        self.last_event_at
    }
}

impl ViewStore for LiveRecord {
    fn target(&self) -> FetchTarget {
        FetchTarget::Record(self.entity, self.subject_id)
    }

    fn replace_from_fetch(&mut self, snapshot: Snapshot) {
        match snapshot {
            Snapshot::Record(record) => self.replace(record),
            Snapshot::Collection(records) => {
                if let Some(record) = records.into_iter().find(|r| r.id == self.subject_id) {
                    self.replace(record);
                }
            }
        }
    }

    fn apply(&mut self, event: &Event) -> Applied {
        LiveRecord::apply(self, event)
    }

    fn record_fetch_failure(&mut self, message: String) {
        self.last_error = Some(message);
    }

    fn record_not_found(&mut self, message: String) {
        self.state = RecordState::Gone;
        self.last_error = Some(message);
    }

    fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

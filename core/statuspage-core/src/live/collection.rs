//! Ordered list store backing incident and service list views.
//!
//! Order is insertion order of first appearance: updates keep a record's
//! position, new ids append at the end, and an id re-created after a delete
//! appends at the end again.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use statuspage_protocol::{EntityKind, Event, Record, RecordId};

use super::reducer::{reduce, RecordUpdate};
use super::{Applied, FetchTarget, Snapshot, ViewStore};

#[derive(Debug, Clone)]
pub struct LiveCollection {
    entity: EntityKind,
    order: Vec<RecordId>,
    records: HashMap<RecordId, Record>,
    last_error: Option<String>,
    last_synced_at: Option<DateTime<Utc>>,
    last_event_at: Option<DateTime<Utc>>,
}

impl LiveCollection {
    pub fn new(entity: EntityKind) -> Self {
        LiveCollection {
            entity,
            order: Vec::new(),
            records: HashMap::new(),
            last_error: None,
            last_synced_at: None,
            last_event_at: None,
        }
    }

    pub fn entity(&self) -> EntityKind {
        self.entity
    }

    /// Replaces every entry with `records`, keeping their order.
    ///
    /// A snapshot listing an id twice keeps the first position and the last
    /// value.
    pub fn replace_all(&mut self, records: Vec<Record>) {
        self.order.clear();
        self.records.clear();
        for record in records {
            self.upsert(record);
        }
        self.last_error = None;
        self.last_synced_at = Some(Utc::now());
    }

    pub fn apply(&mut self, event: &Event) -> Applied {
        let current = event.target_id().and_then(|id| self.records.get(&id));
        let applied = match reduce(current, event) {
            RecordUpdate::Upsert(record) => self.upsert(record),
            RecordUpdate::Delete { id } => self.remove(id),
            RecordUpdate::Skip => Applied::Ignored,
        };
        if applied.changed() {
            self.last_event_at = Some(Utc::now());
        }
        applied
    }

    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.records.get(&id)
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.records.contains_key(&id)
    }

    /// Records in display order.
    pub fn records(&self) -> impl Iterator<Item = &Record> + '_ {
        self.order.iter().filter_map(|id| self.records.get(id))
    }

    pub fn to_vec(&self) -> Vec<Record> {
        self.records().cloned().collect()
    }

    pub fn ids(&self) -> &[RecordId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.last_synced_at
    }

    pub fn last_event_at(&self) -> Option<DateTime<Utc>> {
        self.last_event_at
    }

    fn upsert(&mut self, record: Record) -> Applied {
        let id = record.id;
        match self.records.insert(id, record) {
            Some(_) => Applied::Replaced,
            None => {
                self.order.push(id);
                Applied::Inserted
            }
        }
    }

    fn remove(&mut self, id: RecordId) -> Applied {
        if self.records.remove(&id).is_none() {
            return Applied::Ignored;
        }
        self.order.retain(|held| *held != id);
        Applied::Removed
    }
}

impl ViewStore for LiveCollection {
    fn target(&self) -> FetchTarget {
        FetchTarget::Collection(self.entity)
    }

    fn replace_from_fetch(&mut self, snapshot: Snapshot) {
        match snapshot {
            Snapshot::Collection(records) => self.replace_all(records),
            Snapshot::Record(record) => self.replace_all(vec![record]),
        }
    }

    fn apply(&mut self, event: &Event) -> Applied {
        LiveCollection::apply(self, event)
    }

    fn record_fetch_failure(&mut self, message: String) {
        self.last_error = Some(message);
    }

    fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

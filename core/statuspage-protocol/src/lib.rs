//! Live-update wire contract for status page clients.
//!
//! This crate is shared by every client of the status backend to prevent schema
//! drift. It owns three things:
//!
//! - the record shape pushed by the backend ([`Record`], [`RecordId`]),
//! - the event tag scheme and the envelope decoder ([`decode`]),
//! - the derivation of the live endpoint from the REST base address
//!   ([`live_endpoint`]).
//!
//! Nothing here touches the network or holds state; the reconciliation logic
//! lives in `statuspage-core`.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

mod endpoint;
mod envelope;

pub use endpoint::{live_endpoint, live_endpoint_str, EndpointError, LIVE_PATH};
pub use envelope::{decode, DecodeFailure, EventTag, MAX_FRAME_BYTES};

/// Backend-assigned record identifier. Never reused.
///
/// The incident tables emit ids as strings while the service tables emit
/// numbers, so both encodings are accepted on input. Output is always numeric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(pub i64);

impl RecordId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        RecordId(value)
    }
}

impl std::str::FromStr for RecordId {
    type Err = std::num::ParseIntError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value.trim().parse::<i64>().map(RecordId)
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.0)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RecordIdVisitor;

        impl<'de> Visitor<'de> for RecordIdVisitor {
            type Value = RecordId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an integer record id or a string holding one")
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<RecordId, E> {
                Ok(RecordId(value))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<RecordId, E> {
                i64::try_from(value)
                    .map(RecordId)
                    .map_err(|_| E::custom(format!("record id {} out of range", value)))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<RecordId, E> {
                value
                    .parse::<RecordId>()
                    .map_err(|_| E::custom(format!("record id {:?} is not an integer", value)))
            }
        }

        deserializer.deserialize_any(RecordIdVisitor)
    }
}

/// Which collection an event or a view belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Incident,
    Service,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Incident => "incident",
            EntityKind::Service => "service",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "incident" => Some(EntityKind::Incident),
            "service" => Some(EntityKind::Service),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cached domain entity (incident or service).
///
/// Only `id`, `org_id` and `status` are named; everything else the backend
/// sends (title, description, timestamps, linked services, logs) is carried
/// verbatim in `fields` and written back out unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    #[serde(default, alias = "orgId", skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<RecordId>, status: impl Into<String>) -> Self {
        Record {
            id: id.into(),
            org_id: None,
            status: status.into(),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// Returns an opaque string field, if present.
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Display label: `title` for incidents, `name` for services.
    pub fn label(&self) -> &str {
        self.field_str("title")
            .or_else(|| self.field_str("name"))
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Created => "created",
            EventKind::Updated => "updated",
            EventKind::Deleted => "deleted",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "created" => Some(EventKind::Created),
            "updated" => Some(EventKind::Updated),
            "deleted" => Some(EventKind::Deleted),
            _ => None,
        }
    }
}

/// A decoded server push.
///
/// `subject_id` is always set after decoding: from the tag for
/// updates/deletes, from the payload for creations. `payload` is set for
/// creations and updates only.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub entity: EntityKind,
    pub scope_org_id: String,
    pub subject_id: Option<RecordId>,
    pub payload: Option<Record>,
}

impl Event {
    pub fn created(org_id: &str, entity: EntityKind, record: Record) -> Self {
        Event {
            kind: EventKind::Created,
            entity,
            scope_org_id: org_id.to_string(),
            subject_id: Some(record.id),
            payload: Some(record),
        }
    }

    pub fn updated(org_id: &str, entity: EntityKind, record: Record) -> Self {
        Event {
            kind: EventKind::Updated,
            entity,
            scope_org_id: org_id.to_string(),
            subject_id: Some(record.id),
            payload: Some(record),
        }
    }

    pub fn deleted(org_id: &str, entity: EntityKind, id: RecordId) -> Self {
        Event {
            kind: EventKind::Deleted,
            entity,
            scope_org_id: org_id.to_string(),
            subject_id: Some(id),
            payload: None,
        }
    }

    /// The id this event mutates: the tag's subject, else the payload's id.
    pub fn target_id(&self) -> Option<RecordId> {
        self.subject_id
            .or_else(|| self.payload.as_ref().map(|record| record.id))
    }

    pub fn tag(&self) -> EventTag {
        EventTag {
            org_id: self.scope_org_id.clone(),
            entity: self.entity,
            kind: self.kind,
            subject_id: match self.kind {
                EventKind::Created => None,
                EventKind::Updated | EventKind::Deleted => self.subject_id,
            },
        }
    }

    /// Encodes the event the way the backend emits it: `type` plus the
    /// record under the entity key.
    pub fn to_frame(&self) -> String {
        let mut object = Map::new();
        object.insert("type".to_string(), Value::String(self.tag().to_string()));
        if let Some(record) = &self.payload {
            if let Ok(value) = serde_json::to_value(record) {
                object.insert(self.entity.as_str().to_string(), value);
            }
        }
        Value::Object(object).to_string()
    }
}

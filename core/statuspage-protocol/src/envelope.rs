//! Event envelope decoder.
//!
//! Frames are JSON objects with a `type` tag of the form
//! `{org}_{entity}_{action}[_{id}]`. Organization ids may contain underscores
//! themselves (`org_2abc`), so the tag is matched from the right.
//!
//! Decoding never panics and never retries: anything that does not fit the
//! scheme comes back as a [`DecodeFailure`] for the caller to drop.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;

use crate::{EntityKind, Event, EventKind, Record, RecordId};

/// Frames larger than this are rejected without parsing.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024; // 1MB

const PAYLOAD_FALLBACK_KEY: &str = "payload";

static TAG_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<org>.+)_(?P<entity>incident|service)_(?P<action>created|updated|deleted)(?:_(?P<id>[0-9]+))?$",
    )
    .unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeFailure {
    #[error("frame is not valid JSON: {0}")]
    Malformed(String),

    #[error("frame exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("frame has no string `type` tag")]
    MissingTag,

    #[error("unknown event tag: {0}")]
    UnknownTag(String),

    #[error("{tag}: payload is missing or not an object")]
    MissingPayload { tag: String },

    #[error("{tag}: payload id {payload_id} does not match tag id {tag_id}")]
    SubjectMismatch {
        tag: String,
        tag_id: RecordId,
        payload_id: RecordId,
    },

    #[error("{tag}: payload is not a record: {details}")]
    InvalidPayload { tag: String, details: String },
}

/// Parsed form of a `type` tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTag {
    pub org_id: String,
    pub entity: EntityKind,
    pub kind: EventKind,
    pub subject_id: Option<RecordId>,
}

impl EventTag {
    /// Matches a tag against the scheme. Creations carry no id suffix;
    /// updates and deletions must carry one.
    pub fn parse(tag: &str) -> Option<Self> {
        let captures = TAG_PATTERN.captures(tag)?;
        let org_id = captures.name("org")?.as_str();
        let entity = EntityKind::from_str(captures.name("entity")?.as_str())?;
        let kind = EventKind::from_str(captures.name("action")?.as_str())?;
        let subject_id = match captures.name("id") {
            Some(id) => Some(id.as_str().parse::<RecordId>().ok()?),
            None => None,
        };

        match (kind, subject_id) {
            (EventKind::Created, Some(_)) => return None,
            (EventKind::Updated | EventKind::Deleted, None) => return None,
            _ => {}
        }

        Some(EventTag {
            org_id: org_id.to_string(),
            entity,
            kind,
            subject_id,
        })
    }
}

impl fmt::Display for EventTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}",
            self.org_id,
            self.entity.as_str(),
            self.kind.as_str()
        )?;
        if let Some(id) = self.subject_id {
            write!(f, "_{}", id)?;
        }
        Ok(())
    }
}

/// Decodes one text frame into a typed [`Event`].
pub fn decode(raw: &str) -> Result<Event, DecodeFailure> {
    if raw.len() > MAX_FRAME_BYTES {
        return Err(DecodeFailure::TooLarge {
            limit: MAX_FRAME_BYTES,
        });
    }

    let value: Value =
        serde_json::from_str(raw).map_err(|err| DecodeFailure::Malformed(err.to_string()))?;
    let mut object = match value {
        Value::Object(object) => object,
        _ => return Err(DecodeFailure::MissingTag),
    };

    let tag = match object.get("type").and_then(Value::as_str) {
        Some(tag) => tag.to_string(),
        None => return Err(DecodeFailure::MissingTag),
    };
    let parsed = EventTag::parse(&tag).ok_or_else(|| DecodeFailure::UnknownTag(tag.clone()))?;

    match parsed.kind {
        EventKind::Deleted => Ok(Event {
            kind: EventKind::Deleted,
            entity: parsed.entity,
            scope_org_id: parsed.org_id,
            subject_id: parsed.subject_id,
            payload: None,
        }),
        EventKind::Created | EventKind::Updated => {
            let payload = take_payload(&mut object, parsed.entity)
                .ok_or_else(|| DecodeFailure::MissingPayload { tag: tag.clone() })?;
            let record = payload_record(&tag, &parsed, payload)?;
            Ok(Event {
                kind: parsed.kind,
                entity: parsed.entity,
                scope_org_id: parsed.org_id,
                subject_id: Some(record.id),
                payload: Some(record),
            })
        }
    }
}

fn take_payload(object: &mut Map<String, Value>, entity: EntityKind) -> Option<Map<String, Value>> {
    let value = object
        .remove(entity.as_str())
        .filter(|value| !value.is_null())
        .or_else(|| object.remove(PAYLOAD_FALLBACK_KEY))?;
    match value {
        Value::Object(payload) => Some(payload),
        _ => None,
    }
}

fn payload_record(
    tag: &str,
    parsed: &EventTag,
    mut payload: Map<String, Value>,
) -> Result<Record, DecodeFailure> {
    let has_id = payload.get("id").map(|id| !id.is_null()).unwrap_or(false);
    if !has_id {
        match parsed.subject_id {
            Some(tag_id) => {
                payload.insert("id".to_string(), Value::from(tag_id.get()));
            }
            None => {
                return Err(DecodeFailure::MissingPayload {
                    tag: tag.to_string(),
                })
            }
        }
    }

    let record: Record =
        serde_json::from_value(Value::Object(payload)).map_err(|err| {
            DecodeFailure::InvalidPayload {
                tag: tag.to_string(),
                details: err.to_string(),
            }
        })?;

    if let Some(tag_id) = parsed.subject_id {
        if tag_id != record.id {
            return Err(DecodeFailure::SubjectMismatch {
                tag: tag.to_string(),
                tag_id,
                payload_id: record.id,
            });
        }
    }

    Ok(record)
}

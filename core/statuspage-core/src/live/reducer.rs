use statuspage_protocol::{Event, EventKind, Record, RecordId};

#[derive(Debug, Clone, PartialEq)]
pub enum RecordUpdate {
    Upsert(Record),
    Delete { id: RecordId },
    Skip,
}

/// Merge rule shared by both live stores.
///
/// There is no version on the wire, so an update always wins over whatever is
/// held, even if it was emitted before an update already applied. An update
/// for an id that is not held inserts it: a dropped `created` must not hide
/// the record for the rest of the view's life.
pub fn reduce(current: Option<&Record>, event: &Event) -> RecordUpdate {
    let id = match event.target_id() {
        Some(id) => id,
        None => return RecordUpdate::Skip,
    };

    match event.kind {
        EventKind::Created | EventKind::Updated => match event.payload.as_ref() {
            Some(payload) => {
                let mut record = payload.clone();
                record.id = id;
                RecordUpdate::Upsert(record)
            }
            None => RecordUpdate::Skip,
        },
        EventKind::Deleted => {
            if current.is_some() {
                RecordUpdate::Delete { id }
            } else {
                RecordUpdate::Skip
            }
        }
    }
}

//! Plain-text rendering of view state for the terminal.

use std::fmt::Write;

use chrono::{DateTime, Local, Utc};
use serde_json::{Map, Value};
use statuspage_core::{
    ConnectionState, EntityKind, LiveCollection, LiveRecord, Record, RecordState, ViewState,
    ViewStore,
};

pub fn collection(state: &ViewState<LiveCollection>) -> String {
    let store = &state.store;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} ({}){}",
        heading(store.entity()),
        store.len(),
        status_suffix(state.connection, state.loading, store.last_synced_at())
    );
    if let Some(error) = store.last_error() {
        let _ = writeln!(out, "! {}", error);
    }
    if store.is_empty() && store.last_synced_at().is_some() {
        let _ = writeln!(out, "  (none)");
    }
    for record in store.records() {
        let _ = writeln!(out, "{}", row(record));
    }
    out
}

pub fn record(state: &ViewState<LiveRecord>) -> String {
    let store = &state.store;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} #{}{}",
        store.entity(),
        store.subject_id(),
        status_suffix(state.connection, state.loading, store.last_synced_at())
    );
    if let Some(error) = store.last_error() {
        let _ = writeln!(out, "! {}", error);
    }
    match store.state() {
        RecordState::Loading => {
            let _ = writeln!(out, "  loading");
        }
        RecordState::Gone => {
            let _ = writeln!(out, "  this {} no longer exists", store.entity());
        }
        RecordState::Present(record) => {
            let _ = writeln!(out, "  status: {}", display_status(record));
            if !record.label().is_empty() {
                let _ = writeln!(out, "  {}", record.label());
            }
            if let Some(description) = record.field_str("description").filter(|d| !d.is_empty())
            {
                let _ = writeln!(out, "  {}", description);
            }
            linked_services(&mut out, record);
            timeline(&mut out, record);
        }
    }
    out
}

fn linked_services(out: &mut String, record: &Record) {
    let Some(services) = record.fields.get("linked_services").and_then(Value::as_array) else {
        return;
    };
    if services.is_empty() {
        let _ = writeln!(out, "  affected: none");
        return;
    }
    let names: Vec<String> = services
        .iter()
        .filter_map(|service| {
            let name = service.get("name").and_then(Value::as_str)?;
            Some(match service.get("status").and_then(Value::as_str) {
                Some(status) => format!("{} ({})", name, status),
                None => name.to_string(),
            })
        })
        .collect();
    let _ = writeln!(out, "  affected: {}", names.join(", "));
}

/// Incident log entries, oldest first as the backend sends them.
fn timeline(out: &mut String, record: &Record) {
    let Some(logs) = record
        .fields
        .get("logs")
        .and_then(Value::as_array)
        .filter(|logs| !logs.is_empty())
    else {
        return;
    };
    let _ = writeln!(out, "  timeline:");
    for entry in logs {
        let status = entry
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("-")
            .replace('_', " ");
        let author = entry
            .get("full_name")
            .and_then(Value::as_str)
            .unwrap_or("Unknown");
        let mut line = format!("  - {}", status);
        if let Some(at) = entry.get("created_at").and_then(Value::as_str) {
            let _ = write!(line, " {}", log_time(at));
        }
        let _ = writeln!(out, "{} by {}", line, author);
        if let Some(message) = entry.get("message").and_then(Value::as_str) {
            log_message(out, message);
        }
    }
}

fn log_time(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(at) => at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M")
            .to_string(),
        Err(_) => raw.to_string(),
    }
}

/// Log messages are either plain text or a JSON object of changed fields.
fn log_message(out: &mut String, message: &str) {
    match serde_json::from_str::<Map<String, Value>>(message) {
        Ok(fields) => {
            for (key, value) in fields {
                let value = match value {
                    Value::Array(items) => items
                        .iter()
                        .map(plain_value)
                        .collect::<Vec<_>>()
                        .join(", "),
                    other => plain_value(&other),
                };
                let _ = writeln!(out, "      {}: {}", key.replace('_', " "), value);
            }
        }
        Err(_) if !message.is_empty() => {
            let _ = writeln!(out, "      {}", message);
        }
        Err(_) => {}
    }
}

fn plain_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn heading(entity: EntityKind) -> &'static str {
    match entity {
        EntityKind::Incident => "Incidents",
        EntityKind::Service => "Services",
    }
}

fn row(record: &Record) -> String {
    format!(
        "  #{:<6} {:<22} {}",
        record.id,
        display_status(record),
        record.label()
    )
}

fn display_status(record: &Record) -> &str {
    if record.status.is_empty() {
        "-"
    } else {
        record.status.as_str()
    }
}

fn status_suffix(
    connection: ConnectionState,
    loading: bool,
    synced_at: Option<DateTime<Utc>>,
) -> String {
    let mut suffix = format!(" [{}", connection);
    if loading {
        suffix.push_str(", loading");
    }
    if let Some(synced_at) = synced_at {
        let _ = write!(
            suffix,
            ", synced {}",
            synced_at.with_timezone(&Local).format("%H:%M:%S")
        );
    }
    suffix.push(']');
    suffix
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use statuspage_core::RecordId;

    fn state<S>(store: S, connection: ConnectionState) -> ViewState<S> {
        ViewState {
            store,
            connection,
            loading: false,
            mounted: true,
        }
    }

    #[test]
    fn collection_lists_records_in_order() {
        let mut store = LiveCollection::new(EntityKind::Incident);
        store.replace_all(vec![
            Record::new(5, "investigating").with_field("title", "DB down"),
            Record::new(2, "resolved").with_field("title", "Slow API"),
        ]);

        let text = collection(&state(store, ConnectionState::Open));
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("Incidents (2) [open, synced "));
        assert!(lines[1].contains("#5") && lines[1].contains("DB down"));
        assert!(lines[2].contains("#2") && lines[2].contains("resolved"));
    }

    #[test]
    fn collection_shows_fetch_error_above_data() {
        let mut store = LiveCollection::new(EntityKind::Service);
        store.replace_all(vec![Record::new(1, "operational").with_field("name", "API")]);
        store.record_fetch_failure("Failed to fetch services".to_string());

        let text = collection(&state(store, ConnectionState::Closed));
        assert!(text.contains("[closed"));
        assert!(text.contains("! Failed to fetch services"));
        assert!(text.contains("API"));
    }

    #[test]
    fn record_reports_deletion() {
        let mut store = LiveRecord::new(EntityKind::Incident, RecordId(5));
        store.replace(Record::new(5, "monitoring"));
        let text = record(&state(store.clone(), ConnectionState::Open));
        assert!(text.contains("status: monitoring"));

        let deleted = statuspage_core::Event::deleted("org1", EntityKind::Incident, RecordId(5));
        store.apply(&deleted);
        let text = record(&state(store, ConnectionState::Open));
        assert!(text.contains("this incident no longer exists"));
    }

    #[test]
    fn record_shows_affected_services_and_timeline() {
        let mut store = LiveRecord::new(EntityKind::Incident, RecordId(5));
        store.replace(
            Record::new(5, "identified")
                .with_field("title", "DB down")
                .with_field(
                    "linked_services",
                    json!([
                        { "service_id": 1, "name": "API", "status": "major_outage" },
                        { "name": "Web" }
                    ]),
                )
                .with_field(
                    "logs",
                    json!([
                        {
                            "id": "10",
                            "status": "investigating",
                            "message": "Looking into it",
                            "created_at": "not a timestamp",
                            "full_name": "Dana"
                        },
                        {
                            "id": "11",
                            "status": "partial_outage",
                            "message": "{\"status\":\"identified\",\"linked_services\":[\"API\",\"Web\"]}"
                        }
                    ]),
                ),
        );

        let text = record(&state(store, ConnectionState::Open));
        assert!(text.contains("  affected: API (major_outage), Web"));
        assert!(text.contains("  - investigating not a timestamp by Dana"));
        assert!(text.contains("      Looking into it"));
        assert!(text.contains("  - partial outage by Unknown"));
        assert!(text.contains("      status: identified"));
        assert!(text.contains("      linked services: API, Web"));
    }

    #[test]
    fn record_without_linked_services_says_none() {
        let mut store = LiveRecord::new(EntityKind::Incident, RecordId(5));
        store.replace(Record::new(5, "resolved").with_field("linked_services", json!([])));

        let text = record(&state(store, ConnectionState::Open));
        assert!(text.contains("affected: none"));
        assert!(!text.contains("timeline:"));
    }
}

//! Exercises `StatusApi` against a local socket serving canned HTTP
//! responses, so status mapping and body handling go through reqwest.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use statuspage_core::{
    EntityKind, IncidentForm, IncidentStatus, LiveError, RecordId, StaticCredentials, StatusApi,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use url::Url;

const WAIT: Duration = Duration::from_secs(5);
const TOKEN: &str = "test-token";

/// What the backend saw: request head (lowercased) and body.
struct Captured {
    head: String,
    body: String,
}

/// Serves a single request with the given status line and body.
async fn serve_once(
    status: &'static str,
    content_type: &'static str,
    body: &'static str,
) -> (Url, JoinHandle<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Failed to read local addr");

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("Failed to accept");
        let captured = read_request(&mut stream).await;
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            content_type,
            body.len(),
            body
        );
        stream
            .write_all(response.as_bytes())
            .await
            .expect("Failed to write response");
        stream.shutdown().await.ok();
        captured
    });

    let base = Url::parse(&format!("http://{}/api", addr)).expect("base url");
    (base, server)
}

async fn read_request(stream: &mut tokio::net::TcpStream) -> Captured {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        let n = stream.read(&mut chunk).await.expect("Failed to read request");
        assert!(n > 0, "client closed before sending a full request");
        buffer.extend_from_slice(&chunk[..n]);
        if let Some(index) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            break index + 4;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..head_end]).to_lowercase();
    let content_length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buffer.len() < head_end + content_length {
        let n = stream.read(&mut chunk).await.expect("Failed to read body");
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
    }

    Captured {
        head,
        body: String::from_utf8_lossy(&buffer[head_end..]).into_owned(),
    }
}

fn api(base: Url) -> StatusApi {
    StatusApi::new(base, Arc::new(StaticCredentials::new(TOKEN)))
}

async fn captured(server: JoinHandle<Captured>) -> Captured {
    timeout(WAIT, server)
        .await
        .expect("timed out waiting for test server")
        .expect("test server panicked")
}

#[tokio::test]
async fn server_error_carries_backend_message() {
    let (base, server) = serve_once(
        "500 Internal Server Error",
        "application/json",
        r#"{"error":"Incident not found"}"#,
    )
    .await;

    let err = api(base)
        .get(EntityKind::Incident, RecordId(7))
        .await
        .expect_err("500 must fail");

    match &err {
        LiveError::Fetch { status, message } => {
            assert_eq!(*status, Some(500));
            assert_eq!(message, "Incident not found");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(!err.is_not_found());

    let request = captured(server).await;
    assert!(request.head.starts_with("get /api/user/get-incident/7 "));
    assert!(request
        .head
        .contains(&format!("authorization: bearer {}", TOKEN)));
}

#[tokio::test]
async fn not_found_without_error_body_uses_operation_message() {
    let (base, server) = serve_once(
        "404 Not Found",
        "text/html",
        "<html><body>404 page not found</body></html>",
    )
    .await;

    let err = api(base)
        .get(EntityKind::Incident, RecordId(7))
        .await
        .expect_err("404 must fail");

    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "Failed to fetch incident");
    captured(server).await;
}

#[tokio::test]
async fn null_list_is_empty() {
    let (base, server) = serve_once("200 OK", "application/json", "null").await;

    let records = api(base)
        .list(EntityKind::Service)
        .await
        .expect("null list decodes");

    assert!(records.is_empty());
    let request = captured(server).await;
    assert!(request.head.starts_with("get /api/user/get-services "));
}

#[tokio::test]
async fn list_keeps_unknown_fields() {
    let (base, server) = serve_once(
        "200 OK",
        "application/json",
        r#"[{"id":"3","status":"resolved","title":"Slow API","logs":[]}]"#,
    )
    .await;

    let records = api(base)
        .list(EntityKind::Incident)
        .await
        .expect("list decodes");

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, RecordId(3));
    assert_eq!(records[0].label(), "Slow API");
    assert_eq!(records[0].fields.get("logs"), Some(&json!([])));
    captured(server).await;
}

#[tokio::test]
async fn malformed_success_body_is_a_fetch_error() {
    let (base, server) = serve_once("200 OK", "application/json", "{not json").await;

    let err = api(base)
        .list(EntityKind::Incident)
        .await
        .expect_err("bad body must fail");

    match err {
        LiveError::Fetch { status, message } => {
            assert_eq!(status, Some(200));
            assert!(message.starts_with("Failed to fetch incidents: invalid response body"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    captured(server).await;
}

#[tokio::test]
async fn edit_incident_sends_string_id() {
    let (base, server) = serve_once("200 OK", "application/json", r#"{"ok":true}"#).await;

    let form = IncidentForm::new("DB down", IncidentStatus::Identified);
    let response = api(base)
        .edit_incident(RecordId(12), &form)
        .await
        .expect("edit succeeds");
    assert_eq!(response, json!({"ok": true}));

    let request = captured(server).await;
    assert!(request.head.starts_with("put /api/admin/edit-incident "));
    let body: Value = serde_json::from_str(&request.body).expect("json body");
    assert_eq!(body["id"], json!("12"));
    assert_eq!(body["title"], json!("DB down"));
}

#[tokio::test]
async fn unreachable_backend_has_no_status() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Failed to read local addr");
    drop(listener);

    let base = Url::parse(&format!("http://{}", addr)).expect("base url");
    let err = api(base)
        .list(EntityKind::Incident)
        .await
        .expect_err("closed port must fail");

    match err {
        LiveError::Fetch { status, message } => {
            assert_eq!(status, None);
            assert!(message.starts_with("Failed to fetch incidents: "));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

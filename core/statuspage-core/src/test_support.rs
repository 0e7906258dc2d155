//! Scripted collaborators for driving live views in tests.
//!
//! Enabled for this crate's own tests and, through the `test-helpers`
//! feature, for its integration tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use statuspage_protocol::{Event, Record};
use tokio::sync::mpsc;
use url::Url;

use crate::api::RecordSource;
use crate::error::{LiveError, Result};
use crate::live::{FetchTarget, Snapshot};
use crate::transport::{BoxConnection, Connection, Connector, Frame};

type Inbound = std::result::Result<Frame, String>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

enum Scripted {
    Open(FakeConnection),
    Fail(String),
}

/// Hands out pre-scripted connections in order. Connecting with nothing
/// scripted fails.
#[derive(Default)]
pub struct FakeConnector {
    scripted: Mutex<VecDeque<Scripted>>,
    endpoints: Mutex<Vec<Url>>,
    connects: AtomicUsize,
}

impl FakeConnector {
    pub fn new() -> Self {
        FakeConnector::default()
    }

    /// Queues a connection and returns the server side of it.
    pub fn socket(&self) -> FakeSocket {
        let (tx, rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        lock(&self.scripted).push_back(Scripted::Open(FakeConnection {
            rx,
            closed: Arc::clone(&closed),
        }));
        FakeSocket {
            tx: Mutex::new(Some(tx)),
            closed,
        }
    }

    pub fn fail_next(&self, details: impl Into<String>) {
        lock(&self.scripted).push_back(Scripted::Fail(details.into()));
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn endpoints(&self) -> Vec<Url> {
        lock(&self.endpoints).clone()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, endpoint: &Url) -> Result<BoxConnection> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        lock(&self.endpoints).push(endpoint.clone());
        let next = lock(&self.scripted).pop_front();
        match next {
            Some(Scripted::Open(connection)) => Ok(Box::new(connection)),
            Some(Scripted::Fail(details)) => Err(LiveError::connection(endpoint, details)),
            None => Err(LiveError::connection(endpoint, "no scripted connection")),
        }
    }
}

struct FakeConnection {
    rx: mpsc::UnboundedReceiver<Inbound>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Connection for FakeConnection {
    async fn next_frame(&mut self) -> Option<Result<Frame>> {
        match self.rx.recv().await? {
            Ok(frame) => Some(Ok(frame)),
            Err(details) => Some(Err(LiveError::connection("fake", details))),
        }
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        self.rx.close();
    }
}

/// Server side of a scripted connection.
pub struct FakeSocket {
    tx: Mutex<Option<mpsc::UnboundedSender<Inbound>>>,
    closed: Arc<AtomicBool>,
}

impl FakeSocket {
    pub fn push_text(&self, text: impl Into<String>) {
        self.send(Ok(Frame::Text(text.into())));
    }

    pub fn push_binary(&self, bytes: Vec<u8>) {
        self.send(Ok(Frame::Binary(bytes)));
    }

    pub fn push_event(&self, event: &Event) {
        self.push_text(event.to_frame());
    }

    /// Fails the connection with a transport error.
    pub fn push_error(&self, details: impl Into<String>) {
        self.send(Err(details.into()));
    }

    /// Closes the connection from the server side.
    pub fn hang_up(&self) {
        lock(&self.tx).take();
    }

    /// Whether the client asked for an orderly close.
    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn send(&self, inbound: Inbound) {
        if let Some(tx) = lock(&self.tx).as_ref() {
            // The client may already be gone; tests assert on the store instead.
            let _ = tx.send(inbound);
        }
    }
}

/// A record source whose responses are fed one at a time by the test.
pub struct FakeSource {
    tx: mpsc::UnboundedSender<Result<Snapshot>>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Result<Snapshot>>>,
    targets: Mutex<Vec<FetchTarget>>,
    calls: AtomicUsize,
}

impl Default for FakeSource {
    fn default() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        FakeSource {
            tx,
            rx: tokio::sync::Mutex::new(rx),
            targets: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }
}

impl FakeSource {
    pub fn new() -> Self {
        FakeSource::default()
    }

    pub fn respond(&self, snapshot: Snapshot) {
        let _ = self.tx.send(Ok(snapshot));
    }

    pub fn respond_records(&self, records: Vec<Record>) {
        self.respond(Snapshot::Collection(records));
    }

    pub fn respond_record(&self, record: Record) {
        self.respond(Snapshot::Record(record));
    }

    pub fn fail(&self, status: Option<u16>, message: impl Into<String>) {
        let _ = self.tx.send(Err(LiveError::fetch(status, message)));
    }

    /// Number of fetches started, answered or not.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn targets(&self) -> Vec<FetchTarget> {
        lock(&self.targets).clone()
    }
}

#[async_trait]
impl RecordSource for FakeSource {
    async fn fetch(&self, target: FetchTarget) -> Result<Snapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.targets).push(target);
        let mut rx = self.rx.lock().await;
        match rx.recv().await {
            Some(response) => response,
            None => Err(LiveError::fetch(None, "source closed")),
        }
    }
}

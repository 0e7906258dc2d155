//! Connection lifecycle manager.
//!
//! A mounted view is one driver future ([`LiveView::run`]) that owns its store,
//! its REST fetch and its own live connection. Renderers never touch the store
//! directly: they read [`ViewState`] through a `watch` channel held by the
//! [`ViewHandle`].
//!
//! ```text
//! Idle ──mount──► Connecting ──open──► Open ──close/error/unmount──► Closed
//!                      │                                   │
//!                      └────────── connect failed ─────────┘
//! ```
//!
//! Unmount wins every race: the driver checks the cancellation token before
//! applying any fetch result or frame, so nothing lands in a store after its
//! view went away.

use std::future::{pending, Future};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use statuspage_protocol::{decode, live_endpoint};
use tokio::sync::{watch, Notify};
use tokio::time::{sleep, timeout, Sleep};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::api::RecordSource;
use crate::auth::ViewerContext;
use crate::backoff::ReconnectPolicy;
use crate::error::Result;
use crate::live::{FetchTarget, Snapshot, ViewStore, ViewerScope};
use crate::transport::{BoxConnection, Connector, Frame};

/// How long teardown waits for an orderly close before dropping the socket.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What renderers observe.
#[derive(Debug, Clone)]
pub struct ViewState<S> {
    pub store: S,
    pub connection: ConnectionState,
    /// A fetch is in flight.
    pub loading: bool,
    pub mounted: bool,
}

/// Everything a view needs besides its store. Passed explicitly at mount.
#[derive(Clone)]
pub struct ViewConfig {
    pub base_url: Url,
    pub viewer: ViewerContext,
    pub connector: Arc<dyn Connector>,
    pub source: Arc<dyn RecordSource>,
    pub reconnect: ReconnectPolicy,
}

pub struct ViewHandle<S> {
    state: watch::Receiver<ViewState<S>>,
    unmount: CancellationToken,
    refresh: Arc<Notify>,
}

impl<S> ViewHandle<S> {
    pub fn subscribe(&self) -> watch::Receiver<ViewState<S>> {
        self.state.clone()
    }

    pub fn snapshot(&self) -> ViewState<S>
    where
        S: Clone,
    {
        self.state.borrow().clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state.borrow().connection
    }

    pub fn is_mounted(&self) -> bool {
        self.state.borrow().mounted && !self.unmount.is_cancelled()
    }

    /// Re-runs the fetch. Requests made while one is in flight coalesce into
    /// a single follow-up fetch.
    pub fn refresh(&self) {
        if !self.unmount.is_cancelled() {
            self.refresh.notify_one();
        }
    }

    pub fn unmount(&self) {
        self.unmount.cancel();
    }
}

impl<S> Drop for ViewHandle<S> {
    fn drop(&mut self) {
        self.unmount.cancel();
    }
}

pub struct LiveView<S: ViewStore> {
    endpoint: Url,
    target: FetchTarget,
    scope: ViewerScope,
    connector: Arc<dyn Connector>,
    source: Arc<dyn RecordSource>,
    reconnect: ReconnectPolicy,
    state: watch::Sender<ViewState<S>>,
    unmount: CancellationToken,
    refresh: Arc<Notify>,
}

impl<S: ViewStore> LiveView<S> {
    /// Builds the handle and the driver. Nothing happens until the driver is
    /// polled; [`LiveView::spawn`] does both in one step.
    pub fn mount(config: ViewConfig, store: S) -> Result<(ViewHandle<S>, LiveView<S>)> {
        let endpoint = live_endpoint(&config.base_url)?;
        let target = store.target();
        let scope = ViewerScope::for_target(&config.viewer, target);
        if scope.org_id().is_none() {
            tracing::warn!(
                entity = %target.entity(),
                "Viewer organization is unresolved; live events will not be applied"
            );
        }

        let (tx, rx) = watch::channel(ViewState {
            store,
            connection: ConnectionState::Idle,
            loading: false,
            mounted: true,
        });
        let unmount = CancellationToken::new();
        let refresh = Arc::new(Notify::new());

        let handle = ViewHandle {
            state: rx,
            unmount: unmount.clone(),
            refresh: Arc::clone(&refresh),
        };
        let view = LiveView {
            endpoint,
            target,
            scope,
            connector: config.connector,
            source: config.source,
            reconnect: config.reconnect,
            state: tx,
            unmount,
            refresh,
        };
        Ok((handle, view))
    }

    /// Mounts and spawns the driver on the current tokio runtime.
    pub fn spawn(config: ViewConfig, store: S) -> Result<ViewHandle<S>> {
        let (handle, view) = LiveView::mount(config, store)?;
        tokio::spawn(view.run());
        Ok(handle)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Drives the view until it is unmounted.
    pub async fn run(self) {
        tracing::debug!(
            endpoint = %self.endpoint,
            org_id = self.scope.org_id().unwrap_or(""),
            entity = %self.target.entity(),
            subject_id = ?self.target.subject_id(),
            "Mounting live view"
        );

        // Initial fetch and connection open run concurrently.
        let mut fetch: Option<BoxFuture<Result<Snapshot>>> = Some(self.start_fetch());
        let mut connecting: Option<BoxFuture<Result<BoxConnection>>> = Some(self.start_connect());
        let mut connection: Option<BoxConnection> = None;
        let mut retry: Option<Pin<Box<Sleep>>> = None;
        let mut attempt: u32 = 0;
        let mut refresh_pending = false;

        loop {
            tokio::select! {
                biased;

                _ = self.unmount.cancelled() => break,

                result = poll_slot(&mut fetch), if fetch.is_some() => {
                    fetch = None;
                    if self.unmount.is_cancelled() {
                        break;
                    }
                    self.finish_fetch(result);
                    if refresh_pending {
                        refresh_pending = false;
                        fetch = Some(self.start_fetch());
                    }
                }

                result = poll_slot(&mut connecting), if connecting.is_some() => {
                    connecting = None;
                    match result {
                        Ok(mut opened) => {
                            if self.unmount.is_cancelled() {
                                opened.close().await;
                                break;
                            }
                            tracing::debug!(endpoint = %self.endpoint, "Live connection open");
                            connection = Some(opened);
                            self.set_connection(ConnectionState::Open);
                            if attempt > 0 {
                                // Events sent while disconnected are gone; resync.
                                attempt = 0;
                                if fetch.is_some() {
                                    refresh_pending = true;
                                } else {
                                    fetch = Some(self.start_fetch());
                                }
                            }
                        }
                        Err(err) => {
                            tracing::warn!(
                                endpoint = %self.endpoint,
                                error = %err,
                                "Live connection failed"
                            );
                            self.set_connection(ConnectionState::Closed);
                            retry = self.schedule_retry(&mut attempt);
                        }
                    }
                }

                frame = poll_connection(&mut connection), if connection.is_some() => {
                    match frame {
                        Some(Ok(frame)) => self.handle_frame(frame),
                        Some(Err(err)) => {
                            tracing::warn!(
                                endpoint = %self.endpoint,
                                error = %err,
                                "Live connection error"
                            );
                            connection = None;
                            self.set_connection(ConnectionState::Closed);
                            retry = self.schedule_retry(&mut attempt);
                        }
                        None => {
                            tracing::warn!(endpoint = %self.endpoint, "Live connection closed by server");
                            connection = None;
                            self.set_connection(ConnectionState::Closed);
                            retry = self.schedule_retry(&mut attempt);
                        }
                    }
                }

                _ = poll_slot(&mut retry), if retry.is_some() => {
                    retry = None;
                    tracing::info!(endpoint = %self.endpoint, attempt, "Reconnecting live view");
                    connecting = Some(self.start_connect());
                }

                _ = self.refresh.notified() => {
                    if fetch.is_some() {
                        refresh_pending = true;
                    } else {
                        fetch = Some(self.start_fetch());
                    }
                }
            }
        }

        // In-flight work is discarded unapplied.
        drop(fetch);
        drop(connecting);
        if let Some(mut open) = connection.take() {
            if timeout(CLOSE_TIMEOUT, open.close()).await.is_err() {
                tracing::debug!(endpoint = %self.endpoint, "Live connection close timed out");
            }
        }
        self.state.send_modify(|state| {
            state.connection = ConnectionState::Closed;
            state.loading = false;
            state.mounted = false;
        });
        tracing::debug!(endpoint = %self.endpoint, "Live view unmounted");
    }

    fn start_fetch(&self) -> BoxFuture<Result<Snapshot>> {
        self.state.send_if_modified(|state| !std::mem::replace(&mut state.loading, true));
        let source = Arc::clone(&self.source);
        let target = self.target;
        Box::pin(async move { source.fetch(target).await })
    }

    fn start_connect(&self) -> BoxFuture<Result<BoxConnection>> {
        self.set_connection(ConnectionState::Connecting);
        let connector = Arc::clone(&self.connector);
        let endpoint = self.endpoint.clone();
        Box::pin(async move { connector.connect(&endpoint).await })
    }

    fn finish_fetch(&self, result: Result<Snapshot>) {
        match result {
            Ok(snapshot) => {
                self.state.send_modify(|state| {
                    state.store.replace_from_fetch(snapshot);
                    state.loading = false;
                });
            }
            Err(err) => {
                tracing::warn!(
                    entity = %self.target.entity(),
                    subject_id = ?self.target.subject_id(),
                    error = %err,
                    "Fetch failed; keeping last known data"
                );
                let not_found = err.is_not_found();
                let message = err.to_string();
                self.state.send_modify(|state| {
                    if not_found {
                        state.store.record_not_found(message);
                    } else {
                        state.store.record_fetch_failure(message);
                    }
                    state.loading = false;
                });
            }
        }
    }

    fn handle_frame(&self, frame: Frame) {
        let text = match frame {
            Frame::Text(text) => text,
            Frame::Binary(bytes) => {
                tracing::debug!(
                    endpoint = %self.endpoint,
                    len = bytes.len(),
                    "Dropping binary frame"
                );
                return;
            }
        };

        let event = match decode(&text) {
            Ok(event) => event,
            Err(failure) => {
                tracing::debug!(endpoint = %self.endpoint, error = %failure, "Dropping undecodable frame");
                return;
            }
        };
        if !self.scope.matches(&event) {
            tracing::trace!(tag = %event.tag(), "Event outside view scope");
            return;
        }
        if self.unmount.is_cancelled() {
            return;
        }

        self.state.send_if_modified(|state| {
            let applied = state.store.apply(&event);
            tracing::debug!(
                tag = %event.tag(),
                applied = ?applied,
                "Applied live event"
            );
            applied.changed()
        });
    }

    fn set_connection(&self, connection: ConnectionState) {
        self.state.send_if_modified(|state| {
            if state.connection == connection {
                return false;
            }
            state.connection = connection;
            true
        });
    }

    fn schedule_retry(&self, attempt: &mut u32) -> Option<Pin<Box<Sleep>>> {
        *attempt = attempt.saturating_add(1);
        match self.reconnect.delay_for(*attempt) {
            Some(delay) => {
                tracing::debug!(
                    endpoint = %self.endpoint,
                    attempt = *attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Scheduling reconnect"
                );
                Some(Box::pin(sleep(delay)))
            }
            None => {
                if self.reconnect != ReconnectPolicy::Never {
                    tracing::warn!(
                        endpoint = %self.endpoint,
                        attempts = *attempt - 1,
                        "Giving up on live connection"
                    );
                }
                None
            }
        }
    }
}

async fn poll_slot<F: Future + Unpin>(slot: &mut Option<F>) -> F::Output {
    match slot.as_mut() {
        Some(future) => future.await,
        None => pending().await,
    }
}

async fn poll_connection(connection: &mut Option<BoxConnection>) -> Option<Result<Frame>> {
    match connection.as_mut() {
        Some(connection) => connection.next_frame().await,
        None => pending().await,
    }
}

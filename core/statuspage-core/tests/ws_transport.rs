//! Runs `WsConnector` against a local tungstenite peer.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use statuspage_core::{Connection, Connector, Frame, LiveError, WsConnector};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};
use url::Url;

const WAIT: Duration = Duration::from_secs(5);

/// Accepts one WebSocket client and hands the server side to `script`.
async fn peer<F, Fut, T>(script: F) -> (Url, JoinHandle<T>)
where
    F: FnOnce(WebSocketStream<tokio::net::TcpStream>) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = T> + Send,
    T: Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Failed to read local addr");

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("Failed to accept");
        let ws = accept_async(stream).await.expect("Failed WebSocket handshake");
        script(ws).await
    });

    let endpoint = Url::parse(&format!("ws://{}/ws", addr)).expect("endpoint");
    (endpoint, server)
}

#[tokio::test]
async fn text_is_delivered_and_peer_close_ends_stream() {
    let (endpoint, server) = peer(|mut ws| async move {
        ws.send(Message::Text("hello".into())).await.expect("send text");
        ws.send(Message::Ping(vec![1, 2, 3].into()))
            .await
            .expect("send ping");
        ws.send(Message::Binary(vec![7, 8].into()))
            .await
            .expect("send binary");
        ws.send(Message::Close(None)).await.expect("send close");
        while let Some(Ok(_)) = ws.next().await {}
    })
    .await;

    let mut connection = WsConnector
        .connect(&endpoint)
        .await
        .expect("Failed to connect");

    let first = timeout(WAIT, connection.next_frame())
        .await
        .expect("timed out")
        .expect("stream ended early")
        .expect("transport error");
    assert_eq!(first, Frame::Text("hello".to_string()));

    let second = timeout(WAIT, connection.next_frame())
        .await
        .expect("timed out")
        .expect("stream ended early")
        .expect("transport error");
    assert_eq!(second, Frame::Binary(vec![7, 8]));

    let end = timeout(WAIT, connection.next_frame())
        .await
        .expect("timed out");
    assert!(end.is_none(), "close must end the stream, got {:?}", end);

    drop(connection);
    timeout(WAIT, server)
        .await
        .expect("timed out waiting for peer")
        .expect("peer panicked");
}

#[tokio::test]
async fn close_sends_close_frame() {
    let (endpoint, server) = peer(|mut ws| async move {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) => return true,
                Some(Ok(_)) => continue,
                Some(Err(_)) | None => return false,
            }
        }
    })
    .await;

    let mut connection = WsConnector
        .connect(&endpoint)
        .await
        .expect("Failed to connect");
    timeout(WAIT, connection.close())
        .await
        .expect("timed out closing");

    let saw_close = timeout(WAIT, server)
        .await
        .expect("timed out waiting for peer")
        .expect("peer panicked");
    assert!(saw_close, "peer never received a close frame");
}

#[tokio::test]
async fn refused_connection_is_an_error() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Failed to read local addr");
    drop(listener);

    let endpoint = Url::parse(&format!("ws://{}/ws", addr)).expect("endpoint");
    let err = WsConnector
        .connect(&endpoint)
        .await
        .err()
        .expect("closed port must fail");
    assert!(matches!(err, LiveError::Connection { .. }));
}

//! Live transport seam.
//!
//! A [`Connector`] opens one [`Connection`] per mounted view; connections are
//! never pooled or reused. [`WsConnector`] is the WebSocket implementation.

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::{LiveError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

#[async_trait]
pub trait Connection: Send {
    /// Next data frame. `None` once the peer closed the connection. Must be
    /// cancel-safe: the view driver races it against unmount.
    async fn next_frame(&mut self) -> Option<Result<Frame>>;

    /// Requests an orderly close. Errors are swallowed; the connection is
    /// dropped either way.
    async fn close(&mut self);
}

pub type BoxConnection = Box<dyn Connection>;

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &Url) -> Result<BoxConnection>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, endpoint: &Url) -> Result<BoxConnection> {
        let (stream, response) = connect_async(endpoint.as_str())
            .await
            .map_err(|err| LiveError::connection(endpoint, err))?;
        tracing::debug!(
            endpoint = %endpoint,
            status = response.status().as_u16(),
            "Live socket handshake complete"
        );
        Ok(Box::new(WsConnection {
            endpoint: endpoint.to_string(),
            stream,
        }))
    }
}

struct WsConnection {
    endpoint: String,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connection for WsConnection {
    async fn next_frame(&mut self) -> Option<Result<Frame>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(err) => return Some(Err(LiveError::connection(&self.endpoint, err))),
            };
            match message {
                Message::Text(text) => return Some(Ok(Frame::Text(text.to_string()))),
                Message::Binary(bytes) => return Some(Ok(Frame::Binary(bytes.to_vec()))),
                Message::Close(frame) => {
                    tracing::debug!(endpoint = %self.endpoint, close = ?frame, "Live socket closed by peer");
                    return None;
                }
                // Pings are answered by tungstenite on the next read.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }

    async fn close(&mut self) {
        if let Err(err) = self.stream.close(None).await {
            tracing::debug!(endpoint = %self.endpoint, error = %err, "Live socket close failed");
        }
    }
}

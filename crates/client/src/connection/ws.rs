// tokio-tungstenite transport for the chat channel.

use anyhow::{anyhow, Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use super::{ChatTransport, Incoming};

/// Close code reported when the stream ends without a close frame.
const NO_STATUS: u16 = 1005;
const CONNECTION_RESET: u16 = 1006;

/// Production WebSocket transport.
#[derive(Default)]
pub struct WsTransport {
    stream: Option<WebSocketStream<MaybeTlsStream<TcpStream>>>,
}

impl WsTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChatTransport for WsTransport {
    async fn connect(&mut self, url: &Url) -> Result<()> {
        let (stream, _response) =
            connect_async(url.as_str()).await.context("WebSocket handshake failed")?;
        self.stream = Some(stream);
        Ok(())
    }

    async fn send(&mut self, payload: String) -> Result<()> {
        let stream = self.stream.as_mut().ok_or_else(|| anyhow!("channel is not open"))?;
        stream.send(Message::Text(payload.into())).await.context("WebSocket write failed")
    }

    async fn recv(&mut self) -> Result<Incoming> {
        let stream = self.stream.as_mut().ok_or_else(|| anyhow!("channel is not open"))?;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Incoming::Text(text.to_string())),
                Some(Ok(Message::Close(frame))) => {
                    self.stream = None;
                    let (code, reason) = match frame {
                        Some(frame) => (u16::from(frame.code), frame.reason.to_string()),
                        None => (NO_STATUS, String::new()),
                    };
                    return Ok(Incoming::Closed { code, reason });
                }
                // Pings are answered by tungstenite itself; binary
                // frames are not part of the chat protocol.
                Some(Ok(_)) => continue,
                Some(Err(error)) => {
                    self.stream = None;
                    return Err(error).context("WebSocket read failed");
                }
                None => {
                    self.stream = None;
                    return Ok(Incoming::Closed {
                        code: CONNECTION_RESET,
                        reason: "connection reset".to_owned(),
                    });
                }
            }
        }
    }

    async fn close(&mut self, code: u16, reason: &str) {
        if let Some(mut stream) = self.stream.take() {
            let frame =
                CloseFrame { code: CloseCode::from(code), reason: reason.to_owned().into() };
            if let Err(error) = stream.close(Some(frame)).await {
                tracing::debug!(%error, "channel close handshake failed");
            }
        }
    }
}

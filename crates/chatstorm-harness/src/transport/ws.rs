//! Transport-native framing: one WebSocket text message per JSON body.
//!
//! WebSocket ping/pong is answered by the WS layer itself; there is no
//! application-level heartbeat on this variant.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use chatstorm_core::error::{HarnessError, Result};
use chatstorm_core::protocol::frame::{InboundFrame, WireVariant};

use crate::config::TargetSection;
use crate::transport::{Connection, FrameReader, FrameWriter};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WsFrameReader {
    inner: SplitStream<WsStream>,
}

#[async_trait]
impl FrameReader for WsFrameReader {
    async fn read_frame(&mut self) -> Result<InboundFrame> {
        let body = self.next_payload().await?;
        Ok(WireVariant::TransportNative.classify(body))
    }

    async fn read_some(&mut self, max: usize) -> Result<Bytes> {
        let mut body = self.next_payload().await?;
        body.truncate(max);
        Ok(body)
    }
}

impl WsFrameReader {
    /// Next text or binary payload; control frames are skipped.
    async fn next_payload(&mut self) -> Result<Bytes> {
        loop {
            let Some(incoming) = self.inner.next().await else {
                return Err(HarnessError::ConnectionLost("websocket stream ended".into()));
            };
            match incoming.map_err(classify)? {
                Message::Text(t) => return Ok(Bytes::copy_from_slice(t.as_bytes())),
                Message::Binary(b) => return Ok(Bytes::copy_from_slice(&b)),
                Message::Close(frame) => {
                    let reason = frame
                        .map(|f| format!("{} {}", u16::from(f.code), f.reason))
                        .unwrap_or_else(|| "no close frame".into());
                    return Err(HarnessError::ConnectionLost(format!(
                        "closed by peer: {reason}"
                    )));
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }
}

pub struct WsFrameWriter {
    inner: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameWriter for WsFrameWriter {
    async fn write_frame(&mut self, body: &[u8]) -> Result<()> {
        let text = String::from_utf8(body.to_vec())
            .map_err(|e| HarnessError::Unexpected(format!("body is not utf-8: {e}")))?;
        self.inner.send(Message::text(text)).await.map_err(classify)
    }

    async fn shutdown(&mut self) -> Result<()> {
        match self.inner.close().await {
            Ok(()) | Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(classify(e)),
        }
    }
}

fn classify(e: WsError) -> HarnessError {
    match e {
        WsError::ConnectionClosed | WsError::AlreadyClosed => {
            HarnessError::ConnectionLost("websocket closed".into())
        }
        WsError::Io(io) => HarnessError::from_io("websocket io", io),
        WsError::Protocol(p) => HarnessError::ConnectionLost(format!("websocket protocol: {p}")),
        other => HarnessError::Unexpected(format!("websocket: {other}")),
    }
}

pub async fn dial(target: &TargetSection, limit: Duration) -> Result<Connection> {
    let url = target.ws_url();
    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| HarnessError::ConnectFailed(format!("{url}: {e}")))?;

    if let Some(proto) = &target.subprotocol {
        let value = HeaderValue::from_str(proto)
            .map_err(|e| HarnessError::ConnectFailed(format!("bad subprotocol {proto:?}: {e}")))?;
        request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, value);
    }

    let (stream, _response) = timeout(limit, connect_async(request))
        .await
        .map_err(|_| {
            HarnessError::ConnectFailed(format!("{url}: timed out after {}ms", limit.as_millis()))
        })?
        .map_err(|e| HarnessError::ConnectFailed(format!("{url}: {e}")))?;

    let (sink, stream) = stream.split();
    Ok(Connection::new(
        WsFrameReader { inner: stream },
        WsFrameWriter { inner: sink },
    ))
}

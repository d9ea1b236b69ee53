#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use chatstorm_core::protocol::frame::WireVariant;
use chatstorm_harness::config::{self, HarnessConfig};
use chatstorm_harness::sim::{ChannelDirectory, ClientSession, SessionId};
use chatstorm_harness::sink::{self, EventFeed};

pub async fn listener() -> (TcpListener, SocketAddr) {
    let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = l.local_addr().unwrap();
    (l, addr)
}

/// An address nothing listens on.
pub async fn dead_addr() -> SocketAddr {
    let (l, addr) = listener().await;
    drop(l);
    addr
}

/// Hex-framed target on `addr`; `fleet` is spliced into the fleet section.
pub fn config(addr: SocketAddr, fleet: &str) -> Arc<HarnessConfig> {
    let yaml = format!(
        r#"
version: 1
target:
  host: "127.0.0.1"
  port: {port}
  connect_timeout_ms: 1000
fleet:
  seed: 11
{fleet}
"#,
        port = addr.port()
    );
    Arc::new(config::load_from_str(&yaml).unwrap())
}

pub struct Harness {
    pub session: ClientSession,
    pub feed: EventFeed,
    pub stop: CancellationToken,
    pub directory: Arc<ChannelDirectory>,
}

pub fn session(cfg: Arc<HarnessConfig>) -> Harness {
    let (events, feed) = sink::channel(cfg.fleet.sink_capacity, cfg.fleet.sink_reliable_timeout_ms);
    let stop = CancellationToken::new();
    let directory = Arc::new(ChannelDirectory::new());
    let session = ClientSession::new(
        SessionId(0),
        cfg,
        events,
        stop.clone(),
        Arc::clone(&directory),
    );
    Harness {
        session,
        feed,
        stop,
        directory,
    }
}

pub async fn read_hex_frame(s: &mut TcpStream) -> Vec<u8> {
    let mut header = [0u8; 4];
    s.read_exact(&mut header).await.unwrap();
    let len = WireVariant::HexLength.parse_header(&header).unwrap();
    let mut body = vec![0u8; len];
    s.read_exact(&mut body).await.unwrap();
    body
}

pub async fn read_hex_json(s: &mut TcpStream) -> Value {
    let body = read_hex_frame(s).await;
    serde_json::from_slice(&body).unwrap()
}

pub async fn write_hex_frame(s: &mut TcpStream, body: &[u8]) {
    let frame = WireVariant::HexLength.encode(body).unwrap();
    s.write_all(&frame).await.unwrap();
}

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use chatstorm_core::protocol::frame::WireVariant;
use chatstorm_harness::transport::stream::framed;
use chatstorm_harness::transport::SharedWriter;
use tokio::io::AsyncReadExt;

#[tokio::test]
async fn frames_do_not_interleave() {
    let (client, mut server) = tokio::io::duplex(64 * 1024);
    let conn = framed(client, WireVariant::HexLength, 0xFFFF);
    let writer = SharedWriter::new(conn.writer);

    let a = writer.clone();
    let b = writer.clone();
    let ta = tokio::spawn(async move {
        for _ in 0..50 {
            a.send(br#"{"n":"aaaaaaaa"}"#).await.unwrap();
        }
    });
    let tb = tokio::spawn(async move {
        for _ in 0..50 {
            b.send(br#"{"n":"bb"}"#).await.unwrap();
        }
    });
    ta.await.unwrap();
    tb.await.unwrap();
    assert!(writer.close().await);

    let mut wire = Vec::new();
    server.read_to_end(&mut wire).await.unwrap();

    let mut rest = wire.as_slice();
    let mut frames = 0;
    while !rest.is_empty() {
        let len = WireVariant::HexLength.parse_header(&rest[..4]).unwrap();
        let body = &rest[4..4 + len];
        assert!(body == br#"{"n":"aaaaaaaa"}"# || body == br#"{"n":"bb"}"#);
        rest = &rest[4 + len..];
        frames += 1;
    }
    assert_eq!(frames, 100);
}

#[tokio::test]
async fn close_happens_once() {
    let (client, _server) = tokio::io::duplex(1024);
    let conn = framed(client, WireVariant::BinaryLength, 1024);
    let writer = SharedWriter::new(conn.writer);

    assert!(!writer.is_closed().await);
    assert!(writer.close().await);
    assert!(!writer.close().await);
    assert!(writer.is_closed().await);

    let err = writer.send(b"{}").await.unwrap_err();
    assert_eq!(err.kind().as_str(), "CONNECTION_LOST");
}

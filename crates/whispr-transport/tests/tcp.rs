//! Integration tests for the TCP transport.
//!
//! These spin up a real listener on an OS-assigned port and talk to it
//! with a plain `tokio::net::TcpStream` client.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use whispr_transport::{TcpTransport, Transport};

async fn bind_local() -> (TcpTransport, String) {
    let transport = TcpTransport::bind("127.0.0.1:0")
        .await
        .expect("should bind");
    let addr = transport.local_addr().expect("local addr").to_string();
    (transport, addr)
}

#[tokio::test]
async fn test_tcp_accept_and_send_receive() {
    let (mut transport, addr) = bind_local().await;

    let server = tokio::spawn(async move {
        transport.accept().await.expect("should accept")
    });
    let mut client = TcpStream::connect(&addr).await.expect("connect");
    let conn = server.await.expect("task should complete");

    assert!(conn.id().into_inner() > 0);
    let (mut reader, mut writer) = conn.into_split();
    assert_eq!(reader.id(), writer.id());

    // Server → client.
    writer.send(b"hello from server").await.expect("send");
    let mut buf = [0u8; 17];
    client.read_exact(&mut buf).await.expect("client read");
    assert_eq!(&buf, b"hello from server");

    // Client → server.
    client.write_all(b"hello from client").await.expect("write");
    let mut received = Vec::new();
    while received.len() < 17 {
        let chunk = reader
            .recv_chunk()
            .await
            .expect("recv")
            .expect("not closed");
        received.extend_from_slice(&chunk);
    }
    assert_eq!(received, b"hello from client");
}

#[tokio::test]
async fn test_tcp_recv_chunk_returns_none_on_peer_close() {
    let (mut transport, addr) = bind_local().await;

    let server = tokio::spawn(async move { transport.accept().await.unwrap() });
    let client = TcpStream::connect(&addr).await.unwrap();
    let conn = server.await.unwrap();
    let (mut reader, _writer) = conn.into_split();

    drop(client);

    let result = reader.recv_chunk().await.expect("clean close is not an error");
    assert!(result.is_none());
}

#[tokio::test]
async fn test_tcp_connection_ids_increase() {
    let (mut transport, addr) = bind_local().await;

    let server = tokio::spawn(async move {
        let a = transport.accept().await.unwrap();
        let b = transport.accept().await.unwrap();
        (a.id(), b.id())
    });
    let _c1 = TcpStream::connect(&addr).await.unwrap();
    let _c2 = TcpStream::connect(&addr).await.unwrap();

    let (a, b) = server.await.unwrap();
    assert!(a < b, "later connections get larger ids");
}

#[tokio::test]
async fn test_tcp_close_signals_eof_to_peer() {
    let (mut transport, addr) = bind_local().await;

    let server = tokio::spawn(async move { transport.accept().await.unwrap() });
    let mut client = TcpStream::connect(&addr).await.unwrap();
    let conn = server.await.unwrap();
    let (_reader, mut writer) = conn.into_split();

    writer.close().await.expect("shutdown");

    let mut buf = Vec::new();
    let n = client.read_to_end(&mut buf).await.expect("read to end");
    assert_eq!(n, 0);
}

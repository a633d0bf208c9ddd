//! Async reader tests over an in-memory duplex pipe.

use tokio::io::AsyncWriteExt;
use whispr_crypto::SessionKey;
use whispr_protocol::{
    ClientMessage, FramingError, MessageType, Request, Response, ResponseCode, encode,
    read_request, read_response,
};

#[tokio::test]
async fn test_read_request_plaintext_handshake() {
    let (mut client, mut server) = tokio::io::duplex(4096);
    let request = Request::text(ClientMessage::Handshake {
        public_key_pem: "-----BEGIN PUBLIC KEY-----\n...".into(),
    });
    client.write_all(&encode(&request, None).unwrap()).await.unwrap();

    let received = read_request(&mut server, None).await.unwrap();
    assert_eq!(received, request);
}

#[tokio::test]
async fn test_read_response_sealed_in_two_writes() {
    let (mut server, mut client) = tokio::io::duplex(4096);
    let key = SessionKey::generate();
    let response = Response::new(ResponseCode::Ok, MessageType::Voice, "bob: 0a0b0c");
    let frame = encode(&response, Some(&key)).unwrap();

    let (head, tail) = frame.split_at(5);
    server.write_all(head).await.unwrap();
    let writer = tokio::spawn({
        let tail = tail.to_vec();
        async move {
            tokio::task::yield_now().await;
            server.write_all(&tail).await.unwrap();
            server
        }
    });

    let received = read_response(&mut client, Some(&key)).await.unwrap();
    assert_eq!(received, response);
    drop(writer.await.unwrap());
}

#[tokio::test]
async fn test_read_request_eof_mid_frame_is_connection_closed() {
    let (mut client, mut server) = tokio::io::duplex(4096);
    client.write_all(b"70000005ali").await.unwrap();
    drop(client);

    let result = read_request(&mut server, None).await;
    assert!(matches!(result, Err(FramingError::ConnectionClosed)));
}

#[tokio::test]
async fn test_read_request_eof_before_header_is_connection_closed() {
    let (client, mut server) = tokio::io::duplex(64);
    drop(client);

    let result = read_request(&mut server, None).await;
    assert!(matches!(result, Err(FramingError::ConnectionClosed)));
}

#[tokio::test]
async fn test_read_request_unknown_code_is_malformed() {
    let (mut client, mut server) = tokio::io::duplex(64);
    client.write_all(b"50000001x").await.unwrap();

    let result = read_request(&mut server, None).await;
    assert!(matches!(result, Err(FramingError::Malformed(_))));
}

//! Property tests for the frame codec.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use proptest::prelude::*;
use whispr_crypto::SessionKey;
use whispr_protocol::{
    ClientMessage, FrameDecoder, MessageType, Request, Response, ResponseCode, encode,
};

fn message_type() -> impl Strategy<Value = MessageType> {
    prop_oneof![Just(MessageType::Text), Just(MessageType::Voice)]
}

fn client_message() -> impl Strategy<Value = ClientMessage> {
    let s = || any::<String>();
    prop_oneof![
        s().prop_map(|public_key_pem| ClientMessage::Handshake { public_key_pem }),
        s().prop_map(|username| ClientMessage::SetUsername { username }),
        (s(), s()).prop_map(|(username, password)| ClientMessage::SetPassword { username, password }),
        (s(), s()).prop_map(|(username, text)| ClientMessage::Broadcast { username, text }),
        (s(), s(), s()).prop_map(|(username, recipient, text)| ClientMessage::Private {
            username,
            recipient,
            text,
        }),
    ]
}

fn response_code() -> impl Strategy<Value = ResponseCode> {
    (1u8..=9).prop_map(|d| ResponseCode::from_digit(d).expect("1..=9 are all assigned"))
}

// Property: any request survives a plaintext encode/decode.
proptest! {
    #[test]
    fn prop_request_plaintext_roundtrip(message in client_message(), message_type in message_type()) {
        let request = Request { message_type, message };
        let mut decoder = FrameDecoder::new();
        decoder.push(&encode(&request, None).unwrap());

        prop_assert_eq!(decoder.decode::<Request>(None).unwrap(), Some(request));
        prop_assert_eq!(decoder.buffered(), 0);
    }
}

// Property: any request survives the encrypted envelope.
proptest! {
    #[test]
    fn prop_request_envelope_roundtrip(message in client_message(), message_type in message_type()) {
        let key = SessionKey::generate();
        let request = Request { message_type, message };
        let mut decoder = FrameDecoder::new();
        decoder.push(&encode(&request, Some(&key)).unwrap());

        prop_assert_eq!(decoder.decode::<Request>(Some(&key)).unwrap(), Some(request));
    }
}

// Property: responses survive the envelope, and splitting the frame at
// any point only delays the result.
proptest! {
    #[test]
    fn prop_response_split_anywhere_decodes_once(
        code in response_code(),
        text in any::<String>(),
        split in any::<prop::sample::Index>(),
    ) {
        let key = SessionKey::generate();
        let response = Response::text(code, text);
        let frame = encode(&response, Some(&key)).unwrap();
        let at = split.index(frame.len());

        let mut decoder = FrameDecoder::new();
        decoder.push(&frame[..at]);
        prop_assert_eq!(decoder.decode::<Response>(Some(&key)).unwrap(), None);
        decoder.push(&frame[at..]);
        prop_assert_eq!(decoder.decode::<Response>(Some(&key)).unwrap(), Some(response));
    }
}
